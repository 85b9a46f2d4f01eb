use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  parse_timezone,
  weekday_from_sunday_index
};

const CONFIG_FILE: &str =
  "calendar.toml";
const CONFIG_DIR: &str = "calgrid";
const CONFIG_ENV_VAR: &str =
  "CALGRID_CONFIG";
const TIMEZONE_ENV_VAR: &str =
  "CALGRID_TIMEZONE";
const DEFAULT_TIMEZONE: &str = "UTC";
/// Upper bound for
/// `month.visible_weeks_count`.
pub const MAX_VISIBLE_WEEKS: u32 = 6;

fn options_true() -> bool {
  true
}

fn options_default_timezone() -> String
{
  DEFAULT_TIMEZONE.to_string()
}

fn options_default_hour_end() -> u32 {
  24
}

fn options_default_visible_event_count()
-> usize {
  6
}

fn options_default_threshold_px() -> f64
{
  3.0
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
  #[default]
  Month,
  Week,
  Day
}

impl ViewKind {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Month => "month",
      | Self::Week => "week",
      | Self::Day => "day"
    }
  }

  pub fn from_key(
    key: &str
  ) -> Option<Self> {
    match key.trim() {
      | "month" => Some(Self::Month),
      | "week" => Some(Self::Week),
      | "day" => Some(Self::Day),
      | _ => None
    }
  }
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct CalendarOptions {
  #[serde(
    default = "options_default_timezone"
  )]
  pub timezone:     String,
  #[serde(default)]
  pub default_view: ViewKind,
  #[serde(default)]
  pub month:        MonthOptions,
  #[serde(default)]
  pub week:         WeekOptions,
  #[serde(default)]
  pub drag:         DragOptions
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct MonthOptions {
  #[serde(default)]
  pub start_day_of_week:   u8,
  #[serde(default)]
  pub workweek:            bool,
  #[serde(default)]
  pub visible_weeks_count: u32,
  #[serde(default = "options_true")]
  pub is_always_6_week:    bool,
  #[serde(default)]
  pub narrow_weekend:      bool,
  #[serde(
    default = "options_default_visible_event_count"
  )]
  pub visible_event_count: usize
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct WeekOptions {
  #[serde(default)]
  pub start_day_of_week: u8,
  #[serde(default)]
  pub workweek:          bool,
  #[serde(default)]
  pub narrow_weekend:    bool,
  #[serde(default)]
  pub hour_start:        u32,
  #[serde(
    default = "options_default_hour_end"
  )]
  pub hour_end:          u32
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct DragOptions {
  #[serde(
    default = "options_default_threshold_px"
  )]
  pub threshold_px: f64
}

impl Default for CalendarOptions {
  fn default() -> Self {
    Self {
      timezone:
        options_default_timezone(),
      default_view: ViewKind::Month,
      month: MonthOptions::default(),
      week: WeekOptions::default(),
      drag: DragOptions::default()
    }
  }
}

impl Default for MonthOptions {
  fn default() -> Self {
    Self {
      start_day_of_week:   0,
      workweek:            false,
      visible_weeks_count: 0,
      is_always_6_week:    true,
      narrow_weekend:      false,
      visible_event_count:
        options_default_visible_event_count(
        )
    }
  }
}

impl Default for WeekOptions {
  fn default() -> Self {
    Self {
      start_day_of_week: 0,
      workweek:          false,
      narrow_weekend:    false,
      hour_start:        0,
      hour_end:
        options_default_hour_end()
    }
  }
}

impl Default for DragOptions {
  fn default() -> Self {
    Self {
      threshold_px:
        options_default_threshold_px()
    }
  }
}

impl MonthOptions {
  pub fn week_start(&self) -> Weekday {
    weekday_from_sunday_index(
      self.start_day_of_week
    )
    .unwrap_or(Weekday::Sun)
  }
}

impl WeekOptions {
  pub fn week_start(&self) -> Weekday {
    weekday_from_sunday_index(
      self.start_day_of_week
    )
    .unwrap_or(Weekday::Sun)
  }
}

impl CalendarOptions {
  /// Loads options from the override
  /// path, `$CALGRID_CONFIG`, or the
  /// user config dir. A missing file
  /// yields defaults.
  #[tracing::instrument(skip(
    path_override
  ))]
  pub fn load(
    path_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let Some(path) =
      resolve_config_path(path_override)
    else {
      warn!(
        "no config directory; using \
         defaults"
      );
      return Ok(Self::default());
    };

    if !path.exists() {
      warn!(
        file = %path.display(),
        "calendar config not found; using defaults"
      );
      return Ok(Self::default());
    }

    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let options = Self::from_toml_str(
      &text
    )
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;

    info!(
      file = %path.display(),
      timezone = %options.timezone,
      default_view = options.default_view.as_key(),
      "loaded calendar config"
    );
    Ok(options)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut options =
      toml::from_str::<Self>(text)
        .context(
          "invalid calendar options"
        )?;
    options.sanitize();
    Ok(options)
  }

  /// Clamps out-of-range values to safe
  /// defaults instead of failing.
  pub fn sanitize(&mut self) {
    if self.timezone.trim().is_empty() {
      self.timezone =
        options_default_timezone();
    }

    if self.month.start_day_of_week > 6
    {
      warn!(
        value = self.month.start_day_of_week,
        "month.start_day_of_week out of range; using sunday"
      );
      self.month.start_day_of_week = 0;
    }
    if self.week.start_day_of_week > 6 {
      warn!(
        value = self.week.start_day_of_week,
        "week.start_day_of_week out of range; using sunday"
      );
      self.week.start_day_of_week = 0;
    }

    if self.month.visible_weeks_count
      > MAX_VISIBLE_WEEKS
    {
      warn!(
        value = self.month.visible_weeks_count,
        max = MAX_VISIBLE_WEEKS,
        "month.visible_weeks_count too large; clamping"
      );
      self.month.visible_weeks_count =
        MAX_VISIBLE_WEEKS;
    }

    if self.month.visible_event_count
      == 0
    {
      self.month.visible_event_count =
        options_default_visible_event_count(
        );
    }

    let (hour_start, hour_end) =
      clamp_hours(
        self.week.hour_start,
        self.week.hour_end
      );
    if (hour_start, hour_end)
      != (
        self.week.hour_start,
        self.week.hour_end
      )
    {
      warn!(
        hour_start = self.week.hour_start,
        hour_end = self.week.hour_end,
        clamped_start = hour_start,
        clamped_end = hour_end,
        "clamped week hour range"
      );
      self.week.hour_start = hour_start;
      self.week.hour_end = hour_end;
    }

    if !self.drag.threshold_px.is_finite()
      || self.drag.threshold_px < 0.0
    {
      warn!(
        value = self.drag.threshold_px,
        "invalid drag threshold; using default"
      );
      self.drag.threshold_px =
        options_default_threshold_px();
    }
  }

  /// Applies `section.key = value`
  /// overrides on top of loaded options.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key.trim();
      let value = value.trim();
      debug!(key, value, "applying override");
      match key {
        | "timezone" => {
          self.timezone =
            value.to_string();
        }
        | "default_view" => {
          self.default_view =
            ViewKind::from_key(value)
              .ok_or_else(|| {
                anyhow!(
                  "unknown view: {value}"
                )
              })?;
        }
        | "month.start_day_of_week" => {
          self.month.start_day_of_week =
            parse_value(key, value)?;
        }
        | "month.workweek" => {
          self.month.workweek =
            parse_bool(key, value)?;
        }
        | "month.visible_weeks_count" => {
          self.month.visible_weeks_count =
            parse_value(key, value)?;
        }
        | "month.is_always_6_week" => {
          self.month.is_always_6_week =
            parse_bool(key, value)?;
        }
        | "month.narrow_weekend" => {
          self.month.narrow_weekend =
            parse_bool(key, value)?;
        }
        | "month.visible_event_count" => {
          self.month.visible_event_count =
            parse_value(key, value)?;
        }
        | "week.start_day_of_week" => {
          self.week.start_day_of_week =
            parse_value(key, value)?;
        }
        | "week.workweek" => {
          self.week.workweek =
            parse_bool(key, value)?;
        }
        | "week.narrow_weekend" => {
          self.week.narrow_weekend =
            parse_bool(key, value)?;
        }
        | "week.hour_start" => {
          self.week.hour_start =
            parse_value(key, value)?;
        }
        | "week.hour_end" => {
          self.week.hour_end =
            parse_value(key, value)?;
        }
        | "drag.threshold_px" => {
          self.drag.threshold_px =
            parse_value(key, value)?;
        }
        | _ => {
          return Err(anyhow!(
            "unknown option: {key}"
          ));
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  /// `$CALGRID_TIMEZONE` wins over the
  /// configured zone; anything invalid
  /// falls back to UTC.
  pub fn resolve_timezone(&self) -> Tz {
    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) =
        parse_timezone(
          &raw,
          TIMEZONE_ENV_VAR
        )
    {
      return tz;
    }

    parse_timezone(
      &self.timezone,
      "calendar.toml"
    )
    .unwrap_or(chrono_tz::UTC)
  }
}

/// Keeps `0 <= start < end <= 24`.
pub fn clamp_hours(
  hour_start: u32,
  hour_end: u32
) -> (u32, u32) {
  let start = hour_start.min(23);
  let mut end = hour_end.min(24);
  if end <= start {
    end = start + 1;
  }
  (start, end)
}

fn resolve_config_path(
  path_override: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = path_override {
    return Some(expand_tilde(path));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(expand_tilde(
        Path::new(trimmed)
      ));
    }
  }

  dirs::config_dir().map(|dir| {
    dir.join(CONFIG_DIR).join(CONFIG_FILE)
  })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_value<T>(
  key: &str,
  value: &str
) -> anyhow::Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display
{
  value.parse::<T>().map_err(|error| {
    anyhow!(
      "invalid value for {key}: \
       {value} ({error})"
    )
  })
}

fn parse_bool(
  key: &str,
  value: &str
) -> anyhow::Result<bool> {
  match value
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Ok(true),
    | "0" | "n" | "no" | "off"
    | "false" => Ok(false),
    | _ => {
      Err(anyhow!(
        "invalid boolean for {key}: \
         {value}"
      ))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_uses_defaults() {
    let options =
      CalendarOptions::from_toml_str("")
        .expect("parse empty");
    assert_eq!(
      options,
      CalendarOptions::default()
    );
    assert!(
      options.month.is_always_6_week
    );
    assert_eq!(options.week.hour_end, 24);
  }

  #[test]
  fn sanitize_clamps_bad_values() {
    let options =
      CalendarOptions::from_toml_str(
        r#"
[month]
start_day_of_week = 9
[week]
hour_start = 20
hour_end = 8
[drag]
threshold_px = -4.0
"#
      )
      .expect("parse options");

    assert_eq!(
      options.month.week_start(),
      Weekday::Sun
    );
    assert_eq!(options.week.hour_start, 20);
    assert_eq!(options.week.hour_end, 21);
    assert_eq!(
      options.drag.threshold_px,
      3.0
    );
  }

  #[test]
  fn visible_weeks_are_capped() {
    let options =
      CalendarOptions::from_toml_str(
        "[month]\nvisible_weeks_count = 4000000000"
      )
      .expect("parse options");
    assert_eq!(
      options.month.visible_weeks_count,
      MAX_VISIBLE_WEEKS
    );

    let mut options =
      CalendarOptions::default();
    options
      .apply_overrides([(
        "month.visible_weeks_count"
          .to_string(),
        "52".to_string()
      )])
      .expect("override");
    assert_eq!(
      options.month.visible_weeks_count,
      6
    );
  }

  #[test]
  fn overrides_reject_unknown_keys() {
    let mut options =
      CalendarOptions::default();
    options
      .apply_overrides([
        (
          "month.workweek".to_string(),
          "yes".to_string()
        ),
        (
          "default_view".to_string(),
          "week".to_string()
        )
      ])
      .expect("known overrides");
    assert!(options.month.workweek);
    assert_eq!(
      options.default_view,
      ViewKind::Week
    );

    let err = options
      .apply_overrides([(
        "month.colour".to_string(),
        "red".to_string()
      )])
      .expect_err("unknown key");
    assert!(
      err
        .to_string()
        .contains("unknown option")
    );
  }

  #[test]
  fn clamp_hours_keeps_valid_ranges() {
    assert_eq!(clamp_hours(8, 18), (8, 18));
    assert_eq!(clamp_hours(0, 30), (0, 24));
    assert_eq!(clamp_hours(24, 24), (23, 24));
  }
}
