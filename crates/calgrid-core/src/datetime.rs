use std::cmp::Ordering;
use std::fmt;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Timelike,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

pub const MINUTES_PER_DAY: i64 =
  24 * 60;

/// A wall-clock date-time on the local
/// calendar of a time zone.
///
/// All arithmetic happens on the local
/// calendar so a day is always a day,
/// even across DST transitions.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct CalendarDate {
  local:    NaiveDateTime,
  timezone: Tz
}

impl CalendarDate {
  pub fn new(
    local: NaiveDateTime,
    timezone: Tz
  ) -> Self {
    Self { local, timezone }
  }

  pub fn from_ymd_hm(
    timezone: Tz,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32
  ) -> Option<Self> {
    let local =
      NaiveDate::from_ymd_opt(
        year, month, day
      )?
      .and_hms_opt(hour, minute, 0)?;
    Some(Self::new(local, timezone))
  }

  pub fn from_date(
    date: NaiveDate,
    timezone: Tz
  ) -> Self {
    Self::new(
      date.and_time(NaiveTime::MIN),
      timezone
    )
  }

  pub fn from_utc(
    instant: DateTime<Utc>,
    timezone: Tz
  ) -> Self {
    Self::new(
      instant
        .with_timezone(&timezone)
        .naive_local(),
      timezone
    )
  }

  #[must_use]
  pub fn local(&self) -> NaiveDateTime {
    self.local
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.local.date()
  }

  #[must_use]
  pub fn time(&self) -> NaiveTime {
    self.local.time()
  }

  #[must_use]
  pub fn timezone(&self) -> Tz {
    self.timezone
  }

  #[must_use]
  pub fn minutes_of_day(&self) -> i64 {
    i64::from(self.local.hour()) * 60
      + i64::from(self.local.minute())
  }

  #[must_use]
  pub fn start_of_day(&self) -> Self {
    Self::from_date(
      self.date(),
      self.timezone
    )
  }

  /// 23:59:59 on the same day.
  #[must_use]
  pub fn end_of_day(&self) -> Self {
    let end = NaiveTime::from_hms_opt(
      23, 59, 59
    )
    .unwrap_or(NaiveTime::MIN);
    Self::new(
      self.date().and_time(end),
      self.timezone
    )
  }

  #[must_use]
  pub fn with_date(
    &self,
    date: NaiveDate
  ) -> Self {
    Self::new(
      date.and_time(self.time()),
      self.timezone
    )
  }

  #[must_use]
  pub fn add_days(
    &self,
    days: i64
  ) -> Self {
    self.add(Duration::days(days))
  }

  #[must_use]
  pub fn add_minutes(
    &self,
    minutes: i64
  ) -> Self {
    self.add(Duration::minutes(minutes))
  }

  #[must_use]
  pub fn add(
    &self,
    delta: Duration
  ) -> Self {
    let local = self
      .local
      .checked_add_signed(delta)
      .unwrap_or(self.local);
    Self::new(local, self.timezone)
  }

  /// Difference measured on the local
  /// calendar.
  #[must_use]
  pub fn since(
    &self,
    earlier: &CalendarDate
  ) -> Duration {
    self.local - earlier.local
  }

  #[must_use]
  pub fn date_key(&self) -> String {
    date_key(self.date())
  }

  /// Resolves the wall-clock value to an
  /// instant. Folded times pick the
  /// earliest instant; times inside a DST
  /// gap are an error.
  pub fn to_utc(
    &self
  ) -> anyhow::Result<DateTime<Utc>> {
    match self
      .timezone
      .from_local_datetime(&self.local)
    {
      | LocalResult::Single(dt) => {
        Ok(dt.with_timezone(&Utc))
      }
      | LocalResult::Ambiguous(
        first,
        second
      ) => {
        tracing::debug!(
          local = %self.local,
          timezone = %self.timezone,
          "ambiguous local datetime; using earliest"
        );
        Ok(
          first
            .min(second)
            .with_timezone(&Utc)
        )
      }
      | LocalResult::None => {
        Err(anyhow!(
          "local datetime {} does not \
           exist in {}",
          self.local,
          self.timezone
        ))
      }
    }
  }
}

impl PartialOrd for CalendarDate {
  fn partial_cmp(
    &self,
    other: &Self
  ) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for CalendarDate {
  fn cmp(
    &self,
    other: &Self
  ) -> Ordering {
    self
      .local
      .cmp(&other.local)
      .then_with(|| {
        self
          .timezone
          .name()
          .cmp(other.timezone.name())
      })
  }
}

impl fmt::Display for CalendarDate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{} {}",
      self.local.format("%Y-%m-%d %H:%M"),
      self.timezone
    )
  }
}

/// `YYYYMMDD`, the key used to group UI
/// models per grid date.
#[must_use]
pub fn date_key(date: NaiveDate) -> String {
  date.format("%Y%m%d").to_string()
}

#[must_use]
pub fn is_weekend(date: NaiveDate) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
    -1
  )
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_sunday()
    as i64;
  let start_idx = week_start
    .num_days_from_sunday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let mut year = date.year();
  let mut month =
    date.month() as i32 + months;

  while month < 1 {
    month += 12;
    year = year.saturating_sub(1);
  }
  while month > 12 {
    month -= 12;
    year = year.saturating_add(1);
  }

  let month = month as u32;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

/// Maps `0..=6` (Sunday first) onto a
/// weekday.
pub fn weekday_from_sunday_index(
  index: u8
) -> Option<Weekday> {
  match index {
    | 0 => Some(Weekday::Sun),
    | 1 => Some(Weekday::Mon),
    | 2 => Some(Weekday::Tue),
    | 3 => Some(Weekday::Wed),
    | 4 => Some(Weekday::Thu),
    | 5 => Some(Weekday::Fri),
    | 6 => Some(Weekday::Sat),
    | _ => None
  }
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => Some(tz),
    | Err(error) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %error,
        "invalid timezone id"
      );
      None
    }
  }
}
