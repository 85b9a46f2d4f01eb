use std::collections::BTreeMap;

use anyhow::anyhow;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{CalendarDate, add_days};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    #[default]
    Time,
    AllDay,
    Milestone,
    Task,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,

    pub calendar_id: String,

    pub title: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub category: EventCategory,

    pub start: CalendarDate,

    pub end: CalendarDate,

    #[serde(default)]
    pub is_all_day: bool,

    #[serde(default)]
    pub is_read_only: bool,

    #[serde(default = "default_true")]
    pub is_visible: bool,

    #[serde(default)]
    pub state: Option<String>,

    /// Host-specific fields carried through untouched.
    #[serde(flatten)]
    pub raw: BTreeMap<String, serde_json::Value>,
}

/// A partial update. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventChanges {
    pub calendar_id: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub category: Option<EventCategory>,
    pub start: Option<CalendarDate>,
    pub end: Option<CalendarDate>,
    pub is_all_day: Option<bool>,
    pub is_read_only: Option<bool>,
    pub is_visible: Option<bool>,
    pub state: Option<String>,
}

impl CalendarEvent {
    pub fn new_timed(
        calendar_id: impl Into<String>,
        title: impl Into<String>,
        start: CalendarDate,
        end: CalendarDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            calendar_id: calendar_id.into(),
            title: title.into(),
            location: None,
            category: EventCategory::Time,
            start,
            end,
            is_all_day: false,
            is_read_only: false,
            is_visible: true,
            state: None,
            raw: BTreeMap::new(),
        }
    }

    /// An all-day event covering `first..=last`.
    pub fn new_all_day(
        calendar_id: impl Into<String>,
        title: impl Into<String>,
        first: CalendarDate,
        last: CalendarDate,
    ) -> Self {
        let mut event = Self::new_timed(
            calendar_id,
            title,
            first.start_of_day(),
            last.end_of_day(),
        );
        event.category = EventCategory::AllDay;
        event.is_all_day = true;
        event
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Day-grid events render as bars across date columns; the rest go to the time grid.
    pub fn is_day_grid(&self) -> bool {
        self.is_all_day || self.category != EventCategory::Time
    }

    pub fn duration(&self) -> Duration {
        self.end.since(&self.start)
    }

    pub fn first_date(&self) -> NaiveDate {
        self.start.date()
    }

    /// The last calendar day the event touches. An end at exactly midnight
    /// belongs to the previous day.
    pub fn last_date(&self) -> NaiveDate {
        let end = self.end.date();
        if self.end > self.start && self.end.time() == NaiveTime::MIN {
            add_days(end, -1)
        } else {
            end
        }
    }

    pub fn has_multiple_dates(&self) -> bool {
        self.last_date() > self.first_date()
    }

    pub fn touches_dates(&self, first: NaiveDate, last: NaiveDate) -> bool {
        self.first_date() <= last && self.last_date() >= first
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.calendar_id.trim().is_empty() {
            return Err(anyhow!("event {} has an empty calendar id", self.id));
        }
        if self.end < self.start {
            return Err(anyhow!(
                "event {} ends ({}) before it starts ({})",
                self.id,
                self.end,
                self.start
            ));
        }
        Ok(())
    }

    pub fn apply(&mut self, changes: &EventChanges) {
        if let Some(calendar_id) = &changes.calendar_id {
            self.calendar_id = calendar_id.clone();
        }
        if let Some(title) = &changes.title {
            self.title = title.clone();
        }
        if let Some(location) = &changes.location {
            self.location = Some(location.clone());
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(start) = changes.start {
            self.start = start;
        }
        if let Some(end) = changes.end {
            self.end = end;
        }
        if let Some(is_all_day) = changes.is_all_day {
            self.is_all_day = is_all_day;
        }
        if let Some(is_read_only) = changes.is_read_only {
            self.is_read_only = is_read_only;
        }
        if let Some(is_visible) = changes.is_visible {
            self.is_visible = is_visible;
        }
        if let Some(state) = &changes.state {
            self.state = Some(state.clone());
        }
    }
}

impl EventChanges {
    pub fn schedule(start: CalendarDate, end: CalendarDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::UTC;

    use super::*;

    fn at(d: u32, h: u32, m: u32) -> CalendarDate {
        CalendarDate::from_ymd_hm(UTC, 2021, 12, d, h, m).expect("valid date")
    }

    #[test]
    fn midnight_end_belongs_to_previous_day() {
        let event = CalendarEvent::new_timed("work", "late", at(1, 22, 0), at(2, 0, 0));
        assert_eq!(event.last_date(), at(1, 0, 0).date());
        assert!(!event.has_multiple_dates());
    }

    #[test]
    fn all_day_covers_inclusive_range() {
        let event = CalendarEvent::new_all_day("home", "trip", at(3, 0, 0), at(5, 0, 0));
        assert!(event.is_day_grid());
        assert_eq!(event.first_date(), at(3, 0, 0).date());
        assert_eq!(event.last_date(), at(5, 0, 0).date());
        assert!(event.touches_dates(at(5, 0, 0).date(), at(11, 0, 0).date()));
        assert!(!event.touches_dates(at(6, 0, 0).date(), at(11, 0, 0).date()));
    }

    #[test]
    fn apply_only_touches_given_fields() {
        let mut event = CalendarEvent::new_timed("work", "standup", at(1, 9, 0), at(1, 9, 30));
        let before = event.clone();
        event.apply(&EventChanges {
            title: Some("retro".to_string()),
            ..EventChanges::default()
        });
        assert_eq!(event.title, "retro");
        assert_eq!(event.start, before.start);
        assert_eq!(event.calendar_id, before.calendar_id);
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let event = CalendarEvent::new_timed("work", "oops", at(2, 9, 0), at(1, 9, 0));
        assert!(event.validate().is_err());
    }

    #[test]
    fn unknown_fields_survive_serde() {
        let json = serde_json::json!({
            "calendar_id": "work",
            "title": "sync",
            "start": { "local": "2021-12-01T09:00:00", "timezone": "UTC" },
            "end": { "local": "2021-12-01T10:00:00", "timezone": "UTC" },
            "color": "#ff0000"
        });
        let event: CalendarEvent = serde_json::from_value(json).expect("deserialize event");
        assert!(event.is_visible);
        assert_eq!(event.category, EventCategory::Time);
        assert_eq!(
            event.raw.get("color"),
            Some(&serde_json::Value::String("#ff0000".to_string()))
        );
    }
}
