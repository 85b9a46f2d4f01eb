use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::{CalendarEvent, EventChanges};

/// Events are unique per `(calendar_id, id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub calendar_id: String,
    pub id: String,
}

impl EventKey {
    pub fn new(id: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        Self {
            calendar_id: calendar_id.into(),
            id: id.into(),
        }
    }

    pub fn of(event: &CalendarEvent) -> Self {
        Self::new(event.id.clone(), event.calendar_id.clone())
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.calendar_id, self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCollection {
    events: BTreeMap<EventKey, CalendarEvent>,
}

impl EventCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Adds every event or none. Missing ids get a fresh UUID.
    #[tracing::instrument(skip(self, events))]
    pub fn create<I>(&mut self, events: I) -> anyhow::Result<Vec<EventKey>>
    where
        I: IntoIterator<Item = CalendarEvent>,
    {
        let mut staged = Vec::new();
        for mut event in events {
            if event.id.trim().is_empty() {
                event.id = Uuid::new_v4().to_string();
            }
            event
                .validate()
                .with_context(|| format!("cannot create event {}", event.id))?;

            let key = EventKey::of(&event);
            if self.events.contains_key(&key) || staged.iter().any(|(k, _)| *k == key) {
                return Err(anyhow!("event already exists: {key}"));
            }
            staged.push((key, event));
        }

        let keys = staged.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>();
        self.events.extend(staged);
        debug!(count = keys.len(), total = self.events.len(), "created events");
        Ok(keys)
    }

    pub fn get(&self, id: &str, calendar_id: &str) -> Option<&CalendarEvent> {
        self.events.get(&EventKey::new(id, calendar_id))
    }

    pub fn contains(&self, id: &str, calendar_id: &str) -> bool {
        self.get(id, calendar_id).is_some()
    }

    /// Applies `changes` to a copy and only stores it when the result is
    /// valid. Moving an event to another calendar re-keys it.
    #[tracing::instrument(skip(self, changes))]
    pub fn update(
        &mut self,
        id: &str,
        calendar_id: &str,
        changes: &EventChanges,
    ) -> anyhow::Result<&CalendarEvent> {
        let key = EventKey::new(id, calendar_id);
        let current = self
            .events
            .get(&key)
            .ok_or_else(|| anyhow!("event not found: {key}"))?;

        let mut updated = current.clone();
        updated.apply(changes);
        updated
            .validate()
            .with_context(|| format!("cannot update event {key}"))?;

        let new_key = EventKey::of(&updated);
        if new_key != key && self.events.contains_key(&new_key) {
            return Err(anyhow!("cannot move {key}: {new_key} already exists"));
        }

        self.events.remove(&key);
        debug!(from = %key, to = %new_key, "updated event");
        Ok(self.events.entry(new_key).or_insert(updated))
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str, calendar_id: &str) -> anyhow::Result<CalendarEvent> {
        let key = EventKey::new(id, calendar_id);
        let removed = self
            .events
            .remove(&key)
            .ok_or_else(|| anyhow!("event not found: {key}"))?;
        debug!(key = %key, "deleted event");
        Ok(removed)
    }

    pub fn clear(&mut self) {
        debug!(count = self.events.len(), "clearing events");
        self.events.clear();
    }

    /// Start ascending, then longer events first, then id.
    pub fn iter_ordered(&self) -> Vec<&CalendarEvent> {
        let mut events = self.events.values().collect::<Vec<_>>();
        events.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| b.end.cmp(&a.end))
                .then_with(|| a.id.cmp(&b.id))
        });
        events
    }

    pub fn filtered<F>(&self, mut predicate: F) -> Vec<&CalendarEvent>
    where
        F: FnMut(&CalendarEvent) -> bool,
    {
        self.iter_ordered()
            .into_iter()
            .filter(|event| predicate(*event))
            .collect()
    }

    /// Events touching any day in `first..=last`.
    pub fn in_range(&self, first: NaiveDate, last: NaiveDate) -> Vec<&CalendarEvent> {
        self.filtered(|event| event.touches_dates(first, last))
    }

    /// Reads a JSON-lines snapshot. Blank lines are skipped.
    #[tracing::instrument(skip(path), fields(file = %path.display()))]
    pub fn load_jsonl(path: &Path) -> anyhow::Result<Self> {
        let file =
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let event: CalendarEvent = serde_json::from_str(trimmed)
                .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
            events.push(event);
        }

        let mut collection = Self::new();
        collection.create(events)?;
        info!(count = collection.len(), "loaded events");
        Ok(collection)
    }

    /// Writes one JSON object per line via a temp file in the same
    /// directory, so readers never see a half-written snapshot.
    #[tracing::instrument(skip(self, path), fields(file = %path.display()))]
    pub fn save_jsonl(&self, path: &Path) -> anyhow::Result<()> {
        debug!(count = self.events.len(), "saving events");

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        for event in self.iter_ordered() {
            let serialized = serde_json::to_string(event)?;
            writeln!(temp, "{serialized}")?;
        }
        temp.flush()?;

        temp.persist(path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::UTC;

    use super::*;
    use crate::datetime::CalendarDate;

    fn at(d: u32, h: u32) -> CalendarDate {
        CalendarDate::from_ymd_hm(UTC, 2021, 12, d, h, 0).expect("valid date")
    }

    fn event(id: &str, start: CalendarDate, end: CalendarDate) -> CalendarEvent {
        CalendarEvent::new_timed("work", id, start, end).with_id(id)
    }

    #[test]
    fn create_assigns_missing_ids() {
        let mut store = EventCollection::new();
        let keys = store
            .create([event("", at(1, 9), at(1, 10))])
            .expect("create");

        assert_eq!(keys.len(), 1);
        assert!(Uuid::parse_str(&keys[0].id).is_ok());
        assert!(store.contains(&keys[0].id, "work"));
    }

    #[test]
    fn create_is_all_or_nothing() {
        let mut store = EventCollection::new();
        let result = store.create([
            event("ok", at(1, 9), at(1, 10)),
            event("bad", at(1, 10), at(1, 9)),
        ]);

        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut store = EventCollection::new();
        store
            .create([event("a", at(1, 9), at(1, 10))])
            .expect("create");
        let err = store
            .create([event("a", at(2, 9), at(2, 10))])
            .expect_err("duplicate");
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn unknown_ids_are_errors() {
        let mut store = EventCollection::new();
        assert!(store.update("nope", "work", &EventChanges::default()).is_err());
        assert!(store.delete("nope", "work").is_err());
        assert!(store.get("nope", "work").is_none());
    }

    #[test]
    fn invalid_update_leaves_event_untouched() {
        let mut store = EventCollection::new();
        store
            .create([event("a", at(1, 9), at(1, 10))])
            .expect("create");

        let changes = EventChanges {
            end: Some(at(1, 8)),
            ..EventChanges::default()
        };
        assert!(store.update("a", "work", &changes).is_err());
        assert_eq!(store.get("a", "work").map(|e| e.end), Some(at(1, 10)));
    }

    #[test]
    fn update_can_move_between_calendars() {
        let mut store = EventCollection::new();
        store
            .create([event("a", at(1, 9), at(1, 10))])
            .expect("create");

        let changes = EventChanges {
            calendar_id: Some("home".to_string()),
            ..EventChanges::default()
        };
        store.update("a", "work", &changes).expect("update");
        assert!(store.get("a", "work").is_none());
        assert!(store.get("a", "home").is_some());
    }

    #[test]
    fn ordering_and_range_queries() {
        let mut store = EventCollection::new();
        store
            .create([
                event("late", at(3, 9), at(3, 10)),
                event("short", at(1, 9), at(1, 10)),
                event("long", at(1, 9), at(1, 12)),
            ])
            .expect("create");

        let ids = store
            .iter_ordered()
            .into_iter()
            .map(|e| e.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["long", "short", "late"]);

        let first = at(1, 0).date();
        let in_range = store.in_range(first, first);
        assert_eq!(in_range.len(), 2);
    }

    #[test]
    fn jsonl_snapshot_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("events.jsonl");

        let mut store = EventCollection::new();
        store
            .create([
                event("a", at(1, 9), at(1, 10)),
                event("b", at(2, 9), at(2, 10)),
            ])
            .expect("create");
        store.save_jsonl(&path).expect("save");

        let loaded = EventCollection::load_jsonl(&path).expect("load");
        assert_eq!(loaded, store);
    }
}
