//! The calendar façade: view navigation, event CRUD, drag wiring and
//! notifications on top of the pure layout modules.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, HandlerId, Notification, NotificationKind};
use crate::columns::{FULL_WIDTH, grid_columns};
use crate::datetime::{CalendarDate, add_days, shift_months};
use crate::drag::{
    DayGridDates, DragCancel, DragController, DragKind, DragOutcome, DragPhase, GridDates,
    MonthGridDates, TimeGridDates,
};
use crate::event::{CalendarEvent, EventChanges};
use crate::grid_position::{GridPosition, GridPositionFinder, Rect};
use crate::layout::{
    DayGridLayout, DayGridOptions, UiModelLayout, WeekLayout, layout_month, layout_week,
    max_rows_for_height,
};
use crate::matrix::{DateMatrix, matrix_range, month_matrix, week_dates};
use crate::options::{CalendarOptions, ViewKind, clamp_hours};
use crate::store::{EventCollection, EventKey};
use crate::time_rows::SLOTS_PER_HOUR;

/// Calendar used for events created by dragging when none is registered.
pub const DEFAULT_CALENDAR_ID: &str = "default";
pub const MONTH_HEADER_HEIGHT_PX: f64 = 31.0;
pub const MONTH_EVENT_HEIGHT_PX: f64 = 24.0;

/// Which view is shown and around which date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    kind: ViewKind,
    date: NaiveDate,
    today: NaiveDate,
}

impl ViewState {
    pub fn new(kind: ViewKind, date: NaiveDate, today: NaiveDate) -> Self {
        Self { kind, date, today }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// The focus date one page forward (`direction = 1`) or back (`-1`).
    pub fn step(&self, options: &CalendarOptions, direction: i32) -> NaiveDate {
        let weeks = i64::from(options.month.visible_weeks_count);
        match self.kind {
            ViewKind::Month if weeks > 0 => {
                add_days(self.date, i64::from(direction) * weeks * 7)
            }
            ViewKind::Month => shift_months(self.date, direction),
            ViewKind::Week => add_days(self.date, i64::from(direction) * 7),
            ViewKind::Day => add_days(self.date, i64::from(direction)),
        }
    }

    pub fn month_matrix(&self, options: &CalendarOptions) -> DateMatrix {
        month_matrix(self.date, &options.month)
    }

    /// Date columns of the week or day panel.
    pub fn dates(&self, options: &CalendarOptions) -> Vec<NaiveDate> {
        match self.kind {
            ViewKind::Day => vec![self.date],
            ViewKind::Month | ViewKind::Week => week_dates(self.date, &options.week),
        }
    }

    /// First and last visible date.
    pub fn date_range(&self, options: &CalendarOptions) -> (NaiveDate, NaiveDate) {
        let fallback = (self.date, self.date);
        match self.kind {
            ViewKind::Month => matrix_range(&self.month_matrix(options)).unwrap_or(fallback),
            ViewKind::Week | ViewKind::Day => {
                let dates = self.dates(options);
                match (dates.first(), dates.last()) {
                    (Some(first), Some(last)) => (*first, *last),
                    _ => fallback,
                }
            }
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

impl CalendarInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_visible: true,
        }
    }
}

/// Events plus the calendars they belong to. Events of unregistered
/// calendars are visible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarState {
    pub events: EventCollection,
    calendars: BTreeMap<String, CalendarInfo>,
}

impl CalendarState {
    pub fn calendars(&self) -> impl Iterator<Item = &CalendarInfo> {
        self.calendars.values()
    }

    pub fn is_calendar_visible(&self, calendar_id: &str) -> bool {
        self.calendars
            .get(calendar_id)
            .is_none_or(|calendar| calendar.is_visible)
    }

    pub fn default_calendar_id(&self) -> &str {
        self.calendars
            .keys()
            .next()
            .map_or(DEFAULT_CALENDAR_ID, String::as_str)
    }

    /// Shown events touching `first..=last`, in display order.
    pub fn visible_events(&self, first: NaiveDate, last: NaiveDate) -> Vec<&CalendarEvent> {
        self.events
            .in_range(first, last)
            .into_iter()
            .filter(|event| event.is_visible && self.is_calendar_visible(&event.calendar_id))
            .collect()
    }
}

/// The surface a drag starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DragSurface {
    MonthGrid,
    DayGrid,
    TimeGrid,
}

#[derive(Debug, Clone, PartialEq)]
enum SurfaceDates {
    Month(MonthGridDates),
    DayGrid(DayGridDates),
    Time(TimeGridDates),
}

impl GridDates for SurfaceDates {
    fn cell_start(&self, position: GridPosition) -> Option<chrono::NaiveDateTime> {
        match self {
            Self::Month(grid) => grid.cell_start(position),
            Self::DayGrid(grid) => grid.cell_start(position),
            Self::Time(grid) => grid.cell_start(position),
        }
    }

    fn cell_span(&self) -> chrono::Duration {
        match self {
            Self::Month(grid) => grid.cell_span(),
            Self::DayGrid(grid) => grid.cell_span(),
            Self::Time(grid) => grid.cell_span(),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    controller: DragController,
    dates: SurfaceDates,
}

/// What the current view rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RenderedView {
    Month(Vec<DayGridLayout>),
    Week(WeekLayout),
}

#[derive(Debug)]
pub struct Calendar {
    options: CalendarOptions,
    timezone: Tz,
    view: ViewState,
    state: CalendarState,
    bus: EventBus,
    drag: Option<ActiveDrag>,
}

impl Calendar {
    /// Builds a calendar focused on `today`.
    #[tracing::instrument(skip(options))]
    pub fn new(mut options: CalendarOptions, today: NaiveDate) -> Self {
        options.sanitize();
        let timezone = options.resolve_timezone();
        info!(
            %timezone,
            view = options.default_view.as_key(),
            %today,
            "calendar created"
        );
        Self {
            view: ViewState::new(options.default_view, today, today),
            options,
            timezone,
            state: CalendarState::default(),
            bus: EventBus::new(),
            drag: None,
        }
    }

    /// Uses the wall clock in the configured time zone for "today".
    pub fn from_clock(options: CalendarOptions) -> Self {
        let today = CalendarDate::from_utc(Utc::now(), options.resolve_timezone()).date();
        Self::new(options, today)
    }

    /// Loads options the usual way and starts at today.
    pub fn load(path_override: Option<&Path>) -> anyhow::Result<Self> {
        let options =
            CalendarOptions::load(path_override).context("failed to load calendar options")?;
        Ok(Self::from_clock(options))
    }

    pub fn options(&self) -> &CalendarOptions {
        &self.options
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn on<F>(&mut self, kind: NotificationKind, handler: F) -> HandlerId
    where
        F: FnMut(&Notification) + 'static,
    {
        self.bus.on(kind, handler)
    }

    /// Replaces the options. A live drag is cancelled since its geometry
    /// no longer holds.
    pub fn set_options(&mut self, mut options: CalendarOptions) {
        options.sanitize();
        if self.cancel_drag().is_some() {
            debug!("cancelled drag on option change");
        }
        self.timezone = options.resolve_timezone();
        self.options = options;
        debug!(timezone = %self.timezone, "options updated");
        self.notify_date_changed();
    }

    pub fn set_calendars<I>(&mut self, calendars: I)
    where
        I: IntoIterator<Item = CalendarInfo>,
    {
        self.state.calendars = calendars
            .into_iter()
            .map(|calendar| (calendar.id.clone(), calendar))
            .collect();
    }

    /// Unknown calendar ids are registered on the fly.
    pub fn set_calendar_visibility(&mut self, calendar_id: &str, is_visible: bool) {
        self.state
            .calendars
            .entry(calendar_id.to_string())
            .or_insert_with(|| CalendarInfo::new(calendar_id, calendar_id))
            .is_visible = is_visible;
        debug!(calendar_id, is_visible, "calendar visibility changed");
    }

    // Navigation

    pub fn next(&mut self) {
        self.set_date(self.view.step(&self.options, 1));
    }

    pub fn prev(&mut self) {
        self.set_date(self.view.step(&self.options, -1));
    }

    pub fn today(&mut self) {
        self.set_date(self.view.today);
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        if date == self.view.date {
            return;
        }
        self.cancel_drag();
        self.view.date = date;
        self.notify_date_changed();
    }

    pub fn change_view(&mut self, kind: ViewKind) {
        let from = self.view.kind;
        if from == kind {
            return;
        }
        self.cancel_drag();
        self.view.kind = kind;
        debug!(from = from.as_key(), to = kind.as_key(), "view changed");
        self.bus.fire(&Notification::ViewChanged { from, to: kind });
        self.notify_date_changed();
    }

    pub fn date_range_start(&self) -> NaiveDate {
        self.view.date_range(&self.options).0
    }

    pub fn date_range_end(&self) -> NaiveDate {
        self.view.date_range(&self.options).1
    }

    fn notify_date_changed(&mut self) {
        let (range_start, range_end) = self.view.date_range(&self.options);
        self.bus.fire(&Notification::DateChanged {
            date: self.view.date,
            range_start,
            range_end,
        });
    }

    // Events

    pub fn create_events<I>(&mut self, events: I) -> anyhow::Result<Vec<EventKey>>
    where
        I: IntoIterator<Item = CalendarEvent>,
    {
        let events = events.into_iter().collect::<Vec<_>>();
        for event in &events {
            self.bus.fire(&Notification::BeforeCreateEvent {
                event: event.clone(),
            });
        }
        self.state.events.create(events)
    }

    pub fn get_event(&self, id: &str, calendar_id: &str) -> Option<&CalendarEvent> {
        self.state.events.get(id, calendar_id)
    }

    pub fn update_event(
        &mut self,
        id: &str,
        calendar_id: &str,
        changes: &EventChanges,
    ) -> anyhow::Result<CalendarEvent> {
        let current = self
            .state
            .events
            .get(id, calendar_id)
            .cloned()
            .ok_or_else(|| anyhow!("event not found: {calendar_id}/{id}"))?;
        self.bus.fire(&Notification::BeforeUpdateEvent {
            event: current,
            changes: changes.clone(),
        });
        self.state
            .events
            .update(id, calendar_id, changes)
            .cloned()
    }

    pub fn delete_event(&mut self, id: &str, calendar_id: &str) -> anyhow::Result<CalendarEvent> {
        let current = self
            .state
            .events
            .get(id, calendar_id)
            .cloned()
            .ok_or_else(|| anyhow!("event not found: {calendar_id}/{id}"))?;
        self.bus
            .fire(&Notification::BeforeDeleteEvent { event: current });
        self.state.events.delete(id, calendar_id)
    }

    pub fn clear(&mut self) {
        self.cancel_drag();
        self.state.events.clear();
    }

    // Layout

    /// Rows hidden behind "+N more" follow `visible_event_count`, further
    /// limited by what fits when a container is given.
    pub fn month_layouts(&self, container: Option<Rect>) -> Vec<DayGridLayout> {
        let matrix = self.view.month_matrix(&self.options);
        let Some((first, last)) = matrix_range(&matrix) else {
            return Vec::new();
        };
        let events = self.state.visible_events(first, last);
        let max_rows = self.month_max_rows(container, matrix.len());
        layout_month(
            &matrix,
            &events,
            &DayGridOptions {
                narrow_weekend: self.options.month.narrow_weekend,
                max_rows: Some(max_rows),
            },
        )
    }

    fn month_max_rows(&self, container: Option<Rect>, weeks: usize) -> usize {
        let by_option = self.options.month.visible_event_count;
        match container {
            Some(rect) if weeks > 0 => {
                let cell_height = rect.height / weeks as f64 - MONTH_HEADER_HEIGHT_PX;
                by_option.min(max_rows_for_height(cell_height, MONTH_EVENT_HEIGHT_PX))
            }
            _ => by_option,
        }
    }

    pub fn week_layout(&self) -> WeekLayout {
        let dates = self.view.dates(&self.options);
        let (first, last) = self.view.date_range(&self.options);
        let events = self.state.visible_events(first, last);
        layout_week(&dates, &events, &self.options.week, None)
    }

    /// Lays out the current view and fires `AfterRenderEvent` once per
    /// drawn event.
    pub fn render(&mut self, container: Option<Rect>) -> RenderedView {
        let rendered = match self.view.kind {
            ViewKind::Month => RenderedView::Month(self.month_layouts(container)),
            ViewKind::Week | ViewKind::Day => RenderedView::Week(self.week_layout()),
        };

        let mut seen = BTreeSet::new();
        let mut drawn = Vec::new();
        let mut collect = |models: &UiModelLayout| {
            for model in models.ui_models.iter().filter(|model| !model.exceeded) {
                if seen.insert(EventKey::of(&model.event)) {
                    drawn.push(model.event.clone());
                }
            }
        };
        match &rendered {
            RenderedView::Month(rows) => rows.iter().for_each(|row| collect(&row.models)),
            RenderedView::Week(week) => {
                collect(&week.day_grid.models);
                collect(&week.time_grid.models);
            }
        }

        debug!(events = drawn.len(), "rendered view");
        for event in drawn {
            self.bus.fire(&Notification::AfterRenderEvent { event });
        }
        rendered
    }

    /// Reports how many events `date` hides in the month view.
    pub fn click_more_events(&mut self, date: NaiveDate, container: Option<Rect>) -> usize {
        let hidden = self
            .month_layouts(container)
            .iter()
            .map(|row| row.exceed_count(date))
            .sum();
        self.bus
            .fire(&Notification::ClickMoreEventsBtn { date, hidden });
        hidden
    }

    // Drag

    /// Pointer-down on a grid surface. Returns the origin cell, or `None`
    /// when the press is ignored.
    pub fn begin_drag(
        &mut self,
        surface: DragSurface,
        container: Rect,
        kind: DragKind,
        point: (f64, f64),
        element_rect: Option<Rect>,
    ) -> Option<GridPosition> {
        if self
            .drag
            .as_ref()
            .is_some_and(|active| active.controller.is_active())
        {
            debug!("drag already active; ignoring pointer-down");
            return None;
        }
        if let Some((id, calendar_id)) = kind.target() {
            match self.state.events.get(id, calendar_id) {
                Some(event) if event.is_read_only => {
                    debug!(id, calendar_id, "read-only event; drag ignored");
                    return None;
                }
                None => {
                    warn!(id, calendar_id, "drag on unknown event ignored");
                    return None;
                }
                Some(_) => {}
            }
        }

        let (finder, dates) = self.surface_grid(surface, container);
        let mut controller = DragController::new(finder, self.options.drag.threshold_px);
        let origin = controller.start(kind, point.0, point.1, element_rect)?;
        self.drag = Some(ActiveDrag { controller, dates });
        Some(origin)
    }

    pub fn drag_move(&mut self, x: f64, y: f64) -> Option<GridPosition> {
        self.drag.as_mut()?.controller.update(x, y)
    }

    /// Pointer-up. Creations are reported through `SelectDateTime` and
    /// returned for the host to confirm; moves and resizes are applied.
    pub fn end_drag(&mut self, x: f64, y: f64) -> anyhow::Result<Option<DragOutcome>> {
        let Some(mut active) = self.drag.take() else {
            return Ok(None);
        };
        if active.controller.is_active() {
            active.controller.update(x, y);
        }
        let Some(commit) = active.controller.commit() else {
            return Ok(None);
        };

        let event = match commit.kind.target() {
            Some((id, calendar_id)) => Some(
                self.state
                    .events
                    .get(id, calendar_id)
                    .cloned()
                    .ok_or_else(|| anyhow!("dragged event vanished: {calendar_id}/{id}"))?,
            ),
            None => None,
        };
        let Some(outcome) = commit.resolve(&active.dates, event.as_ref(), self.timezone) else {
            return Ok(None);
        };

        match &outcome {
            DragOutcome::Create {
                start,
                end,
                is_all_day,
            } => {
                self.bus.fire(&Notification::SelectDateTime {
                    start: *start,
                    end: *end,
                    is_all_day: *is_all_day,
                });
            }
            DragOutcome::Update { .. } => {
                self.apply_drag_outcome(&outcome)
                    .context("failed to apply drag")?;
            }
        }
        Ok(Some(outcome))
    }

    pub fn cancel_drag(&mut self) -> Option<DragCancel> {
        self.drag.take()?.controller.cancel()
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.drag
            .as_ref()
            .map_or(DragPhase::Idle, |active| active.controller.phase())
    }

    pub fn drag_css_state(&self) -> Option<&'static str> {
        self.drag.as_ref()?.controller.css_state()
    }

    pub fn drag_preview_rect(&self) -> Option<Rect> {
        self.drag.as_ref()?.controller.preview_rect()
    }

    /// Persists a drag result in one store operation; on error nothing
    /// changes.
    pub fn apply_drag_outcome(&mut self, outcome: &DragOutcome) -> anyhow::Result<EventKey> {
        match outcome {
            DragOutcome::Update {
                event_id,
                calendar_id,
                changes,
            } => {
                let event = self
                    .state
                    .events
                    .get(event_id, calendar_id)
                    .ok_or_else(|| anyhow!("event not found: {calendar_id}/{event_id}"))?;
                if event.is_read_only {
                    return Err(anyhow!("event {calendar_id}/{event_id} is read-only"));
                }
                let updated = self.update_event(event_id, calendar_id, changes)?;
                Ok(EventKey::of(&updated))
            }
            DragOutcome::Create {
                start,
                end,
                is_all_day,
            } => {
                let calendar_id = self.state.default_calendar_id().to_string();
                let event = if *is_all_day {
                    CalendarEvent::new_all_day(calendar_id, "", *start, *end)
                } else {
                    CalendarEvent::new_timed(calendar_id, "", *start, *end)
                };
                self.create_events([event])?
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow!("created event was not stored"))
            }
        }
    }

    fn surface_grid(
        &self,
        surface: DragSurface,
        container: Rect,
    ) -> (GridPositionFinder, SurfaceDates) {
        match surface {
            DragSurface::MonthGrid => {
                let matrix = self.view.month_matrix(&self.options);
                let columns = matrix.first().map_or(0, Vec::len);
                let mut finder = GridPositionFinder::new(Some(container), columns, matrix.len());
                if self.options.month.narrow_weekend
                    && let Some(row) = matrix.first()
                {
                    finder = finder.with_grid_columns(&grid_columns(row, true, FULL_WIDTH));
                }
                (finder, SurfaceDates::Month(MonthGridDates { matrix }))
            }
            DragSurface::DayGrid => {
                let dates = self.view.dates(&self.options);
                let mut finder = GridPositionFinder::new(Some(container), dates.len(), 1);
                if self.options.week.narrow_weekend {
                    finder = finder.with_grid_columns(&grid_columns(&dates, true, FULL_WIDTH));
                }
                (finder, SurfaceDates::DayGrid(DayGridDates { dates }))
            }
            DragSurface::TimeGrid => {
                let dates = self.view.dates(&self.options);
                let (hour_start, hour_end) =
                    clamp_hours(self.options.week.hour_start, self.options.week.hour_end);
                let rows = ((hour_end - hour_start) * SLOTS_PER_HOUR) as usize;
                let mut finder = GridPositionFinder::new(Some(container), dates.len(), rows);
                if self.options.week.narrow_weekend {
                    finder = finder.with_grid_columns(&grid_columns(&dates, true, FULL_WIDTH));
                }
                (
                    finder,
                    SurfaceDates::Time(TimeGridDates { dates, hour_start }),
                )
            }
        }
    }
}
