//! Pointer drag state machine for
//! creating, moving and resizing events.
//!
//! A drag moves through
//! `Idle -> Pending -> Dragging` and ends
//! in a commit or a cancel, after which
//! the controller is `Idle` again.
//! `Pending` covers the time between
//! pointer-down and the pointer moving
//! past the threshold; only `Dragging`
//! carries the visual drag marker.
//!
//! Grid positions are translated into
//! dates through [`GridDates`], so the
//! same controller drives the month grid,
//! the all-day panel and the time grid.

use chrono::{
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime
};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{
  debug,
  trace
};

use crate::datetime::CalendarDate;
use crate::event::{
  CalendarEvent,
  EventChanges
};
use crate::grid_position::{
  GridPosition,
  GridPositionFinder,
  Rect
};
use crate::matrix::DateMatrix;
use crate::time_rows::SLOT_MINUTES;

pub const DEFAULT_DRAG_THRESHOLD_PX: f64 =
  3.0;
pub const DRAGGING_CSS_STATE: &str =
  "dragging";

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub enum ResizeEdge {
  Start,
  End
}

#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
pub enum DragKind {
  Create,
  Move {
    event_id:    String,
    calendar_id: String
  },
  Resize {
    event_id:    String,
    calendar_id: String,
    edge:        ResizeEdge
  }
}

impl DragKind {
  pub fn target(
    &self
  ) -> Option<(&str, &str)> {
    match self {
      | Self::Create => None,
      | Self::Move {
        event_id,
        calendar_id
      }
      | Self::Resize {
        event_id,
        calendar_id,
        ..
      } => {
        Some((
          event_id.as_str(),
          calendar_id.as_str()
        ))
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub enum DragPhase {
  #[default]
  Idle,
  Pending,
  Dragging
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DragState {
  pub kind:          DragKind,
  pub origin:        GridPosition,
  pub current:       GridPosition,
  pub is_cancelled:  bool,
  pub origin_point:  (f64, f64),
  pub current_point: (f64, f64),
  /// The dragged element before the drag.
  pub element_rect:  Option<Rect>
}

impl DragState {
  fn moved_distance(&self) -> f64 {
    let dx = self.current_point.0
      - self.origin_point.0;
    let dy = self.current_point.1
      - self.origin_point.1;
    dx.hypot(dy)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyInput {
  Escape,
  Other
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
  Down {
    x:            f64,
    y:            f64,
    kind:         DragKind,
    element_rect: Option<Rect>
  },
  Move {
    x: f64,
    y: f64
  },
  Up {
    x: f64,
    y: f64
  },
  Key(KeyInput)
}

/// A finished drag, still in grid terms.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DragCommit {
  pub kind:    DragKind,
  pub origin:  GridPosition,
  pub current: GridPosition,
  /// False for a click without movement.
  pub moved:   bool
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DragCancel {
  pub state:         DragState,
  /// Where the element goes back to.
  pub restored_rect: Option<Rect>
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragTransition {
  Ignored,
  Started(GridPosition),
  Moved(GridPosition),
  Committed(DragCommit),
  Cancelled(DragCancel)
}

/// What a commit means for the event
/// collection.
///
/// A `Create` dragged across time-grid
/// columns is one continuous timed range
/// from the first slot to the end of the
/// last, not one block per day.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub enum DragOutcome {
  Create {
    start:      CalendarDate,
    end:        CalendarDate,
    is_all_day: bool
  },
  Update {
    event_id:    String,
    calendar_id: String,
    changes:     EventChanges
  }
}

/// Maps grid cells onto the calendar.
pub trait GridDates {
  /// Wall-clock start of a cell.
  fn cell_start(
    &self,
    position: GridPosition
  ) -> Option<NaiveDateTime>;

  /// Length of one cell.
  fn cell_span(&self) -> Duration;

  /// Whether cells are whole days.
  fn is_day_grid(&self) -> bool {
    self.cell_span() >= Duration::days(1)
  }
}

/// Month view: a cell is one matrix date.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthGridDates {
  pub matrix: DateMatrix
}

impl GridDates for MonthGridDates {
  fn cell_start(
    &self,
    position: GridPosition
  ) -> Option<NaiveDateTime> {
    let date = self
      .matrix
      .get(position.row_index)?
      .get(position.column_index)?;
    Some(date.and_time(NaiveTime::MIN))
  }

  fn cell_span(&self) -> Duration {
    Duration::days(1)
  }
}

/// The all-day panel of a week view; the
/// row is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGridDates {
  pub dates: Vec<NaiveDate>
}

impl GridDates for DayGridDates {
  fn cell_start(
    &self,
    position: GridPosition
  ) -> Option<NaiveDateTime> {
    let date =
      self.dates.get(position.column_index)?;
    Some(date.and_time(NaiveTime::MIN))
  }

  fn cell_span(&self) -> Duration {
    Duration::days(1)
  }
}

/// Week/day time grid: a column is a date
/// and a row is a half-hour slot starting
/// at `hour_start`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGridDates {
  pub dates:      Vec<NaiveDate>,
  pub hour_start: u32
}

impl GridDates for TimeGridDates {
  fn cell_start(
    &self,
    position: GridPosition
  ) -> Option<NaiveDateTime> {
    let date =
      self.dates.get(position.column_index)?;
    let minutes = i64::from(
      self.hour_start
    ) * 60
      + position.row_index as i64
        * SLOT_MINUTES;
    Some(
      date.and_time(NaiveTime::MIN)
        + Duration::minutes(minutes)
    )
  }

  fn cell_span(&self) -> Duration {
    Duration::minutes(SLOT_MINUTES)
  }
}

impl DragCommit {
  /// Translates the grid delta into a
  /// calendar change. Move and resize
  /// need the dragged event; `None` means
  /// there is nothing to apply.
  pub fn resolve<G>(
    &self,
    grid: &G,
    event: Option<&CalendarEvent>,
    timezone: Tz
  ) -> Option<DragOutcome>
  where
    G: GridDates + ?Sized
  {
    let origin =
      grid.cell_start(self.origin)?;
    let current =
      grid.cell_start(self.current)?;
    let span = grid.cell_span();

    match &self.kind {
      | DragKind::Create => {
        let first = origin.min(current);
        let last = origin.max(current);
        let start =
          CalendarDate::new(first, timezone);
        let is_all_day = grid.is_day_grid();
        let end = if is_all_day {
          CalendarDate::new(last, timezone)
            .end_of_day()
        } else {
          CalendarDate::new(
            last + span,
            timezone
          )
        };
        Some(DragOutcome::Create {
          start,
          end,
          is_all_day
        })
      }
      | DragKind::Move {
        event_id,
        calendar_id
      } => {
        let event = event?;
        let delta = current - origin;
        if !self.moved
          || delta.is_zero()
        {
          return None;
        }
        Some(DragOutcome::Update {
          event_id:    event_id.clone(),
          calendar_id: calendar_id.clone(),
          changes:     EventChanges::schedule(
            event.start.add(delta),
            event.end.add(delta)
          )
        })
      }
      | DragKind::Resize {
        event_id,
        calendar_id,
        edge
      } => {
        let event = event?;
        let delta = current - origin;
        if !self.moved
          || delta.is_zero()
        {
          return None;
        }
        let (start, end) = resize_edge(
          event,
          *edge,
          delta,
          grid.is_day_grid(),
          span
        );
        Some(DragOutcome::Update {
          event_id:    event_id.clone(),
          calendar_id: calendar_id.clone(),
          changes:     EventChanges::schedule(
            start, end
          )
        })
      }
    }
  }
}

/// Moves one edge, keeping at least one
/// slot (or one day) between the edges.
fn resize_edge(
  event: &CalendarEvent,
  edge: ResizeEdge,
  delta: Duration,
  day_grid: bool,
  span: Duration
) -> (CalendarDate, CalendarDate) {
  match edge {
    | ResizeEdge::End => {
      let min_end = if day_grid {
        event.start.end_of_day()
      } else {
        event.start.add(span)
      };
      (
        event.start,
        event.end.add(delta).max(min_end)
      )
    }
    | ResizeEdge::Start => {
      let max_start = if day_grid {
        event
          .start
          .with_date(event.last_date())
      } else {
        event.end.add(-span)
      };
      (
        event
          .start
          .add(delta)
          .min(max_start),
        event.end
      )
    }
  }
}

/// Single-pointer drag controller.
#[derive(Debug, Clone)]
pub struct DragController {
  finder:       GridPositionFinder,
  threshold_px: f64,
  phase:        DragPhase,
  state:        Option<DragState>
}

impl DragController {
  pub fn new(
    finder: GridPositionFinder,
    threshold_px: f64
  ) -> Self {
    Self {
      finder,
      threshold_px: threshold_px.max(0.0),
      phase: DragPhase::Idle,
      state: None
    }
  }

  /// Swaps the geometry, e.g. after the
  /// container was resized. Ignored while
  /// a drag is live.
  pub fn set_finder(
    &mut self,
    finder: GridPositionFinder
  ) {
    if self.is_active() {
      debug!(
        "ignoring finder change during drag"
      );
      return;
    }
    self.finder = finder;
  }

  pub fn finder(
    &self
  ) -> &GridPositionFinder {
    &self.finder
  }

  pub fn phase(&self) -> DragPhase {
    self.phase
  }

  pub fn state(
    &self
  ) -> Option<&DragState> {
    self.state.as_ref()
  }

  pub fn is_active(&self) -> bool {
    self.phase != DragPhase::Idle
  }

  /// True once the pointer moved past the
  /// threshold.
  pub fn is_dragging(&self) -> bool {
    self.phase == DragPhase::Dragging
  }

  /// CSS state marker for the dragged
  /// element.
  pub fn css_state(
    &self
  ) -> Option<&'static str> {
    self
      .is_dragging()
      .then_some(DRAGGING_CSS_STATE)
  }

  /// Pointer-down. Ignored while another
  /// drag is live or outside the grid.
  pub fn start(
    &mut self,
    kind: DragKind,
    x: f64,
    y: f64,
    element_rect: Option<Rect>
  ) -> Option<GridPosition> {
    if self.is_active() {
      trace!(
        "pointer-down ignored; drag already active"
      );
      return None;
    }
    let origin = self.finder.find(x, y)?;

    debug!(
      ?kind,
      column = origin.column_index,
      row = origin.row_index,
      "drag started"
    );
    self.phase = DragPhase::Pending;
    self.state = Some(DragState {
      kind,
      origin,
      current: origin,
      is_cancelled: false,
      origin_point: (x, y),
      current_point: (x, y),
      element_rect
    });
    Some(origin)
  }

  /// Pointer-move. Points outside the
  /// container clamp to its edges.
  pub fn update(
    &mut self,
    x: f64,
    y: f64
  ) -> Option<GridPosition> {
    let state = self.state.as_mut()?;
    let current =
      self.finder.find_clamped(x, y)?;
    state.current = current;
    state.current_point = (x, y);

    if self.phase == DragPhase::Pending
      && state.moved_distance()
        > self.threshold_px
    {
      trace!("drag passed threshold");
      self.phase = DragPhase::Dragging;
    }
    Some(current)
  }

  /// Pointer-up. Consumes the drag, so a
  /// commit can only happen once.
  pub fn commit(
    &mut self
  ) -> Option<DragCommit> {
    let phase = self.phase;
    let state = self.reset()?;
    let moved =
      phase == DragPhase::Dragging;

    if !moved
      && state.kind != DragKind::Create
    {
      debug!(
        "drag released before threshold; nothing to commit"
      );
      return None;
    }

    // A click selects the pressed cell,
    // wherever the pointer came to rest.
    let current = if moved {
      state.current
    } else {
      state.origin
    };
    debug!(
      kind = ?state.kind,
      moved,
      "drag committed"
    );
    Some(DragCommit {
      kind: state.kind,
      origin: state.origin,
      current,
      moved
    })
  }

  /// Cancel key. Nothing is applied.
  pub fn cancel(
    &mut self
  ) -> Option<DragCancel> {
    let mut state = self.reset()?;
    state.is_cancelled = true;
    debug!(
      kind = ?state.kind,
      "drag cancelled"
    );
    Some(DragCancel {
      restored_rect: state.element_rect,
      state
    })
  }

  /// Where the dragged element should be
  /// drawn right now.
  pub fn preview_rect(&self) -> Option<Rect> {
    let state = self.state.as_ref()?;
    let rect = state.element_rect?;
    if !self.is_dragging() {
      return Some(rect);
    }
    let (_, cell_h) =
      self.finder.cell_size()?;
    let dx = self.finder.column_left(
      state.current.column_index
    )? - self.finder.column_left(
      state.origin.column_index
    )?;
    let rows = state.current.row_index
      as f64
      - state.origin.row_index as f64;

    match &state.kind {
      | DragKind::Create => Some(rect),
      | DragKind::Move { .. } => {
        Some(rect.translate(
          dx,
          rows * cell_h
        ))
      }
      | DragKind::Resize {
        edge: ResizeEdge::End,
        ..
      } => {
        Some(Rect {
          height: (rect.height
            + rows * cell_h)
            .max(cell_h),
          ..rect
        })
      }
      | DragKind::Resize {
        edge: ResizeEdge::Start,
        ..
      } => {
        let dy = (rows * cell_h)
          .min(rect.height - cell_h);
        Some(Rect {
          y: rect.y + dy,
          height: rect.height - dy,
          ..rect
        })
      }
    }
  }

  pub fn handle(
    &mut self,
    input: PointerInput
  ) -> DragTransition {
    match input {
      | PointerInput::Down {
        x,
        y,
        kind,
        element_rect
      } => {
        self
          .start(kind, x, y, element_rect)
          .map_or(
            DragTransition::Ignored,
            DragTransition::Started
          )
      }
      | PointerInput::Move { x, y } => {
        self.update(x, y).map_or(
          DragTransition::Ignored,
          DragTransition::Moved
        )
      }
      | PointerInput::Up { x, y } => {
        if self.is_active() {
          self.update(x, y);
        }
        self.commit().map_or(
          DragTransition::Ignored,
          DragTransition::Committed
        )
      }
      | PointerInput::Key(
        KeyInput::Escape
      ) => {
        self.cancel().map_or(
          DragTransition::Ignored,
          DragTransition::Cancelled
        )
      }
      | PointerInput::Key(
        KeyInput::Other
      ) => DragTransition::Ignored
    }
  }

  fn reset(&mut self) -> Option<DragState> {
    self.phase = DragPhase::Idle;
    self.state.take()
  }
}
