//! Turns events plus grid geometry into
//! render-ready UI models.

pub mod day_grid;
pub mod time_grid;
pub mod ui_model;

use serde::Serialize;

pub use day_grid::{
  DayGridLayout,
  DayGridOptions,
  is_within_height,
  layout_day_grid,
  max_rows_for_height
};
pub use time_grid::{
  TimeGridLayout,
  TimeGridOptions,
  layout_time_grid
};
pub use ui_model::{
  EventUiModel,
  UiModelLayout
};

use crate::event::CalendarEvent;
use crate::matrix::DateMatrix;
use crate::options::WeekOptions;

/// Both panels of a week or day view.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct WeekLayout {
  pub day_grid:  DayGridLayout,
  pub time_grid: TimeGridLayout
}

/// One packed day grid per matrix row.
/// Every visible event is drawn as a bar
/// in the month view, timed or not.
pub fn layout_month(
  matrix: &DateMatrix,
  events: &[&CalendarEvent],
  options: &DayGridOptions
) -> Vec<DayGridLayout> {
  matrix
    .iter()
    .map(|row| {
      layout_day_grid(
        row,
        events.iter().copied(),
        options
      )
    })
    .collect()
}

/// Splits events between the all-day
/// panel and the time grid.
pub fn layout_week(
  dates: &[chrono::NaiveDate],
  events: &[&CalendarEvent],
  options: &WeekOptions,
  max_day_grid_rows: Option<usize>
) -> WeekLayout {
  let day_grid = layout_day_grid(
    dates,
    events
      .iter()
      .copied()
      .filter(|event| event.is_day_grid()),
    &DayGridOptions {
      narrow_weekend: options
        .narrow_weekend,
      max_rows:       max_day_grid_rows
    }
  );
  let time_grid = layout_time_grid(
    dates,
    events.iter().copied(),
    &TimeGridOptions::from(options)
  );

  WeekLayout {
    day_grid,
    time_grid
  }
}
