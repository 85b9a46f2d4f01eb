use chrono::NaiveDate;
use serde::Serialize;

use crate::columns::{
  FULL_WIDTH,
  GridColumn,
  grid_columns
};
use crate::options::{
  WeekOptions,
  clamp_hours
};

pub const SLOT_MINUTES: i64 = 30;
pub const SLOTS_PER_HOUR: u32 = 2;

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct TimeGridRow {
  pub top:        f64,
  pub height:     f64,
  pub start_time: String,
  pub end_time:   String
}

/// Columns and half-hour rows of one
/// week or day panel.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct TimeGridData {
  pub columns:    Vec<GridColumn>,
  pub rows:       Vec<TimeGridRow>,
  pub hour_start: u32,
  pub hour_end:   u32
}

impl TimeGridData {
  /// Minutes covered by one row.
  pub fn step_minutes(&self) -> i64 {
    SLOT_MINUTES
  }

  pub fn total_minutes(&self) -> i64 {
    i64::from(
      self.hour_end - self.hour_start
    ) * 60
  }
}

pub fn time_grid_rows(
  hour_start: u32,
  hour_end: u32
) -> Vec<TimeGridRow> {
  let (hour_start, hour_end) =
    clamp_hours(hour_start, hour_end);
  let steps = ((hour_end - hour_start)
    * SLOTS_PER_HOUR)
    as usize;
  let height = FULL_WIDTH / steps as f64;

  (0..steps)
    .map(|index| {
      let hour = hour_start
        + (index as u32
          / SLOTS_PER_HOUR);
      let half = index % 2 == 1;
      let (start_time, end_time) =
        if half {
          (
            clock(hour, 30),
            clock(hour + 1, 0)
          )
        } else {
          (
            clock(hour, 0),
            clock(hour, 30)
          )
        };
      TimeGridRow {
        top: height * index as f64,
        height,
        start_time,
        end_time
      }
    })
    .collect()
}

pub fn time_grid_data(
  dates: &[NaiveDate],
  options: &WeekOptions
) -> TimeGridData {
  let (hour_start, hour_end) =
    clamp_hours(
      options.hour_start,
      options.hour_end
    );
  TimeGridData {
    columns: grid_columns(
      dates,
      options.narrow_weekend,
      FULL_WIDTH
    ),
    rows: time_grid_rows(
      hour_start, hour_end
    ),
    hour_start,
    hour_end
  }
}

/// Converts minutes past `hour_start`
/// into percent of the visible window,
/// going through the row step size.
pub fn percent_of_minutes(
  minutes: i64,
  hour_start: u32,
  hour_end: u32
) -> f64 {
  let (hour_start, hour_end) =
    clamp_hours(hour_start, hour_end);
  let steps = f64::from(
    (hour_end - hour_start)
      * SLOTS_PER_HOUR
  );
  let row_height = FULL_WIDTH / steps;
  minutes as f64 / SLOT_MINUTES as f64
    * row_height
}

fn clock(
  hour: u32,
  minute: u32
) -> String {
  format!("{hour:02}:{minute:02}")
}

#[cfg(test)]
mod tests {
  use super::*;

  const EPSILON: f64 = 1e-9;

  #[test]
  fn rows_are_contiguous_and_fill() {
    for (start, end) in
      [(0, 24), (8, 18), (23, 24), (0, 1)]
    {
      let rows =
        time_grid_rows(start, end);
      assert_eq!(
        rows.len(),
        (2 * (end - start)) as usize
      );
      for pair in rows.windows(2) {
        assert!(
          (pair[0].top + pair[0].height
            - pair[1].top)
            .abs()
            < EPSILON
        );
      }
      let total: f64 = rows
        .iter()
        .map(|row| row.height)
        .sum();
      assert!(
        (total - 100.0).abs() < 1e-6
      );
    }
  }

  #[test]
  fn labels_toggle_half_hours() {
    let rows = time_grid_rows(9, 11);
    let labels = rows
      .iter()
      .map(|row| {
        (
          row.start_time.as_str(),
          row.end_time.as_str()
        )
      })
      .collect::<Vec<_>>();
    assert_eq!(
      labels,
      vec![
        ("09:00", "09:30"),
        ("09:30", "10:00"),
        ("10:00", "10:30"),
        ("10:30", "11:00")
      ]
    );

    let full = time_grid_rows(0, 24);
    assert_eq!(full.len(), 48);
    assert_eq!(
      full[47].end_time,
      "24:00"
    );
  }

  #[test]
  fn panel_data_follows_week_options() {
    let dates = crate::matrix::range_dates(
      NaiveDate::from_ymd_opt(2021, 12, 13)
        .expect("valid date"),
      NaiveDate::from_ymd_opt(2021, 12, 17)
        .expect("valid date")
    );
    let data = time_grid_data(
      &dates,
      &WeekOptions {
        hour_start: 8,
        hour_end: 18,
        ..WeekOptions::default()
      }
    );
    assert_eq!(data.columns.len(), 5);
    assert_eq!(data.rows.len(), 20);
    assert_eq!(data.step_minutes(), 30);
    assert_eq!(data.total_minutes(), 600);
  }

  #[test]
  fn inverted_range_is_clamped() {
    let rows = time_grid_rows(10, 4);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].start_time, "10:00");
  }

  #[test]
  fn minutes_map_through_step_size() {
    assert!(
      (percent_of_minutes(90, 0, 24)
        - 90.0
          / crate::datetime::MINUTES_PER_DAY
            as f64
          * 100.0)
        .abs()
        < EPSILON
    );
    assert!(
      (percent_of_minutes(60, 8, 10)
        - 50.0)
        .abs()
        < EPSILON
    );
  }
}
