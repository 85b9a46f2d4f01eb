use chrono::NaiveDate;
use serde::Serialize;

use crate::datetime::is_weekend;

pub const FULL_WIDTH: f64 = 100.0;

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct GridColumn {
  pub date:  NaiveDate,
  /// Percent of the row.
  pub width: f64,
  /// Percent of the row.
  pub left:  f64
}

/// Splits `total_width` across `dates`.
///
/// With `narrow_weekend` Saturday and
/// Sunday get half a weekday's width,
/// unless the row holds only one kind of
/// day.
pub fn grid_columns(
  dates: &[NaiveDate],
  narrow_weekend: bool,
  total_width: f64
) -> Vec<GridColumn> {
  if dates.is_empty() {
    return Vec::new();
  }

  let weekend_count = dates
    .iter()
    .filter(|date| is_weekend(**date))
    .count();
  let weekday_count =
    dates.len() - weekend_count;
  let narrow = narrow_weekend
    && weekend_count > 0
    && weekday_count > 0;

  let unit = if narrow {
    total_width
      / (weekday_count as f64
        + weekend_count as f64 / 2.0)
  } else {
    total_width / dates.len() as f64
  };

  let mut left = 0.0;
  dates
    .iter()
    .map(|date| {
      let width =
        if narrow && is_weekend(*date) {
          unit / 2.0
        } else {
          unit
        };
      let column = GridColumn {
        date: *date,
        width,
        left
      };
      left += width;
      column
    })
    .collect()
}

/// Right edge of every column, in
/// percent.
pub fn column_edges(
  columns: &[GridColumn]
) -> Vec<f64> {
  columns
    .iter()
    .map(|column| {
      column.left + column.width
    })
    .collect()
}

/// Left offset and width covering
/// `start..=end`.
pub fn span_left_and_width(
  columns: &[GridColumn],
  start: usize,
  end: usize
) -> (f64, f64) {
  let Some(first) = columns.get(start)
  else {
    return (0.0, 0.0);
  };
  let width = columns
    .iter()
    .skip(start)
    .take(end.saturating_sub(start) + 1)
    .map(|column| column.width)
    .sum::<f64>();
  (first.left, width)
}
