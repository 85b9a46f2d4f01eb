//! Month and week date grids.

use chrono::{
  Datelike,
  NaiveDate
};
use tracing::trace;

use crate::datetime::{
  add_days,
  days_in_month,
  first_day_of_month,
  is_weekend,
  start_of_week
};
use crate::options::{
  MAX_VISIBLE_WEEKS,
  MonthOptions,
  WeekOptions
};

pub const DAYS_OF_WEEK: usize = 7;
const DEFAULT_MONTH_WEEKS: usize = 6;

/// Weeks of days. Every row has the same
/// length.
pub type DateMatrix = Vec<Vec<NaiveDate>>;

/// Builds the month grid around `target`.
///
/// With `visible_weeks_count > 0` the
/// grid starts at the week holding
/// `target` and has that many rows, at
/// most [`MAX_VISIBLE_WEEKS`];
/// otherwise it starts at the week
/// holding the first of the month and
/// has 6 rows, or just enough to cover
/// the month when `is_always_6_week` is
/// off.
pub fn month_matrix(
  target: NaiveDate,
  options: &MonthOptions
) -> DateMatrix {
  let week_start = options.week_start();
  let month_first = first_day_of_month(
    target.year(),
    target.month()
  );
  let base =
    if options.visible_weeks_count > 0 {
      target
    } else {
      month_first
    };
  let matrix_start =
    start_of_week(base, week_start);

  let weeks =
    if options.visible_weeks_count > 0 {
      options
        .visible_weeks_count
        .min(MAX_VISIBLE_WEEKS)
        as usize
    } else if options.is_always_6_week {
      DEFAULT_MONTH_WEEKS
    } else {
      let lead_days = (month_first
        - matrix_start)
        .num_days()
        as usize;
      let total = lead_days
        + days_in_month(
          target.year(),
          target.month()
        ) as usize;
      total.div_ceil(DAYS_OF_WEEK)
    };

  let matrix = (0..weeks)
    .map(|week| {
      week_row(
        add_days(
          matrix_start,
          (week * DAYS_OF_WEEK) as i64
        ),
        options.workweek
      )
    })
    .collect::<DateMatrix>();

  trace!(
    %target,
    rows = matrix.len(),
    columns = matrix.first().map_or(0, Vec::len),
    "built month matrix"
  );
  matrix
}

/// The dates of the week holding
/// `target`.
pub fn week_dates(
  target: NaiveDate,
  options: &WeekOptions
) -> Vec<NaiveDate> {
  week_row(
    start_of_week(
      target,
      options.week_start()
    ),
    options.workweek
  )
}

/// Every day from `start` to `end`,
/// inclusive. Empty when `end < start`.
pub fn range_dates(
  start: NaiveDate,
  end: NaiveDate
) -> Vec<NaiveDate> {
  start
    .iter_days()
    .take_while(|day| *day <= end)
    .collect()
}

/// First and last date shown by a matrix.
pub fn matrix_range(
  matrix: &DateMatrix
) -> Option<(NaiveDate, NaiveDate)> {
  let first = *matrix.first()?.first()?;
  let last = *matrix.last()?.last()?;
  Some((first, last))
}

fn week_row(
  first: NaiveDate,
  workweek: bool
) -> Vec<NaiveDate> {
  (0..DAYS_OF_WEEK as i64)
    .map(|offset| add_days(first, offset))
    .filter(|day| {
      !workweek || !is_weekend(*day)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::Weekday;

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn december_2021_default_grid() {
    let matrix = month_matrix(
      date(2021, 12, 15),
      &MonthOptions::default()
    );

    assert_eq!(matrix.len(), 6);
    assert!(
      matrix
        .iter()
        .all(|row| row.len() == 7)
    );
    assert_eq!(
      matrix[0][0],
      date(2021, 11, 28)
    );
    assert_eq!(
      matrix[5][6],
      date(2022, 1, 8)
    );
  }

  #[test]
  fn workweek_rows_span_monday_to_friday()
  {
    let options = MonthOptions {
      workweek: true,
      ..MonthOptions::default()
    };
    let matrix = month_matrix(
      date(2021, 12, 1),
      &options
    );

    assert_eq!(matrix.len(), 6);
    for row in &matrix {
      assert_eq!(row.len(), 5);
      assert_eq!(
        row[0].weekday(),
        Weekday::Mon
      );
      assert_eq!(
        row[4].weekday(),
        Weekday::Fri
      );
    }
  }

  #[test]
  fn natural_span_without_six_weeks() {
    let options = MonthOptions {
      is_always_6_week: false,
      ..MonthOptions::default()
    };

    let december = month_matrix(
      date(2021, 12, 1),
      &options
    );
    assert_eq!(december.len(), 5);

    // February 2015 starts on a Sunday
    // and has 28 days.
    let february = month_matrix(
      date(2015, 2, 10),
      &options
    );
    assert_eq!(february.len(), 4);
  }

  #[test]
  fn visible_weeks_count_wins() {
    for always in [true, false] {
      let options = MonthOptions {
        visible_weeks_count: 4,
        is_always_6_week: always,
        ..MonthOptions::default()
      };
      let matrix = month_matrix(
        date(2021, 12, 15),
        &options
      );
      assert_eq!(matrix.len(), 4);
      assert_eq!(
        matrix[0][0],
        date(2021, 12, 12)
      );
    }
  }

  #[test]
  fn unsanitized_week_count_is_capped() {
    let options = MonthOptions {
      visible_weeks_count: 200_000,
      ..MonthOptions::default()
    };
    assert_eq!(
      month_matrix(
        date(2021, 12, 15),
        &options
      )
      .len(),
      MAX_VISIBLE_WEEKS as usize
    );
  }

  #[test]
  fn builder_is_idempotent() {
    let options = MonthOptions {
      start_day_of_week: 1,
      narrow_weekend: true,
      ..MonthOptions::default()
    };
    let target = date(2024, 2, 29);
    assert_eq!(
      month_matrix(target, &options),
      month_matrix(target, &options)
    );
  }

  #[test]
  fn monday_week_start_shifts_grid() {
    let options = MonthOptions {
      start_day_of_week: 1,
      ..MonthOptions::default()
    };
    let matrix = month_matrix(
      date(2021, 12, 1),
      &options
    );
    assert_eq!(
      matrix[0][0],
      date(2021, 11, 29)
    );
  }

  #[test]
  fn range_dates_is_inclusive() {
    let days = range_dates(
      date(2021, 12, 30),
      date(2022, 1, 2)
    );
    assert_eq!(days.len(), 4);
    assert!(
      range_dates(
        date(2022, 1, 2),
        date(2021, 12, 30)
      )
      .is_empty()
    );
  }
}
