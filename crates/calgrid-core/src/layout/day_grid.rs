//! Packing of all-day and multi-day bars
//! into display rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::trace;

use super::ui_model::{
  EventUiModel,
  UiModelLayout
};
use crate::columns::{
  FULL_WIDTH,
  GridColumn,
  grid_columns,
  span_left_and_width
};
use crate::datetime::date_key;
use crate::event::CalendarEvent;

#[derive(
  Debug, Clone, Default, PartialEq,
)]
pub struct DayGridOptions {
  pub narrow_weekend: bool,
  /// Rows past this limit are marked
  /// exceeded. `None` shows everything.
  pub max_rows:       Option<usize>
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DayGridLayout {
  pub columns:       Vec<GridColumn>,
  pub models:        UiModelLayout,
  /// Hidden events per date key.
  pub exceed_counts: BTreeMap<String, usize>,
  pub row_count:     usize
}

impl DayGridLayout {
  pub fn exceed_count(
    &self,
    date: NaiveDate
  ) -> usize {
    self
      .exceed_counts
      .get(&date_key(date))
      .copied()
      .unwrap_or(0)
  }
}

struct Candidate<'a> {
  event:        &'a CalendarEvent,
  column_start: usize,
  column_end:   usize
}

/// Packs the events touching `dates`
/// into the fewest display rows.
///
/// Events are ordered by first visible
/// column, then longest first; ties keep
/// input order. Each takes the lowest row
/// free across its whole span.
pub fn layout_day_grid<'a, I>(
  dates: &[NaiveDate],
  events: I,
  options: &DayGridOptions
) -> DayGridLayout
where
  I: IntoIterator<
    Item = &'a CalendarEvent
  >
{
  let columns = grid_columns(
    dates,
    options.narrow_weekend,
    FULL_WIDTH
  );

  let mut candidates = events
    .into_iter()
    .filter(|event| event.is_visible)
    .filter_map(|event| {
      let (column_start, column_end) =
        column_span(dates, event)?;
      Some(Candidate {
        event,
        column_start,
        column_end
      })
    })
    .collect::<Vec<_>>();

  candidates.sort_by(|a, b| {
    a.column_start
      .cmp(&b.column_start)
      .then_with(|| {
        b.event
          .duration()
          .cmp(&a.event.duration())
      })
  });

  let mut occupied: Vec<Vec<bool>> =
    Vec::new();
  let mut models =
    UiModelLayout::default();
  let mut exceed_counts =
    BTreeMap::<String, usize>::new();

  for candidate in candidates {
    let span = candidate.column_start
      ..=candidate.column_end;
    let row = first_free_row(
      &mut occupied,
      dates.len(),
      span.clone()
    );
    for cell in
      &mut occupied[row][span.clone()]
    {
      *cell = true;
    }

    let exceeded = options
      .max_rows
      .is_some_and(|max| row >= max);
    let span_dates =
      &dates[span.clone()];
    if exceeded {
      for date in span_dates {
        *exceed_counts
          .entry(date_key(*date))
          .or_default() += 1;
      }
    }

    let (left, width) =
      span_left_and_width(
        &columns,
        candidate.column_start,
        candidate.column_end
      );
    let model = EventUiModel {
      event: candidate.event.clone(),
      column_start: candidate
        .column_start,
      column_end: candidate.column_end,
      row,
      left,
      width,
      top: row as f64,
      height: 1.0,
      exceeded,
      continues_before: candidate
        .event
        .first_date()
        < dates[candidate.column_start],
      continues_after: candidate
        .event
        .last_date()
        > dates[candidate.column_end]
    };
    models.push(
      model,
      span_dates.iter().copied()
    );
  }

  trace!(
    columns = columns.len(),
    models = models.len(),
    rows = occupied.len(),
    "packed day grid"
  );

  DayGridLayout {
    columns,
    models,
    exceed_counts,
    row_count: occupied.len()
  }
}

/// Ceiling for [`max_rows_for_height`].
pub const MAX_DISPLAY_ROWS: usize =
  u16::MAX as usize;

/// Predicate telling whether display
/// row `i` fits in the container.
pub fn is_within_height(
  container_height: f64,
  row_height: f64
) -> impl Fn(usize) -> bool {
  move |index| {
    (index as f64 + 1.0) * row_height
      <= container_height
  }
}

/// How many display rows fit, using the
/// same rule as [`is_within_height`].
pub fn max_rows_for_height(
  container_height: f64,
  row_height: f64
) -> usize {
  if !row_height.is_finite()
    || row_height <= 0.0
    || !container_height.is_finite()
    || container_height <= 0.0
  {
    return 0;
  }

  let fits = is_within_height(
    container_height,
    row_height
  );
  let mut rows = (container_height
    / row_height)
    .floor()
    .min(MAX_DISPLAY_ROWS as f64)
    as usize;
  while rows > 0 && !fits(rows - 1) {
    rows -= 1;
  }
  while rows < MAX_DISPLAY_ROWS
    && fits(rows)
  {
    rows += 1;
  }
  rows
}

fn column_span(
  dates: &[NaiveDate],
  event: &CalendarEvent
) -> Option<(usize, usize)> {
  let first = event.first_date();
  let last = event.last_date();
  let start = dates
    .iter()
    .position(|date| *date >= first)?;
  let end = dates
    .iter()
    .rposition(|date| *date <= last)?;
  (start <= end).then_some((start, end))
}

fn first_free_row(
  occupied: &mut Vec<Vec<bool>>,
  width: usize,
  span: std::ops::RangeInclusive<usize>
) -> usize {
  let found =
    occupied.iter().position(|row| {
      row[span.clone()]
        .iter()
        .all(|cell| !cell)
    });
  match found {
    | Some(row) => row,
    | None => {
      occupied.push(vec![false; width]);
      occupied.len() - 1
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono_tz::UTC;

  use super::*;
  use crate::datetime::CalendarDate;
  use crate::matrix::range_dates;

  fn day(d: u32) -> CalendarDate {
    CalendarDate::from_ymd_hm(
      UTC, 2021, 12, d, 0, 0
    )
    .expect("valid date")
  }

  fn all_day(
    id: &str,
    first: u32,
    last: u32
  ) -> CalendarEvent {
    CalendarEvent::new_all_day(
      "cal",
      id,
      day(first),
      day(last)
    )
    .with_id(id)
  }

  fn week() -> Vec<NaiveDate> {
    range_dates(
      day(5).date(),
      day(11).date()
    )
  }

  fn row_of(
    layout: &DayGridLayout,
    id: &str
  ) -> usize {
    layout
      .models
      .find(id, "cal")
      .expect("model present")
      .row
  }

  #[test]
  fn longer_events_pack_first() {
    let events = vec![
      all_day("short", 6, 6),
      all_day("long", 6, 9),
      all_day("after", 8, 8),
      all_day("gap", 10, 11),
    ];
    let layout = layout_day_grid(
      &week(),
      &events,
      &DayGridOptions::default()
    );

    assert_eq!(row_of(&layout, "long"), 0);
    assert_eq!(row_of(&layout, "short"), 1);
    assert_eq!(row_of(&layout, "after"), 1);
    assert_eq!(row_of(&layout, "gap"), 0);
    assert_eq!(layout.row_count, 2);
  }

  #[test]
  fn no_two_models_share_a_cell() {
    let events = (0..12)
      .map(|n| {
        all_day(
          &format!("e{n}"),
          5 + n % 4,
          5 + n % 4 + n % 3
        )
      })
      .collect::<Vec<_>>();
    let layout = layout_day_grid(
      &week(),
      &events,
      &DayGridOptions::default()
    );

    let models = &layout.models.ui_models;
    for (i, a) in models.iter().enumerate()
    {
      for b in &models[i + 1..] {
        let overlap = (a.column_start
          ..=a.column_end)
          .any(|c| b.covers_column(c));
        assert!(
          !(overlap && a.row == b.row)
        );
      }
    }
  }

  #[test]
  fn identical_events_keep_input_order() {
    let events = vec![
      all_day("first", 6, 7),
      all_day("second", 6, 7),
    ];
    let layout = layout_day_grid(
      &week(),
      &events,
      &DayGridOptions::default()
    );
    assert_eq!(row_of(&layout, "first"), 0);
    assert_eq!(
      row_of(&layout, "second"),
      1
    );
  }

  #[test]
  fn overflow_counts_hidden_events() {
    let events = vec![
      all_day("a", 6, 6),
      all_day("b", 6, 7),
      all_day("c", 6, 6),
    ];
    let layout = layout_day_grid(
      &week(),
      &events,
      &DayGridOptions {
        narrow_weekend: false,
        max_rows:       Some(2)
      }
    );

    assert_eq!(
      layout.exceed_count(day(6).date()),
      1
    );
    assert_eq!(
      layout.exceed_count(day(7).date()),
      0
    );
    let hidden = layout
      .models
      .find("c", "cal")
      .expect("model present");
    assert!(hidden.exceeded);
  }

  #[test]
  fn spans_clamp_to_row() {
    let events =
      vec![all_day("trip", 1, 20)];
    let layout = layout_day_grid(
      &week(),
      &events,
      &DayGridOptions::default()
    );
    let model = &layout.models.ui_models[0];

    assert_eq!(model.column_start, 0);
    assert_eq!(model.column_end, 6);
    assert!(model.continues_before);
    assert!(model.continues_after);
    assert!(
      (model.width - 100.0).abs() < 1e-6
    );
    assert_eq!(
      layout
        .models
        .models_on(day(8).date())
        .count(),
      1
    );
  }

  #[test]
  fn weekend_only_event_skipped_in_workweek()
  {
    let workweek = week()
      .into_iter()
      .filter(|date| {
        !crate::datetime::is_weekend(
          *date
        )
      })
      .collect::<Vec<_>>();
    let events =
      vec![all_day("weekend", 11, 12)];
    let layout = layout_day_grid(
      &workweek,
      &events,
      &DayGridOptions::default()
    );
    assert!(layout.models.is_empty());
    assert!(layout.models.by_date.is_empty());
  }

  #[test]
  fn height_predicate_is_inclusive() {
    let fits = is_within_height(60.0, 20.0);
    assert!(fits(0));
    assert!(fits(2));
    assert!(!fits(3));
    assert_eq!(
      max_rows_for_height(60.0, 20.0),
      3
    );
    assert_eq!(
      max_rows_for_height(59.0, 20.0),
      2
    );
    assert_eq!(
      max_rows_for_height(10.0, 0.0),
      0
    );
  }

  #[test]
  fn tiny_row_heights_stay_bounded() {
    assert!(is_within_height(1.0, 1e-320)(
      usize::MAX
    ));
    assert_eq!(
      max_rows_for_height(1.0, 1e-320),
      MAX_DISPLAY_ROWS
    );
    assert_eq!(
      max_rows_for_height(1.0, f64::NAN),
      0
    );
    assert_eq!(
      max_rows_for_height(
        f64::INFINITY,
        20.0
      ),
      0
    );
  }
}
