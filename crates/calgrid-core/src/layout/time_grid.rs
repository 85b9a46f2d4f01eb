//! Placement of timed events on the
//! vertical time axis.

use chrono::{
  NaiveDate,
  NaiveDateTime,
  NaiveTime
};
use serde::Serialize;
use tracing::trace;

use super::ui_model::{
  EventUiModel,
  UiModelLayout
};
use crate::columns::FULL_WIDTH;
use crate::event::CalendarEvent;
use crate::options::{
  WeekOptions,
  clamp_hours
};
use crate::time_rows::{
  TimeGridData,
  percent_of_minutes,
  time_grid_data
};

#[derive(
  Debug, Clone, PartialEq,
)]
pub struct TimeGridOptions {
  pub narrow_weekend: bool,
  pub hour_start:     u32,
  pub hour_end:       u32
}

impl Default for TimeGridOptions {
  fn default() -> Self {
    Self::from(&WeekOptions::default())
  }
}

impl From<&WeekOptions> for TimeGridOptions {
  fn from(options: &WeekOptions) -> Self {
    Self {
      narrow_weekend: options
        .narrow_weekend,
      hour_start:     options.hour_start,
      hour_end:       options.hour_end
    }
  }
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct TimeGridLayout {
  pub data:   TimeGridData,
  pub models: UiModelLayout
}

/// One event clipped to one date column.
struct Segment<'a> {
  event:     &'a CalendarEvent,
  start_min: i64,
  end_min:   i64,
  cropped_start: bool,
  cropped_end:   bool
}

impl Segment<'_> {
  fn length(&self) -> i64 {
    self.end_min - self.start_min
  }
}

/// Places timed events in each date
/// column by their literal start and end.
///
/// Overlapping events in a column are
/// grouped; each group is split into as
/// many sub-columns as its peak
/// concurrency.
pub fn layout_time_grid<'a, I>(
  dates: &[NaiveDate],
  events: I,
  options: &TimeGridOptions
) -> TimeGridLayout
where
  I: IntoIterator<
    Item = &'a CalendarEvent
  >
{
  let (hour_start, hour_end) =
    clamp_hours(
      options.hour_start,
      options.hour_end
    );
  let data = time_grid_data(
    dates,
    &WeekOptions {
      narrow_weekend: options
        .narrow_weekend,
      hour_start,
      hour_end,
      ..WeekOptions::default()
    }
  );

  let timed = events
    .into_iter()
    .filter(|event| {
      event.is_visible
        && !event.is_day_grid()
    })
    .collect::<Vec<_>>();

  let mut models =
    UiModelLayout::default();

  for (column, date) in
    dates.iter().enumerate()
  {
    let window_start =
      at_hour(*date, hour_start);
    let window_end =
      at_hour(*date, hour_end);

    let mut segments = timed
      .iter()
      .filter_map(|event| {
        clip(
          event,
          window_start,
          window_end
        )
      })
      .collect::<Vec<_>>();
    segments.sort_by(|a, b| {
      a.start_min
        .cmp(&b.start_min)
        .then_with(|| {
          b.length().cmp(&a.length())
        })
    });

    for (segment, sub_column, count) in
      assign_sub_columns(&segments)
    {
      let width =
        FULL_WIDTH / count as f64;
      let model = EventUiModel {
        event: segment.event.clone(),
        column_start: column,
        column_end: column,
        row: sub_column,
        left: width * sub_column as f64,
        width,
        top: percent_of_minutes(
          segment.start_min,
          hour_start,
          hour_end
        ),
        height: percent_of_minutes(
          segment.length(),
          hour_start,
          hour_end
        ),
        exceeded: false,
        continues_before: segment
          .cropped_start,
        continues_after: segment
          .cropped_end
      };
      models.push(
        model,
        std::iter::once(*date)
      );
    }
  }

  trace!(
    columns = dates.len(),
    models = models.len(),
    hour_start,
    hour_end,
    "placed time grid events"
  );

  TimeGridLayout { data, models }
}

fn at_hour(
  date: NaiveDate,
  hour: u32
) -> NaiveDateTime {
  date.and_time(NaiveTime::MIN)
    + chrono::Duration::hours(i64::from(
      hour
    ))
}

fn clip<'a>(
  event: &'a CalendarEvent,
  window_start: NaiveDateTime,
  window_end: NaiveDateTime
) -> Option<Segment<'a>> {
  let start = event.start.local();
  let end = event.end.local().max(start);

  let touches = if start == end {
    start >= window_start
      && start < window_end
  } else {
    start < window_end
      && end > window_start
  };
  if !touches {
    return None;
  }

  let clipped_start =
    start.max(window_start);
  let clipped_end = end.min(window_end);
  Some(Segment {
    event,
    start_min: (clipped_start
      - window_start)
      .num_minutes(),
    end_min: (clipped_end
      - window_start)
      .num_minutes(),
    cropped_start: start < window_start,
    cropped_end: end > window_end
  })
}

/// Greedy interval partitioning over
/// segments sorted by start. Returns
/// `(segment, sub_column, group_columns)`.
fn assign_sub_columns<'s, 'a>(
  segments: &'s [Segment<'a>]
) -> Vec<(&'s Segment<'a>, usize, usize)>
{
  let mut placed = Vec::with_capacity(
    segments.len()
  );
  let mut group_first = 0;
  let mut group_end = i64::MIN;
  let mut column_ends: Vec<i64> =
    Vec::new();

  for segment in segments {
    if segment.start_min >= group_end
      && !column_ends.is_empty()
    {
      close_group(
        &mut placed[group_first..],
        column_ends.len()
      );
      group_first = placed.len();
      column_ends.clear();
    }

    let sub_column = match column_ends
      .iter()
      .position(|end| {
        *end <= segment.start_min
      }) {
      | Some(index) => index,
      | None => {
        column_ends.push(i64::MIN);
        column_ends.len() - 1
      }
    };
    column_ends[sub_column] =
      segment.end_min;
    group_end = if placed.len()
      == group_first
    {
      segment.end_min
    } else {
      group_end.max(segment.end_min)
    };
    placed.push((segment, sub_column, 0));
  }

  close_group(
    &mut placed[group_first..],
    column_ends.len()
  );
  placed
}

fn close_group(
  group: &mut [(&Segment<'_>, usize, usize)],
  columns: usize
) {
  for entry in group {
    entry.2 = columns.max(1);
  }
}
