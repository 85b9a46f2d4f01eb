use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::datetime::date_key;
use crate::event::CalendarEvent;

/// A render-ready event.
///
/// In the day grid `row` is the display
/// row, `top == row` and `height == 1`
/// (slot units), and `left`/`width` are
/// percent of the whole row. In the time
/// grid `row` is the sub-column inside a
/// collision group, `top`/`height` are
/// percent of the visible hours and
/// `left`/`width` are percent of the date
/// column.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct EventUiModel {
  pub event:            CalendarEvent,
  pub column_start:     usize,
  pub column_end:       usize,
  pub row:              usize,
  pub left:             f64,
  pub width:            f64,
  pub top:              f64,
  pub height:           f64,
  /// Hidden behind a "+N more" marker.
  pub exceeded:         bool,
  pub continues_before: bool,
  pub continues_after:  bool
}

impl EventUiModel {
  pub fn covers_column(
    &self,
    column: usize
  ) -> bool {
    (self.column_start..=self.column_end)
      .contains(&column)
  }
}

/// UI models plus the date-key index of
/// the models touching each date.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Serialize,
)]
pub struct UiModelLayout {
  pub ui_models: Vec<EventUiModel>,
  pub by_date:   BTreeMap<String, Vec<usize>>
}

impl UiModelLayout {
  pub fn is_empty(&self) -> bool {
    self.ui_models.is_empty()
  }

  pub fn len(&self) -> usize {
    self.ui_models.len()
  }

  pub fn models_on(
    &self,
    date: NaiveDate
  ) -> impl Iterator<Item = &EventUiModel>
  {
    self
      .by_date
      .get(&date_key(date))
      .into_iter()
      .flatten()
      .filter_map(|index| {
        self.ui_models.get(*index)
      })
  }

  pub fn find(
    &self,
    event_id: &str,
    calendar_id: &str
  ) -> Option<&EventUiModel> {
    self.ui_models.iter().find(|model| {
      model.event.id == event_id
        && model.event.calendar_id
          == calendar_id
    })
  }

  pub(crate) fn push<I>(
    &mut self,
    model: EventUiModel,
    dates: I
  ) where
    I: IntoIterator<Item = NaiveDate>
  {
    let index = self.ui_models.len();
    self.ui_models.push(model);
    for date in dates {
      self
        .by_date
        .entry(date_key(date))
        .or_default()
        .push(index);
    }
  }
}
