//! Pixel to grid-cell inversion for
//! pointer events.

use serde::{
  Deserialize,
  Serialize
};

use crate::columns::{
  FULL_WIDTH,
  GridColumn,
  column_edges
};

/// A bounding box in client pixels.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct Rect {
  pub x:      f64,
  pub y:      f64,
  pub width:  f64,
  pub height: f64
}

impl Rect {
  pub fn new(
    x: f64,
    y: f64,
    width: f64,
    height: f64
  ) -> Self {
    Self {
      x,
      y,
      width,
      height
    }
  }

  pub fn right(&self) -> f64 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f64 {
    self.y + self.height
  }

  /// Edges are inclusive.
  pub fn contains(
    &self,
    x: f64,
    y: f64
  ) -> bool {
    x >= self.x
      && x <= self.right()
      && y >= self.y
      && y <= self.bottom()
  }

  pub fn clamp_point(
    &self,
    x: f64,
    y: f64
  ) -> (f64, f64) {
    (
      x.clamp(self.x, self.right()),
      y.clamp(self.y, self.bottom())
    )
  }

  #[must_use]
  pub fn translate(
    &self,
    dx: f64,
    dy: f64
  ) -> Self {
    Self {
      x: self.x + dx,
      y: self.y + dy,
      ..*self
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct GridPosition {
  pub column_index: usize,
  pub row_index:    usize
}

impl GridPosition {
  pub fn new(
    column_index: usize,
    row_index: usize
  ) -> Self {
    Self {
      column_index,
      row_index
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridPositionFinder {
  container:     Option<Rect>,
  columns_count: usize,
  rows_count:    usize,
  /// Cumulative right edges in percent,
  /// for rows with uneven columns.
  column_edges:  Option<Vec<f64>>
}

impl GridPositionFinder {
  pub fn new(
    container: Option<Rect>,
    columns_count: usize,
    rows_count: usize
  ) -> Self {
    Self {
      container,
      columns_count,
      rows_count,
      column_edges: None
    }
  }

  /// Uses per-column widths (percent)
  /// instead of equal columns, e.g. for
  /// narrow weekends.
  #[must_use]
  pub fn with_column_widths(
    mut self,
    widths: &[f64]
  ) -> Self {
    let total: f64 = widths.iter().sum();
    if widths.len() != self.columns_count
      || total <= 0.0
    {
      tracing::warn!(
        widths = widths.len(),
        columns = self.columns_count,
        "column widths ignored; using equal columns"
      );
      return self;
    }

    let mut running = 0.0;
    self.column_edges = Some(
      widths
        .iter()
        .map(|width| {
          running +=
            width / total * FULL_WIDTH;
          running
        })
        .collect()
    );
    self
  }

  /// Same as [`Self::with_column_widths`]
  /// for columns already laid out.
  #[must_use]
  pub fn with_grid_columns(
    mut self,
    columns: &[GridColumn]
  ) -> Self {
    if columns.len() != self.columns_count
    {
      tracing::warn!(
        given = columns.len(),
        columns = self.columns_count,
        "grid columns ignored; using equal columns"
      );
      return self;
    }
    self.column_edges =
      Some(column_edges(columns));
    self
  }

  pub fn container(&self) -> Option<Rect> {
    self.container
  }

  pub fn columns_count(&self) -> usize {
    self.columns_count
  }

  pub fn rows_count(&self) -> usize {
    self.rows_count
  }

  /// `None` when there is no container or
  /// the point lies outside it.
  pub fn find(
    &self,
    x: f64,
    y: f64
  ) -> Option<GridPosition> {
    let container = self.container?;
    if !container.contains(x, y) {
      return None;
    }
    self.locate(container, x, y)
  }

  /// Like [`Self::find`] but pulls an
  /// outside point onto the nearest edge.
  pub fn find_clamped(
    &self,
    x: f64,
    y: f64
  ) -> Option<GridPosition> {
    let container = self.container?;
    let (x, y) =
      container.clamp_point(x, y);
    self.locate(container, x, y)
  }

  /// Pixel box of one cell, for equal
  /// columns.
  pub fn cell_size(
    &self
  ) -> Option<(f64, f64)> {
    let container = self.container?;
    if self.columns_count == 0
      || self.rows_count == 0
    {
      return None;
    }
    Some((
      container.width
        / self.columns_count as f64,
      container.height
        / self.rows_count as f64
    ))
  }

  /// Pixel x of a column's left edge,
  /// honouring uneven columns.
  pub fn column_left(
    &self,
    column_index: usize
  ) -> Option<f64> {
    let container = self.container?;
    if column_index >= self.columns_count {
      return None;
    }
    let percent = match &self.column_edges
    {
      | Some(edges) if column_index > 0 => {
        *edges.get(column_index - 1)?
      }
      | Some(_) => 0.0,
      | None => {
        column_index as f64
          / self.columns_count as f64
          * FULL_WIDTH
      }
    };
    Some(
      container.x
        + percent / FULL_WIDTH
          * container.width
    )
  }

  fn locate(
    &self,
    container: Rect,
    x: f64,
    y: f64
  ) -> Option<GridPosition> {
    if self.columns_count == 0
      || self.rows_count == 0
      || container.width <= 0.0
      || container.height <= 0.0
    {
      return None;
    }

    let column_index =
      match &self.column_edges {
        | Some(edges) => {
          let percent = (x - container.x)
            / container.width
            * FULL_WIDTH;
          edges
            .iter()
            .position(|edge| percent < *edge)
            .unwrap_or(
              self.columns_count - 1
            )
        }
        | None => {
          cell_index(
            x - container.x,
            container.width,
            self.columns_count
          )
        }
      };
    let row_index = cell_index(
      y - container.y,
      container.height,
      self.rows_count
    );

    Some(GridPosition {
      column_index,
      row_index
    })
  }
}

fn cell_index(
  offset: f64,
  extent: f64,
  count: usize
) -> usize {
  let size = extent / count as f64;
  let raw = (offset / size).floor();
  if raw <= 0.0 {
    0
  } else {
    (raw as usize).min(count - 1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn week_grid() -> GridPositionFinder {
    GridPositionFinder::new(
      Some(Rect::new(0.0, 0.0, 700.0, 960.0)),
      7,
      48
    )
  }

  #[test]
  fn maps_pointer_into_cells() {
    let finder = week_grid();
    assert_eq!(
      finder.find(250.0, 130.0),
      Some(GridPosition::new(2, 6))
    );
    assert_eq!(
      finder.find(0.0, 0.0),
      Some(GridPosition::new(0, 0))
    );
  }

  #[test]
  fn bottom_right_corner_is_last_cell() {
    assert_eq!(
      week_grid().find(700.0, 960.0),
      Some(GridPosition::new(6, 47))
    );
  }

  #[test]
  fn outside_points_are_none() {
    let finder = week_grid();
    assert_eq!(finder.find(701.0, 10.0), None);
    assert_eq!(finder.find(10.0, 961.0), None);
    assert_eq!(finder.find(-1.0, 10.0), None);
    assert_eq!(finder.find(10.0, -1.0), None);
  }

  #[test]
  fn missing_container_never_finds() {
    let finder =
      GridPositionFinder::new(None, 7, 6);
    assert_eq!(finder.find(1.0, 1.0), None);
    assert_eq!(
      finder.find_clamped(1.0, 1.0),
      None
    );
  }

  #[test]
  fn offset_container_and_clamping() {
    let finder = GridPositionFinder::new(
      Some(Rect::new(100.0, 50.0, 700.0, 600.0)),
      7,
      6
    );
    assert_eq!(
      finder.find(150.0, 60.0),
      Some(GridPosition::new(0, 0))
    );
    assert_eq!(
      finder.find_clamped(2000.0, -500.0),
      Some(GridPosition::new(6, 0))
    );
  }

  #[test]
  fn uneven_columns_follow_widths() {
    // Narrow weekend: Sun and Sat are half
    // as wide as weekdays.
    let unit = 100.0 / 6.0;
    let widths = [
      unit / 2.0,
      unit,
      unit,
      unit,
      unit,
      unit,
      unit / 2.0
    ];
    let finder = GridPositionFinder::new(
      Some(Rect::new(0.0, 0.0, 600.0, 100.0)),
      7,
      1
    )
    .with_column_widths(&widths);

    assert_eq!(
      finder.find(40.0, 10.0),
      Some(GridPosition::new(0, 0))
    );
    assert_eq!(
      finder.find(60.0, 10.0),
      Some(GridPosition::new(1, 0))
    );
    assert_eq!(
      finder.find(560.0, 10.0),
      Some(GridPosition::new(6, 0))
    );
    assert_eq!(
      finder.find(600.0, 10.0),
      Some(GridPosition::new(6, 0))
    );

    let left = |index| {
      finder
        .column_left(index)
        .expect("column exists")
    };
    assert_eq!(left(0), 0.0);
    assert!((left(1) - 50.0).abs() < 1e-9);
    assert!((left(6) - 550.0).abs() < 1e-9);
    assert_eq!(finder.column_left(7), None);
    let equal = week_grid()
      .column_left(2)
      .expect("column exists");
    assert!((equal - 200.0).abs() < 1e-9);
  }

  #[test]
  fn laid_out_columns_match_widths() {
    let dates = crate::matrix::range_dates(
      chrono::NaiveDate::from_ymd_opt(
        2021, 11, 28
      )
      .expect("valid date"),
      chrono::NaiveDate::from_ymd_opt(
        2021, 12, 4
      )
      .expect("valid date")
    );
    let columns = crate::columns::grid_columns(
      &dates, true, FULL_WIDTH
    );
    let finder = GridPositionFinder::new(
      Some(Rect::new(0.0, 0.0, 600.0, 100.0)),
      7,
      1
    )
    .with_grid_columns(&columns);

    assert_eq!(
      finder.find(40.0, 10.0),
      Some(GridPosition::new(0, 0))
    );
    assert_eq!(
      finder.find(560.0, 10.0),
      Some(GridPosition::new(6, 0))
    );
    assert_eq!(
      GridPositionFinder::new(None, 7, 1)
        .with_grid_columns(&columns[..3])
        .columns_count(),
      7
    );
  }
}
