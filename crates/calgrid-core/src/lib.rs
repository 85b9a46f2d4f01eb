pub mod bus;
pub mod columns;
pub mod control;
pub mod datetime;
pub mod drag;
pub mod event;
pub mod grid_position;
pub mod layout;
pub mod matrix;
pub mod options;
pub mod store;
pub mod telemetry;
pub mod time_rows;

pub use bus::{
  EventBus,
  Notification,
  NotificationKind
};
pub use control::{
  Calendar,
  CalendarInfo,
  DragSurface,
  RenderedView,
  ViewState
};
pub use datetime::CalendarDate;
pub use drag::{
  DragController,
  DragKind,
  DragOutcome,
  ResizeEdge
};
pub use event::{
  CalendarEvent,
  EventCategory,
  EventChanges
};
pub use grid_position::{
  GridPosition,
  GridPositionFinder,
  Rect
};
pub use options::{
  CalendarOptions,
  ViewKind
};
pub use store::{
  EventCollection,
  EventKey
};
