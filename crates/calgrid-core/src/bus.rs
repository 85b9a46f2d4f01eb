//! Synchronous publish/subscribe for calendar notifications.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, trace};

use crate::datetime::CalendarDate;
use crate::event::{CalendarEvent, EventChanges};
use crate::options::ViewKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NotificationKind {
    SelectDateTime,
    BeforeCreateEvent,
    BeforeUpdateEvent,
    BeforeDeleteEvent,
    AfterRenderEvent,
    ClickMoreEventsBtn,
    ViewChanged,
    DateChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Notification {
    /// A cell range was picked by click or drag.
    SelectDateTime {
        start: CalendarDate,
        end: CalendarDate,
        is_all_day: bool,
    },
    BeforeCreateEvent {
        event: CalendarEvent,
    },
    BeforeUpdateEvent {
        event: CalendarEvent,
        changes: EventChanges,
    },
    BeforeDeleteEvent {
        event: CalendarEvent,
    },
    AfterRenderEvent {
        event: CalendarEvent,
    },
    ClickMoreEventsBtn {
        date: NaiveDate,
        hidden: usize,
    },
    ViewChanged {
        from: ViewKind,
        to: ViewKind,
    },
    DateChanged {
        date: NaiveDate,
        range_start: NaiveDate,
        range_end: NaiveDate,
    },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::SelectDateTime { .. } => NotificationKind::SelectDateTime,
            Self::BeforeCreateEvent { .. } => NotificationKind::BeforeCreateEvent,
            Self::BeforeUpdateEvent { .. } => NotificationKind::BeforeUpdateEvent,
            Self::BeforeDeleteEvent { .. } => NotificationKind::BeforeDeleteEvent,
            Self::AfterRenderEvent { .. } => NotificationKind::AfterRenderEvent,
            Self::ClickMoreEventsBtn { .. } => NotificationKind::ClickMoreEventsBtn,
            Self::ViewChanged { .. } => NotificationKind::ViewChanged,
            Self::DateChanged { .. } => NotificationKind::DateChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&Notification)>;

struct Registration {
    id: HandlerId,
    kind: NotificationKind,
    once: bool,
    handler: Handler,
}

/// Handlers run in registration order on the caller's thread.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.registrations.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: NotificationKind, handler: F) -> HandlerId
    where
        F: FnMut(&Notification) + 'static,
    {
        self.register(kind, false, Box::new(handler))
    }

    /// Like [`Self::on`], but the handler is dropped after its first call.
    pub fn once<F>(&mut self, kind: NotificationKind, handler: F) -> HandlerId
    where
        F: FnMut(&Notification) + 'static,
    {
        self.register(kind, true, Box::new(handler))
    }

    pub fn off(&mut self, id: HandlerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|registration| registration.id != id);
        before != self.registrations.len()
    }

    /// Removes every handler for `kind`; returns how many were dropped.
    pub fn off_kind(&mut self, kind: NotificationKind) -> usize {
        let before = self.registrations.len();
        self.registrations
            .retain(|registration| registration.kind != kind);
        before - self.registrations.len()
    }

    pub fn handler_count(&self, kind: NotificationKind) -> usize {
        self.registrations
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    /// Calls every handler for the notification's kind and returns how
    /// many ran.
    pub fn fire(&mut self, notification: &Notification) -> usize {
        let kind = notification.kind();
        let mut delivered = 0;
        for registration in &mut self.registrations {
            if registration.kind == kind {
                (registration.handler)(notification);
                delivered += 1;
            }
        }

        self.registrations
            .retain(|registration| !(registration.once && registration.kind == kind));

        trace!(?kind, delivered, "fired notification");
        delivered
    }

    fn register(&mut self, kind: NotificationKind, once: bool, handler: Handler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        debug!(?kind, once, id = id.0, "registered handler");
        self.registrations.push(Registration {
            id,
            kind,
            once,
            handler,
        });
        id
    }
}
