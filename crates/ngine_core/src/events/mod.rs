//! Window and input events
//!
//! The window pushes events into an [`EventQueue`] owned by the application
//! loop, which drains it once per tick.

use std::collections::VecDeque;

pub use glfw::Key;

/// A single window or input event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// The drawable area changed size (pixels)
    WindowResize {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
    /// The cursor moved (window coordinates)
    CursorMove {
        /// Horizontal position
        x: f64,
        /// Vertical position
        y: f64,
    },
    /// A key was pressed, repeated or released
    KeyAction {
        /// Key identifier
        key: Key,
        /// `true` for press and repeat, `false` for release
        pressed: bool,
    },
}

/// FIFO buffer of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
}

impl EventQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    /// Remove and return the oldest event
    pub fn pop(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    /// Remove every pending event in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.pending.drain(..)
    }

    /// Number of pending events
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending event
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_drain_in_arrival_order() {
        let mut queue = EventQueue::new();
        queue.push(Event::WindowResize { width: 800, height: 600 });
        queue.push(Event::KeyAction { key: Key::W, pressed: true });
        queue.push(Event::CursorMove { x: 10.0, y: 20.0 });

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(
            drained,
            vec![
                Event::WindowResize { width: 800, height: 600 },
                Event::KeyAction { key: Key::W, pressed: true },
                Event::CursorMove { x: 10.0, y: 20.0 },
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_and_clear() {
        let mut queue = EventQueue::new();
        queue.push(Event::KeyAction { key: Key::Q, pressed: false });
        queue.push(Event::KeyAction { key: Key::E, pressed: true });

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(Event::KeyAction { key: Key::Q, pressed: false }));
        queue.clear();
        assert_eq!(queue.pop(), None);
    }
}
