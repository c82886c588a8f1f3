//! # Typed Event Channels
//!
//! A publish/subscribe channel per event, with guard functions composed
//! ahead of dispatch: if any guard rejects the value, no subscriber runs for
//! that emission.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`EventChannel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(usize);

type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;
type GuardFn<T> = Rc<dyn Fn(&T) -> bool>;

/// A single-threaded event channel carrying values of type `T`.
pub struct EventChannel<T> {
    next_id: Cell<usize>,
    handlers: RefCell<Vec<(usize, Handler<T>)>>,
    guards: RefCell<Vec<GuardFn<T>>>,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            handlers: RefCell::new(Vec::new()),
            guards: RefCell::new(Vec::new()),
        }
    }

    /// Add a subscriber. Subscribers run in registration order.
    pub fn subscribe(&self, handler: impl FnMut(&T) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(handler))));
        Subscription(id)
    }

    /// Remove a previously added subscriber.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.handlers
            .borrow_mut()
            .retain(|(id, _)| *id != subscription.0);
    }

    /// Add a precondition. Every guard must pass for an emission to reach
    /// the subscribers.
    pub fn add_guard(&self, guard: impl Fn(&T) -> bool + 'static) {
        self.guards.borrow_mut().push(Rc::new(guard));
    }

    /// Emit a value. Returns whether the subscribers ran.
    pub fn emit(&self, value: &T) -> bool {
        let guards: Vec<GuardFn<T>> = self.guards.borrow().clone();
        if guards.iter().any(|guard| !guard(value)) {
            return false;
        }

        // Clone the handler list first; a subscriber may itself subscribe or
        // unsubscribe while running.
        let handlers: Vec<Handler<T>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in &handlers {
            (handler.borrow_mut())(value);
        }
        true
    }
}
