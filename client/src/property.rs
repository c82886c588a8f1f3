//! # Reactive Properties
//!
//! A property is a value plus the hooks that observe it. The value changes
//! only through its container's setter, which runs every hook synchronously
//! with the new value before returning; see [`crate::object::ObjectState`].

use std::cell::RefCell;
use std::rc::Rc;

use tabletop_shared::PropertyValue;

/// Handle returned by `add_hook`, used to remove the hook again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(pub(crate) u64);

pub(crate) type HookFn = Rc<RefCell<dyn FnMut(&PropertyValue)>>;

/// A single replicated property: its current value and its update hooks.
pub(crate) struct Property {
    pub(crate) value: PropertyValue,
    pub(crate) hooks: Vec<(HookId, HookFn)>,
}

impl Property {
    pub(crate) fn new(value: PropertyValue) -> Self {
        Self {
            value,
            hooks: Vec::new(),
        }
    }
}
