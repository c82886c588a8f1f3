//! # Class Registry
//!
//! Maps class tags to factory functions and to named authoritative actions.
//! Creation messages carry a tag; realizing one into a live entity is an
//! explicit table lookup, populated at startup, never name resolution
//! against a live namespace.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use serde_json::Value;

use crate::error::EngineError;
use crate::object::Entity;
use crate::session::Session;

/// Realizes a creation record into a live entity from its positional
/// constructor parameters.
pub type Factory = Rc<dyn Fn(&Session, &[Value]) -> Result<Rc<dyn Entity>, EngineError>>;

/// A named function constrained to execute on the host, invoked on a tracked
/// entity with one parameter.
pub type ActionFn = Rc<dyn Fn(&Session, &Rc<dyn Entity>, &Value)>;

/// Registry of entity classes known to this participant.
#[derive(Default)]
pub struct ClassRegistry {
    factories: HashMap<String, Factory>,
    actions: HashMap<String, HashMap<String, ActionFn>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class with the system.
    pub fn register(
        &mut self,
        tag: &str,
        factory: impl Fn(&Session, &[Value]) -> Result<Rc<dyn Entity>, EngineError> + 'static,
    ) {
        if self.factories.contains_key(tag) {
            warn!("replacing existing factory for class '{}'", tag);
        }
        self.factories.insert(tag.to_string(), Rc::new(factory));
        debug!("registered class '{}'", tag);
    }

    /// Register an authoritative action under a class tag. Registration
    /// order relative to the class factory does not matter.
    pub fn register_action(
        &mut self,
        tag: &str,
        name: &str,
        action: impl Fn(&Session, &Rc<dyn Entity>, &Value) + 'static,
    ) {
        let class_actions = self.actions.entry(tag.to_string()).or_default();
        if class_actions.contains_key(name) {
            warn!("replacing existing action '{}' for class '{}'", name, tag);
        }
        class_actions.insert(name.to_string(), Rc::new(action));
        debug!("registered action '{}' for class '{}'", name, tag);
    }

    pub fn factory(&self, tag: &str) -> Option<Factory> {
        self.factories.get(tag).cloned()
    }

    pub fn action(&self, tag: &str, name: &str) -> Option<ActionFn> {
        self.actions
            .get(tag)
            .and_then(|class_actions| class_actions.get(name))
            .cloned()
    }

    pub fn has_class(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }
}
