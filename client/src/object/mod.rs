//! # Object Registry & State Containers
//!
//! Every entity whose state is shared between participants carries an
//! [`ObjectState`]: a named collection of reactive properties with network
//! propagation. The [`Registry`] holds all tracked entities of a session,
//! keyed by identifier.
//!
//! Concrete entities compose an `ObjectState` and implement [`Entity`];
//! there is no base-class ladder. Capabilities beyond replicated state
//! (rendering, physics, picking) belong to the embedding layer.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use log::warn;
use tabletop_shared::{ObjectId, PropertyValue, StateUpdate};

use crate::property::{HookFn, HookId, Property};
use crate::session::{Session, SessionInner};

/// The minimal contract every tracked entity fulfils.
pub trait Entity {
    /// The entity's replicated state container.
    fn state(&self) -> &ObjectState;

    /// Called when the entity is removed from the registry.
    fn teardown(&self) {}
}

/// A tracked entity with no behavior beyond its replicated state.
pub struct BasicEntity {
    state: ObjectState,
}

impl BasicEntity {
    pub fn new(state: ObjectState) -> Rc<Self> {
        Rc::new(Self { state })
    }
}

impl Entity for BasicEntity {
    fn state(&self) -> &ObjectState {
        &self.state
    }
}

type ComputedFn = Rc<RefCell<dyn FnMut(&HashMap<String, PropertyValue>)>>;

/// The stateful component attached to every tracked entity.
///
/// Hooks observe individual properties; computed properties observe a set of
/// inputs and receive a full snapshot of the container once per triggering
/// setter call.
pub struct ObjectState {
    identifier: ObjectId,
    class_tag: String,
    session: Weak<SessionInner>,
    properties: RefCell<HashMap<String, Property>>,
    computed: RefCell<Vec<ComputedFn>>,
    dependents: RefCell<HashMap<String, Vec<usize>>>,
    next_hook: Cell<u64>,
}

impl ObjectState {
    /// Build a container identified by the class tag itself.
    pub fn new(
        session: &Session,
        class_tag: &str,
        initial: Vec<(&str, PropertyValue)>,
    ) -> Self {
        Self::with_token(session, class_tag, class_tag, initial)
    }

    /// Build a container whose identifier token differs from the class tag.
    /// Entities that must exist exactly once per participant fold the owning
    /// participant's id into the token, so their identifiers converge no
    /// matter the creation order.
    pub fn with_token(
        session: &Session,
        class_tag: &str,
        token: &str,
        initial: Vec<(&str, PropertyValue)>,
    ) -> Self {
        let identifier = session.inner.allocator.borrow_mut().next(token);
        let properties = initial
            .into_iter()
            .map(|(name, value)| (name.to_string(), Property::new(value)))
            .collect();
        Self {
            identifier,
            class_tag: class_tag.to_string(),
            session: Rc::downgrade(&session.inner),
            properties: RefCell::new(properties),
            computed: RefCell::new(Vec::new()),
            dependents: RefCell::new(HashMap::new()),
            next_hook: Cell::new(0),
        }
    }

    pub fn identifier(&self) -> &ObjectId {
        &self.identifier
    }

    pub fn class_tag(&self) -> &str {
        &self.class_tag
    }

    /// Get the current value of a property.
    pub fn get(&self, property: &str) -> Option<PropertyValue> {
        self.properties
            .borrow()
            .get(property)
            .map(|p| p.value.clone())
    }

    /// A snapshot of every property's current value.
    pub fn full_state(&self) -> HashMap<String, PropertyValue> {
        self.properties
            .borrow()
            .iter()
            .map(|(name, property)| (name.clone(), property.value.clone()))
            .collect()
    }

    /// The property names this container carries.
    pub fn property_names(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    /// Update a stateful value. Hooks run synchronously with the new value;
    /// dependent computed properties run once; if `propagate` is set and the
    /// session is broadcasting, a state update goes out to the relay.
    pub fn set(&self, property: &str, value: PropertyValue, propagate: bool) {
        self.apply(property, value, propagate);
    }

    /// The inbound-network path: apply a setter without echoing the change
    /// back to the relay.
    pub fn update_state(&self, property: &str, value: PropertyValue) {
        self.apply(property, value, false);
    }

    fn apply(&self, property: &str, value: PropertyValue, propagate: bool) {
        let session = self.session.upgrade();

        if let Some(inner) = &session {
            let mut updating = inner.updating.borrow_mut();
            if let Some((other_id, other_prop)) = updating.as_ref() {
                warn!(
                    "{} ran a state update on '{}' while {} was updating '{}'; \
                     consider a computed property",
                    self.identifier, property, other_id, other_prop
                );
            }
            *updating = Some((self.identifier.clone(), property.to_string()));
        }

        // Hooks observe the new value before it is stored.
        let hooks: Vec<HookFn> = {
            let mut properties = self.properties.borrow_mut();
            let entry = properties.entry(property.to_string()).or_insert_with(|| {
                warn!("{} has no property '{}'; creating it", self.identifier, property);
                Property::new(PropertyValue::Null)
            });
            entry.hooks.iter().map(|(_, hook)| hook.clone()).collect()
        };
        for hook in &hooks {
            (hook.borrow_mut())(&value);
        }

        if propagate {
            if let Some(inner) = &session {
                inner.send_state_update(StateUpdate {
                    identifier: self.identifier.clone(),
                    property: property.to_string(),
                    value: value.clone(),
                });
            }
        }

        if let Some(entry) = self.properties.borrow_mut().get_mut(property) {
            entry.value = value;
        }

        self.compute(property);

        if let Some(inner) = &session {
            let mut updating = inner.updating.borrow_mut();
            let ours = updating
                .as_ref()
                .map(|(id, prop)| id == &self.identifier && prop == property)
                .unwrap_or(false);
            if ours {
                *updating = None;
            }
        }
    }

    /// Add an update callback to a property's hook set.
    pub fn add_hook(
        &self,
        property: &str,
        hook: impl FnMut(&PropertyValue) + 'static,
    ) -> HookId {
        let id = HookId(self.next_hook.get());
        self.next_hook.set(id.0 + 1);

        let mut properties = self.properties.borrow_mut();
        let entry = properties.entry(property.to_string()).or_insert_with(|| {
            warn!("{} has no property '{}'; creating it", self.identifier, property);
            Property::new(PropertyValue::Null)
        });
        entry.hooks.push((id, Rc::new(RefCell::new(hook))));
        id
    }

    /// Remove an update callback from a property's hook set.
    pub fn remove_hook(&self, property: &str, id: HookId) {
        if let Some(entry) = self.properties.borrow_mut().get_mut(property) {
            entry.hooks.retain(|(hook_id, _)| *hook_id != id);
        }
    }

    /// Register a function computed from a list of stateful inputs. It runs
    /// with a full snapshot whenever any input changes: once per triggering
    /// setter call, not once per listed input. The function must not set its
    /// own inputs; doing so is logged and proceeds anyway.
    pub fn add_computed(
        &self,
        inputs: &[&str],
        function: impl FnMut(&HashMap<String, PropertyValue>) + 'static,
    ) {
        let index = {
            let mut computed = self.computed.borrow_mut();
            computed.push(Rc::new(RefCell::new(function)));
            computed.len() - 1
        };

        // Deduplicate inputs so one setter call runs the function once.
        let mut seen = HashSet::new();
        let mut dependents = self.dependents.borrow_mut();
        for input in inputs {
            if !seen.insert(*input) {
                continue;
            }
            dependents
                .entry((*input).to_string())
                .or_default()
                .push(index);
        }
    }

    fn compute(&self, property: &str) {
        let functions: Vec<ComputedFn> = {
            let dependents = self.dependents.borrow();
            let Some(indices) = dependents.get(property) else {
                return;
            };
            let computed = self.computed.borrow();
            indices
                .iter()
                .filter_map(|&index| computed.get(index).cloned())
                .collect()
        };
        if functions.is_empty() {
            return;
        }

        let snapshot = self.full_state();
        for function in &functions {
            (function.borrow_mut())(&snapshot);
        }
    }
}

/// Holds every tracked entity of the session, keyed by identifier.
#[derive(Default)]
pub struct Registry {
    entities: HashMap<ObjectId, Rc<dyn Entity>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the state machinery under its own identifier.
    pub fn insert(&mut self, entity: Rc<dyn Entity>) {
        let identifier = entity.state().identifier().clone();
        self.entities.insert(identifier, entity);
    }

    pub fn get(&self, identifier: &str) -> Option<Rc<dyn Entity>> {
        self.entities.get(identifier).cloned()
    }

    pub fn remove(&mut self, identifier: &str) -> Option<Rc<dyn Entity>> {
        self.entities.remove(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entities.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Rc<dyn Entity>)> {
        self.entities.iter()
    }

    /// Remove every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
