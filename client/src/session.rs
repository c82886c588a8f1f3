//! # Session Services
//!
//! One [`Session`] per participant process bundles the services a room
//! needs: identifier allocation, the loading manager, the object registry,
//! the class registry, the replication log, the transport gateway, and the
//! authority flags. Services are constructed once and shared by reference;
//! collaborators hold the session handle, never ambient globals.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};
use serde_json::Value;
use tabletop_shared::{ConnectionState, Creation, Destruction, ObjectId, ParticipantInfo};

use crate::class::ClassRegistry;
use crate::error::EngineError;
use crate::event::{EventChannel, Subscription};
use crate::handshake::ReplicationLog;
use crate::id::IdAllocator;
use crate::loading::LoadingManager;
use crate::net::{Gateway, StateMode, Transport};
use crate::object::{Entity, Registry};

pub(crate) struct SessionInner {
    pub(crate) participant: ParticipantInfo,
    pub(crate) allocator: RefCell<IdAllocator>,
    pub(crate) loading: RefCell<LoadingManager>,
    pub(crate) ready_events: EventChannel<()>,
    pub(crate) roster: RefCell<Vec<ParticipantInfo>>,
    pub(crate) roster_events: EventChannel<Vec<ParticipantInfo>>,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) log: RefCell<ReplicationLog>,
    pub(crate) classes: RefCell<ClassRegistry>,
    pub(crate) gateway: RefCell<Gateway>,
    pub(crate) mode: Cell<StateMode>,
    pub(crate) is_host: Cell<bool>,
    pub(crate) is_authoritative: Cell<bool>,
    pub(crate) updating: RefCell<Option<(ObjectId, String)>>,
    pub(crate) scene_loader: RefCell<Option<Box<dyn Fn(&Session)>>>,
}

/// Handle to one participant's replication engine. Cloning is cheap and
/// every clone refers to the same process-wide services.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Rc<SessionInner>,
}

impl Session {
    /// Wire up the services for one participant. Fails if the transport
    /// cannot guarantee ordered, reliable delivery.
    ///
    /// A fresh session starts in [`StateMode::Local`] so scene setup does
    /// not broadcast; switch to [`StateMode::Global`] once the scene stands.
    pub fn new(
        participant: ParticipantInfo,
        transport: Box<dyn Transport>,
    ) -> Result<Self, EngineError> {
        let gateway = Gateway::new(transport)?;
        let session = Session {
            inner: Rc::new(SessionInner {
                participant,
                allocator: RefCell::new(IdAllocator::new()),
                loading: RefCell::new(LoadingManager::new()),
                ready_events: EventChannel::new(),
                roster: RefCell::new(Vec::new()),
                roster_events: EventChannel::new(),
                registry: RefCell::new(Registry::new()),
                log: RefCell::new(ReplicationLog::new()),
                classes: RefCell::new(ClassRegistry::new()),
                gateway: RefCell::new(gateway),
                mode: Cell::new(StateMode::Local),
                is_host: Cell::new(false),
                is_authoritative: Cell::new(false),
                updating: RefCell::new(None),
                scene_loader: RefCell::new(None),
            }),
        };

        // Becoming ready drains whatever queued up behind the loads.
        let weak = Rc::downgrade(&session.inner);
        session.inner.ready_events.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                Session { inner }.apply_queued_operations();
            }
        });

        Ok(session)
    }

    pub fn participant(&self) -> ParticipantInfo {
        self.inner.participant.clone()
    }

    pub fn mode(&self) -> StateMode {
        self.inner.mode.get()
    }

    pub fn set_mode(&self, mode: StateMode) {
        self.inner.mode.set(mode);
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.gateway.borrow().state
    }

    /// Register a class with the system.
    pub fn register_class(
        &self,
        tag: &str,
        factory: impl Fn(&Session, &[Value]) -> Result<Rc<dyn Entity>, EngineError> + 'static,
    ) {
        self.inner.classes.borrow_mut().register(tag, factory);
    }

    /// Register an authoritative action for a class.
    pub fn register_action(
        &self,
        tag: &str,
        name: &str,
        action: impl Fn(&Session, &Rc<dyn Entity>, &Value) + 'static,
    ) {
        self.inner
            .classes
            .borrow_mut()
            .register_action(tag, name, action);
    }

    /// Install the local scene-construction callback a fast-forward runs
    /// before replaying the room's backlog. Tracked entities are rebuilt
    /// from the backlog itself; the callback is for everything else the
    /// scene needs (surfaces, lighting, asset loads).
    pub fn set_scene_loader(&self, loader: impl Fn(&Session) + 'static) {
        *self.inner.scene_loader.borrow_mut() = Some(Box::new(loader));
    }

    // --- loading ---------------------------------------------------------

    /// Whether every requested resource has finished loading.
    pub fn ready(&self) -> bool {
        self.inner.loading.borrow().ready()
    }

    /// Begin tracking a slow asynchronous load.
    pub fn add_resource(&self, key: &str) {
        self.inner.loading.borrow_mut().add_resource(key);
    }

    /// Record a finished load; crossing to zero outstanding loads flushes
    /// the queued operations and notifies `on_ready` subscribers.
    pub fn done_resource(&self, key: &str) {
        let crossed = self.inner.loading.borrow_mut().done_resource(key);
        if crossed {
            self.inner.ready_events.emit(&());
        }
    }

    /// Subscribe to the became-ready transition. Fires once per zero
    /// crossing of the outstanding-load count.
    pub fn on_ready(&self, mut handler: impl FnMut() + 'static) -> Subscription {
        self.inner.ready_events.subscribe(move |_| handler())
    }

    // --- participants ----------------------------------------------------

    /// The most recent participant roster the relay delivered.
    pub fn roster(&self) -> Vec<ParticipantInfo> {
        self.inner.roster.borrow().clone()
    }

    /// Subscribe to roster changes.
    pub fn on_roster(
        &self,
        mut handler: impl FnMut(&[ParticipantInfo]) + 'static,
    ) -> Subscription {
        self.inner.roster_events.subscribe(move |roster| handler(roster))
    }

    pub(crate) fn receive_roster(&self, roster: Vec<ParticipantInfo>) {
        *self.inner.roster.borrow_mut() = roster.clone();
        self.inner.roster_events.emit(&roster);
    }

    // --- objects ---------------------------------------------------------

    /// Look up a tracked entity by identifier.
    pub fn get_object(&self, identifier: &str) -> Option<Rc<dyn Entity>> {
        self.inner.registry.borrow().get(identifier)
    }

    /// Number of live tracked entities.
    pub fn object_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Construct a tracked entity through its class factory and add it to
    /// the state machinery. Nothing is broadcast: pair with
    /// [`Session::create_replicated`] for dynamic construction other
    /// participants should see.
    pub fn create(&self, tag: &str, params: Vec<Value>) -> Result<Rc<dyn Entity>, EngineError> {
        let factory = self
            .inner
            .classes
            .borrow()
            .factory(tag)
            .ok_or_else(|| EngineError::UnknownClass(tag.to_string()))?;

        let entity = factory(self, &params)?;
        let identifier = entity.state().identifier().clone();
        debug!("created {} ({})", identifier, tag);

        self.inner.registry.borrow_mut().insert(entity.clone());
        self.inner.log.borrow_mut().record_creation(Creation {
            identifier,
            class_name: tag.to_string(),
            params,
        });
        Ok(entity)
    }

    /// Authoritative construction helper: build locally and replicate the
    /// creation. Only call this inside an authoritatively executed function.
    pub fn create_replicated(
        &self,
        tag: &str,
        params: Vec<Value>,
    ) -> Result<Rc<dyn Entity>, EngineError> {
        let entity = self.create(tag, params.clone())?;
        self.inner.send_creation(Creation {
            identifier: entity.state().identifier().clone(),
            class_name: tag.to_string(),
            params,
        });
        Ok(entity)
    }

    /// Remove an entity from the registry and tear it down. Local only;
    /// authoritative destruction goes through
    /// [`Session::request_destroy`]. Returns whether the entity existed.
    pub fn destroy(&self, identifier: &str) -> bool {
        let removed = self.inner.registry.borrow_mut().remove(identifier);
        match removed {
            Some(entity) => {
                entity.teardown();
                self.inner.log.borrow_mut().record_destruction(Destruction {
                    identifier: identifier.to_string(),
                });
                true
            }
            None => {
                warn!("destroy for unknown identifier '{}'", identifier);
                false
            }
        }
    }

    /// Remove every tracked entity and reset identifier allocation; scene
    /// teardown. Pending queued operations survive; they belong to the
    /// room, not to the scene.
    pub fn clear(&self) {
        self.inner.registry.borrow_mut().clear();
        self.inner.log.borrow_mut().clear();
        self.inner.allocator.borrow_mut().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tabletop_shared::{PropertyValue, ReplicationMessage};

    use crate::net::testing::recording_session;
    use crate::net::StateMode;
    use crate::object::{BasicEntity, ObjectState};

    fn register_marker(session: &Session) {
        session.register_class("Marker", |session, params| {
            let owner = params
                .first()
                .and_then(|p| p.as_str())
                .ok_or_else(|| EngineError::BadParams {
                    class: "Marker".to_string(),
                    reason: "missing owner".to_string(),
                })?
                .to_string();
            let token = format!("Marker_{}", owner);
            let entity: Rc<dyn Entity> = BasicEntity::new(ObjectState::with_token(
                session,
                "Marker",
                &token,
                vec![("owner", PropertyValue::Str(owner))],
            ));
            Ok(entity)
        });
    }

    #[test]
    fn unknown_class_is_an_error() {
        let (session, _outbox) = recording_session();
        let result = session.create("Deck", vec![]);
        assert!(matches!(result, Err(EngineError::UnknownClass(tag)) if tag == "Deck"));
    }

    #[test]
    fn bad_params_surface_from_the_factory() {
        let (session, _outbox) = recording_session();
        register_marker(&session);
        let result = session.create("Marker", vec![]);
        assert!(matches!(result, Err(EngineError::BadParams { .. })));
    }

    #[test]
    fn participant_token_overrides_converge_independent_of_order() {
        let (a, _) = recording_session();
        let (b, _) = recording_session();
        register_marker(&a);
        register_marker(&b);

        // Opposite creation orders, same identifiers.
        let a_first = a.create("Marker", vec![json!("carol")]).unwrap();
        let a_second = a.create("Marker", vec![json!("dave")]).unwrap();
        let b_first = b.create("Marker", vec![json!("dave")]).unwrap();
        let b_second = b.create("Marker", vec![json!("carol")]).unwrap();

        assert_eq!(a_first.state().identifier(), "Marker_carol_0");
        assert_eq!(a_second.state().identifier(), "Marker_dave_0");
        assert_eq!(b_first.state().identifier(), "Marker_dave_0");
        assert_eq!(b_second.state().identifier(), "Marker_carol_0");
    }

    #[test]
    fn create_replicated_broadcasts_only_in_global_mode() {
        let (session, outbox) = recording_session();
        register_marker(&session);

        session.create_replicated("Marker", vec![json!("carol")]).unwrap();
        assert!(outbox.borrow().is_empty());

        session.set_mode(StateMode::Global);
        session.create_replicated("Marker", vec![json!("dave")]).unwrap();
        assert!(matches!(
            outbox.borrow().as_slice(),
            [ReplicationMessage::Create(creation)] if creation.class_name == "Marker"
        ));
    }

    #[test]
    fn teardown_runs_on_destroy() {
        use std::cell::Cell;

        struct Flagged {
            state: ObjectState,
            dead: Rc<Cell<bool>>,
        }
        impl Entity for Flagged {
            fn state(&self) -> &ObjectState {
                &self.state
            }
            fn teardown(&self) {
                self.dead.set(true);
            }
        }

        let (session, _outbox) = recording_session();
        let dead = Rc::new(Cell::new(false));
        let flag = dead.clone();
        session.register_class("Flagged", move |session, _params| {
            let entity: Rc<dyn Entity> = Rc::new(Flagged {
                state: ObjectState::new(session, "Flagged", vec![]),
                dead: flag.clone(),
            });
            Ok(entity)
        });

        let entity = session.create("Flagged", vec![]).unwrap();
        let id = entity.state().identifier().clone();
        assert!(session.destroy(&id));
        assert!(dead.get());
        assert!(!session.destroy(&id));
    }

    #[test]
    fn clear_resets_allocation() {
        let (session, _outbox) = recording_session();
        register_marker(&session);
        session.create("Marker", vec![json!("carol")]).unwrap();
        session.clear();
        assert_eq!(session.object_count(), 0);
        let again = session.create("Marker", vec![json!("carol")]).unwrap();
        assert_eq!(again.state().identifier(), "Marker_carol_0");
    }

    #[test]
    fn roster_updates_notify_subscribers() {
        let (session, _outbox) = recording_session();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        session.on_roster(move |roster| sink.borrow_mut().push(roster.len()));

        session.receive(ReplicationMessage::Players {
            roster: vec![
                ParticipantInfo::new("p0", "tester"),
                ParticipantInfo::new("p1", "guest"),
            ],
        });
        assert_eq!(session.roster().len(), 2);
        assert_eq!(*seen.borrow(), vec![2]);
    }
}
