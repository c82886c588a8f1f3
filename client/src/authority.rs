//! # Host Authority
//!
//! Handles the authoritative firing of functions. Exactly one participant
//! per room is host; a gated action always executes exactly once, on the
//! host, no matter who requested it. There is no result channel: the
//! observable effect of an authoritative call is exactly the replication
//! traffic it triggers while running on the host.

use log::{info, warn};
use serde_json::Value;
use tabletop_shared::{AuthoritativeAction, Destruction};

use crate::session::Session;

/// Builtin action name for authoritative teardown of a tracked entity.
pub const DESTROY_ACTION: &str = "destroy";

impl Session {
    /// Whether this participant's process is authoritative for gated
    /// mutations.
    pub fn is_host(&self) -> bool {
        self.inner.is_host.get()
    }

    /// Designate (or revoke) host status. Normally driven by the relay's
    /// host-assignment message.
    pub fn set_host(&self, is_host: bool) {
        self.inner.is_host.set(is_host);
    }

    /// Whether an authoritative call is currently executing.
    pub fn is_authoritative(&self) -> bool {
        self.inner.is_authoritative.get()
    }

    /// The only sanctioned way to perform a gated mutation: run the named
    /// function on the identified entity, on the host. The host runs it
    /// immediately; everyone else sends the request to the relay, which
    /// forwards it to the host.
    ///
    /// Call functions this way when they make stateful changes with
    /// stateful preconditions.
    pub fn do_call(&self, identifier: &str, function_name: &str, param: Value) {
        let action = AuthoritativeAction {
            identifier: identifier.to_string(),
            function_name: function_name.to_string(),
            param,
        };
        if self.inner.is_host.get() {
            // Short circuit: we are the host.
            self.dispatch(action);
        } else {
            self.inner.send_authoritative(action);
        }
    }

    /// Request that the host destroy a tracked entity. On success the
    /// destruction replicates like any other side effect.
    pub fn request_destroy(&self, identifier: &str) {
        self.do_call(identifier, DESTROY_ACTION, Value::Null);
    }

    /// Guard for functions that must only run with authority. Logs and
    /// returns false otherwise; what "abort" means is the caller's business.
    pub fn require_authority(&self) -> bool {
        let authoritative = self.inner.is_authoritative.get();
        if !authoritative {
            warn!("a function which requires authority was called without it; this action will be cancelled");
        }
        authoritative
    }

    /// We are the authority, and the relay has just handed us an
    /// authoritative call to make.
    pub(crate) fn receive_authoritative_action(&self, action: AuthoritativeAction) {
        if !self.inner.is_host.get() {
            warn!(
                "authoritative call '{}' arrived at a non-host participant",
                action.function_name
            );
            return;
        }
        self.dispatch(action);
    }

    fn dispatch(&self, action: AuthoritativeAction) {
        info!(
            "{} :: ! {}({})",
            action.identifier, action.function_name, action.param
        );

        let Some(entity) = self.get_object(&action.identifier) else {
            // Destroyed before the request arrived: most recent surviving
            // state wins, the intent is simply dropped.
            warn!(
                "an authoritative function was called on identifier '{}', but no such object was found",
                action.identifier
            );
            return;
        };

        let prior = self.inner.is_authoritative.replace(true);

        if action.function_name == DESTROY_ACTION {
            self.destroy(&action.identifier);
            self.inner.send_destruction(Destruction {
                identifier: action.identifier.clone(),
            });
        } else {
            let class_tag = entity.state().class_tag().to_string();
            let handler = self.inner.classes.borrow().action(&class_tag, &action.function_name);
            match handler {
                Some(handler) => handler(self, &entity, &action.param),
                None => warn!(
                    "no action '{}' registered for class '{}'",
                    action.function_name, class_tag
                ),
            }
        }

        self.inner.is_authoritative.set(prior);
    }

    pub(crate) fn receive_set_host(&self, host_id: &str) {
        let is_host = host_id == self.inner.participant.uid;
        self.inner.is_host.set(is_host);
        info!(
            "host is {}{}",
            host_id,
            if is_host { " (this participant)" } else { "" }
        );
    }
}
