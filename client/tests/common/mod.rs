#![allow(dead_code)]

//! Shared test harness: an in-memory ordered relay plus the card-table
//! classes the scenario tests play with.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tabletop_client::{
    BasicEntity, ChannelOrdering, Entity, ObjectState, PropertyValue, ReplicationMessage,
    Session, Transport, TransportError,
};

struct RelayInner {
    queue: VecDeque<(String, ReplicationMessage)>,
    history: Vec<(String, ReplicationMessage)>,
    host: Option<String>,
}

/// A dumb ordered broadcast relay for one room, entirely in memory. It
/// rebroadcasts to every participant except the sender, forwards
/// authoritative calls to the host only, and designates the host, nothing
/// else.
pub struct MemoryRelay {
    inner: Rc<RefCell<RelayInner>>,
}

struct RelayEnd {
    uid: String,
    inner: Rc<RefCell<RelayInner>>,
}

impl Transport for RelayEnd {
    fn ordering(&self) -> ChannelOrdering {
        ChannelOrdering::OrderedReliable
    }

    fn send(&mut self, message: &ReplicationMessage) -> Result<(), TransportError> {
        let mut inner = self.inner.borrow_mut();
        inner.queue.push_back((self.uid.clone(), message.clone()));
        inner.history.push((self.uid.clone(), message.clone()));
        Ok(())
    }
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RelayInner {
                queue: VecDeque::new(),
                history: Vec::new(),
                host: None,
            })),
        }
    }

    /// A transport endpoint for one participant.
    pub fn endpoint(&self, uid: &str) -> Box<dyn Transport> {
        Box::new(RelayEnd {
            uid: uid.to_string(),
            inner: self.inner.clone(),
        })
    }

    /// Designate the host and tell every participant.
    pub fn assign_host(&self, uid: &str, sessions: &[(&str, &Session)]) {
        self.inner.borrow_mut().host = Some(uid.to_string());
        for (_, session) in sessions {
            session.receive(ReplicationMessage::SetHost {
                host_id: uid.to_string(),
            });
        }
    }

    /// Deliver queued messages, in order, until the room goes quiet.
    pub fn pump(&self, sessions: &[(&str, &Session)]) {
        loop {
            let item = self.inner.borrow_mut().queue.pop_front();
            let Some((from, message)) = item else {
                break;
            };
            match &message {
                ReplicationMessage::Authority(_) => {
                    let host = self.inner.borrow().host.clone();
                    let Some(host) = host else { continue };
                    if host == from {
                        continue;
                    }
                    if let Some((_, session)) = sessions.iter().find(|(uid, _)| *uid == host) {
                        session.receive(message.clone());
                    }
                }
                _ => {
                    for (uid, session) in sessions {
                        if *uid != from {
                            session.receive(message.clone());
                        }
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Everything ever sent through this relay.
    pub fn history(&self) -> Vec<(String, ReplicationMessage)> {
        self.inner.borrow().history.clone()
    }

    pub fn state_update_count(&self) -> usize {
        self.inner
            .borrow()
            .history
            .iter()
            .filter(|(_, message)| matches!(message, ReplicationMessage::State(_)))
            .count()
    }
}

/// Register the deck/card/grabber classes and their gated actions.
pub fn register_card_table(session: &Session) {
    session.register_class("Deck", |session, params| {
        let cards: Vec<PropertyValue> = params
            .first()
            .and_then(|p| p.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|card| card.as_str())
                    .map(|card| PropertyValue::Str(card.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let state = ObjectState::new(
            session,
            "Deck",
            vec![("cards", PropertyValue::List(cards))],
        );
        let entity: Rc<dyn Entity> = BasicEntity::new(state);
        Ok(entity)
    });

    session.register_class("Card", |session, params| {
        let face = params
            .first()
            .and_then(|p| p.as_str())
            .unwrap_or("back")
            .to_string();
        let state = ObjectState::new(
            session,
            "Card",
            vec![
                ("face", PropertyValue::Str(face)),
                ("holder", PropertyValue::Null),
            ],
        );
        let entity: Rc<dyn Entity> = BasicEntity::new(state);
        Ok(entity)
    });

    session.register_class("Grabber", |session, params| {
        let owner = params
            .first()
            .and_then(|p| p.as_str())
            .unwrap_or("unknown")
            .to_string();
        let token = format!("Grabber_{}", owner);
        let state = ObjectState::with_token(
            session,
            "Grabber",
            &token,
            vec![
                ("owner", PropertyValue::Str(owner)),
                ("holding", PropertyValue::Null),
            ],
        );
        let entity: Rc<dyn Entity> = BasicEntity::new(state);
        Ok(entity)
    });

    session.register_action("Grabber", "grab", |session, grabber, param| {
        if !session.require_authority() {
            return;
        }
        let Some(card_id) = param.as_str() else { return };
        let Some(card) = session.get_object(card_id) else { return };
        // Somebody may have got there first.
        if card.state().get("holder") != Some(PropertyValue::Null) {
            return;
        }
        card.state().set(
            "holder",
            PropertyValue::Str(grabber.state().identifier().clone()),
            true,
        );
        grabber
            .state()
            .set("holding", PropertyValue::Str(card_id.to_string()), true);
    });

    session.register_action("Grabber", "release", |session, grabber, _param| {
        if !session.require_authority() {
            return;
        }
        let held = grabber
            .state()
            .get("holding")
            .and_then(|value| value.as_str().map(str::to_string));
        let Some(held) = held else { return };
        if let Some(card) = session.get_object(&held) {
            card.state().set("holder", PropertyValue::Null, true);
        }
        grabber.state().set("holding", PropertyValue::Null, true);
    });
}

pub fn holder_of(session: &Session, card_id: &str) -> PropertyValue {
    session
        .get_object(card_id)
        .and_then(|card| card.state().get("holder"))
        .unwrap_or(PropertyValue::Null)
}
