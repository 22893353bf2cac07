//! Subscriptions and events

use serde_json::{json, Value};

use crate::error::{MemdbError, Result};
use crate::protocol::data_to_value;
use crate::store::{NodeId, NodeInfo, NodeType, ROOT_NODE_ID};

/// Handle returned by `add`, used by `remove`
pub type SubscriptionId = u64;

/// Event categories a client can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    NodeCreated = 1,
    NodeDestroyed = 2,
    AttributeChanged = 3,
}

impl EventKind {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(EventKind::NodeCreated),
            2 => Ok(EventKind::NodeDestroyed),
            3 => Ok(EventKind::AttributeChanged),
            other => Err(MemdbError::InvalidParams(format!(
                "unsupported event {}",
                other
            ))),
        }
    }

    /// Method name carried by notification datagrams
    pub fn method(self) -> &'static str {
        match self {
            EventKind::NodeCreated => "node_create",
            EventKind::NodeDestroyed => "node_delete",
            EventKind::AttributeChanged => "node_attr",
        }
    }
}

/// What happened to an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AttrAction {
    Add = 1,
    Mod = 2,
    Del = 3,
}

impl AttrAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AttrAction::Add => "add",
            AttrAction::Mod => "mod",
            AttrAction::Del => "del",
        }
    }
}

/// A change produced by one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NodeCreated(NodeInfo),
    NodeDestroyed(NodeInfo),
    Attribute {
        node_id: NodeId,
        cookie: u64,
        action: AttrAction,
        name: String,
        data: Vec<u8>,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NodeCreated(_) => EventKind::NodeCreated,
            Event::NodeDestroyed(_) => EventKind::NodeDestroyed,
            Event::Attribute { .. } => EventKind::AttributeChanged,
        }
    }

    /// Encode as a notification object for database `db`
    pub fn to_json(&self, db: &str) -> Value {
        let params = match self {
            Event::NodeCreated(info) | Event::NodeDestroyed(info) => json!({
                "db_name": db,
                "node_id": info.node_id,
                "parent": info.parent,
                "type": info.node_type.as_str(),
            }),
            Event::Attribute {
                node_id,
                cookie,
                action,
                name,
                data,
            } => json!({
                "db_name": db,
                "node_id": node_id,
                "cookie": cookie,
                "action": *action as u8,
                "name": name,
                "data": data_to_value(data),
            }),
        };

        json!({ "method": self.kind().method(), "params": params })
    }
}

/// Where a subscriber listens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberTarget {
    /// Informational only
    pub pid: u32,
    pub port: u16,
}

/// What a subscription matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Node events whose type lies in `[type_min, type_max]`
    Node {
        kind: EventKind,
        type_min: NodeType,
        type_max: NodeType,
    },

    /// Attribute events on one node (0 = any node) with a name prefix
    /// (empty = any name)
    Attribute { node_id: NodeId, name_prefix: String },
}

impl SubscriptionFilter {
    pub fn kind(&self) -> EventKind {
        match self {
            SubscriptionFilter::Node { kind, .. } => *kind,
            SubscriptionFilter::Attribute { .. } => EventKind::AttributeChanged,
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        if self.kind() != event.kind() {
            return false;
        }

        match (self, event) {
            (
                SubscriptionFilter::Node {
                    type_min, type_max, ..
                },
                Event::NodeCreated(info) | Event::NodeDestroyed(info),
            ) => info.node_type >= *type_min && info.node_type <= *type_max,

            (
                SubscriptionFilter::Attribute {
                    node_id: wanted,
                    name_prefix,
                },
                Event::Attribute { node_id, name, .. },
            ) => (*wanted == ROOT_NODE_ID || wanted == node_id) && name.starts_with(name_prefix),

            _ => false,
        }
    }
}

/// A registered subscription
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub filter: SubscriptionFilter,
    pub target: SubscriberTarget,
}

/// One database's subscription list, in registration order
#[derive(Debug)]
pub struct SubscriptionRegistry {
    subscriptions: Vec<Subscription>,
    next_id: SubscriptionId,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a filter, returning its handle
    pub fn add(&mut self, filter: SubscriptionFilter, target: SubscriberTarget) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;

        tracing::debug!(sub = id, port = target.port, ?filter, "Subscription added");
        self.subscriptions.push(Subscription { id, filter, target });
        id
    }

    /// Drop a subscription; false if the handle is unknown
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Targets of every subscription matching `event`
    pub fn matching(&self, event: &Event) -> Vec<SubscriberTarget> {
        self.subscriptions
            .iter()
            .filter(|s| s.filter.matches(event))
            .map(|s| s.target)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
