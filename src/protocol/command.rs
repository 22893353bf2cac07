//! Command definitions
//!
//! Typed commands plus the fixed method-name table.

use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::error::{MemdbError, Result};
use crate::event::{EventKind, SubscriberTarget, SubscriptionFilter, SubscriptionId};
use crate::store::{AttrType, NodeId, NodeType, SnapshotFlag};

use super::params::Params;

/// Command identifiers, one per method name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    DumpNodes,
    NodeCreate,
    NodeCreateWithId,
    NodeDestroy,
    NodeGet,
    ListSubnode,
    ListNode,
    AttrSet,
    AttrGet,
    AttrRemove,
    ListAttrsByNode,
    ListAttrsByCookie,
    AddSubscription,
    RemoveSubscription,
    Lock,
    Unlock,
}

impl CommandType {
    pub const ALL: [CommandType; 16] = [
        CommandType::DumpNodes,
        CommandType::NodeCreate,
        CommandType::NodeCreateWithId,
        CommandType::NodeDestroy,
        CommandType::NodeGet,
        CommandType::ListSubnode,
        CommandType::ListNode,
        CommandType::AttrSet,
        CommandType::AttrGet,
        CommandType::AttrRemove,
        CommandType::ListAttrsByNode,
        CommandType::ListAttrsByCookie,
        CommandType::AddSubscription,
        CommandType::RemoveSubscription,
        CommandType::Lock,
        CommandType::Unlock,
    ];

    pub fn method(self) -> &'static str {
        match self {
            CommandType::DumpNodes => "dump_nodes",
            CommandType::NodeCreate => "node_create",
            CommandType::NodeCreateWithId => "node_create_with_node_id",
            CommandType::NodeDestroy => "node_destroy",
            CommandType::NodeGet => "node_get_by_node_id",
            CommandType::ListSubnode => "list_subnode",
            CommandType::ListNode => "list_node",
            CommandType::AttrSet => "attr_set",
            CommandType::AttrGet => "attr_get",
            CommandType::AttrRemove => "attr_remove",
            CommandType::ListAttrsByNode => "list_attrs_by_node",
            CommandType::ListAttrsByCookie => "list_attrs_by_cookie",
            CommandType::AddSubscription => "add_subscription",
            CommandType::RemoveSubscription => "remove_subscription",
            CommandType::Lock => "lock",
            CommandType::Unlock => "unlock",
        }
    }

    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.method() == method)
    }
}

/// A decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write the tree and subscription list to the dump file
    DumpNodes,

    CreateNode {
        parent: NodeId,
        node_type: NodeType,
        snapshot_flag: SnapshotFlag,
    },

    CreateNodeWithId {
        parent: NodeId,
        node_id: NodeId,
        node_type: NodeType,
        snapshot_flag: SnapshotFlag,
    },

    DestroyNode {
        node_id: NodeId,
    },

    GetNode {
        node_id: NodeId,
    },

    /// Direct children, optionally of one type
    ListChildren {
        node_id: NodeId,
        type_filter: Option<NodeType>,
    },

    /// Every node with a type in the inclusive range
    ListNodes {
        type_min: NodeType,
        type_max: NodeType,
    },

    SetAttribute {
        node_id: NodeId,
        name: String,
        cookie: u64,
        data: Vec<u8>,
        attr_type: AttrType,
        snapshot_flag: SnapshotFlag,
    },

    GetAttribute {
        node_id: NodeId,
        name: String,
    },

    RemoveAttribute {
        node_id: NodeId,
        name: String,
    },

    ListAttributes {
        node_id: NodeId,
    },

    /// Attributes whose cookie contains every bit of `mask`
    ListAttributesByCookie {
        mask: u64,
    },

    Subscribe {
        filter: SubscriptionFilter,
        target: SubscriberTarget,
    },

    Unsubscribe {
        sub: SubscriptionId,
    },

    Lock {
        timeout: Duration,
    },

    Unlock,
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::DumpNodes => CommandType::DumpNodes,
            Command::CreateNode { .. } => CommandType::NodeCreate,
            Command::CreateNodeWithId { .. } => CommandType::NodeCreateWithId,
            Command::DestroyNode { .. } => CommandType::NodeDestroy,
            Command::GetNode { .. } => CommandType::NodeGet,
            Command::ListChildren { .. } => CommandType::ListSubnode,
            Command::ListNodes { .. } => CommandType::ListNode,
            Command::SetAttribute { .. } => CommandType::AttrSet,
            Command::GetAttribute { .. } => CommandType::AttrGet,
            Command::RemoveAttribute { .. } => CommandType::AttrRemove,
            Command::ListAttributes { .. } => CommandType::ListAttrsByNode,
            Command::ListAttributesByCookie { .. } => CommandType::ListAttrsByCookie,
            Command::Subscribe { .. } => CommandType::AddSubscription,
            Command::Unsubscribe { .. } => CommandType::RemoveSubscription,
            Command::Lock { .. } => CommandType::Lock,
            Command::Unlock => CommandType::Unlock,
        }
    }

    /// Decode the method-specific parameters
    pub fn from_params(command_type: CommandType, p: &Params<'_>) -> Result<Self> {
        let command = match command_type {
            CommandType::DumpNodes => Command::DumpNodes,

            CommandType::NodeCreate => Command::CreateNode {
                parent: p.u64("p_parent")?,
                node_type: p.node_type("p_type")?,
                snapshot_flag: p.snapshot_flag("p_snapshot_flag")?,
            },

            CommandType::NodeCreateWithId => Command::CreateNodeWithId {
                parent: p.u64("p_parent")?,
                node_id: p.u64("p_node_id")?,
                node_type: p.node_type("p_type")?,
                snapshot_flag: p.snapshot_flag("p_snapshot_flag")?,
            },

            CommandType::NodeDestroy => Command::DestroyNode {
                node_id: p.u64("node_id")?,
            },

            CommandType::NodeGet => Command::GetNode {
                node_id: p.u64("node_id")?,
            },

            CommandType::ListSubnode => {
                let type_filter = match p.opt_u64("p_type_match")? {
                    Some(m) if m != 0 => Some(p.node_type("p_type_value")?),
                    _ => None,
                };
                Command::ListChildren {
                    node_id: p.u64("node_id")?,
                    type_filter,
                }
            }

            CommandType::ListNode => Command::ListNodes {
                type_min: p.node_type("p_type_min")?,
                type_max: p.node_type("p_type_max")?,
            },

            CommandType::AttrSet => Command::SetAttribute {
                node_id: p.u64("node_id")?,
                name: p.str("p_name")?.to_string(),
                cookie: p.opt_u64("p_cookie")?.unwrap_or(0),
                data: p.data("p_data")?,
                attr_type: p.attr_type("p_attr_type")?,
                snapshot_flag: p.snapshot_flag("p_snapshot_flag")?,
            },

            CommandType::AttrGet => Command::GetAttribute {
                node_id: p.u64("node_id")?,
                name: p.str("p_name")?.to_string(),
            },

            CommandType::AttrRemove => Command::RemoveAttribute {
                node_id: p.u64("node_id")?,
                name: p.str("p_name")?.to_string(),
            },

            CommandType::ListAttrsByNode => Command::ListAttributes {
                node_id: p.u64("node_id")?,
            },

            CommandType::ListAttrsByCookie => Command::ListAttributesByCookie {
                mask: p.u64("p_cmask")?,
            },

            CommandType::AddSubscription => Self::subscribe_from_params(p)?,

            CommandType::RemoveSubscription => Command::Unsubscribe {
                sub: p.u64("p_sub")?,
            },

            CommandType::Lock => Command::Lock {
                timeout: Duration::from_micros(p.u64("p_timeout")?),
            },

            CommandType::Unlock => Command::Unlock,
        };

        Ok(command)
    }

    fn subscribe_from_params(p: &Params<'_>) -> Result<Self> {
        let event = p.u64("p_event")?;
        let kind = EventKind::from_code(event as i64)?;

        let port = u16::try_from(p.u64("p_cb_port")?)
            .map_err(|_| MemdbError::InvalidParams("p_cb_port out of range".to_string()))?;
        let pid = u32::try_from(p.opt_u64("p_cb_pid")?.unwrap_or(0))
            .map_err(|_| MemdbError::InvalidParams("p_cb_pid out of range".to_string()))?;

        let filter = match kind {
            EventKind::NodeCreated | EventKind::NodeDestroyed => SubscriptionFilter::Node {
                kind,
                type_min: p.node_type("p_type_min")?,
                type_max: p.node_type("p_type_max")?,
            },
            EventKind::AttributeChanged => {
                let prefix_len = p.opt_u64("p_prefix_len")?.unwrap_or(0) as usize;
                let name_prefix = if prefix_len == 0 {
                    String::new()
                } else {
                    let full = p.str("p_name_prefix")?;
                    full.get(..prefix_len.min(full.len()))
                        .ok_or_else(|| {
                            MemdbError::InvalidParams(
                                "p_prefix_len splits a character".to_string(),
                            )
                        })?
                        .to_string()
                };
                SubscriptionFilter::Attribute {
                    node_id: p.opt_u64("p_node_id")?.unwrap_or(0),
                    name_prefix,
                }
            }
        };

        Ok(Command::Subscribe {
            filter,
            target: SubscriberTarget { pid, port },
        })
    }

    /// Encode back into named parameters (client side)
    pub fn to_params(&self) -> Map<String, Value> {
        let value = match self {
            Command::DumpNodes | Command::Unlock => json!({}),

            Command::CreateNode {
                parent,
                node_type,
                snapshot_flag,
            } => json!({
                "p_parent": parent,
                "p_type": node_type.as_str(),
                "p_snapshot_flag": *snapshot_flag as u8,
            }),

            Command::CreateNodeWithId {
                parent,
                node_id,
                node_type,
                snapshot_flag,
            } => json!({
                "p_parent": parent,
                "p_node_id": node_id,
                "p_type": node_type.as_str(),
                "p_snapshot_flag": *snapshot_flag as u8,
            }),

            Command::DestroyNode { node_id }
            | Command::GetNode { node_id }
            | Command::ListAttributes { node_id } => json!({ "node_id": node_id }),

            Command::ListChildren {
                node_id,
                type_filter,
            } => match type_filter {
                Some(t) => json!({
                    "node_id": node_id,
                    "p_type_match": 1,
                    "p_type_value": t.as_str(),
                }),
                None => json!({ "node_id": node_id, "p_type_match": 0 }),
            },

            Command::ListNodes { type_min, type_max } => json!({
                "p_type_min": type_min.as_str(),
                "p_type_max": type_max.as_str(),
            }),

            Command::SetAttribute {
                node_id,
                name,
                cookie,
                data,
                attr_type,
                snapshot_flag,
            } => json!({
                "node_id": node_id,
                "p_name": name,
                "p_cookie": cookie,
                "p_data": super::data_to_value(data),
                "p_attr_type": attr_type.as_str(),
                "p_snapshot_flag": *snapshot_flag as u8,
            }),

            Command::GetAttribute { node_id, name } | Command::RemoveAttribute { node_id, name } => {
                json!({ "node_id": node_id, "p_name": name })
            }

            Command::ListAttributesByCookie { mask } => json!({ "p_cmask": mask }),

            Command::Subscribe { filter, target } => {
                let mut v = json!({
                    "p_event": filter.kind() as u8,
                    "p_cb_port": target.port,
                    "p_cb_pid": target.pid,
                });
                match filter {
                    SubscriptionFilter::Node {
                        type_min, type_max, ..
                    } => {
                        v["p_type_min"] = json!(type_min.as_str());
                        v["p_type_max"] = json!(type_max.as_str());
                    }
                    SubscriptionFilter::Attribute {
                        node_id,
                        name_prefix,
                    } => {
                        v["p_node_id"] = json!(node_id);
                        v["p_prefix_len"] = json!(name_prefix.len());
                        v["p_name_prefix"] = json!(name_prefix);
                    }
                }
                v
            }

            Command::Unsubscribe { sub } => json!({ "p_sub": sub }),

            Command::Lock { timeout } => json!({ "p_timeout": timeout.as_micros() as u64 }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
