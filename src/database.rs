//! Database Instance
//!
//! One logical database: its tree, its persistence files and its
//! subscription list. The engine holds two of these ("primary", "pod").
//!
//! Every mutation here:
//! 1. Applies to the tree
//! 2. Logs a record when the result must persist (ancestors promoted by
//!    the change are logged first, outermost first)
//! 3. Queues an event for matching subscribers
//!
//! A command normally produces one log record. The exception is a
//! must-persist change under ancestors that were not yet persistent: their
//! create records are written ahead of the command's own record, so that
//! replaying the log without a snapshot can still resolve every parent.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::Config;
use crate::error::{MemdbError, Result};
use crate::event::{
    AttrAction, Event, Notification, SubscriberTarget, SubscriptionFilter, SubscriptionId,
    SubscriptionRegistry,
};
use crate::protocol::data_to_value;
use crate::storage::{Persistence, RecoveryReport};
use crate::store::{
    AttrChange, AttrInfo, AttrType, Attribute, CreateOutcome, DestroyedNode, NodeId, NodeInfo,
    NodeTree, NodeType, SnapshotFlag,
};
use crate::wal::LogOperation;

/// Which logical database a request addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DbName {
    Primary,
    Pod,
}

impl DbName {
    pub const ALL: [DbName; 2] = [DbName::Primary, DbName::Pod];

    pub fn as_str(self) -> &'static str {
        match self {
            DbName::Primary => "primary",
            DbName::Pod => "pod",
        }
    }
}

impl FromStr for DbName {
    type Err = MemdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" => Ok(DbName::Primary),
            "pod" => Ok(DbName::Pod),
            other => Err(MemdbError::InvalidParams(format!(
                "unknown db_name '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DbName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a diagnostic dump wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpSummary {
    pub path: PathBuf,
    pub nodes: usize,
    pub attributes: usize,
    pub subscriptions: usize,
}

/// One logical database
pub struct DatabaseInstance {
    name: DbName,
    tree: NodeTree,
    persistence: Persistence,
    subscriptions: SubscriptionRegistry,

    /// Events produced since the last `take_notifications()`
    events: Vec<Event>,
}

impl DatabaseInstance {
    /// Open the database, rebuilding it from its snapshot and log
    pub fn open(name: DbName, config: &Config) -> Result<(Self, RecoveryReport)> {
        let mut tree = NodeTree::new();
        let mut persistence = Persistence::new(name.as_str(), config);
        let report = persistence.recover(&mut tree, config.recovery_mode)?;

        Ok((
            Self {
                name,
                tree,
                persistence,
                subscriptions: SubscriptionRegistry::new(),
                events: Vec::new(),
            },
            report,
        ))
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Create a node with the next free id
    pub fn create_node(
        &mut self,
        parent: NodeId,
        node_type: NodeType,
        flag: SnapshotFlag,
    ) -> Result<NodeId> {
        let promoted = self.tree.unpersisted_ancestry(parent);
        let id = self.tree.create_node(parent, node_type, flag)?;

        if flag.is_persistent() {
            self.log_promoted(&promoted);
            self.log(LogOperation::CreateNode {
                parent,
                node_id: id,
                node_type,
                snapshot_flag: flag,
            });
        }

        let info = self.tree.node(id)?.info();
        self.events.push(Event::NodeCreated(info));
        Ok(id)
    }

    /// Create a node with a caller-chosen id
    ///
    /// An existing id keeps its place; only its flag is strengthened.
    pub fn create_node_with_id(
        &mut self,
        parent: NodeId,
        id: NodeId,
        node_type: NodeType,
        flag: SnapshotFlag,
    ) -> Result<CreateOutcome> {
        let was_persistent = self.tree.node(id).map_or(false, |n| n.snapshot_flag.is_persistent());
        let anchor = self.tree.node(id).ok().and_then(|n| n.parent).unwrap_or(parent);
        let promoted = self.tree.unpersisted_ancestry(anchor);

        let outcome = self.tree.create_node_with_id(parent, id, node_type, flag)?;
        let node = self.tree.node(id)?;
        let (info, effective) = (node.info(), node.snapshot_flag);

        if flag.is_persistent() && !(was_persistent && matches!(outcome, CreateOutcome::Existing(_)))
        {
            self.log_promoted(&promoted);
            self.log(LogOperation::CreateNode {
                parent: info.parent,
                node_id: id,
                node_type: info.node_type,
                snapshot_flag: effective,
            });
        }

        if let CreateOutcome::Created(_) = outcome {
            self.events.push(Event::NodeCreated(info));
        }
        Ok(outcome)
    }

    /// Destroy a node and its subtree; `Ok(None)` for the root
    pub fn destroy_node(&mut self, id: NodeId) -> Result<Option<DestroyedNode>> {
        let Some(destroyed) = self.tree.destroy_node(id)? else {
            return Ok(None);
        };

        if destroyed.snapshot_flag.is_persistent() {
            self.log(LogOperation::DestroyNode { node_id: id });
        }

        self.events
            .extend(destroyed.removed.iter().cloned().map(Event::NodeDestroyed));
        Ok(Some(destroyed))
    }

    // =========================================================================
    // Attribute Operations
    // =========================================================================

    /// Create or replace an attribute
    pub fn set_attribute(
        &mut self,
        node_id: NodeId,
        name: &str,
        cookie: u64,
        data: &[u8],
        attr_type: AttrType,
        flag: SnapshotFlag,
    ) -> Result<AttrChange> {
        let promoted = self.tree.unpersisted_ancestry(node_id);
        let change = self
            .tree
            .set_attribute(node_id, name, cookie, data, attr_type, flag)?;

        if change.persistent {
            let effective = self.tree.get_attribute(node_id, name)?.snapshot_flag;
            self.log_promoted(&promoted);
            self.log(LogOperation::SetAttribute {
                node_id,
                cookie,
                attr_type,
                snapshot_flag: effective,
                name: name.to_string(),
                data: data.to_vec(),
            });
        }

        self.events.push(Event::Attribute {
            node_id,
            cookie,
            action: if change.created {
                AttrAction::Add
            } else {
                AttrAction::Mod
            },
            name: name.to_string(),
            data: data.to_vec(),
        });
        Ok(change)
    }

    pub fn get_attribute(&self, node_id: NodeId, name: &str) -> Result<&Attribute> {
        self.tree.get_attribute(node_id, name)
    }

    /// Remove an attribute; false when it was not there (nothing logged)
    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) -> Result<bool> {
        let Some(removed) = self.tree.remove_attribute(node_id, name)? else {
            return Ok(false);
        };

        if removed.persistent {
            self.log(LogOperation::RemoveAttribute {
                node_id,
                name: name.to_string(),
            });
        }

        self.events.push(Event::Attribute {
            node_id,
            cookie: removed.attribute.cookie,
            action: AttrAction::Del,
            name: removed.attribute.name,
            data: removed.attribute.data,
        });
        Ok(true)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn node_info(&self, id: NodeId) -> Result<NodeInfo> {
        Ok(self.tree.node(id)?.info())
    }

    pub fn list_children(&self, id: NodeId, type_filter: Option<NodeType>) -> Result<Vec<NodeInfo>> {
        self.tree.list_children(id, type_filter)
    }

    pub fn list_nodes(&self, type_min: NodeType, type_max: NodeType) -> Vec<NodeInfo> {
        self.tree.list_nodes(type_min, type_max)
    }

    pub fn list_attributes(&self, id: NodeId) -> Result<Vec<AttrInfo>> {
        self.tree.list_attributes(id)
    }

    pub fn list_attributes_by_cookie(&self, mask: u64) -> Vec<AttrInfo> {
        self.tree.list_attributes_by_cookie(mask)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub fn subscribe(&mut self, filter: SubscriptionFilter, target: SubscriberTarget) -> SubscriptionId {
        self.subscriptions.add(filter, target)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(id)
    }

    /// Turn pending events into datagrams for their subscribers
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();

        for event in self.events.drain(..) {
            let targets = self.subscriptions.matching(&event);
            if targets.is_empty() {
                continue;
            }

            let payload = match serde_json::to_vec(&event.to_json(self.name.as_str())) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(db = %self.name, error = %e, "Failed to encode event");
                    continue;
                }
            };

            out.extend(targets.into_iter().map(|target| Notification {
                target,
                payload: payload.clone(),
            }));
        }

        out
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Render the tree and subscription list into `<db>.dump`
    pub fn dump(&self) -> Result<DumpSummary> {
        let path = self.persistence.dump_path().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);

        writeln!(
            out,
            "# memdb dump: {} ({})",
            self.name,
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(out, "[nodes]")?;
        for (depth, node) in self.tree.preorder() {
            let indent = "  ".repeat(depth);
            writeln!(
                out,
                "{}node {} type={} parent={} flag={} created={} modified={}",
                indent,
                node.id,
                node.node_type,
                node.info().parent,
                node.snapshot_flag as u8,
                rfc3339(node.created_at.into()),
                rfc3339(node.modified_at.into()),
            )?;
            for attr in &node.attrs {
                writeln!(
                    out,
                    "{}  attr {} cookie={} type={} flag={} data={}",
                    indent,
                    attr.name,
                    attr.cookie,
                    attr.attr_type.as_str(),
                    attr.snapshot_flag as u8,
                    data_to_value(&attr.data),
                )?;
            }
        }

        writeln!(out, "[subscriptions]")?;
        for sub in self.subscriptions.iter() {
            let filter = match &sub.filter {
                SubscriptionFilter::Node {
                    kind,
                    type_min,
                    type_max,
                } => format!("{} types={}..{}", kind.method(), type_min, type_max),
                SubscriptionFilter::Attribute {
                    node_id,
                    name_prefix,
                } => format!("node_attr node={} prefix={:?}", node_id, name_prefix),
            };
            writeln!(
                out,
                "sub {} port={} pid={} {}",
                sub.id, sub.target.port, sub.target.pid, filter
            )?;
        }
        out.flush()?;

        Ok(DumpSummary {
            path,
            nodes: self.tree.len(),
            attributes: self.tree.attribute_count(),
            subscriptions: self.subscriptions.len(),
        })
    }

    /// Snapshot now and rotate the log
    pub fn checkpoint(&mut self) -> Result<()> {
        self.persistence.checkpoint(&self.tree)?;
        Ok(())
    }

    /// Force the log to disk
    pub fn sync(&mut self) -> Result<()> {
        self.persistence.sync()
    }

    pub fn name(&self) -> DbName {
        self.name
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn is_degraded(&self) -> bool {
        self.persistence.is_degraded()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn log(&mut self, operation: LogOperation) {
        self.persistence.record(operation, &self.tree);
    }

    /// Log creation of nodes a must-persist change just promoted
    fn log_promoted(&mut self, promoted: &[NodeInfo]) {
        for info in promoted {
            self.log(LogOperation::CreateNode {
                parent: info.parent,
                node_id: info.node_id,
                node_type: info.node_type,
                snapshot_flag: SnapshotFlag::Needed,
            });
        }
    }
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
