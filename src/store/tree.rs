//! Node tree implementation
//!
//! Arena of nodes keyed by id, with parent/child ids as edges.

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::error::{MemdbError, Result};

use super::{
    AttrInfo, AttrType, NodeId, NodeInfo, NodeType, SnapshotFlag, NODE_ID_SEED, ROOT_NODE_ID,
};

/// A vertex of the tree
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// `None` only for the root
    pub parent: Option<NodeId>,
    /// Child ids in creation order
    pub children: Vec<NodeId>,
    /// Owned attributes in creation order
    pub attrs: Vec<Attribute>,
    pub snapshot_flag: SnapshotFlag,
    pub created_at: SystemTime,
    pub modified_at: SystemTime,
}

impl Node {
    fn new(id: NodeId, node_type: NodeType, parent: Option<NodeId>, flag: SnapshotFlag) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            node_type,
            parent,
            children: Vec::new(),
            attrs: Vec::new(),
            snapshot_flag: flag,
            created_at: now,
            modified_at: now,
        }
    }

    /// Look up an owned attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// True when the attribute must reach the log/snapshot
    pub fn persists_attribute(&self, attr: &Attribute) -> bool {
        attr.snapshot_flag.is_persistent() || self.snapshot_flag == SnapshotFlag::ForceAll
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            parent: self.parent.unwrap_or(ROOT_NODE_ID),
            node_id: self.id,
            node_type: self.node_type,
        }
    }
}

/// A named value owned by a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub cookie: u64,
    pub data: Vec<u8>,
    pub attr_type: AttrType,
    pub snapshot_flag: SnapshotFlag,
}

impl Attribute {
    fn info(&self, node_id: NodeId) -> AttrInfo {
        AttrInfo {
            node_id,
            cookie: self.cookie,
            name: self.name.clone(),
            data: self.data.clone(),
            attr_type: self.attr_type,
        }
    }
}

/// Result of an explicit-id creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new node was linked into the tree
    Created(NodeId),

    /// The id already existed; only its flag was updated
    Existing(NodeId),
}

impl CreateOutcome {
    pub fn node_id(self) -> NodeId {
        match self {
            CreateOutcome::Created(id) | CreateOutcome::Existing(id) => id,
        }
    }
}

/// What a destroy removed
#[derive(Debug, Clone)]
pub struct DestroyedNode {
    /// The subtree root that was destroyed
    pub info: NodeInfo,
    pub snapshot_flag: SnapshotFlag,
    /// Every removed node, children before parents, subtree root last
    pub removed: Vec<NodeInfo>,
}

/// What a set-attribute changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrChange {
    /// False when an existing attribute was replaced
    pub created: bool,
    /// True when the change must reach the log
    pub persistent: bool,
}

/// What a remove-attribute removed
#[derive(Debug, Clone)]
pub struct RemovedAttribute {
    pub attribute: Attribute,
    pub persistent: bool,
}

/// One database's tree
pub struct NodeTree {
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
}

impl NodeTree {
    /// Create a tree holding only the root
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            ROOT_NODE_ID,
            Node::new(ROOT_NODE_ID, NodeType::Rmm, None, SnapshotFlag::NotNeeded),
        );

        Self {
            nodes,
            next_id: NODE_ID_SEED,
        }
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Create a node under `parent` with the next free id
    pub fn create_node(
        &mut self,
        parent: NodeId,
        node_type: NodeType,
        flag: SnapshotFlag,
    ) -> Result<NodeId> {
        if !self.nodes.contains_key(&parent) {
            return Err(MemdbError::NodeNotFound(parent));
        }

        let id = self.next_id;
        self.next_id += 1;
        self.link(parent, Node::new(id, node_type, Some(parent), flag));

        Ok(id)
    }

    /// Create a node with a caller-chosen id (replay and explicit creation)
    ///
    /// Re-creating an existing id only strengthens its snapshot flag.
    pub fn create_node_with_id(
        &mut self,
        parent: NodeId,
        id: NodeId,
        node_type: NodeType,
        flag: SnapshotFlag,
    ) -> Result<CreateOutcome> {
        if let Some(existing) = self.nodes.get_mut(&id) {
            existing.snapshot_flag = existing.snapshot_flag.merge(flag);
            if flag.is_persistent() {
                let up = existing.parent;
                self.mark_persistent_upwards(up);
            }
            return Ok(CreateOutcome::Existing(id));
        }

        if !self.nodes.contains_key(&parent) {
            return Err(MemdbError::NodeNotFound(parent));
        }

        self.next_id = self.next_id.max(id.saturating_add(1));
        self.link(parent, Node::new(id, node_type, Some(parent), flag));

        Ok(CreateOutcome::Created(id))
    }

    fn link(&mut self, parent: NodeId, node: Node) {
        let id = node.id;
        let persistent = node.snapshot_flag.is_persistent();
        self.nodes.insert(id, node);

        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        if persistent {
            self.mark_persistent_upwards(Some(parent));
        }
    }

    /// Destroy a node and its whole subtree
    ///
    /// Returns `Ok(None)` for the root, which is never destroyed. An unknown
    /// id is `NodeNotFound`, not a silent success.
    pub fn destroy_node(&mut self, id: NodeId) -> Result<Option<DestroyedNode>> {
        if id == ROOT_NODE_ID {
            return Ok(None);
        }

        let (info, flag, parent) = match self.nodes.get(&id) {
            Some(n) => (n.info(), n.snapshot_flag, n.parent),
            None => return Err(MemdbError::NodeNotFound(id)),
        };

        // Collect the subtree, then drop children before parents
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(n) = self.nodes.get(&current) {
                stack.extend(n.children.iter().copied());
            }
            order.push(current);
        }
        let removed = order
            .iter()
            .rev()
            .filter_map(|victim| self.nodes.remove(victim))
            .map(|n| n.info())
            .collect();

        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|c| *c != id);
            p.modified_at = SystemTime::now();
        }

        Ok(Some(DestroyedNode {
            info,
            snapshot_flag: flag,
            removed,
        }))
    }

    // =========================================================================
    // Attribute Operations
    // =========================================================================

    /// Create or replace a named attribute
    pub fn set_attribute(
        &mut self,
        node_id: NodeId,
        name: &str,
        cookie: u64,
        data: &[u8],
        attr_type: AttrType,
        flag: SnapshotFlag,
    ) -> Result<AttrChange> {
        if name.is_empty() {
            return Err(MemdbError::InvalidParams(
                "attribute name must not be empty".to_string(),
            ));
        }

        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(MemdbError::NodeNotFound(node_id))?;
        node.modified_at = SystemTime::now();

        let created = match node.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => {
                attr.cookie = cookie;
                attr.data = data.to_vec();
                attr.attr_type = attr_type;
                attr.snapshot_flag = attr.snapshot_flag.merge(flag);
                false
            }
            None => {
                node.attrs.push(Attribute {
                    name: name.to_string(),
                    cookie,
                    data: data.to_vec(),
                    attr_type,
                    snapshot_flag: flag,
                });
                true
            }
        };

        let persistent = node
            .attribute(name)
            .map(|a| node.persists_attribute(a))
            .unwrap_or(false);

        if flag.is_persistent() {
            self.mark_persistent_upwards(Some(node_id));
        }

        Ok(AttrChange {
            created,
            persistent,
        })
    }

    /// Read an attribute
    pub fn get_attribute(&self, node_id: NodeId, name: &str) -> Result<&Attribute> {
        let node = self.node(node_id)?;
        node.attribute(name)
            .ok_or_else(|| MemdbError::AttributeNotFound {
                node_id,
                name: name.to_string(),
            })
    }

    /// Remove an attribute; `Ok(None)` when it was not there
    pub fn remove_attribute(
        &mut self,
        node_id: NodeId,
        name: &str,
    ) -> Result<Option<RemovedAttribute>> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(MemdbError::NodeNotFound(node_id))?;

        let pos = match node.attrs.iter().position(|a| a.name == name) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let persistent = node.persists_attribute(&node.attrs[pos]);
        let attribute = node.attrs.remove(pos);
        node.modified_at = SystemTime::now();

        Ok(Some(RemovedAttribute {
            attribute,
            persistent,
        }))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Borrow a node
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(MemdbError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn root(&self) -> &Node {
        &self.nodes[&ROOT_NODE_ID]
    }

    /// Direct children, optionally restricted to one type
    pub fn list_children(
        &self,
        id: NodeId,
        type_filter: Option<NodeType>,
    ) -> Result<Vec<NodeInfo>> {
        let node = self.node(id)?;
        Ok(node
            .children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .filter(|c| type_filter.map_or(true, |t| c.node_type == t))
            .map(Node::info)
            .collect())
    }

    /// Every node whose type lies in `[type_min, type_max]`
    pub fn list_nodes(&self, type_min: NodeType, type_max: NodeType) -> Vec<NodeInfo> {
        self.nodes
            .values()
            .filter(|n| n.node_type >= type_min && n.node_type <= type_max)
            .map(Node::info)
            .collect()
    }

    /// Attributes owned by one node
    pub fn list_attributes(&self, id: NodeId) -> Result<Vec<AttrInfo>> {
        let node = self.node(id)?;
        Ok(node.attrs.iter().map(|a| a.info(id)).collect())
    }

    /// Every attribute whose cookie contains all bits of `mask`
    pub fn list_attributes_by_cookie(&self, mask: u64) -> Vec<AttrInfo> {
        self.nodes
            .values()
            .flat_map(|n| {
                n.attrs
                    .iter()
                    .filter(move |a| a.cookie & mask == mask)
                    .map(move |a| a.info(n.id))
            })
            .collect()
    }

    /// Non-persistent nodes on the path from `from` up to (not including)
    /// the root, outermost first
    ///
    /// These are the nodes a must-persist change below them would promote.
    pub fn unpersisted_ancestry(&self, from: NodeId) -> Vec<NodeInfo> {
        let mut chain = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            if id == ROOT_NODE_ID {
                break;
            }
            let Some(node) = self.nodes.get(&id) else {
                break;
            };
            if node.snapshot_flag.is_persistent() {
                break;
            }
            chain.push(node.info());
            cursor = node.parent;
        }
        chain.reverse();
        chain
    }

    /// Pre-order walk from the root with depth; parents precede children
    pub fn preorder(&self) -> Vec<(usize, &Node)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0usize, ROOT_NODE_ID)];

        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            out.push((depth, node));
            for child in node.children.iter().rev() {
                stack.push((depth + 1, *child));
            }
        }

        out
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Total number of attributes across all nodes
    pub fn attribute_count(&self) -> usize {
        self.nodes.values().map(|n| n.attrs.len()).sum()
    }

    /// Id the next `create_node` will hand out
    pub fn next_id(&self) -> NodeId {
        self.next_id
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Mark `from` and every ancestor must-persist
    fn mark_persistent_upwards(&mut self, from: Option<NodeId>) {
        let mut cursor = from;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get_mut(&id) else {
                break;
            };
            node.snapshot_flag = node.snapshot_flag.merge(SnapshotFlag::Needed);
            cursor = node.parent;
        }
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}
