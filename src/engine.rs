//! Engine Module
//!
//! The core engine that coordinates all components.
//!
//! ## Responsibilities
//! - Own both database instances ("primary" and "pod")
//! - Route every request through the lock scheduler
//! - Dispatch commands to their handlers and shape the results
//! - Collect notifications produced by executed commands
//! - Run recovery for both databases on startup

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Instant;

use serde_json::{json, Value};

use crate::config::Config;
use crate::database::{DatabaseInstance, DbName};
use crate::error::{MemdbError, Result};
use crate::event::Notification;
use crate::protocol::{data_to_value, decode_request, Command, Request, Response};
use crate::scheduler::{Admission, LockId, Scheduler};
use crate::store::{AttrInfo, CreateOutcome, NodeInfo};

/// A response and where it goes
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// `None` for in-process callers
    pub to: Option<SocketAddr>,
    pub response: Response,
}

/// A request parked in the scheduler
#[derive(Debug)]
struct Parked {
    request: Request,
    reply_to: Option<SocketAddr>,
}

/// The main engine
///
/// ## Execution Model: single-threaded, cooperative
///
/// One request is decoded, admitted by the scheduler, executed, logged and
/// answered before the next is looked at. Lock deadlines are checked on
/// every `submit()` and `tick()`; nothing runs in the background except
/// notification delivery, which lives outside the engine.
pub struct Engine {
    config: Config,
    primary: DatabaseInstance,
    pod: DatabaseInstance,

    /// One advisory lock shared by both databases
    scheduler: Scheduler<Parked>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Recover each database from its snapshot and log
    /// 3. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Data directory
        fs::create_dir_all(&config.data_dir)?;

        // Step 2: Databases
        let (primary, primary_report) = DatabaseInstance::open(DbName::Primary, &config)?;
        let (pod, pod_report) = DatabaseInstance::open(DbName::Pod, &config)?;

        for report in [&primary_report, &pod_report] {
            if report.replay.halted || report.snapshot.halted {
                tracing::warn!(
                    mode = ?config.recovery_mode,
                    "Recovery stopped early; database continues with what was loaded"
                );
            }
        }

        let scheduler = Scheduler::new(config.max_lock_timeout);

        Ok(Self {
            config,
            primary,
            pod,
            scheduler,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Request Entry Points
    // =========================================================================

    /// Handle one raw datagram
    ///
    /// Undecodable requests are answered straight away; they never reach
    /// the scheduler.
    pub fn handle_datagram(
        &mut self,
        bytes: &[u8],
        reply_to: Option<SocketAddr>,
        now: Instant,
    ) -> Vec<Reply> {
        match decode_request(bytes) {
            Ok(request) => self.submit(request, reply_to, now),
            Err(failure) => {
                tracing::debug!(error = %failure.error, "Rejecting undecodable request");
                vec![Reply {
                    to: reply_to,
                    response: failure.into_response(),
                }]
            }
        }
    }

    /// Submit a decoded request
    ///
    /// Returns every reply that became ready: the request's own (unless it
    /// was parked) followed by any parked commands released by it.
    pub fn submit(
        &mut self,
        request: Request,
        reply_to: Option<SocketAddr>,
        now: Instant,
    ) -> Vec<Reply> {
        let mut replies = Vec::new();
        self.expire(now);

        let ticket = request.ticket();
        match self.scheduler.admit(ticket, Parked { request, reply_to }) {
            Admission::Run(parked) => {
                replies.push(self.run(parked, now));
            }
            Admission::Queued => {}
            Admission::Rejected(parked, error) => {
                tracing::debug!(lock_id = ticket.lock_id, "Rejecting stale lock id");
                replies.push(Reply {
                    to: parked.reply_to,
                    response: Response::error(Some(parked.request.id), &error),
                });
            }
        }

        self.drain(now, &mut replies);
        replies
    }

    /// Cooperative timer: expire the lock and release parked commands
    pub fn tick(&mut self, now: Instant) -> Vec<Reply> {
        let mut replies = Vec::new();
        self.expire(now);
        self.drain(now, &mut replies);
        replies
    }

    /// Execute a request directly, bypassing the scheduler
    pub fn execute(&mut self, request: &Request, now: Instant) -> Result<Value> {
        tracing::debug!(
            id = request.id,
            db = %request.db,
            lock_id = request.lock_id,
            method = request.command.command_type().method(),
            "Executing command"
        );

        match &request.command {
            Command::Lock { timeout } => {
                let id = self.scheduler.acquire(*timeout, now)?;
                Ok(json!({ "r_lock_id": id }))
            }
            Command::Unlock => {
                self.scheduler.release(request.lock_id)?;
                Ok(json!({}))
            }
            command => Self::dispatch(self.database_mut(request.db), command),
        }
    }

    /// Notifications produced since the last call, both databases
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut out = self.primary.take_notifications();
        out.extend(self.pod.take_notifications());
        out
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn database(&self, db: DbName) -> &DatabaseInstance {
        match db {
            DbName::Primary => &self.primary,
            DbName::Pod => &self.pod,
        }
    }

    pub fn database_mut(&mut self, db: DbName) -> &mut DatabaseInstance {
        match db {
            DbName::Primary => &mut self.primary,
            DbName::Pod => &mut self.pod,
        }
    }

    /// Current lock holder, if any
    pub fn lock_holder(&self) -> Option<LockId> {
        self.scheduler.lock().holder()
    }

    /// When the current holder's reservation ends
    pub fn lock_deadline(&self) -> Option<Instant> {
        self.scheduler.lock().deadline()
    }

    /// Number of parked commands
    pub fn pending_commands(&self) -> usize {
        self.scheduler.pending()
    }

    /// True when either database lost log writes
    pub fn is_degraded(&self) -> bool {
        self.primary.is_degraded() || self.pod.is_degraded()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Force both logs to disk
    pub fn sync(&mut self) -> Result<()> {
        self.primary.sync()?;
        self.pod.sync()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn expire(&mut self, now: Instant) {
        self.scheduler.expire(now);
    }

    /// Run parked commands until none is eligible
    fn drain(&mut self, now: Instant, replies: &mut Vec<Reply>) {
        while let Some((parked, stale)) = self.scheduler.next_ready() {
            let reply = match stale {
                Some(error) => Reply {
                    to: parked.reply_to,
                    response: Response::error(Some(parked.request.id), &error),
                },
                None => self.run(parked, now),
            };
            replies.push(reply);
        }
    }

    fn run(&mut self, parked: Parked, now: Instant) -> Reply {
        let id = Some(parked.request.id);
        let response = match self.execute(&parked.request, now) {
            Ok(result) => Response::ok(id, result),
            Err(error) => {
                tracing::debug!(id = parked.request.id, %error, "Command failed");
                Response::error(id, &error)
            }
        };

        Reply {
            to: parked.reply_to,
            response,
        }
    }

    /// Database-scoped handlers
    fn dispatch(db: &mut DatabaseInstance, command: &Command) -> Result<Value> {
        match command {
            Command::DumpNodes => {
                let summary = db.dump()?;
                Ok(json!({
                    "path": summary.path.display().to_string(),
                    "nodes": summary.nodes,
                    "attributes": summary.attributes,
                    "subscriptions": summary.subscriptions,
                }))
            }

            Command::CreateNode {
                parent,
                node_type,
                snapshot_flag,
            } => {
                let id = db.create_node(*parent, *node_type, *snapshot_flag)?;
                Ok(json!({ "node_id": id }))
            }

            Command::CreateNodeWithId {
                parent,
                node_id,
                node_type,
                snapshot_flag,
            } => {
                let outcome = db.create_node_with_id(*parent, *node_id, *node_type, *snapshot_flag)?;
                Ok(json!({
                    "node_id": outcome.node_id(),
                    "created": matches!(outcome, CreateOutcome::Created(_)),
                }))
            }

            Command::DestroyNode { node_id } => {
                let removed = db
                    .destroy_node(*node_id)?
                    .map_or(0, |destroyed| destroyed.removed.len());
                Ok(json!({ "node_id": node_id, "removed": removed }))
            }

            Command::GetNode { node_id } => {
                let info = db.node_info(*node_id)?;
                Ok(json!({ "r_node": node_json(&info) }))
            }

            Command::ListChildren {
                node_id,
                type_filter,
            } => {
                let children = db.list_children(*node_id, *type_filter)?;
                Ok(json!({
                    "node_id": node_id,
                    "r_nodes": children.iter().map(node_json).collect::<Vec<_>>(),
                }))
            }

            Command::ListNodes { type_min, type_max } => {
                let nodes = db.list_nodes(*type_min, *type_max);
                Ok(json!({ "r_nodes": nodes.iter().map(node_json).collect::<Vec<_>>() }))
            }

            Command::SetAttribute {
                node_id,
                name,
                cookie,
                data,
                attr_type,
                snapshot_flag,
            } => {
                let change =
                    db.set_attribute(*node_id, name, *cookie, data, *attr_type, *snapshot_flag)?;
                Ok(json!({ "node_id": node_id, "created": change.created }))
            }

            Command::GetAttribute { node_id, name } => {
                let attr = db.get_attribute(*node_id, name)?;
                Ok(json!({
                    "node_id": node_id,
                    "r_attr": {
                        "cookie": attr.cookie,
                        "data": data_to_value(&attr.data),
                        "type": attr.attr_type.as_str(),
                    },
                }))
            }

            Command::RemoveAttribute { node_id, name } => {
                let removed = db.remove_attribute(*node_id, name)?;
                Ok(json!({ "node_id": node_id, "removed": removed }))
            }

            Command::ListAttributes { node_id } => {
                let attrs = db.list_attributes(*node_id)?;
                Ok(json!({
                    "node_id": node_id,
                    "r_attrs": attrs.iter().map(attr_json).collect::<Vec<_>>(),
                }))
            }

            Command::ListAttributesByCookie { mask } => {
                let attrs = db.list_attributes_by_cookie(*mask);
                Ok(json!({ "r_attrs": attrs.iter().map(attr_json).collect::<Vec<_>>() }))
            }

            Command::Subscribe { filter, target } => {
                let sub = db.subscribe(filter.clone(), *target);
                Ok(json!({ "r_sub": sub }))
            }

            Command::Unsubscribe { sub } => Ok(json!({ "removed": db.unsubscribe(*sub) })),

            Command::Lock { .. } | Command::Unlock => Err(MemdbError::HandleError(
                "lock commands are not database scoped".to_string(),
            )),
        }
    }
}

fn node_json(info: &NodeInfo) -> Value {
    json!({
        "parent": info.parent,
        "node_id": info.node_id,
        "type": info.node_type.as_str(),
    })
}

fn attr_json(attr: &AttrInfo) -> Value {
    json!({
        "node": attr.node_id,
        "cookie": attr.cookie,
        "name": attr.name,
        "data": data_to_value(&attr.data),
        "type": attr.attr_type.as_str(),
    })
}
