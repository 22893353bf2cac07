//! Request definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::DbName;
use crate::error::{MemdbError, Result};
use crate::scheduler::{LockId, Ticket, NO_LOCK};

use super::params::Params;
use super::{Command, CommandType};

/// The raw `{id, method, params}` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// A fully decoded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    pub db: DbName,
    pub lock_id: LockId,
    pub command: Command,
}

impl Request {
    pub fn new(id: u64, db: DbName, lock_id: LockId, command: Command) -> Self {
        Self {
            id,
            db,
            lock_id,
            command,
        }
    }

    /// Resolve method and parameters
    ///
    /// Unknown methods are `MethodNotFound`; anything wrong with the
    /// parameters is `InvalidParams`.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self> {
        let command_type = CommandType::from_method(&envelope.method)
            .ok_or_else(|| MemdbError::MethodNotFound(envelope.method.clone()))?;

        let p = Params(&envelope.params);
        let db = p.str("db_name")?.parse()?;
        let lock_id = p.opt_u64("lock_id")?.unwrap_or(NO_LOCK);
        let command = Command::from_params(command_type, &p)?;

        Ok(Self {
            id: envelope.id,
            db,
            lock_id,
            command,
        })
    }

    /// Encode for sending (client side)
    pub fn to_envelope(&self) -> Envelope {
        let mut params = self.command.to_params();
        params.insert("db_name".to_string(), Value::from(self.db.as_str()));
        params.insert("lock_id".to_string(), Value::from(self.lock_id));
        if !params.contains_key("node_id") {
            params.insert("node_id".to_string(), Value::from(0u64));
        }

        Envelope {
            id: self.id,
            method: self.command.command_type().method().to_string(),
            params,
        }
    }

    /// What the scheduler needs to decide when this may run
    pub fn ticket(&self) -> Ticket {
        Ticket {
            lock_id: self.lock_id,
            acquires: matches!(self.command, Command::Lock { .. }),
        }
    }
}
