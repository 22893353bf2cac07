//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (JSON, one object per datagram)
//!
//! ### Request Format
//! ```text
//! {"id": 7, "method": "attr_set",
//!  "params": {"db_name": "primary", "node_id": 10000001, "lock_id": 0,
//!             "p_name": "ipv4_addr", "p_cookie": 1, "p_data": "10.0.0.5",
//!             "p_snapshot_flag": 1}}
//! ```
//!
//! ### Methods
//! - dump_nodes, node_create, node_create_with_node_id, node_destroy,
//!   node_get_by_node_id, list_subnode, list_node
//! - attr_set, attr_get, attr_remove, list_attrs_by_node, list_attrs_by_cookie
//! - add_subscription, remove_subscription, lock, unlock
//!
//! ### Response Format
//! ```text
//! {"id": 7, "result": {"node_id": 10000001}}
//! {"id": 7, "error": {"code": -32001, "message": "Node 42 not found"}}
//! ```

mod codec;
mod command;
mod params;
mod request;
mod response;

pub use codec::{
    decode_envelope, decode_request, decode_response, encode_request, encode_response,
    DecodeError,
};
pub use command::{Command, CommandType};
pub use params::{data_to_value, Params};
pub use request::{Envelope, Request};
pub use response::{ErrorObject, Response};
