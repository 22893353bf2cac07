//! Event Module
//!
//! Change notifications for subscribed clients.
//!
//! ## Responsibilities
//! - Keep each database's subscription list
//! - Match node create/destroy and attribute events against filters
//! - Deliver matching events as UDP datagrams from a background thread
//!
//! ## Notification Format
//! One JSON object per datagram, sent to `notify_host:<subscriber port>`:
//! ```text
//! {"method":"node_create","params":{"db_name":"primary","node_id":10000001,"parent":0,"type":"BMC"}}
//! {"method":"node_attr","params":{"db_name":"primary","node_id":10000001,"cookie":1,
//!                                 "action":1,"name":"ipv4_addr","data":"10.0.0.5"}}
//! ```

mod notifier;
mod subscription;

pub use notifier::{Notification, Notifier, UdpNotifier};
pub use subscription::{
    AttrAction, Event, EventKind, SubscriberTarget, Subscription, SubscriptionFilter,
    SubscriptionId, SubscriptionRegistry,
};
