//! Tests for subscriptions and notification delivery
//!
//! These tests verify:
//! - Filter matching for node and attribute events
//! - Registry handles and removal
//! - Notification JSON shape
//! - UDP delivery from the background thread

use std::net::UdpSocket;
use std::time::Duration;

use memdb::event::{
    AttrAction, Event, EventKind, Notification, Notifier, SubscriberTarget, SubscriptionFilter,
    SubscriptionRegistry, UdpNotifier,
};
use memdb::store::{NodeInfo, NodeType};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn target(port: u16) -> SubscriberTarget {
    SubscriberTarget { pid: 100, port }
}

fn node_event(node_type: NodeType) -> Event {
    Event::NodeCreated(NodeInfo {
        parent: 0,
        node_id: 10_000_000,
        node_type,
    })
}

fn attr_event(node_id: u64, name: &str) -> Event {
    Event::Attribute {
        node_id,
        cookie: 1,
        action: AttrAction::Add,
        name: name.to_string(),
        data: b"10.0.0.5".to_vec(),
    }
}

// =============================================================================
// Filter Tests
// =============================================================================

#[test]
fn test_node_filter_type_range() {
    let filter = SubscriptionFilter::Node {
        kind: EventKind::NodeCreated,
        type_min: NodeType::Drawer,
        type_max: NodeType::Bmc,
    };

    assert!(filter.matches(&node_event(NodeType::Drawer)));
    assert!(filter.matches(&node_event(NodeType::Bmc)));
    assert!(!filter.matches(&node_event(NodeType::Rack)));
    assert!(!filter.matches(&node_event(NodeType::Fan)));
}

#[test]
fn test_node_filter_kind_must_match() {
    let filter = SubscriptionFilter::Node {
        kind: EventKind::NodeDestroyed,
        type_min: NodeType::min(),
        type_max: NodeType::max(),
    };

    assert!(!filter.matches(&node_event(NodeType::Bmc)));
    assert!(filter.matches(&Event::NodeDestroyed(NodeInfo {
        parent: 0,
        node_id: 1,
        node_type: NodeType::Bmc,
    })));
}

#[test]
fn test_attribute_filter_node_and_prefix() {
    let any_node = SubscriptionFilter::Attribute {
        node_id: 0,
        name_prefix: "ipv4".to_string(),
    };
    let one_node = SubscriptionFilter::Attribute {
        node_id: 7,
        name_prefix: String::new(),
    };

    assert!(any_node.matches(&attr_event(7, "ipv4_addr")));
    assert!(any_node.matches(&attr_event(8, "ipv4_mask")));
    assert!(!any_node.matches(&attr_event(7, "ipv6_addr")));

    assert!(one_node.matches(&attr_event(7, "anything")));
    assert!(!one_node.matches(&attr_event(8, "anything")));
    assert!(!one_node.matches(&node_event(NodeType::Bmc)));
}

#[test]
fn test_event_codes() {
    assert_eq!(EventKind::from_code(1).unwrap(), EventKind::NodeCreated);
    assert_eq!(EventKind::from_code(3).unwrap().method(), "node_attr");
    assert!(EventKind::from_code(0).is_err());
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_registry_ids_and_removal() {
    let mut registry = SubscriptionRegistry::new();
    let filter = SubscriptionFilter::Attribute {
        node_id: 0,
        name_prefix: String::new(),
    };

    let a = registry.add(filter.clone(), target(9001));
    let b = registry.add(filter, target(9002));
    assert_eq!((a, b), (1, 2));
    assert_eq!(registry.len(), 2);

    assert!(registry.remove(a));
    assert!(!registry.remove(a));
    assert_eq!(registry.matching(&attr_event(1, "x")), vec![target(9002)]);
}

#[test]
fn test_matching_in_registration_order() {
    let mut registry = SubscriptionRegistry::new();
    registry.add(
        SubscriptionFilter::Node {
            kind: EventKind::NodeCreated,
            type_min: NodeType::Rack,
            type_max: NodeType::Rack,
        },
        target(1),
    );
    registry.add(
        SubscriptionFilter::Node {
            kind: EventKind::NodeCreated,
            type_min: NodeType::min(),
            type_max: NodeType::max(),
        },
        target(2),
    );
    registry.add(
        SubscriptionFilter::Node {
            kind: EventKind::NodeCreated,
            type_min: NodeType::min(),
            type_max: NodeType::max(),
        },
        target(3),
    );

    assert_eq!(
        registry.matching(&node_event(NodeType::Bmc)),
        vec![target(2), target(3)]
    );
}

// =============================================================================
// Notification Format Tests
// =============================================================================

#[test]
fn test_node_event_json() {
    let value = node_event(NodeType::Bmc).to_json("primary");

    assert_eq!(
        value,
        json!({
            "method": "node_create",
            "params": {"db_name": "primary", "node_id": 10000000, "parent": 0, "type": "BMC"}
        })
    );
}

#[test]
fn test_attribute_event_json() {
    let event = Event::Attribute {
        node_id: 5,
        cookie: 2,
        action: AttrAction::Del,
        name: "blob".to_string(),
        data: vec![0xff],
    };
    let value = event.to_json("pod");

    assert_eq!(value["method"], json!("node_attr"));
    assert_eq!(value["params"]["db_name"], json!("pod"));
    assert_eq!(value["params"]["action"], json!(3));
    assert_eq!(value["params"]["data"], json!([255]));
}

// =============================================================================
// Delivery Tests
// =============================================================================

#[test]
fn test_udp_notifier_delivers() {
    let listener = UdpSocket::bind("127.0.0.1:0").unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let port = listener.local_addr().unwrap().port();

    let notifier = UdpNotifier::start("127.0.0.1").unwrap();
    notifier.deliver(Notification {
        target: target(port),
        payload: br#"{"method":"node_create","params":{}}"#.to_vec(),
    });

    let mut buf = [0u8; 512];
    let (len, _) = listener.recv_from(&mut buf).unwrap();
    let value: Value = serde_json::from_slice(&buf[..len]).unwrap();
    assert_eq!(value["method"], json!("node_create"));

    drop(notifier);
}
