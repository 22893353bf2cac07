//! Tests for the engine
//!
//! These tests verify:
//! - Command dispatch and result shapes
//! - Lock acquisition, queueing, expiry and stale ids
//! - Durability across reopen (log replay and snapshots)
//! - Notifications produced by mutations
//! - Independence of the two databases

use std::fs;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use memdb::config::LogSyncStrategy;
use memdb::event::{EventKind, SubscriberTarget, SubscriptionFilter};
use memdb::protocol::{Command, Request, Response};
use memdb::store::{AttrType, NodeType, SnapshotFlag, ROOT_NODE_ID};
use memdb::{Config, DbName, Engine};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_engine(temp: &TempDir) -> Engine {
    let config = Config::builder()
        .data_dir(temp.path())
        .log_sync_strategy(LogSyncStrategy::EveryWrite)
        .build();
    Engine::open(config).unwrap()
}

fn setup_engine() -> (TempDir, Engine) {
    let temp = TempDir::new().unwrap();
    let engine = open_engine(&temp);
    (temp, engine)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Submit one request and return its single reply
fn call_on(engine: &mut Engine, db: DbName, lock_id: u64, command: Command) -> Response {
    let replies = engine.submit(Request::new(1, db, lock_id, command), None, Instant::now());
    assert_eq!(replies.len(), 1, "expected exactly one reply: {:?}", replies);
    replies.into_iter().next().unwrap().response
}

fn call(engine: &mut Engine, command: Command) -> Response {
    call_on(engine, DbName::Primary, 0, command)
}

fn ok(engine: &mut Engine, command: Command) -> Value {
    let response = call(engine, command);
    response
        .result()
        .cloned()
        .unwrap_or_else(|| panic!("command failed: {:?}", response))
}

fn create(engine: &mut Engine, parent: u64, node_type: NodeType, flag: SnapshotFlag) -> u64 {
    let result = ok(
        engine,
        Command::CreateNode {
            parent,
            node_type,
            snapshot_flag: flag,
        },
    );
    result["node_id"].as_u64().unwrap()
}

fn set_attr(engine: &mut Engine, node_id: u64, name: &str, cookie: u64, data: &str, flag: SnapshotFlag) {
    ok(
        engine,
        Command::SetAttribute {
            node_id,
            name: name.to_string(),
            cookie,
            data: data.as_bytes().to_vec(),
            attr_type: AttrType::String,
            snapshot_flag: flag,
        },
    );
}

fn get_attr(engine: &mut Engine, node_id: u64, name: &str) -> Response {
    call(
        engine,
        Command::GetAttribute {
            node_id,
            name: name.to_string(),
        },
    )
}

fn lock_command(timeout_us: u64) -> Command {
    Command::Lock {
        timeout: Duration::from_micros(timeout_us),
    }
}

fn all_nodes(engine: &mut Engine) -> Value {
    ok(
        engine,
        Command::ListNodes {
            type_min: NodeType::min(),
            type_max: NodeType::max(),
        },
    )
}

// =============================================================================
// Node Command Tests
// =============================================================================

#[test]
fn test_create_and_get_node() {
    let (_temp, mut engine) = setup_engine();

    let rack = create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::NotNeeded);
    let result = ok(&mut engine, Command::GetNode { node_id: rack });

    assert_eq!(rack, 10_000_000);
    assert_eq!(
        result["r_node"],
        json!({"parent": 0, "node_id": 10000000, "type": "RACK"})
    );
}

#[test]
fn test_create_under_missing_parent() {
    let (_temp, mut engine) = setup_engine();

    let response = call(
        &mut engine,
        Command::CreateNode {
            parent: 1234,
            node_type: NodeType::Rack,
            snapshot_flag: SnapshotFlag::NotNeeded,
        },
    );

    assert_eq!(response.error_code(), Some(-32001));
}

#[test]
fn test_create_with_existing_id_reports_not_created() {
    let (_temp, mut engine) = setup_engine();
    let command = Command::CreateNodeWithId {
        parent: ROOT_NODE_ID,
        node_id: 20_000_000,
        node_type: NodeType::Pod,
        snapshot_flag: SnapshotFlag::NotNeeded,
    };

    let first = ok(&mut engine, command.clone());
    let second = ok(&mut engine, command);

    assert_eq!(first, json!({"node_id": 20000000, "created": true}));
    assert_eq!(second, json!({"node_id": 20000000, "created": false}));
}

#[test]
fn test_destroy_subtree() {
    let (_temp, mut engine) = setup_engine();
    let drawer = create(&mut engine, ROOT_NODE_ID, NodeType::Drawer, SnapshotFlag::NotNeeded);
    let bmc = create(&mut engine, drawer, NodeType::Bmc, SnapshotFlag::NotNeeded);

    let result = ok(&mut engine, Command::DestroyNode { node_id: drawer });

    assert_eq!(result["removed"], json!(2));
    assert_eq!(
        call(&mut engine, Command::GetNode { node_id: bmc }).error_code(),
        Some(-32001)
    );
}

#[test]
fn test_destroy_root_and_missing() {
    let (_temp, mut engine) = setup_engine();

    let root = ok(&mut engine, Command::DestroyNode { node_id: ROOT_NODE_ID });
    assert_eq!(root["removed"], json!(0));

    let missing = call(&mut engine, Command::DestroyNode { node_id: 77 });
    assert_eq!(missing.error_code(), Some(-32001));
}

#[test]
fn test_list_subnode_and_list_node() {
    let (_temp, mut engine) = setup_engine();
    let drawer = create(&mut engine, ROOT_NODE_ID, NodeType::Drawer, SnapshotFlag::NotNeeded);
    let fan = create(&mut engine, drawer, NodeType::Fan, SnapshotFlag::NotNeeded);
    create(&mut engine, drawer, NodeType::Psu, SnapshotFlag::NotNeeded);

    let fans = ok(
        &mut engine,
        Command::ListChildren {
            node_id: drawer,
            type_filter: Some(NodeType::Fan),
        },
    );
    assert_eq!(fans["r_nodes"].as_array().unwrap().len(), 1);
    assert_eq!(fans["r_nodes"][0]["node_id"], json!(fan));

    let psus = ok(
        &mut engine,
        Command::ListNodes {
            type_min: NodeType::Psu,
            type_max: NodeType::Psu,
        },
    );
    assert_eq!(psus["r_nodes"].as_array().unwrap().len(), 1);
    assert_eq!(psus["r_nodes"][0]["type"], json!("PSU"));
}

// =============================================================================
// Attribute Command Tests
// =============================================================================

#[test]
fn test_set_get_attribute() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);

    set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.5", SnapshotFlag::NotNeeded);
    let result = get_attr(&mut engine, bmc, "ipv4_addr").result().cloned().unwrap();

    assert_eq!(
        result["r_attr"],
        json!({"cookie": 1, "data": "10.0.0.5", "type": "string"})
    );
}

#[test]
fn test_get_missing_attribute() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);

    assert_eq!(get_attr(&mut engine, bmc, "nope").error_code(), Some(-32002));
}

#[test]
fn test_remove_missing_attribute_logs_nothing() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::Needed);
    let log_len = engine.database(DbName::Primary).persistence().log_len();

    let result = ok(
        &mut engine,
        Command::RemoveAttribute {
            node_id: bmc,
            name: "absent".to_string(),
        },
    );

    assert_eq!(result["removed"], json!(false));
    assert_eq!(
        engine.database(DbName::Primary).persistence().log_len(),
        log_len
    );
}

#[test]
fn test_remove_attribute() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "state", 0, "on", SnapshotFlag::NotNeeded);

    let result = ok(
        &mut engine,
        Command::RemoveAttribute {
            node_id: bmc,
            name: "state".to_string(),
        },
    );

    assert_eq!(result["removed"], json!(true));
    assert_eq!(get_attr(&mut engine, bmc, "state").error_code(), Some(-32002));
}

#[test]
fn test_list_attrs_by_cookie_mask() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
    let fan = create(&mut engine, ROOT_NODE_ID, NodeType::Fan, SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "ipv4_addr", 0b101, "10.0.0.5", SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "state", 0b001, "on", SnapshotFlag::NotNeeded);
    set_attr(&mut engine, fan, "rpm", 0b100, "3000", SnapshotFlag::NotNeeded);

    let result = ok(&mut engine, Command::ListAttributesByCookie { mask: 0b100 });
    let attrs = result["r_attrs"].as_array().unwrap();

    assert_eq!(attrs.len(), 2);
    assert_eq!(
        attrs[0],
        json!({"node": bmc, "cookie": 5, "name": "ipv4_addr", "data": "10.0.0.5", "type": "string"})
    );
    assert_eq!(attrs[1]["name"], json!("rpm"));
}

#[test]
fn test_list_attrs_by_node() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "a", 0, "1", SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "b", 0, "2", SnapshotFlag::NotNeeded);

    let result = ok(&mut engine, Command::ListAttributes { node_id: bmc });
    let names: Vec<&str> = result["r_attrs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();

    assert_eq!(names, vec!["a", "b"]);
}

// =============================================================================
// Lock Tests
// =============================================================================

#[test]
fn test_lock_timeout_above_ceiling_rejected() {
    let (_temp, mut engine) = setup_engine();

    let response = call(&mut engine, lock_command(6_000_000));

    assert_eq!(response.error_code(), Some(-32602));
    assert_eq!(engine.lock_holder(), None);
}

#[test]
fn test_lock_and_unlock() {
    let (_temp, mut engine) = setup_engine();

    let result = ok(&mut engine, lock_command(1_000_000));
    let id = result["r_lock_id"].as_u64().unwrap();
    assert_eq!(id, 1);
    assert_eq!(engine.lock_holder(), Some(1));

    let unlock = call_on(&mut engine, DbName::Primary, id, Command::Unlock);
    assert!(unlock.is_ok());
    assert_eq!(engine.lock_holder(), None);
}

#[test]
fn test_unlock_by_non_holder() {
    let (_temp, mut engine) = setup_engine();
    ok(&mut engine, lock_command(1_000_000));

    let response = call_on(&mut engine, DbName::Primary, 0, Command::Unlock);

    assert_eq!(response.error_code(), Some(-32004));
    assert_eq!(engine.lock_holder(), Some(1));
}

#[test]
fn test_second_lock_waits_for_unlock() {
    let (_temp, mut engine) = setup_engine();
    let now = Instant::now();

    let first = engine.submit(
        Request::new(1, DbName::Primary, 0, lock_command(1_000_000)),
        Some(addr(5001)),
        now,
    );
    assert_eq!(first[0].response.result().unwrap()["r_lock_id"], json!(1));

    // Another client's lock is parked
    let parked = engine.submit(
        Request::new(2, DbName::Primary, 0, lock_command(1_000_000)),
        Some(addr(5002)),
        now,
    );
    assert!(parked.is_empty());
    assert_eq!(engine.pending_commands(), 1);

    // The holder keeps working under its id
    let held = engine.submit(
        Request::new(
            3,
            DbName::Primary,
            1,
            Command::CreateNode {
                parent: ROOT_NODE_ID,
                node_type: NodeType::Rack,
                snapshot_flag: SnapshotFlag::NotNeeded,
            },
        ),
        Some(addr(5001)),
        now,
    );
    assert_eq!(held.len(), 1);
    assert!(held[0].response.is_ok());

    // Unlock answers the holder, then releases the parked lock
    let released = engine.submit(
        Request::new(4, DbName::Primary, 1, Command::Unlock),
        Some(addr(5001)),
        now,
    );
    assert_eq!(released.len(), 2);
    assert_eq!(released[0].to, Some(addr(5001)));
    assert_eq!(released[1].to, Some(addr(5002)));
    assert_eq!(released[1].response.id, Some(2));
    assert_eq!(released[1].response.result().unwrap()["r_lock_id"], json!(2));
    assert_eq!(engine.lock_holder(), Some(2));
    assert_eq!(engine.pending_commands(), 0);
}

#[test]
fn test_unlocked_reads_are_not_blocked() {
    let (_temp, mut engine) = setup_engine();
    ok(&mut engine, lock_command(1_000_000));

    let response = call(&mut engine, Command::GetNode { node_id: ROOT_NODE_ID });

    assert!(response.is_ok());
}

#[test]
fn test_lock_expires_on_tick() {
    let (_temp, mut engine) = setup_engine();
    let start = Instant::now();

    engine.submit(
        Request::new(1, DbName::Primary, 0, lock_command(1_000)),
        Some(addr(5001)),
        start,
    );
    let parked = engine.submit(
        Request::new(2, DbName::Primary, 0, lock_command(1_000)),
        Some(addr(5002)),
        start,
    );
    assert!(parked.is_empty());

    let replies = engine.tick(start + Duration::from_millis(10));

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].to, Some(addr(5002)));
    assert_eq!(replies[0].response.result().unwrap()["r_lock_id"], json!(2));
}

#[test]
fn test_stale_lock_id_rejected() {
    let (_temp, mut engine) = setup_engine();

    let response = call_on(
        &mut engine,
        DbName::Primary,
        5,
        Command::GetNode { node_id: ROOT_NODE_ID },
    );

    assert_eq!(response.error_code(), Some(-32000));
}

#[test]
fn test_expired_holder_id_becomes_stale() {
    let (_temp, mut engine) = setup_engine();
    let start = Instant::now();

    for _ in 0..2 {
        let replies = engine.submit(
            Request::new(1, DbName::Primary, 0, lock_command(1_000)),
            None,
            start,
        );
        assert!(replies[0].response.is_ok());
        engine.tick(start + Duration::from_millis(5));
    }
    for _ in 0..2 {
        let replies = engine.submit(
            Request::new(1, DbName::Primary, 0, lock_command(1_000)),
            None,
            start + Duration::from_millis(5),
        );
        assert!(replies[0].response.is_ok());
        engine.tick(start + Duration::from_millis(10));
    }

    // Ids 1..=4 issued; 1 is too old now
    let replies = engine.submit(
        Request::new(9, DbName::Primary, 1, Command::GetNode { node_id: ROOT_NODE_ID }),
        None,
        start + Duration::from_millis(10),
    );
    assert_eq!(replies[0].response.error_code(), Some(-32000));
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_bmc_attribute_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let bmc;
    {
        let mut engine = open_engine(&temp);
        bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
        set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.5", SnapshotFlag::Needed);
    }

    let mut engine = open_engine(&temp);
    let result = get_attr(&mut engine, bmc, "ipv4_addr").result().cloned().unwrap();

    assert_eq!(result["r_attr"]["cookie"], json!(1));
    assert_eq!(result["r_attr"]["data"], json!("10.0.0.5"));

    // Second reopen reads the snapshot written by the first
    drop(engine);
    let mut engine = open_engine(&temp);
    assert!(get_attr(&mut engine, bmc, "ipv4_addr").is_ok());
}

#[test]
fn test_bmc_attribute_survives_snapshot_threshold() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .snapshot_threshold(2)
        .log_sync_strategy(LogSyncStrategy::EveryWrite)
        .build();
    let bmc;
    {
        let mut engine = Engine::open(config.clone()).unwrap();
        bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::Needed);
        set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.5", SnapshotFlag::Needed);
        assert_eq!(
            engine.database(DbName::Primary).persistence().snapshots_taken(),
            1
        );
    }

    let mut engine = Engine::open(config).unwrap();
    let result = get_attr(&mut engine, bmc, "ipv4_addr").result().cloned().unwrap();
    assert_eq!(result["r_attr"]["data"], json!("10.0.0.5"));
}

#[test]
fn test_transient_state_is_lost() {
    let temp = TempDir::new().unwrap();
    let bmc;
    {
        let mut engine = open_engine(&temp);
        bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
        set_attr(&mut engine, bmc, "scratch", 0, "x", SnapshotFlag::NotNeeded);
    }

    let mut engine = open_engine(&temp);
    assert_eq!(
        call(&mut engine, Command::GetNode { node_id: bmc }).error_code(),
        Some(-32001)
    );
}

#[test]
fn test_promoted_ancestors_survive_replay() {
    let temp = TempDir::new().unwrap();
    let (rack, drawer, bmc);
    {
        let mut engine = open_engine(&temp);
        rack = create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::NotNeeded);
        drawer = create(&mut engine, rack, NodeType::Drawer, SnapshotFlag::NotNeeded);
        bmc = create(&mut engine, drawer, NodeType::Bmc, SnapshotFlag::Needed);
    }

    let mut engine = open_engine(&temp);
    let result = ok(&mut engine, Command::GetNode { node_id: bmc });
    assert_eq!(result["r_node"]["parent"], json!(drawer));

    let result = ok(&mut engine, Command::GetNode { node_id: drawer });
    assert_eq!(result["r_node"]["parent"], json!(rack));
}

#[test]
fn test_replay_reproduces_persistent_state() {
    let temp = TempDir::new().unwrap();
    let (nodes_before, attrs_before);
    {
        let mut engine = open_engine(&temp);
        let rack = create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::Needed);
        let drawer = create(&mut engine, rack, NodeType::Drawer, SnapshotFlag::Needed);
        let sled = create(&mut engine, drawer, NodeType::Sled, SnapshotFlag::ForceAll);
        let doomed = create(&mut engine, rack, NodeType::Drawer, SnapshotFlag::Needed);

        set_attr(&mut engine, sled, "serial", 2, "SN-1", SnapshotFlag::NotNeeded);
        set_attr(&mut engine, drawer, "slots", 4, "8", SnapshotFlag::Needed);
        set_attr(&mut engine, drawer, "slots", 4, "12", SnapshotFlag::Needed);
        set_attr(&mut engine, rack, "temp", 1, "40", SnapshotFlag::Needed);
        ok(
            &mut engine,
            Command::RemoveAttribute {
                node_id: rack,
                name: "temp".to_string(),
            },
        );
        ok(&mut engine, Command::DestroyNode { node_id: doomed });

        nodes_before = all_nodes(&mut engine);
        attrs_before = ok(&mut engine, Command::ListAttributesByCookie { mask: 0 });
    }

    let mut engine = open_engine(&temp);
    assert_eq!(all_nodes(&mut engine), nodes_before);
    assert_eq!(
        ok(&mut engine, Command::ListAttributesByCookie { mask: 0 }),
        attrs_before
    );
    assert!(!engine.is_degraded());
}

#[test]
fn test_log_failure_degrades_but_keeps_mutation() {
    let temp = TempDir::new().unwrap();

    // A non-empty directory in place of the previous log generation makes
    // every log rotation fail
    let blocker = temp.path().join("primary.log.1");
    fs::create_dir(&blocker).unwrap();
    fs::write(blocker.join("keep"), b"x").unwrap();

    let config = Config::builder()
        .data_dir(temp.path())
        .log_sync_strategy(LogSyncStrategy::EveryWrite)
        .snapshot_threshold(1)
        .build();
    let mut engine = Engine::open(config).unwrap();
    assert!(!engine.is_degraded());

    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::Needed);
    assert!(engine.is_degraded());
    assert!(engine.database(DbName::Primary).is_degraded());
    assert!(!engine.database(DbName::Pod).is_degraded());

    set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.5", SnapshotFlag::Needed);
    let got = get_attr(&mut engine, bmc, "ipv4_addr");
    assert_eq!(got.result().unwrap()["r_attr"]["data"], json!("10.0.0.5"));

    let node = ok(&mut engine, Command::GetNode { node_id: bmc });
    assert_eq!(node["r_node"]["node_id"], json!(bmc));
}

#[test]
fn test_allocator_continues_after_reopen() {
    let temp = TempDir::new().unwrap();
    let first;
    {
        let mut engine = open_engine(&temp);
        first = create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::Needed);
    }

    let mut engine = open_engine(&temp);
    let second = create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::Needed);
    assert_eq!(second, first + 1);
}

// =============================================================================
// Notification Tests
// =============================================================================

#[test]
fn test_node_create_notification() {
    let (_temp, mut engine) = setup_engine();
    let result = ok(
        &mut engine,
        Command::Subscribe {
            filter: SubscriptionFilter::Node {
                kind: EventKind::NodeCreated,
                type_min: NodeType::Bmc,
                type_max: NodeType::Bmc,
            },
            target: SubscriberTarget { pid: 1, port: 9100 },
        },
    );
    assert_eq!(result["r_sub"], json!(1));

    create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::NotNeeded);
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);

    let notifications = engine.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].target.port, 9100);

    let payload: Value = serde_json::from_slice(&notifications[0].payload).unwrap();
    assert_eq!(payload["method"], json!("node_create"));
    assert_eq!(payload["params"]["node_id"], json!(bmc));
    assert_eq!(payload["params"]["db_name"], json!("primary"));

    assert!(engine.take_notifications().is_empty());
}

#[test]
fn test_destroy_notifies_each_removed_node() {
    let (_temp, mut engine) = setup_engine();
    let drawer = create(&mut engine, ROOT_NODE_ID, NodeType::Drawer, SnapshotFlag::NotNeeded);
    let bmc = create(&mut engine, drawer, NodeType::Bmc, SnapshotFlag::NotNeeded);
    ok(
        &mut engine,
        Command::Subscribe {
            filter: SubscriptionFilter::Node {
                kind: EventKind::NodeDestroyed,
                type_min: NodeType::min(),
                type_max: NodeType::max(),
            },
            target: SubscriberTarget { pid: 1, port: 9200 },
        },
    );

    ok(&mut engine, Command::DestroyNode { node_id: drawer });

    let ids: Vec<Value> = engine
        .take_notifications()
        .iter()
        .map(|n| serde_json::from_slice::<Value>(&n.payload).unwrap())
        .map(|v| v["params"]["node_id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(bmc), json!(drawer)]);
}

#[test]
fn test_attribute_notification_actions() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
    ok(
        &mut engine,
        Command::Subscribe {
            filter: SubscriptionFilter::Attribute {
                node_id: bmc,
                name_prefix: "ipv4".to_string(),
            },
            target: SubscriberTarget { pid: 1, port: 9300 },
        },
    );

    set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.5", SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.6", SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "state", 0, "on", SnapshotFlag::NotNeeded);
    ok(
        &mut engine,
        Command::RemoveAttribute {
            node_id: bmc,
            name: "ipv4_addr".to_string(),
        },
    );

    let actions: Vec<Value> = engine
        .take_notifications()
        .iter()
        .map(|n| serde_json::from_slice::<Value>(&n.payload).unwrap())
        .map(|v| v["params"]["action"].clone())
        .collect();
    assert_eq!(actions, vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_unsubscribe_stops_notifications() {
    let (_temp, mut engine) = setup_engine();
    let sub = ok(
        &mut engine,
        Command::Subscribe {
            filter: SubscriptionFilter::Node {
                kind: EventKind::NodeCreated,
                type_min: NodeType::min(),
                type_max: NodeType::max(),
            },
            target: SubscriberTarget { pid: 1, port: 9400 },
        },
    )["r_sub"]
        .as_u64()
        .unwrap();

    let removed = ok(&mut engine, Command::Unsubscribe { sub });
    assert_eq!(removed["removed"], json!(true));

    create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::NotNeeded);
    assert!(engine.take_notifications().is_empty());
}

// =============================================================================
// Database Separation / Diagnostics Tests
// =============================================================================

#[test]
fn test_databases_are_independent() {
    let (_temp, mut engine) = setup_engine();

    let primary = create(&mut engine, ROOT_NODE_ID, NodeType::Rack, SnapshotFlag::NotNeeded);
    let response = call_on(
        &mut engine,
        DbName::Pod,
        0,
        Command::GetNode { node_id: primary },
    );
    assert_eq!(response.error_code(), Some(-32001));

    let pod_result = call_on(
        &mut engine,
        DbName::Pod,
        0,
        Command::CreateNode {
            parent: ROOT_NODE_ID,
            node_type: NodeType::PodManager,
            snapshot_flag: SnapshotFlag::NotNeeded,
        },
    );
    assert_eq!(pod_result.result().unwrap()["node_id"], json!(primary));
}

#[test]
fn test_dump_writes_file() {
    let (_temp, mut engine) = setup_engine();
    let bmc = create(&mut engine, ROOT_NODE_ID, NodeType::Bmc, SnapshotFlag::NotNeeded);
    set_attr(&mut engine, bmc, "ipv4_addr", 1, "10.0.0.5", SnapshotFlag::NotNeeded);

    let result = ok(&mut engine, Command::DumpNodes);

    assert_eq!(result["nodes"], json!(2));
    assert_eq!(result["attributes"], json!(1));
    let text = fs::read_to_string(result["path"].as_str().unwrap()).unwrap();
    assert!(text.contains("[nodes]"));
    assert!(text.contains("ipv4_addr"));
    assert!(text.contains("BMC"));
}

#[test]
fn test_undecodable_datagram_answered() {
    let (_temp, mut engine) = setup_engine();

    let replies = engine.handle_datagram(b"{oops", Some(addr(6000)), Instant::now());

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].to, Some(addr(6000)));
    assert_eq!(replies[0].response.id, None);
    assert_eq!(replies[0].response.error_code(), Some(-32700));
}

#[test]
fn test_datagram_round_trip() {
    let (_temp, mut engine) = setup_engine();
    let bytes = serde_json::to_vec(&json!({
        "id": 77,
        "method": "node_create",
        "params": {"db_name": "pod", "lock_id": 0, "node_id": 0, "p_parent": 0, "p_type": "POD"}
    }))
    .unwrap();

    let replies = engine.handle_datagram(&bytes, None, Instant::now());

    assert_eq!(replies[0].response.id, Some(77));
    assert_eq!(replies[0].response.result().unwrap()["node_id"], json!(10000000));
}
