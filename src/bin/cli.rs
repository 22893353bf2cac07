//! memdb CLI Client
//!
//! Command-line interface for interacting with a memdb server.

use std::net::UdpSocket;
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use memdb::protocol::{decode_response, encode_request, Command, Request};
use memdb::store::{AttrType, NodeType, SnapshotFlag, ROOT_NODE_ID};
use memdb::DbName;

/// memdb CLI
#[derive(Parser, Debug)]
#[command(name = "memdb-cli")]
#[command(about = "CLI for the memdb hierarchical database")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7777")]
    server: String,

    /// Database to address (primary or pod)
    #[arg(short, long, default_value = "primary")]
    db: DbName,

    /// Lock id to run under (0 = none)
    #[arg(short, long, default_value = "0")]
    lock_id: u64,

    /// Reply timeout in milliseconds
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a node
    Create {
        /// Node type name (e.g. RACK, BMC)
        node_type: NodeType,

        /// Parent node id
        #[arg(short, long, default_value_t = ROOT_NODE_ID)]
        parent: u64,

        /// Use this id instead of the next free one
        #[arg(long)]
        id: Option<u64>,

        /// Persist the node (1) or the node with all attributes (2)
        #[arg(short, long, default_value = "0")]
        flag: u8,
    },

    /// Destroy a node and its subtree
    Destroy { node_id: u64 },

    /// Show one node
    GetNode { node_id: u64 },

    /// List direct children
    Children {
        node_id: u64,

        /// Only children of this type
        #[arg(short = 't', long)]
        node_type: Option<NodeType>,
    },

    /// List nodes in a type range
    List {
        #[arg(default_value = "RMM")]
        type_min: NodeType,

        #[arg(default_value = "MISC")]
        type_max: NodeType,
    },

    /// Set an attribute
    Set {
        node_id: u64,
        name: String,
        value: String,

        #[arg(short, long, default_value = "0")]
        cookie: u64,

        #[arg(short = 't', long, default_value = "string")]
        attr_type: AttrType,

        #[arg(short, long, default_value = "0")]
        flag: u8,
    },

    /// Read an attribute
    Get { node_id: u64, name: String },

    /// Remove an attribute
    Remove { node_id: u64, name: String },

    /// List a node's attributes
    Attrs { node_id: u64 },

    /// List attributes whose cookie contains every bit of MASK
    Cookie { mask: u64 },

    /// Acquire the advisory lock
    Lock {
        /// Reservation in microseconds
        #[arg(default_value = "1000000")]
        timeout_us: u64,
    },

    /// Release the advisory lock given by --lock-id
    Unlock,

    /// Write the server-side dump file
    Dump,
}

impl Commands {
    fn into_command(self) -> memdb::Result<Command> {
        let command = match self {
            Commands::Create {
                node_type,
                parent,
                id,
                flag,
            } => {
                let snapshot_flag = SnapshotFlag::from_u8(flag)?;
                match id {
                    Some(node_id) => Command::CreateNodeWithId {
                        parent,
                        node_id,
                        node_type,
                        snapshot_flag,
                    },
                    None => Command::CreateNode {
                        parent,
                        node_type,
                        snapshot_flag,
                    },
                }
            }
            Commands::Destroy { node_id } => Command::DestroyNode { node_id },
            Commands::GetNode { node_id } => Command::GetNode { node_id },
            Commands::Children { node_id, node_type } => Command::ListChildren {
                node_id,
                type_filter: node_type,
            },
            Commands::List { type_min, type_max } => Command::ListNodes { type_min, type_max },
            Commands::Set {
                node_id,
                name,
                value,
                cookie,
                attr_type,
                flag,
            } => Command::SetAttribute {
                node_id,
                name,
                cookie,
                data: value.into_bytes(),
                attr_type,
                snapshot_flag: SnapshotFlag::from_u8(flag)?,
            },
            Commands::Get { node_id, name } => Command::GetAttribute { node_id, name },
            Commands::Remove { node_id, name } => Command::RemoveAttribute { node_id, name },
            Commands::Attrs { node_id } => Command::ListAttributes { node_id },
            Commands::Cookie { mask } => Command::ListAttributesByCookie { mask },
            Commands::Lock { timeout_us } => Command::Lock {
                timeout: Duration::from_micros(timeout_us),
            },
            Commands::Unlock => Command::Unlock,
            Commands::Dump => Command::DumpNodes,
        };
        Ok(command)
    }
}

fn run(args: Args) -> memdb::Result<bool> {
    let id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(1);
    let request = Request::new(id, args.db, args.lock_id, args.command.into_command()?);

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(Duration::from_millis(args.timeout_ms)))?;
    socket.send_to(&encode_request(&request)?, &args.server)?;

    let mut buf = vec![0u8; 64 * 1024];
    let (len, _) = socket.recv_from(&mut buf)?;
    let response = decode_response(&buf[..len])?;

    match &response.outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(result)?);
            Ok(true)
        }
        Err(error) => {
            eprintln!("error {}: {}", error.code, error.message);
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("memdb-cli: {}", e);
            ExitCode::FAILURE
        }
    }
}
