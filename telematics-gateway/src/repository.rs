//! Repository contract (spec.md §4.4): persistence is an external
//! collaborator behind a trait, so the session handler and the DOUT1
//! controller depend on an interface rather than a concrete pool — the same
//! "depend on the trait, inject the concrete type" shape the teacher uses
//! for its `SharedState`/`SharedEngine` aliases.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use telematics_wire::Record;

use crate::error::GatewayResult;

/// One row of `dout1_state` per IMEI (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dout1State {
    pub last_zero_time: Option<i64>,
    pub active: bool,
    pub deactivate_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CommandStatus::Pending),
            "completed" => Some(CommandStatus::Completed),
            "failed" => Some(CommandStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandQueueEntry {
    pub id: i64,
    pub imei: String,
    pub command: String,
    pub status: CommandStatus,
    pub created_at: i64,
}

/// The fixed operation set from spec.md §4.4. Calls are synchronous from the
/// caller's point of view (no multi-statement transactions assumed) — a
/// per-IMEI lock is layered on top by [`Repository::dout1_lock`] so the read
/// -modify-write DOUT1 update stays safe under the "one writer per IMEI"
/// assumption from spec.md §5.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_gps(&self, imei: &str, record: &Record) -> GatewayResult<()>;

    async fn insert_io(
        &self,
        imei: &str,
        timestamp: i64,
        io_id: u16,
        value: u64,
    ) -> GatewayResult<()>;

    /// Ensures a `dout1_state` row exists for `imei` with default values,
    /// satisfying the invariant that a row exists for every IMEI ever seen.
    /// A no-op if the row already exists.
    async fn ensure_device(&self, imei: &str) -> GatewayResult<()>;

    async fn get_dout1_state(&self, imei: &str) -> GatewayResult<Option<Dout1State>>;

    async fn upsert_dout1_state(&self, imei: &str, state: Dout1State) -> GatewayResult<()>;

    /// Whether a `dout1_state` row exists for this IMEI — used by the
    /// operator API to distinguish "unknown device" (404) from "known,
    /// never seen a zero value yet".
    async fn device_known(&self, imei: &str) -> GatewayResult<bool>;

    async fn enqueue_command(&self, imei: &str, command: &str) -> GatewayResult<i64>;

    /// Pending commands for `imei`, FIFO (ordered by `id`).
    async fn list_pending_commands(&self, imei: &str) -> GatewayResult<Vec<CommandQueueEntry>>;

    async fn mark_command(&self, id: i64, status: CommandStatus) -> GatewayResult<()>;

    /// A per-IMEI mutex, held around the DOUT1 read-modify-write section.
    /// The device protocol itself guarantees at most one open connection
    /// per IMEI, so this lock only needs to protect against the HTTP API's
    /// `POST /dout1_control` racing a live session — the same per-key-lock
    /// shape the teacher uses for `SeqTracker`'s per-`node_id` bookkeeping
    /// in `uwb_hub.rs`, generalized from "per node" to "per IMEI".
    async fn dout1_lock(&self, imei: &str) -> Arc<Mutex<()>>;
}
