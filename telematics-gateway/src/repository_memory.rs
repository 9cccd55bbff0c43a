//! In-memory `Repository` for tests — no SQLite file, no migrations, same
//! contract. Mirrors the shape of the teacher's in-process `SharedState`
//! used in its own test modules.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use telematics_wire::Record;

use crate::error::GatewayResult;
use crate::repository::{CommandQueueEntry, CommandStatus, Dout1State, Repository};

#[derive(Default)]
struct Inner {
    gps: Vec<(String, Record)>,
    io: Vec<(String, i64, u16, u64)>,
    dout1: HashMap<String, Dout1State>,
    commands: Vec<CommandQueueEntry>,
    next_command_id: i64,
    locks: HashMap<String, Arc<Mutex<()>>>,
}

pub struct MemoryRepository {
    inner: Mutex<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_command_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_gps(&self, imei: &str, record: &Record) -> GatewayResult<()> {
        self.inner.lock().await.gps.push((imei.to_string(), record.clone()));
        Ok(())
    }

    async fn insert_io(
        &self,
        imei: &str,
        timestamp: i64,
        io_id: u16,
        value: u64,
    ) -> GatewayResult<()> {
        self.inner.lock().await.io.push((imei.to_string(), timestamp, io_id, value));
        Ok(())
    }

    async fn ensure_device(&self, imei: &str) -> GatewayResult<()> {
        self.inner
            .lock()
            .await
            .dout1
            .entry(imei.to_string())
            .or_insert_with(Dout1State::default);
        Ok(())
    }

    async fn get_dout1_state(&self, imei: &str) -> GatewayResult<Option<Dout1State>> {
        Ok(self.inner.lock().await.dout1.get(imei).copied())
    }

    async fn upsert_dout1_state(&self, imei: &str, state: Dout1State) -> GatewayResult<()> {
        self.inner.lock().await.dout1.insert(imei.to_string(), state);
        Ok(())
    }

    async fn device_known(&self, imei: &str) -> GatewayResult<bool> {
        Ok(self.inner.lock().await.dout1.contains_key(imei))
    }

    async fn enqueue_command(&self, imei: &str, command: &str) -> GatewayResult<i64> {
        let mut guard = self.inner.lock().await;
        let id = guard.next_command_id;
        guard.next_command_id += 1;
        guard.commands.push(CommandQueueEntry {
            id,
            imei: imei.to_string(),
            command: command.to_string(),
            status: CommandStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
        });
        Ok(id)
    }

    async fn list_pending_commands(&self, imei: &str) -> GatewayResult<Vec<CommandQueueEntry>> {
        Ok(self
            .inner
            .lock()
            .await
            .commands
            .iter()
            .filter(|c| c.imei == imei && c.status == CommandStatus::Pending)
            .cloned()
            .collect())
    }

    async fn mark_command(&self, id: i64, status: CommandStatus) -> GatewayResult<()> {
        let mut guard = self.inner.lock().await;
        if let Some(entry) = guard.commands.iter_mut().find(|c| c.id == id) {
            entry.status = status;
        }
        Ok(())
    }

    async fn dout1_lock(&self, imei: &str) -> Arc<Mutex<()>> {
        self.inner
            .lock()
            .await
            .locks
            .entry(imei.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
