//! SQLite-backed `Repository` (SPEC_FULL.md §4.4). `sqlx`'s compile-time
//! query macros aren't available without a live database at build time, so
//! this uses plain runtime `query`/`query_as` calls — the same tradeoff a
//! team makes before wiring up `sqlx::migrate!` verification into CI.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use telematics_wire::Record;

use crate::error::GatewayResult;
use crate::repository::{CommandQueueEntry, CommandStatus, Dout1State, Repository};

pub struct SqliteRepository {
    pool: SqlitePool,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl SqliteRepository {
    pub async fn connect(db_path: &str) -> GatewayResult<Self> {
        let url = format!("sqlite://{db_path}?mode=rwc");
        let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            sqlx::Error::Migrate(Box::new(e))
        })?;
        info!("repository: connected to {db_path}, migrations applied");
        Ok(Self {
            pool,
            locks: RwLock::new(HashMap::new()),
        })
    }

    fn row_to_entry(row: SqliteRow) -> CommandQueueEntry {
        CommandQueueEntry {
            id: row.get::<i64, _>("id"),
            imei: row.get::<String, _>("imei"),
            command: row.get::<String, _>("command"),
            status: CommandStatus::from_str(&row.get::<String, _>("status"))
                .unwrap_or(CommandStatus::Pending),
            created_at: row.get::<i64, _>("created_at"),
        }
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn insert_gps(&self, imei: &str, record: &Record) -> GatewayResult<()> {
        sqlx::query(
            "INSERT INTO gps_data \
             (imei, timestamp, priority, longitude, latitude, altitude, angle, satellites, speed, event_io_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(imei)
        .bind(record.timestamp)
        .bind(record.priority as i64)
        .bind(record.longitude)
        .bind(record.latitude)
        .bind(record.altitude as i64)
        .bind(record.angle as i64)
        .bind(record.satellites as i64)
        .bind(record.speed as i64)
        .bind(record.event_io_id as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_io(
        &self,
        imei: &str,
        timestamp: i64,
        io_id: u16,
        value: u64,
    ) -> GatewayResult<()> {
        // Stored as the i64 bit pattern; values >= 2^63 (only possible for
        // 8-byte IO elements) round-trip bit-for-bit but display signed.
        // See DESIGN.md's Open Question note — the source treats these as
        // unsigned throughout and so does the wire decoder; only the SQL
        // column type is narrower than u64.
        sqlx::query("INSERT INTO io_data (imei, timestamp, io_id, value) VALUES (?, ?, ?, ?)")
            .bind(imei)
            .bind(timestamp)
            .bind(io_id as i64)
            .bind(value as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ensure_device(&self, imei: &str) -> GatewayResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO dout1_state (imei, last_zero_time, active, deactivate_time) \
             VALUES (?, NULL, 0, NULL)",
        )
        .bind(imei)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_dout1_state(&self, imei: &str) -> GatewayResult<Option<Dout1State>> {
        let row = sqlx::query(
            "SELECT last_zero_time, active, deactivate_time FROM dout1_state WHERE imei = ?",
        )
        .bind(imei)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Dout1State {
            last_zero_time: r.get::<Option<i64>, _>("last_zero_time"),
            active: r.get::<i64, _>("active") != 0,
            deactivate_time: r.get::<Option<i64>, _>("deactivate_time"),
        }))
    }

    async fn upsert_dout1_state(&self, imei: &str, state: Dout1State) -> GatewayResult<()> {
        sqlx::query(
            "INSERT INTO dout1_state (imei, last_zero_time, active, deactivate_time) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(imei) DO UPDATE SET \
             last_zero_time = excluded.last_zero_time, \
             active = excluded.active, \
             deactivate_time = excluded.deactivate_time",
        )
        .bind(imei)
        .bind(state.last_zero_time)
        .bind(state.active as i64)
        .bind(state.deactivate_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn device_known(&self, imei: &str) -> GatewayResult<bool> {
        Ok(self.get_dout1_state(imei).await?.is_some())
    }

    async fn enqueue_command(&self, imei: &str, command: &str) -> GatewayResult<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO command_queue (imei, command, status, created_at) VALUES (?, ?, 'pending', ?)",
        )
        .bind(imei)
        .bind(command)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn list_pending_commands(&self, imei: &str) -> GatewayResult<Vec<CommandQueueEntry>> {
        let rows = sqlx::query(
            "SELECT id, imei, command, status, created_at FROM command_queue \
             WHERE imei = ? AND status = 'pending' ORDER BY id ASC",
        )
        .bind(imei)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Self::row_to_entry).collect())
    }

    async fn mark_command(&self, id: i64, status: CommandStatus) -> GatewayResult<()> {
        sqlx::query("UPDATE command_queue SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dout1_lock(&self, imei: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(imei) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(imei.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
