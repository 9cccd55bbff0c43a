//! # session
//!
//! One Tokio task per accepted TCP connection, running the spec.md §4.6
//! sequence: IMEI handshake → command drain → uplink ingest → acknowledgement.
//! One uplink frame per session; the device reconnects for its next batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use telematics_wire::framer::{self, HEADER_LEN};
use telematics_wire::{codec12, codec8e};

use crate::config::Config;
use crate::dout1;
use crate::repository::{CommandStatus, Repository};

/// Runs the full session protocol on an accepted socket. Errors reading the
/// handshake or a malformed uplink frame end the session without panicking —
/// a telematics device retries on its own schedule.
pub async fn handle(mut socket: TcpStream, repo: Arc<dyn Repository>, config: Arc<Config>) {
    let imei = match read_imei_handshake(&mut socket).await {
        Ok(Some(imei)) => imei,
        Ok(None) => {
            debug!("session: rejected IMEI handshake");
            let _ = socket.write_all(&[0x00]).await;
            return;
        }
        Err(e) => {
            debug!("session: handshake read failed: {e}");
            return;
        }
    };

    if socket.write_all(&[0x01]).await.is_err() {
        return;
    }
    info!(imei = %imei, "session: accepted");

    if let Err(e) = repo.ensure_device(&imei).await {
        warn!(imei = %imei, "session: failed to ensure device row: {e}");
        return;
    }

    drain_commands(&mut socket, &repo, &imei, &config).await;

    match read_uplink_frame(&mut socket, &config).await {
        Ok(Some(data_field)) => {
            ingest_uplink(&mut socket, &repo, &imei, &config, &data_field).await;
        }
        Ok(None) => {
            debug!(imei = %imei, "session: connection closed before an uplink frame arrived");
        }
        Err(e) => {
            warn!(imei = %imei, "session: rejected uplink frame: {e}");
        }
    }
}

async fn read_imei_handshake(socket: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut len_buf = [0u8; 2];
    socket.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    socket.read_exact(&mut payload).await?;

    Ok(framer::parse_imei_payload(&payload))
}

/// Fetches pending commands and drives each through a Codec 12 request /
/// response round trip. A command that times out or comes back malformed is
/// marked failed; it does not abort the session (spec.md §4.6 step 2).
async fn drain_commands(socket: &mut TcpStream, repo: &Arc<dyn Repository>, imei: &str, config: &Config) {
    let pending = match repo.list_pending_commands(imei).await {
        Ok(p) => p,
        Err(e) => {
            warn!(imei = %imei, "session: failed to list pending commands: {e}");
            return;
        }
    };

    for entry in pending {
        let request = framer::encode_envelope(&codec12::build_command_data_field(entry.command.as_bytes()));
        if socket.write_all(&request).await.is_err() {
            let _ = repo.mark_command(entry.id, CommandStatus::Failed).await;
            continue;
        }

        let status = match timeout(
            Duration::from_secs(config.response_timeout_s),
            read_codec12_response(socket),
        )
        .await
        {
            Ok(Ok(response)) if response.success => CommandStatus::Completed,
            Ok(Ok(_)) => CommandStatus::Failed,
            Ok(Err(e)) => {
                debug!(imei = %imei, "session: malformed command response: {e}");
                CommandStatus::Failed
            }
            Err(_) => {
                debug!(imei = %imei, command = %entry.command, "session: command response timed out");
                CommandStatus::Failed
            }
        };

        if let Err(e) = repo.mark_command(entry.id, status).await {
            warn!(imei = %imei, "session: failed to record command status: {e}");
        }
    }
}

async fn read_codec12_response(socket: &mut TcpStream) -> std::io::Result<codec12::CommandResponse> {
    let mut header = [0u8; HEADER_LEN];
    socket.read_exact(&mut header).await?;
    let data_length = framer::peek_data_length(&header)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let mut rest = vec![0u8; data_length as usize + 4];
    socket.read_exact(&mut rest).await?;

    let mut frame = Vec::with_capacity(header.len() + rest.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&rest);

    let data_field = framer::decode_envelope(&frame)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    codec12::parse_response_data_field(data_field)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Reads one length-prefixed frame and validates its envelope, returning the
/// `data_field`. `Ok(None)` means the peer closed the connection cleanly
/// before sending a frame, which is not an error at this point in the session.
async fn read_uplink_frame(
    socket: &mut TcpStream,
    config: &Config,
) -> Result<Option<Vec<u8>>, telematics_wire::WireError> {
    let mut header = [0u8; HEADER_LEN];
    match timeout(Duration::from_secs(config.read_timeout_s), socket.read_exact(&mut header)).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) | Err(_) => return Ok(None),
    }

    let data_length = framer::peek_data_length(&header)?;
    let mut rest = vec![0u8; data_length as usize + 4];
    match timeout(Duration::from_secs(config.read_timeout_s), socket.read_exact(&mut rest)).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) | Err(_) => return Ok(None),
    }

    let mut frame = Vec::with_capacity(header.len() + rest.len());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&rest);

    let data_field = framer::decode_envelope(&frame)?.to_vec();
    Ok(Some(data_field))
}

async fn ingest_uplink(
    socket: &mut TcpStream,
    repo: &Arc<dyn Repository>,
    imei: &str,
    config: &Config,
    data_field: &[u8],
) {
    let now = chrono::Utc::now().timestamp();
    let (records, count) = match codec8e::decode_batch(data_field, now) {
        Ok(result) => result,
        Err(e) => {
            warn!(imei = %imei, hex = %hex::encode(data_field), "session: codec8e decode failed: {e}");
            return;
        }
    };

    let mut persisted_count: u32 = 0;
    for (index, record) in records.iter().enumerate() {
        if record.timestamp_substituted {
            warn!(imei = %imei, index, "session: record timestamp out of range, substituted wall-clock time");
        }

        if let Err(e) = repo.insert_gps(imei, record).await {
            warn!(imei = %imei, "session: failed to persist gps record: {e}");
            continue;
        }
        persisted_count += 1;

        for io in &record.ios {
            if let Err(e) = repo.insert_io(imei, record.timestamp, io.io_id, io.value).await {
                warn!(imei = %imei, "session: failed to persist io point: {e}");
            }
        }

        if let Some(value) = record.io_value(config.dout1_io_id) {
            apply_dout1(socket, repo, imei, config, record.timestamp, value).await;
        }
    }

    let ack = persisted_count.to_be_bytes();
    let _ = socket.write_all(&ack).await;
    info!(imei = %imei, count, persisted_count, "session: acknowledged uplink batch");
}

/// Serializes the DOUT1 read-modify-write under the IMEI's lock (spec.md §5)
/// and, if the policy decided a command is due, sends it inline on the same
/// socket before persisting the outcome.
async fn apply_dout1(
    socket: &mut TcpStream,
    repo: &Arc<dyn Repository>,
    imei: &str,
    config: &Config,
    t: i64,
    v: u64,
) {
    let lock = repo.dout1_lock(imei).await;
    let _guard = lock.lock().await;

    let state = match repo.get_dout1_state(imei).await {
        Ok(Some(s)) => s,
        Ok(None) => Default::default(),
        Err(e) => {
            warn!(imei = %imei, "session: failed to load dout1 state: {e}");
            return;
        }
    };

    let decision = dout1::decide(state, t, v, config);
    let mut succeeded = true;
    if let Some(command) = decision.command {
        succeeded = send_dout1_command(socket, config, command).await;
        if !succeeded {
            debug!(imei = %imei, "session: dout1 command failed, will retry on next observation");
        }
    }

    let next_state = dout1::resolve(decision, succeeded);
    if let Err(e) = repo.upsert_dout1_state(imei, next_state).await {
        warn!(imei = %imei, "session: failed to persist dout1 state: {e}");
    }
}

async fn send_dout1_command(socket: &mut TcpStream, config: &Config, command: dout1::Dout1Command) -> bool {
    let request = framer::encode_envelope(&codec12::build_command_data_field(
        command.as_command_str().as_bytes(),
    ));
    if socket.write_all(&request).await.is_err() {
        return false;
    }
    match timeout(Duration::from_secs(config.response_timeout_s), read_codec12_response(socket)).await {
        Ok(Ok(response)) => response.success,
        _ => false,
    }
}
