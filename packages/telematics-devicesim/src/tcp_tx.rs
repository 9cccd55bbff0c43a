//! tcp_tx.rs — TCP transmitter for one device session.
//!
//! A real tracker opens one TCP connection per uplink batch: handshake,
//! drains whatever queued commands the gateway sends right after the
//! handshake ack, sends one Codec 8E frame, reads the 4-byte record-count
//! acknowledgement, then disconnects. Errors are logged and the session is
//! abandoned rather than panicking — a device retries on its own schedule.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use telematics_wire::framer::{self, HEADER_LEN};
use telematics_wire::{codec12, codec8e, Record};

pub struct TcpTransmitter {
    imei: String,
    /// How long to wait for a queued command to arrive after the handshake
    /// before giving up and proceeding to the uplink frame — the gateway's
    /// `session.rs` sends queued commands inline, one at a time, before it
    /// ever reads the uplink frame, so a real device has to be prepared to
    /// see zero or more of them first.
    command_drain_wait: Duration,
}

impl TcpTransmitter {
    pub fn new(imei: &str, command_drain_wait: Duration) -> Self {
        Self {
            imei: imei.to_string(),
            command_drain_wait,
        }
    }

    /// Runs one full session against `addr`: handshake, drains any queued
    /// commands the gateway offers, sends `records`, and reads the ack.
    pub async fn send_batch(&self, addr: &str, records: &[Record]) -> std::io::Result<()> {
        let mut socket = TcpStream::connect(addr).await?;

        let handshake = framer::build_imei_handshake(&self.imei);
        socket.write_all(&handshake).await?;

        let mut accept = [0u8; 1];
        socket.read_exact(&mut accept).await?;
        if accept[0] != 0x01 {
            warn!(imei = %self.imei, "gateway rejected imei handshake");
            return Ok(());
        }

        self.drain_commands(&mut socket).await?;

        let data_field = codec8e::encode_batch(records);
        let frame = framer::encode_envelope(&data_field);
        socket.write_all(&frame).await?;

        let mut ack = [0u8; 4];
        socket.read_exact(&mut ack).await?;
        let accepted = u32::from_be_bytes(ack);
        info!(imei = %self.imei, sent = records.len(), accepted, "batch acknowledged");
        Ok(())
    }

    /// Peeks for a queued command after the handshake and answers each one
    /// in turn until the gateway stops sending them within
    /// `command_drain_wait`. A peek (rather than a consuming read) means a
    /// timeout leaves the socket untouched for the uplink frame that follows.
    async fn drain_commands(&self, socket: &mut TcpStream) -> std::io::Result<()> {
        loop {
            let mut probe = [0u8; 1];
            match timeout(self.command_drain_wait, socket.peek(&mut probe)).await {
                Ok(Ok(n)) if n > 0 => self.drain_one_command(socket).await?,
                _ => return Ok(()),
            }
        }
    }

    /// Responds to one queued Codec 12 command request with a fixed `OK` body.
    async fn drain_one_command(&self, socket: &mut TcpStream) -> std::io::Result<()> {
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
        let command = codec12::parse_command_data_field(data_field)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        debug!(imei = %self.imei, command = %command, "drained queued command");

        let response = framer::encode_envelope(&codec12::build_response_data_field("OK"));
        socket.write_all(&response).await?;
        Ok(())
    }
}
