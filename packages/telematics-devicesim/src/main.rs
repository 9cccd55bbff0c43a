//! main.rs — Teltonika FMB device simulator entry point.
//!
//! Opens one TCP session per uplink batch, exactly as a real tracker would:
//! handshake, send a Codec 8E frame of `--records-per-batch` records along a
//! simulated route, read the acknowledgement, disconnect, sleep, repeat.

mod route_sim;
mod scenario;
mod tcp_tx;

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use route_sim::RouteSim;
use scenario::Scenario;
use tcp_tx::TcpTransmitter;

#[derive(Parser, Debug)]
#[command(name = "telematics-devicesim", about = "Teltonika FMB device simulator")]
struct Args {
    /// Gateway TCP address
    #[arg(long, default_value = "127.0.0.1:12345")]
    addr: String,
    /// Device IMEI to present at handshake
    #[arg(long, default_value = "123456789012345")]
    imei: String,
    /// Records per uplink batch
    #[arg(long, default_value_t = 5)]
    records_per_batch: u16,
    /// Seconds between each record inside a batch
    #[arg(long, default_value_t = 10.0)]
    step_secs: f64,
    /// Seconds between batches (sessions)
    #[arg(long, default_value_t = 30)]
    batch_interval_secs: u64,
    /// DOUT1 IO id to report (must match the gateway's DOUT1_IO_ID)
    #[arg(long, default_value_t = 179)]
    dout1_io_id: u16,
    /// Input scenario driving the DOUT1 value
    #[arg(long, value_enum, default_value_t = scenario::Scenario::Driving)]
    scenario: Scenario,
    /// Number of batches to send before exiting; 0 means run forever
    #[arg(long, default_value_t = 0)]
    batches: u64,
    /// Milliseconds to wait after the handshake for a queued command before
    /// giving up and sending the uplink frame
    #[arg(long, default_value_t = 300)]
    command_drain_wait_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    info!(imei = %args.imei, addr = %args.addr, "telematics-devicesim starting");

    let mut route = RouteSim::new(25.2797, 54.6872, 45.0, 40, args.dout1_io_id);
    let transmitter = TcpTransmitter::new(&args.imei, Duration::from_millis(args.command_drain_wait_ms));

    let mut batch_index: u64 = 0;
    loop {
        if args.batches > 0 && batch_index >= args.batches {
            info!("reached requested batch count, exiting");
            break;
        }

        route.set_dout1(args.scenario.dout1_value(batch_index));

        let now = chrono::Utc::now().timestamp();
        let records: Vec<_> = (0..args.records_per_batch)
            .map(|i| {
                let t = now + (i as f64 * args.step_secs) as i64;
                route.step(t, args.step_secs)
            })
            .collect();

        if let Err(e) = transmitter.send_batch(&args.addr, &records).await {
            error!("batch send failed: {e}");
        }

        batch_index += 1;
        tokio::time::sleep(Duration::from_secs(args.batch_interval_secs)).await;
    }
}
