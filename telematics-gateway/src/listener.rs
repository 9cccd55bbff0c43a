//! # listener
//!
//! Accepts TCP connections and spawns a [`crate::session`] task per
//! connection. Shuts down cleanly when the `watch` channel flips to `true`,
//! the same shutdown signal shape the teacher uses for its periodic tick
//! loops, generalized from an interval tick to `accept()`.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;
use crate::repository::Repository;
use crate::session;

pub async fn run(
    config: Arc<Config>,
    repo: Arc<dyn Repository>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = config.tcp_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("tcp listener bound on {addr}");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let repo = repo.clone();
                        let config = config.clone();
                        tokio::spawn(async move {
                            info!(%peer, "tcp: connection accepted");
                            session::handle(socket, repo, config).await;
                        });
                    }
                    Err(e) => {
                        warn!("tcp: accept error: {e}");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("tcp listener shutting down");
                    return Ok(());
                }
            }
        }
    }
}
