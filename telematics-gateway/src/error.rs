use thiserror::Error;
use telematics_wire::WireError;

/// Top-level gateway error taxonomy (spec.md §7). Library code returns
/// this; `main`'s glue uses `anyhow::Result` only where nothing downstream
/// needs to match on the variant.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("timed out waiting for device response")]
    Timeout,

    #[error("repository error: {0}")]
    Repository(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
