//! BackendGateway trait - the simulation backend as seen by the sync engine
//!
//! Request/response shapes only; transport is up to the implementation.

use crate::{ControlAck, Sample, StatusReport, TransportError};

/// Asynchronous access to the simulation backend
///
/// Every call either succeeds with typed data or fails with a [`TransportError`].
/// Implementations must not retry on their own; retry policy belongs to the engine.
#[trait_variant::make(BackendGateway: Send)]
pub trait LocalBackendGateway {
    /// Human-readable endpoint description (used for logging)
    fn endpoint(&self) -> &str;

    /// Start the simulation (`POST /start`)
    async fn start(&self) -> Result<ControlAck, TransportError>;

    /// Stop the simulation (`POST /stop`)
    async fn stop(&self) -> Result<ControlAck, TransportError>;

    /// Read the run flag (`GET /status`)
    async fn status(&self) -> Result<StatusReport, TransportError>;

    /// Full recorded series (`GET /results`)
    async fn fetch_all(&self) -> Result<Vec<Sample>, TransportError>;

    /// Capped tail of the series (`GET /results/latest`)
    async fn fetch_latest(&self) -> Result<Vec<Sample>, TransportError>;
}
