//! # Gateway
//!
//! Backend gateway implementations.
//!
//! Responsibilities:
//! - Talk to the simulation backend over HTTP (`HttpGateway`)
//! - Provide an in-memory backend for tests and offline runs (`MockGateway`)
//! - Classify transport failures into `TransportError`
//!
//! ## Feature Flags
//!
//! - `http`: Enable the reqwest-based HTTP gateway (default)

pub mod error;
pub mod mock_gateway;
pub mod simulation;

#[cfg(feature = "http")]
pub mod http_gateway;

pub use contracts::{BackendGateway, LocalBackendGateway};
pub use error::{GatewayError, Result};
pub use mock_gateway::{MockGateway, MockGatewayConfig, DEFAULT_LATEST_LIMIT};
pub use simulation::{pv_profile, spawn_simulation, MeterSource, METER_INTERVAL};

#[cfg(feature = "http")]
pub use http_gateway::HttpGateway;
