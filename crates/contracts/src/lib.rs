//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the monitor: wire types received from
//! the simulation backend, the gateway and display sink traits, configuration and errors.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Sample timestamps are the backend's ISO-8601 strings and are never re-clocked locally
//! - Ordering of samples is the ordering of their timestamps

mod control;
mod display;
mod error;
mod gateway;
mod monitor_config;
mod sample;
mod sync_engine_config;

pub use control::*;
pub use display::*;
pub use error::*;
pub use gateway::{BackendGateway, LocalBackendGateway};
pub use monitor_config::*;
pub use sample::*;
pub use sync_engine_config::*;
