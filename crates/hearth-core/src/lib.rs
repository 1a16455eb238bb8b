//! Model lifecycle for the hearth chat backend.
//!
//! The catalog lives in SQLite ([`entities::AnyStore`]); the inference server
//! is reached through [`gateway::RemoteGateway`]. [`services::ModelServices`]
//! wires the state machine, synchronizer, download orchestrator and library
//! cache on top of both.

pub mod entities;
pub mod error;
pub mod gateway;
pub mod services;

pub use entities::AnyStore;
pub use error::{CatalogError, Result, Unavailability};
pub use gateway::{GatewayError, OllamaGateway, RemoteGateway};
pub use services::{ModelServices, ServiceOptions};
