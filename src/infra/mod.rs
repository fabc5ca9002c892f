//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod engine_process;
pub mod error;
pub mod follow_client;
pub mod http;
pub mod telemetry;
