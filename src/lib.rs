pub mod batch;
pub mod config;
pub mod discrepancy;
pub mod error;
pub mod fetch;
pub mod history;
pub mod ingest;
pub mod output;
pub mod scoring;
pub mod service;
pub mod telemetry;

pub use error::{ContractError, ContractResult, ErrorBody, ErrorKind};
