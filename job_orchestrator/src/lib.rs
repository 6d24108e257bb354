pub mod engine;
pub mod scanner;

pub use engine::{entries_from_inputs, AnalysisEngine, EngineSettings};
pub use scanner::{HistoryScanner, ScanSettings};

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Ledger client error: {0}")]
    Ledger(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Analysis run cancelled before it started")]
    Cancelled,
}

impl From<overlap_core::CoreError> for OrchestratorError {
    fn from(err: overlap_core::CoreError) -> Self {
        OrchestratorError::InvalidInput(err.to_string())
    }
}

impl From<solana_client::LedgerError> for OrchestratorError {
    fn from(err: solana_client::LedgerError) -> Self {
        OrchestratorError::Ledger(err.to_string())
    }
}

impl From<config_manager::ConfigurationError> for OrchestratorError {
    fn from(err: config_manager::ConfigurationError) -> Self {
        OrchestratorError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
