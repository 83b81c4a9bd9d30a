use thiserror::Error;

/// Rejected configuration, caught before anything enters the pipeline
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("order size must be positive and finite, got {0}")]
    InvalidOrderSize(f64),

    #[error("moving average window must be at least 1, got {0}")]
    InvalidWindow(usize),

    #[error("yield threshold must be a non-negative finite percentage, got {0}")]
    InvalidYieldThreshold(f64),

    #[error("{0} interval must be greater than zero")]
    InvalidInterval(&'static str),

    #[error("history cap {cap} must exceed the moving average window {window}")]
    InvalidHistoryCap { cap: usize, window: usize },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Failures reported by a price feed source
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("price feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed price feed payload: {0}")]
    Malformed(String),

    #[error("price feed already started")]
    AlreadyStarted,
}

/// Failures of the order execution collaborator
///
/// These never stop the pipeline; they are surfaced as notifications.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("no usable reference price for {0}")]
    NoPrice(String),

    #[error("swap quote failed: {0}")]
    Quote(String),

    #[error("live swap execution is delegated to an external signer: {0}")]
    Delegated(String),
}
