use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchkeeperError {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
