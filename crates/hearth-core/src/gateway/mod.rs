//! Control-protocol adapter to the inference server.
//!
//! [`RemoteGateway`] is the only seam through which the lifecycle services
//! talk to the outside world. [`ollama::OllamaGateway`] is the production
//! implementation; tests substitute an in-memory fake.

pub mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ollama::OllamaGateway;

/// One model as reported by the inference server's inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteModel {
    pub name: String,
    pub size: i64,
    pub family: String,
    pub format: String,
    pub parameters: String,
    pub quantization: String,
}

/// One progress event of a pull. A populated `error` ends the pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullProgress {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PullProgress {
    /// Completion percentage, when the event carries a positive total.
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                let completed = self.completed.unwrap_or(0).min(total);
                Some(completed as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }
}

/// Detailed metadata returned by `inspect`. Every field is best effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDetails {
    pub family: String,
    pub format: String,
    pub parameter_size: String,
    pub quantization: String,
    pub supports_embeddings: bool,
    pub embedding_dimensions: Option<i64>,
}

pub type PullStream = BoxStream<'static, Result<PullProgress, GatewayError>>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("inference server error: {0}")]
    Remote(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait RemoteGateway: Send + Sync + 'static {
    /// Every model currently installed on the inference server.
    async fn list_installed(&self) -> Result<Vec<RemoteModel>, GatewayError>;

    /// Start pulling `name`; the stream ends when the pull completes.
    async fn pull(&self, name: &str) -> Result<PullStream, GatewayError>;

    /// Remove the model artifact from the inference server.
    async fn delete(&self, name: &str) -> Result<(), GatewayError>;

    async fn inspect(&self, name: &str) -> Result<ModelDetails, GatewayError>;

    /// Names of models downloadable from the public library. The source of
    /// this listing is unstable; callers must tolerate failures.
    async fn list_catalog(&self) -> Result<Vec<String>, GatewayError>;
}
