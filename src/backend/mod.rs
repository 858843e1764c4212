pub mod http;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use url::Url;

use crate::engine::error::{ApiError, TransportError};
use crate::engine::model::{AudioInput, JobId, ResultArtifact};

/// Raw `data:` payloads of the progress channel, in transport order.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

#[derive(Debug, Clone)]
pub struct ClientContext {
    pub api_origin: Url,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ClientContext {
    pub fn new(api_origin: Url) -> Self {
        Self {
            api_origin,
            user_agent: concat!("dumu/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 180,
            connect_timeout_secs: 10,
        }
    }

    /// Resolves `api/...` against the origin, keeping any path prefix the origin has.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.api_origin.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
    }

    /// `api/<kind>/<job_id>` with the id percent-encoded as one path segment.
    pub fn job_endpoint(&self, kind: &str, job_id: &str) -> Result<Url, url::ParseError> {
        let mut url = self.endpoint(&format!("api/{kind}"))?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(job_id);
        Ok(url)
    }
}

#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, input: &AudioInput) -> Result<JobId, ApiError>;
}

#[async_trait]
pub trait ProgressTransport: Send + Sync {
    async fn connect(&self, job_id: &str) -> Result<FrameStream, TransportError>;
}

#[async_trait]
pub trait ResultFetcher: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Result<ResultArtifact, ApiError>;
}

/// The three outbound seams the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub submitter: Arc<dyn JobSubmitter>,
    pub transport: Arc<dyn ProgressTransport>,
    pub fetcher: Arc<dyn ResultFetcher>,
}

impl Collaborators {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: JobSubmitter + ProgressTransport + ResultFetcher + 'static,
    {
        Self {
            submitter: backend.clone(),
            transport: backend.clone(),
            fetcher: backend,
        }
    }
}
