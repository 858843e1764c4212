use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::backend::http::sse::SseDecoder;
use crate::backend::{ClientContext, FrameStream, JobSubmitter, ProgressTransport, ResultFetcher};
use crate::engine::error::{ApiError, TransportError};
use crate::engine::model::{AudioInput, JobId, ResultArtifact};

const UPLOAD_FIELD: &str = "audio_file";

#[derive(Debug, Deserialize)]
struct Accepted {
    job_id: JobId,
}

pub struct HttpBackend {
    client: reqwest::Client,
    ctx: ClientContext,
}

impl HttpBackend {
    pub fn new(ctx: ClientContext) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(ctx.user_agent.clone())
            .connect_timeout(Duration::from_secs(ctx.connect_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, ctx })
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ctx.timeout_secs)
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status().as_u16();
        let ok = resp.status().is_success();
        let body = resp.bytes().await.map_err(|e| ApiError::Transport(e.into()))?;

        if ok {
            return serde_json::from_slice::<T>(&body).map_err(|e| {
                debug!(status, error = %e, "response body did not match the expected shape");
                ApiError::Rejected {
                    status,
                    detail: format!("Server returned {} with an unexpected body", status),
                }
            });
        }

        Err(ApiError::Rejected { status, detail: detail_from_body(status, &body) })
    }
}

/// Pulls the human-readable `detail` out of an error body. Strings are kept
/// verbatim; any other JSON value is rendered as compact JSON.
pub fn detail_from_body(status: u16, body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => format!("Server returned {}", status),
        },
        Err(_) => format!("Server returned {} with no JSON body", status),
    }
}

#[async_trait]
impl JobSubmitter for HttpBackend {
    async fn submit(&self, input: &AudioInput) -> Result<JobId, ApiError> {
        let url = self.ctx.endpoint("api/process").map_err(|e| ApiError::Transport(e.into()))?;
        let part = Part::bytes(input.data.to_vec()).file_name(input.filename.clone());
        let form = Form::new().part(UPLOAD_FIELD, part);

        debug!(%url, filename = %input.filename, bytes = input.data.len(), "submitting job");
        let resp = self.client
            .post(url)
            .multipart(form)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.into()))?;

        let accepted: Accepted = Self::decode(resp).await?;
        Ok(accepted.job_id)
    }
}

#[async_trait]
impl ProgressTransport for HttpBackend {
    async fn connect(&self, job_id: &str) -> Result<FrameStream, TransportError> {
        let url = self.ctx
            .job_endpoint("progress", job_id)
            .map_err(|e| TransportError::Connect(e.into()))?;

        debug!(%url, "opening progress stream");
        // no request timeout: the channel stays open for the whole job
        let resp = self.client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.into()))?;

        if !resp.status().is_success() {
            return Err(TransportError::Status(resp.status().as_u16()));
        }

        let mut decoder = SseDecoder::new();
        let frames = resp
            .bytes_stream()
            .map(move |chunk| -> Vec<Result<String, TransportError>> {
                match chunk {
                    Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(TransportError::Read(e.into()))],
                }
            })
            .flat_map(stream::iter)
            .boxed();

        Ok(frames)
    }
}

#[async_trait]
impl ResultFetcher for HttpBackend {
    async fn fetch(&self, job_id: &str) -> Result<ResultArtifact, ApiError> {
        let url = self.ctx
            .job_endpoint("result", job_id)
            .map_err(|e| ApiError::Transport(e.into()))?;

        debug!(%url, "fetching result");
        let resp = self.client
            .get(url)
            .timeout(self.request_timeout())
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.into()))?;

        Self::decode(resp).await
    }
}
