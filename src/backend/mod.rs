//! Remote speech services.
//!
//! The HTTP layer depends on the [`SpeechSynthesizer`] and
//! [`TranscriptionService`] traits instead of the AWS clients, which keeps
//! request handling testable without network access.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AudioFormat;
use crate::error::AppError;
use crate::storage::{ObjectStore, S3Store, S3Uri};

pub mod polly;
pub mod transcribe;

/// Input for a single synthesis call.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub format: AudioFormat,
}

/// Audio returned by a synthesis backend.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// Content type reported by the service, if any.
    pub content_type: Option<String>,
}

/// Backend contract for text-to-speech services.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, req: SynthesisRequest) -> Result<SynthesizedAudio, AppError>;
}

/// Parameters for submitting a transcription job.
#[derive(Debug, Clone)]
pub struct TranscriptionJobRequest {
    /// Unique job name.
    pub job_name: String,
    /// Location of the staged media.
    pub media_uri: S3Uri,
    /// Media format such as `wav` or `mp3`.
    pub media_format: String,
    /// Language code such as `en-US`.
    pub language_code: String,
}

/// Observed state of a remote transcription job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed { transcript_uri: String },
    Failed { reason: Option<String> },
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Backend contract for asynchronous speech-to-text job services.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Submits a job; returns once the service has accepted it.
    async fn start_job(&self, req: TranscriptionJobRequest) -> Result<(), AppError>;

    /// Reads the current status of a previously submitted job.
    async fn job_status(&self, job_name: &str) -> Result<JobStatus, AppError>;

    /// Downloads the transcript document and returns its plain text.
    async fn fetch_transcript(&self, transcript_uri: &str) -> Result<String, AppError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    transcripts: Vec<TranscriptAlternative>,
}

#[derive(Debug, Deserialize)]
struct TranscriptAlternative {
    transcript: String,
}

/// Extracts the first transcript from a Transcribe result document.
pub fn parse_transcript_document(raw: &[u8]) -> Result<String, AppError> {
    let doc: TranscriptDocument = serde_json::from_slice(raw).map_err(|err| {
        AppError::upstream("transcribe", format!("malformed transcript document: {err}"))
    })?;
    doc.results
        .transcripts
        .into_iter()
        .next()
        .map(|alt| alt.transcript)
        .ok_or_else(|| AppError::upstream("transcribe", "transcript document has no transcripts"))
}

/// Concrete collaborators wired into the HTTP state.
pub struct Backends {
    pub store: Arc<dyn ObjectStore>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub transcriber: Arc<dyn TranscriptionService>,
}

/// Builds the AWS-backed implementations from a shared SDK configuration.
pub fn build_backends(sdk_config: &aws_config::SdkConfig) -> Result<Backends, AppError> {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;

    Ok(Backends {
        store: Arc::new(S3Store::new(aws_sdk_s3::Client::new(sdk_config))),
        synthesizer: Arc::new(polly::PollyBackend::new(aws_sdk_polly::Client::new(
            sdk_config,
        ))),
        transcriber: Arc::new(transcribe::TranscribeBackend::new(
            aws_sdk_transcribe::Client::new(sdk_config),
            http,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_transcript() {
        let raw = br#"{
            "jobName": "transcription-clip-1",
            "accountId": "123456789012",
            "results": {
                "transcripts": [{"transcript": "hello world"}],
                "items": []
            },
            "status": "COMPLETED"
        }"#;
        assert_eq!(parse_transcript_document(raw).unwrap(), "hello world");
    }

    #[test]
    fn empty_transcripts_are_upstream_errors() {
        let err = parse_transcript_document(br#"{"results": {"transcripts": []}}"#).unwrap_err();
        assert_eq!(err.code(), "upstream_error");
        assert!(parse_transcript_document(b"not json").is_err());
    }
}
