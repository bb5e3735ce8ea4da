//! Amazon Transcribe speech-to-text backend.
//!
//! Jobs are submitted with `aws-sdk-transcribe`; the finished transcript is a
//! JSON document behind a pre-signed HTTPS URL, downloaded with `reqwest`.

use async_trait::async_trait;
use aws_sdk_transcribe::error::DisplayErrorContext;
use aws_sdk_transcribe::types::{LanguageCode, Media, MediaFormat, TranscriptionJobStatus};
use tracing::{debug, info};

use crate::backend::{
    parse_transcript_document, JobStatus, TranscriptionJobRequest, TranscriptionService,
};
use crate::error::AppError;

/// Transcription backend powered by `aws-sdk-transcribe`.
pub struct TranscribeBackend {
    client: aws_sdk_transcribe::Client,
    http: reqwest::Client,
}

impl TranscribeBackend {
    pub fn new(client: aws_sdk_transcribe::Client, http: reqwest::Client) -> Self {
        Self { client, http }
    }
}

#[async_trait]
impl TranscriptionService for TranscribeBackend {
    async fn start_job(&self, req: TranscriptionJobRequest) -> Result<(), AppError> {
        let media = Media::builder()
            .media_file_uri(req.media_uri.to_string())
            .build();

        self.client
            .start_transcription_job()
            .transcription_job_name(&req.job_name)
            .media(media)
            .media_format(MediaFormat::from(req.media_format.as_str()))
            .language_code(LanguageCode::from(req.language_code.as_str()))
            .send()
            .await
            .map_err(|err| {
                AppError::upstream(
                    "transcribe",
                    format!(
                        "failed to start job {}: {}",
                        req.job_name,
                        DisplayErrorContext(&err)
                    ),
                )
            })?;

        info!(
            job_name = %req.job_name,
            media_uri = %req.media_uri,
            media_format = %req.media_format,
            language = %req.language_code,
            "started transcription job"
        );
        Ok(())
    }

    async fn job_status(&self, job_name: &str) -> Result<JobStatus, AppError> {
        let output = self
            .client
            .get_transcription_job()
            .transcription_job_name(job_name)
            .send()
            .await
            .map_err(|err| {
                AppError::upstream(
                    "transcribe",
                    format!("failed to read job {job_name}: {}", DisplayErrorContext(&err)),
                )
            })?;

        let job = output.transcription_job().ok_or_else(|| {
            AppError::upstream("transcribe", format!("job {job_name} missing from response"))
        })?;

        let status = match job.transcription_job_status() {
            Some(TranscriptionJobStatus::Completed) => {
                let transcript_uri = job
                    .transcript()
                    .and_then(|t| t.transcript_file_uri())
                    .ok_or_else(|| {
                        AppError::upstream(
                            "transcribe",
                            format!("job {job_name} completed without a transcript URI"),
                        )
                    })?;
                JobStatus::Completed {
                    transcript_uri: transcript_uri.to_string(),
                }
            }
            Some(TranscriptionJobStatus::Failed) => JobStatus::Failed {
                reason: job.failure_reason().map(ToOwned::to_owned),
            },
            Some(TranscriptionJobStatus::Queued) => JobStatus::Queued,
            _ => JobStatus::InProgress,
        };

        debug!(job_name, status = status.as_str(), "polled transcription job");
        Ok(status)
    }

    async fn fetch_transcript(&self, transcript_uri: &str) -> Result<String, AppError> {
        let response = self
            .http
            .get(transcript_uri)
            .send()
            .await
            .map_err(|err| {
                AppError::upstream("transcribe", format!("transcript download failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(
                "transcribe",
                format!("transcript download failed with HTTP status {status}"),
            ));
        }

        let body = response.bytes().await.map_err(|err| {
            AppError::upstream("transcribe", format!("failed to read transcript body: {err}"))
        })?;
        parse_transcript_document(&body)
    }
}
