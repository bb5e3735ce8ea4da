//! Amazon Polly text-to-speech backend.

use async_trait::async_trait;
use aws_sdk_polly::error::DisplayErrorContext;
use aws_sdk_polly::types::{OutputFormat, VoiceId};
use tracing::info;

use crate::backend::{SpeechSynthesizer, SynthesisRequest, SynthesizedAudio};
use crate::error::AppError;

/// Longest input Polly accepts for a single `SynthesizeSpeech` call.
pub const MAX_TEXT_CHARS: usize = 3_000;

/// Synthesis backend powered by `aws-sdk-polly`.
pub struct PollyBackend {
    client: aws_sdk_polly::Client,
}

impl PollyBackend {
    pub fn new(client: aws_sdk_polly::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SpeechSynthesizer for PollyBackend {
    async fn synthesize(&self, req: SynthesisRequest) -> Result<SynthesizedAudio, AppError> {
        let output = self
            .client
            .synthesize_speech()
            .text(req.text)
            .voice_id(VoiceId::from(req.voice_id.as_str()))
            .output_format(OutputFormat::from(req.format.as_str()))
            .send()
            .await
            .map_err(|err| {
                AppError::upstream(
                    "polly",
                    format!("speech synthesis failed: {}", DisplayErrorContext(&err)),
                )
            })?;

        let content_type = output.content_type().map(ToOwned::to_owned);
        let characters = output.request_characters();
        let bytes = output
            .audio_stream
            .collect()
            .await
            .map_err(|err| AppError::upstream("polly", format!("failed to read audio stream: {err}")))?
            .into_bytes()
            .to_vec();

        info!(
            voice = %req.voice_id,
            format = req.format.as_str(),
            characters,
            bytes = bytes.len(),
            "synthesized speech"
        );

        Ok(SynthesizedAudio {
            bytes,
            content_type,
        })
    }
}
