//! Configuration loading from environment variables.
//!
//! Values are validated early so startup fails fast with actionable errors.
//! AWS region and credentials are not read here; they come from the default
//! `aws-config` provider chain.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;
use crate::jobs::PollPolicy;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;
pub const MAX_UPLOAD_BYTES_LIMIT: u64 = 512 * 1024 * 1024;

/// Audio container requested from the synthesis service.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AudioFormat {
    Mp3,
    OggVorbis,
    Pcm,
}

impl AudioFormat {
    /// Parses the wire value accepted by Polly.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "ogg_vorbis" => Some(Self::OggVorbis),
            "pcm" => Some(Self::Pcm),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg_vorbis",
            Self::Pcm => "pcm",
        }
    }

    /// File extension used for stored output objects.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggVorbis => "ogg",
            Self::Pcm => "pcm",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::OggVorbis => "audio/ogg",
            Self::Pcm => "audio/L16",
        }
    }
}

/// Runtime configuration for the HTTP server and the AWS collaborators.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `127.0.0.1`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Bucket receiving the uploaded source files.
    pub input_bucket: String,
    /// Bucket receiving synthesized audio and transcripts.
    pub output_bucket: String,
    /// Local scratch directory for staged files.
    pub upload_dir: PathBuf,
    /// Keeps scratch files on disk after the request completes.
    pub keep_scratch_files: bool,
    /// Maximum accepted request body size.
    pub max_upload_bytes: u64,
    /// Polly voice id, for example `Joanna`.
    pub voice_id: String,
    /// Polly output format.
    pub audio_format: AudioFormat,
    /// Transcribe language code, for example `en-US`.
    pub language_code: String,
    /// First delay before polling a transcription job.
    pub poll_initial_ms: u64,
    /// Upper bound for the backoff delay between polls.
    pub poll_max_ms: u64,
    /// Total time budget for one transcription job.
    pub poll_timeout_secs: u64,
}

impl AppConfig {
    /// Builds configuration from environment variables.
    ///
    /// Variables:
    /// - `HOST` (default `127.0.0.1`)
    /// - `PORT` (default `8000`)
    /// - `INPUT_BUCKET` (default `my-audio-translation-bucket`)
    /// - `OUTPUT_BUCKET` (default `speech-app-output-bucket`)
    /// - `UPLOAD_DIR` (default `./uploads`)
    /// - `KEEP_SCRATCH_FILES` (default `false`)
    /// - `MAX_UPLOAD_BYTES` (default 25 MiB, max 512 MiB)
    /// - `POLLY_VOICE_ID` (default `Joanna`)
    /// - `POLLY_OUTPUT_FORMAT` (default `mp3`; `mp3`, `ogg_vorbis` or `pcm`)
    /// - `TRANSCRIBE_LANGUAGE_CODE` (default `en-US`)
    /// - `TRANSCRIBE_POLL_INITIAL_MS` (default `5000`)
    /// - `TRANSCRIBE_POLL_MAX_MS` (default `60000`)
    /// - `TRANSCRIBE_POLL_TIMEOUT_SECS` (default `1800`)
    pub fn from_env() -> Result<Self, AppError> {
        let host = env_str("HOST", "127.0.0.1");
        let port = env_u16("PORT", 8000)?;

        let raw_format = env_str("POLLY_OUTPUT_FORMAT", "mp3");
        let audio_format = AudioFormat::parse(&raw_format).ok_or_else(|| {
            AppError::internal(format!(
                "invalid POLLY_OUTPUT_FORMAT={raw_format:?}; expected mp3, ogg_vorbis or pcm"
            ))
        })?;

        let poll_initial_ms = env_u64_bounded("TRANSCRIBE_POLL_INITIAL_MS", 5_000, 1, 600_000)?;
        let poll_max_ms = env_u64_bounded("TRANSCRIBE_POLL_MAX_MS", 60_000, 1, 3_600_000)?;
        if poll_max_ms < poll_initial_ms {
            return Err(AppError::internal(format!(
                "invalid TRANSCRIBE_POLL_MAX_MS={poll_max_ms}; must be >= TRANSCRIBE_POLL_INITIAL_MS={poll_initial_ms}"
            )));
        }

        Ok(Self {
            host,
            port,
            input_bucket: env_str("INPUT_BUCKET", "my-audio-translation-bucket"),
            output_bucket: env_str("OUTPUT_BUCKET", "speech-app-output-bucket"),
            upload_dir: PathBuf::from(env_str("UPLOAD_DIR", "./uploads")),
            keep_scratch_files: env_bool("KEEP_SCRATCH_FILES", false)?,
            max_upload_bytes: env_u64_bounded(
                "MAX_UPLOAD_BYTES",
                DEFAULT_MAX_UPLOAD_BYTES,
                1,
                MAX_UPLOAD_BYTES_LIMIT,
            )?,
            voice_id: env_str("POLLY_VOICE_ID", "Joanna"),
            audio_format,
            language_code: env_str("TRANSCRIBE_LANGUAGE_CODE", "en-US"),
            poll_initial_ms,
            poll_max_ms,
            poll_timeout_secs: env_u64_bounded("TRANSCRIBE_POLL_TIMEOUT_SECS", 1_800, 1, 86_400)?,
        })
    }

    /// Returns the polling policy used for transcription jobs.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(self.poll_initial_ms),
            max_delay: Duration::from_millis(self.poll_max_ms),
            multiplier: PollPolicy::DEFAULT_MULTIPLIER,
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(_) => None,
    }
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_bool(name, &raw)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_u64_bounded(name: &str, default: u64, min: u64, max: u64) -> Result<u64, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_u64_bounded(name, &raw, min, max)
}

fn parse_u64_bounded(name: &str, raw: &str, min: u64, max: u64) -> Result<u64, AppError> {
    let parsed = raw.trim().parse::<u64>().map_err(|_| {
        AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        ))
    })?;
    if parsed < min || parsed > max {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_u64_bounded_accepts_in_range_values() {
        assert_eq!(
            parse_u64_bounded("TRANSCRIBE_POLL_INITIAL_MS", "1", 1, 10).unwrap(),
            1
        );
        assert_eq!(
            parse_u64_bounded("TRANSCRIBE_POLL_INITIAL_MS", " 10 ", 1, 10).unwrap(),
            10
        );
    }

    #[test]
    fn parse_u64_bounded_rejects_non_numeric_value() {
        assert!(parse_u64_bounded("MAX_UPLOAD_BYTES", "lots", 1, 10).is_err());
    }

    #[test]
    fn parse_u64_bounded_rejects_out_of_range_values() {
        assert!(parse_u64_bounded("MAX_UPLOAD_BYTES", "0", 1, 10).is_err());
        assert!(parse_u64_bounded("MAX_UPLOAD_BYTES", "11", 1, 10).is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("KEEP_SCRATCH_FILES", "Yes").unwrap());
        assert!(!parse_bool("KEEP_SCRATCH_FILES", "off").unwrap());
        assert!(parse_bool("KEEP_SCRATCH_FILES", "maybe").is_err());
    }

    #[test]
    fn audio_format_maps_to_extension_and_mime() {
        let format = AudioFormat::parse("OGG_VORBIS").unwrap();
        assert_eq!(format, AudioFormat::OggVorbis);
        assert_eq!(format.extension(), "ogg");
        assert_eq!(format.content_type(), "audio/ogg");
        assert!(AudioFormat::parse("wav").is_none());
    }
}
