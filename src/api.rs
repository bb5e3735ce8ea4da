//! HTTP API surface.
//!
//! This module owns multipart parsing, input validation, scratch staging, and
//! response formatting while delegating storage, synthesis, and transcription
//! to the backends held in [`AppState`].

use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::backend::polly::MAX_TEXT_CHARS;
use crate::backend::{
    Backends, SpeechSynthesizer, SynthesisRequest, TranscriptionJobRequest, TranscriptionService,
};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::jobs::wait_for_transcript;
use crate::media::{content_type_for, media_format_for};
use crate::storage::{ObjectStore, S3Uri};
use crate::uploads::{
    file_extension, input_key, output_key, secure_filename, transcription_job_name, ScratchDir,
    ScratchFile,
};

/// Human-readable service name returned by the health endpoint.
pub const APP_NAME: &str = "speech-relay-server";
/// Service version string returned by the health endpoint.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state injected into all route handlers.
pub struct AppState {
    /// Runtime configuration loaded at startup.
    pub cfg: AppConfig,
    /// Local staging area for uploads and results.
    pub scratch: ScratchDir,
    pub store: Arc<dyn ObjectStore>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub transcriber: Arc<dyn TranscriptionService>,
}

impl AppState {
    /// Constructs shared handler state.
    pub fn new(cfg: AppConfig, backends: Backends) -> Self {
        let scratch = ScratchDir::new(cfg.upload_dir.clone(), cfg.keep_scratch_files);
        Self {
            cfg,
            scratch,
            store: backends.store,
            synthesizer: backends.synthesizer,
            transcriber: backends.transcriber,
        }
    }
}

/// Builds the Axum router for all public endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.cfg.max_upload_bytes).unwrap_or(usize::MAX);
    Router::new()
        .route("/health", get(health))
        .route("/text-to-speech", post(text_to_speech))
        .route("/speech-to-text", post(speech_to_text))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Status endpoint (`GET /health`).
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": APP_NAME,
        "version": APP_VERSION,
    }))
}

/// Synthesizes an uploaded text file (`POST /text-to-speech`).
///
/// Redirects to the public URL of the stored audio.
pub async fn text_to_speech(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;
    let filename = sanitize(&upload.filename)?;
    let request_id = Uuid::new_v4().to_string();

    let mut staged = Vec::new();
    let result = synthesize_upload(&state, &request_id, &filename, upload.bytes, &mut staged).await;
    state.scratch.discard(staged).await;
    result
}

/// Transcribes an uploaded audio file (`POST /speech-to-text`).
///
/// Redirects to the public URL of the stored transcript.
pub async fn speech_to_text(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;
    let filename = sanitize(&upload.filename)?;
    let media_format = media_format_for(&filename)?;
    if upload.bytes.is_empty() {
        return Err(AppError::invalid_request("uploaded file is empty", "empty_file"));
    }
    let request_id = Uuid::new_v4().to_string();

    let mut staged = Vec::new();
    let result = transcribe_upload(
        &state,
        &request_id,
        &filename,
        &media_format,
        upload.bytes,
        &mut staged,
    )
    .await;
    state.scratch.discard(staged).await;
    result
}

async fn synthesize_upload(
    state: &AppState,
    request_id: &str,
    filename: &str,
    bytes: Vec<u8>,
    staged: &mut Vec<ScratchFile>,
) -> Result<Response, AppError> {
    let source = state.scratch.stage(request_id, filename, &bytes).await?;
    let text = source.read_to_string().await;
    // Track the staged file before any decode error returns so it is discarded.
    staged.push(source);
    let text = validate_text(text?)?;

    let input = S3Uri::new(&state.cfg.input_bucket, input_key(request_id, filename));
    let extension = file_extension(filename).unwrap_or_default();
    state
        .store
        .put_object(&input, bytes, content_type_for(&extension))
        .await?;

    let format = state.cfg.audio_format;
    let audio = state
        .synthesizer
        .synthesize(SynthesisRequest {
            text,
            voice_id: state.cfg.voice_id.clone(),
            format,
        })
        .await?;

    let key = output_key(filename, request_id, format.extension());
    staged.push(state.scratch.stage(request_id, &key, &audio.bytes).await?);

    let output = S3Uri::new(&state.cfg.output_bucket, key);
    let content_type = audio
        .content_type
        .as_deref()
        .unwrap_or(format.content_type())
        .to_string();
    state
        .store
        .put_object(&output, audio.bytes, &content_type)
        .await?;

    info!(request_id, input = %input, output = %output, "text-to-speech finished");
    Ok(redirect_found(&output.public_url()))
}

async fn transcribe_upload(
    state: &AppState,
    request_id: &str,
    filename: &str,
    media_format: &str,
    bytes: Vec<u8>,
    staged: &mut Vec<ScratchFile>,
) -> Result<Response, AppError> {
    staged.push(state.scratch.stage(request_id, filename, &bytes).await?);

    let input = S3Uri::new(&state.cfg.input_bucket, input_key(request_id, filename));
    state
        .store
        .put_object(&input, bytes, content_type_for(media_format))
        .await?;

    let job_name = transcription_job_name(filename, request_id);
    state
        .transcriber
        .start_job(TranscriptionJobRequest {
            job_name: job_name.clone(),
            media_uri: input.clone(),
            media_format: media_format.to_string(),
            language_code: state.cfg.language_code.clone(),
        })
        .await?;

    let transcript_uri =
        wait_for_transcript(state.transcriber.as_ref(), &job_name, state.cfg.poll_policy()).await?;
    let transcript = state.transcriber.fetch_transcript(&transcript_uri).await?;

    let key = output_key(filename, request_id, "txt");
    staged.push(
        state
            .scratch
            .stage(request_id, &key, transcript.as_bytes())
            .await?,
    );

    let output = S3Uri::new(&state.cfg.output_bucket, key);
    state
        .store
        .put_object(&output, transcript.into_bytes(), content_type_for("txt"))
        .await?;

    info!(request_id, job_name = %job_name, output = %output, "speech-to-text finished");
    Ok(redirect_found(&output.public_url()))
}

struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Extracts the `file` field from a multipart body.
///
/// A missing field, or one without a client filename, is reported as
/// [`AppError::MissingFile`]. Other fields are ignored.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Upload, AppError> {
    let mut multipart = multipart
        .map_err(|err| AppError::bad_multipart(format!("expected a multipart body: {err}")))?;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error("invalid multipart body", err))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
        else {
            continue;
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|err| multipart_error("failed to read file bytes", err))?;
        upload = Some(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    upload.ok_or(AppError::MissingFile)
}

/// Maps a body read failure, keeping `413` for bodies over the upload limit.
fn multipart_error(context: &str, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::payload_too_large(format!("{context}: {}", err.body_text()));
    }
    AppError::bad_multipart(format!("{context}: {err}"))
}

fn sanitize(raw: &str) -> Result<String, AppError> {
    let filename = secure_filename(raw);
    if filename.is_empty() {
        return Err(AppError::invalid_request(
            format!("filename {raw:?} has no usable characters"),
            "invalid_filename",
        ));
    }
    Ok(filename)
}

fn validate_text(text: String) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::invalid_request(
            "uploaded text file is empty",
            "empty_text",
        ));
    }
    let chars = text.chars().count();
    if chars > MAX_TEXT_CHARS {
        return Err(AppError::invalid_request(
            format!("text has {chars} characters; at most {MAX_TEXT_CHARS} are supported"),
            "text_too_long",
        ));
    }
    Ok(text)
}

fn redirect_found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
