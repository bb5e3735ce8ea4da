//! Upload filename handling and local scratch staging.
//!
//! Every staged file and every derived object key carries the request id, so
//! concurrent requests with the same client filename never overwrite each
//! other.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::error::AppError;

/// Maximum stem length kept in derived names; Transcribe job names cap at 200.
const MAX_STEM_CHARS: usize = 100;

/// Reduces a client-supplied filename to a safe, flat ASCII name.
///
/// The name is NFKD-decomposed first so accented Latin letters keep their
/// base letter. Path separators become word breaks, whitespace runs become
/// `_`, anything outside `[A-Za-z0-9._-]` is dropped, and leading/trailing
/// `.`/`_` are stripped. The result may be empty.
pub fn secure_filename(raw: &str) -> String {
    let decomposed = raw.nfkd().collect::<String>();
    let flattened = decomposed.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");
    let kept = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Returns the filename without its final extension.
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Returns the lowercased final extension without the dot, if any.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn short_stem(filename: &str) -> String {
    file_stem(filename).chars().take(MAX_STEM_CHARS).collect()
}

/// Object key for an uploaded source file in the input bucket.
pub fn input_key(request_id: &str, filename: &str) -> String {
    format!("{request_id}/{filename}")
}

/// Object key for a result derived from `filename` in the output bucket.
pub fn output_key(filename: &str, request_id: &str, extension: &str) -> String {
    format!("{}-{request_id}.{extension}", short_stem(filename))
}

/// Builds a Transcribe job name for an uploaded file.
///
/// Dots and spaces are not valid in job names and are replaced by `-`.
pub fn transcription_job_name(filename: &str, request_id: &str) -> String {
    format!("transcription-{}-{request_id}", short_stem(filename)).replace(['.', ' '], "-")
}

/// A file written into the scratch directory for the duration of a request.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the staged file back as UTF-8 text.
    pub async fn read_to_string(&self) -> Result<String, AppError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|err| {
            AppError::internal(format!("failed to read scratch file {:?}: {err}", self.path))
        })?;
        String::from_utf8(bytes).map_err(|_| {
            AppError::invalid_request("uploaded file is not valid UTF-8 text", "invalid_text")
        })
    }
}

/// Local directory holding staged uploads and generated results.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    keep_files: bool,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>, keep_files: bool) -> Self {
        Self {
            root: root.into(),
            keep_files,
        }
    }

    /// Creates the scratch directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            AppError::internal(format!(
                "failed to create upload directory {:?}: {err}",
                self.root
            ))
        })
    }

    /// Writes `bytes` to `<root>/<request_id>-<name>`.
    pub async fn stage(
        &self,
        request_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<ScratchFile, AppError> {
        let path = self.root.join(format!("{request_id}-{name}"));
        tokio::fs::write(&path, bytes).await.map_err(|err| {
            AppError::internal(format!("failed to write scratch file {:?}: {err}", path))
        })?;
        debug!(path = ?path, bytes = bytes.len(), "staged scratch file");
        Ok(ScratchFile { path })
    }

    /// Removes staged files unless the directory is configured to keep them.
    pub async fn discard(&self, files: impl IntoIterator<Item = ScratchFile>) {
        if self.keep_files {
            return;
        }
        for file in files {
            if let Err(err) = tokio::fs::remove_file(file.path()).await {
                warn!(path = ?file.path(), error = %err, "failed to remove scratch file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_filename_flattens_paths() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\notes.txt"), "C_Users_me_notes.txt");
    }

    #[test]
    fn secure_filename_joins_whitespace_and_drops_symbols() {
        assert_eq!(secure_filename("my  voice memo (1).wav"), "my_voice_memo_1.wav");
        assert_eq!(secure_filename("  .hidden.mp3"), "hidden.mp3");
    }

    #[test]
    fn secure_filename_transliterates_accents() {
        assert_eq!(secure_filename("élan.txt"), "elan.txt");
        assert_eq!(secure_filename("café résumé.wav"), "cafe_resume.wav");
        assert_eq!(secure_filename("日本語.mp3"), "mp3");
    }

    #[test]
    fn secure_filename_can_be_empty() {
        assert_eq!(secure_filename("../.."), "");
        assert_eq!(secure_filename("???"), "");
    }

    #[test]
    fn stem_and_extension() {
        assert_eq!(file_stem("speech.final.wav"), "speech.final");
        assert_eq!(file_stem("README"), "README");
        assert_eq!(file_extension("Clip.WAV").as_deref(), Some("wav"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn derived_names_include_request_id() {
        assert_eq!(input_key("abc", "hello.txt"), "abc/hello.txt");
        assert_eq!(output_key("hello.txt", "abc", "mp3"), "hello-abc.mp3");
        assert_eq!(
            transcription_job_name("meeting.notes.wav", "abc"),
            "transcription-meeting-notes-abc"
        );
    }

    #[tokio::test]
    async fn stage_read_and_discard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path().join("uploads"), false);
        scratch.ensure().await.expect("ensure");

        let file = scratch
            .stage("req1", "hello.txt", b"hello there")
            .await
            .expect("stage");
        assert!(file.path().ends_with("req1-hello.txt"));
        assert_eq!(file.read_to_string().await.expect("read"), "hello there");

        let path = file.path().to_path_buf();
        scratch.discard([file]).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn non_utf8_upload_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path(), true);

        let file = scratch
            .stage("req2", "blob.txt", &[0xff, 0xfe, 0x00])
            .await
            .expect("stage");
        let err = file.read_to_string().await.unwrap_err();
        assert_eq!(err.code(), "invalid_text");

        let path = file.path().to_path_buf();
        scratch.discard([file]).await;
        assert!(path.exists(), "keep_files retains scratch files");
    }
}
