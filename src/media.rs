//! Media-format validation for transcription uploads.

use crate::error::AppError;
use crate::uploads::file_extension;

/// File extensions Transcribe accepts as a media format.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["amr", "flac", "m4a", "mp3", "mp4", "ogg", "wav", "webm"];

/// Validates the uploaded filename and returns the Transcribe media format.
///
/// The format is the lowercased extension without the leading dot.
pub fn media_format_for(filename: &str) -> Result<String, AppError> {
    let accepted = SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{ext}"))
        .collect::<Vec<_>>()
        .join(",");

    let extension = file_extension(filename).ok_or_else(|| {
        AppError::unsupported_media_type(format!(
            "file must include an extension; accepted extensions: {accepted}"
        ))
    })?;

    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::unsupported_media_type(format!(
            "unsupported file extension .{extension}; accepted extensions: {accepted}"
        )));
    }

    Ok(extension)
}

/// MIME type recorded on the staged input object.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "amr" => "audio/amr",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_uppercase_wav() {
        assert_eq!(media_format_for("Interview.WAV").unwrap(), "wav");
    }

    #[test]
    fn rejects_unknown_or_missing_extension() {
        let err = media_format_for("notes.txt").unwrap_err();
        assert_eq!(err.code(), "unsupported_media_type");
        assert!(media_format_for("recording").is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("mp3"), "audio/mpeg");
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }
}
