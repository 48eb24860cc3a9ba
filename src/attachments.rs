use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

pub const ERR_ATTACHMENT_MISSING: &str = "ATTACHMENT/MISSING";
pub const ERR_INVALID_EXTENSION: &str = "ATTACHMENT/INVALID_EXTENSION";
pub const ERR_INVALID_ENCODING: &str = "ATTACHMENT/INVALID_ENCODING";

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Label stored when the caller sent a blank original filename.
pub const DEFAULT_DOCUMENT_LABEL: &str = "documento.pdf";

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([a-z0-9.+-]+/[a-z0-9.+-]+);base64,(.*)$").unwrap());

/// Upload payload as the caller sends it: a claimed filename plus a
/// `data:application/pdf;base64,<data>` string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    pub original_filename: String,
    pub base64_payload: String,
}

/// A validated, decoded PDF ready to persist.
#[derive(Debug)]
pub struct PdfAttachment {
    pub original_filename: String,
    pub bytes: Vec<u8>,
}

impl PdfAttachment {
    /// Cosmetic label stored alongside the document.
    pub fn display_name(&self) -> &str {
        let trimmed = self.original_filename.trim();
        if trimmed.is_empty() {
            DEFAULT_DOCUMENT_LABEL
        } else {
            trimmed
        }
    }
}

/// The add-document endpoint requires a payload; absence is a caller error.
pub fn decode_required(upload: Option<&AttachmentUpload>) -> AppResult<PdfAttachment> {
    match upload {
        Some(upload) => decode(upload),
        None => Err(AppError::new(
            ERR_ATTACHMENT_MISSING,
            "A PDF attachment is required",
        )),
    }
}

/// The create-record endpoint treats the attachment as optional; a present
/// payload still has to pass every check.
pub fn decode_optional(upload: Option<&AttachmentUpload>) -> AppResult<Option<PdfAttachment>> {
    upload.map(decode).transpose()
}

/// Validation order: extension, data-URL shape, media type, base64 body.
/// The first failure aborts the request before any file or row is written.
fn decode(upload: &AttachmentUpload) -> AppResult<PdfAttachment> {
    let filename = upload.original_filename.trim();
    // A blank filename falls back to the generic label later; a non-blank
    // one must claim the PDF extension.
    if !filename.is_empty() && !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(AppError::new(
            ERR_INVALID_EXTENSION,
            "Only PDF attachments are accepted",
        )
        .with_context("filename", filename.to_string()));
    }

    let payload = upload.base64_payload.trim();
    let caps = DATA_URL_RE.captures(payload).ok_or_else(|| {
        AppError::new(
            ERR_INVALID_ENCODING,
            "Attachment payload is not a base64 data URL",
        )
    })?;
    let media_type = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    if media_type != PDF_MEDIA_TYPE {
        return Err(AppError::new(
            ERR_INVALID_ENCODING,
            "Attachment payload is not PDF data",
        )
        .with_context("media_type", media_type.to_string()));
    }

    let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|err| {
            AppError::new(ERR_INVALID_ENCODING, "Attachment payload failed to decode")
                .with_cause(AppError::from(err.to_string()))
        })?;

    Ok(PdfAttachment {
        original_filename: filename.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, payload: &str) -> AttachmentUpload {
        AttachmentUpload {
            original_filename: filename.to_string(),
            base64_payload: payload.to_string(),
        }
    }

    #[test]
    fn accepts_a_valid_pdf_payload() {
        let pdf = decode_required(Some(&upload(
            "analisis.pdf",
            "data:application/pdf;base64,JVBERi0xLjQK",
        )))
        .expect("valid payload");
        assert_eq!(pdf.original_filename, "analisis.pdf");
        assert_eq!(pdf.bytes, b"%PDF-1.4\n");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let pdf = decode_required(Some(&upload(
            "Analisis.PDF",
            "data:application/pdf;base64,JVBERi0xLjQK",
        )))
        .expect("uppercase extension");
        assert_eq!(pdf.display_name(), "Analisis.PDF");
    }

    #[test]
    fn rejects_wrong_extension() {
        let err = decode_required(Some(&upload(
            "analisis.png",
            "data:application/pdf;base64,JVBERi0xLjQK",
        )))
        .unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_EXTENSION);
    }

    #[test]
    fn rejects_missing_data_url_prefix() {
        let err = decode_required(Some(&upload("analisis.pdf", "JVBERi0xLjQK"))).unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_ENCODING);
    }

    #[test]
    fn rejects_mismatched_media_type() {
        let err = decode_required(Some(&upload(
            "analisis.pdf",
            "data:image/png;base64,JVBERi0xLjQK",
        )))
        .unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_ENCODING);
        assert_eq!(
            err.context().get("media_type"),
            Some(&"image/png".to_string())
        );
    }

    #[test]
    fn rejects_invalid_base64_body() {
        let err = decode_required(Some(&upload(
            "analisis.pdf",
            "data:application/pdf;base64,%%%not-base64%%%",
        )))
        .unwrap_err();
        assert_eq!(err.code(), ERR_INVALID_ENCODING);
    }

    #[test]
    fn missing_payload_is_an_error_only_when_required() {
        let err = decode_required(None).unwrap_err();
        assert_eq!(err.code(), ERR_ATTACHMENT_MISSING);
        assert!(decode_optional(None).expect("optional").is_none());
    }

    #[test]
    fn blank_filename_falls_back_to_generic_label() {
        let pdf = decode_required(Some(&upload(
            "  ",
            "data:application/pdf;base64,JVBERi0xLjQK",
        )))
        .expect("blank filename allowed");
        assert_eq!(pdf.display_name(), DEFAULT_DOCUMENT_LABEL);
    }
}
