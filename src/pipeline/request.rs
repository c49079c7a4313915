//! Request construction for `POST /v1/convert/file`.
//!
//! Every input becomes a part under the shared `files` field; conversion
//! directives travel as plain text fields derived from [`ImageMode`].

use crate::config::ImageMode;
use crate::error::JobError;
use crate::job::ConversionJob;
use reqwest::multipart::{Form, Part};
use std::path::Path;

/// Multipart field name shared by every uploaded file.
pub const FILES_FIELD: &str = "files";

/// Directive fields for a job, in a stable order.
pub fn form_fields(mode: ImageMode, batch: bool) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("to_formats", "md".to_string()),
        ("image_export_mode", mode.export_mode().to_string()),
        ("include_images", mode.includes_images().to_string()),
        ("images_scale", mode.images_scale().to_string()),
        ("table_mode", "fast".to_string()),
        ("abort_on_error", "false".to_string()),
    ];
    if batch {
        fields.push(("target_type", "inbody".to_string()));
        fields.push(("force_ocr", "true".to_string()));
    }
    fields
}

/// MIME type for an uploaded part.
pub fn mime_for(path: &Path, batch: bool) -> &'static str {
    if !batch {
        return "application/pdf";
    }
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}

/// Read every input and assemble the multipart body.
///
/// Called once per attempt: `reqwest` forms are consumed on send.
pub async fn build_form(job: &ConversionJob) -> Result<Form, JobError> {
    let batch = job.is_batch();
    let mut form = Form::new();

    for (name, value) in form_fields(job.image_mode, batch) {
        form = form.text(name, value);
    }

    for path in job.inputs() {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| JobError::InputReadFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".into());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(path, batch))
            .map_err(|e| JobError::InputReadFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        form = form.part(FILES_FIELD, part);
    }

    Ok(form)
}
