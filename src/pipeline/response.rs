//! Response unpacking: HTTP 200 body → Markdown.
//!
//! Docling answers in one of two shapes:
//!
//! * **JSON envelope** (single document):
//!   `{ "status": "success" | "partial_success" | "failure", "errors": [...],
//!   "document": { "md_content": "..." } }`
//! * **Zip archive** (multi-file batch): one `*.md` member per input.
//!
//! The zip shape is detected from the content type or, failing that, from
//! the `PK` signature.

use crate::error::JobError;
use crate::pipeline::postprocess::{is_empty_member, no_text_placeholder};
use serde::Deserialize;
use std::io::{Cursor, Read};
use tracing::{debug, error, warn};

/// Separator placed between zip members in the combined document.
pub const MEMBER_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Deserialize)]
struct ConvertEnvelope {
    #[serde(default)]
    status: Option<String>,
    // `null` and a missing key both mean "no errors".
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    document: Option<DocumentBody>,
}

#[derive(Debug, Deserialize)]
struct DocumentBody {
    #[serde(default)]
    md_content: Option<String>,
}

/// Whether the body should be read as a zip archive.
pub fn is_zip(content_type: Option<&str>, body: &[u8]) -> bool {
    content_type.is_some_and(|ct| ct.contains("zip")) || body.starts_with(b"PK")
}

/// Turn a successful response body into Markdown, classifying failures.
///
/// * unreadable body → [`JobError::InvalidResponse`] (transient)
/// * `status = "failure"` with errors → [`JobError::ServiceFailure`] (terminal)
/// * no Markdown at all → [`JobError::EmptyResult`] (terminal)
pub fn extract_markdown(
    content_type: Option<&str>,
    body: &[u8],
    attempt: u32,
) -> Result<String, JobError> {
    let markdown = if is_zip(content_type, body) {
        markdown_from_zip(body).map_err(|detail| JobError::InvalidResponse { attempt, detail })?
    } else {
        markdown_from_json(body, attempt)?
    };

    if markdown.trim().is_empty() {
        error!("No Markdown content in service response");
        return Err(JobError::EmptyResult);
    }
    Ok(markdown)
}

/// Concatenate the archive's `*.md` members in file-name order.
///
/// Each member is preceded by an HTML comment naming it; empty members
/// (including a bare `{}`) become a no-text placeholder.
pub fn markdown_from_zip(body: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(body)).map_err(|e| e.to_string())?;

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.ends_with(".md"))
        .map(str::to_owned)
        .collect();
    names.sort();

    let mut sections = Vec::with_capacity(names.len());
    for name in &names {
        let mut raw = Vec::new();
        archive
            .by_name(name)
            .map_err(|e| format!("{name}: {e}"))?
            .read_to_end(&mut raw)
            .map_err(|e| format!("{name}: {e}"))?;

        let text = String::from_utf8_lossy(&raw);
        let text = text.trim();
        let body = if is_empty_member(text) {
            debug!("Zip member {name} carried no text ({:?})", text);
            no_text_placeholder(name)
        } else {
            text.to_string()
        };
        sections.push(format!("<!-- {name} -->\n{body}"));
    }

    debug!("Unpacked {} Markdown member(s) from zip", sections.len());
    Ok(sections.join(MEMBER_SEPARATOR))
}

fn markdown_from_json(body: &[u8], attempt: u32) -> Result<String, JobError> {
    let envelope: ConvertEnvelope =
        serde_json::from_slice(body).map_err(|e| JobError::InvalidResponse {
            attempt,
            detail: format!("JSON decode failed: {e}"),
        })?;

    let errors: Vec<String> = envelope
        .errors
        .unwrap_or_default()
        .iter()
        .map(error_text)
        .collect();
    for e in &errors {
        warn!("Service warning: {e}");
    }

    if envelope.status.as_deref() == Some("failure") && !errors.is_empty() {
        error!("Service reported failure: {:?}", errors);
        return Err(JobError::ServiceFailure { errors });
    }

    Ok(envelope
        .document
        .and_then(|d| d.md_content)
        .unwrap_or_default())
}

/// Prefer an `error_message` field; fall back to the raw JSON.
fn error_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("error_message")
            .and_then(|m| m.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| v.to_string()),
        other => other.to_string(),
    }
}
