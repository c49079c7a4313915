//! Pipeline stages for one Docling conversion.
//!
//! Each submodule implements one step of a job's life. Only [`health`] and
//! the client that drives these stages do network I/O; everything else is
//! a pure transformation that can be tested without a running service.
//!
//! ## Data Flow
//!
//! ```text
//!            health ─────────────┐ (startup gate + re-probe before retry)
//!                                ▼
//! job ──▶ request ──▶ POST /v1/convert/file ──▶ response ──▶ postprocess ──▶ normalize
//!        (multipart)                          (JSON | zip)   (strip / {})   (WebP via encode)
//! ```
//!
//! 1. [`request`]  build the multipart body and directive fields
//! 2. [`response`] classify the HTTP 200 body and unpack Markdown
//! 3. [`postprocess`] remove inline images in strip mode; placeholder text
//!    for empty batch members
//! 4. [`normalize`] re-encode embedded raster images as bounded WebP; CPU
//!    bound, so the client runs it in `spawn_blocking`
//! 5. [`encode`] the raw image codec helpers used by `normalize`

pub mod encode;
pub mod health;
pub mod normalize;
pub mod postprocess;
pub mod request;
pub mod response;
