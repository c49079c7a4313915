//! Conversion jobs: what to send, where the Markdown goes.

use crate::config::ImageMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Extensions recognised as slide images for batch jobs.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// The input side of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobInput {
    /// One document (PDF) converted on its own.
    Document(PathBuf),
    /// An ordered set of images converted as one logical document.
    ImageBatch(Vec<PathBuf>),
}

/// One unit of conversion work. Immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    pub input: JobInput,
    pub output_path: PathBuf,
    pub image_mode: ImageMode,
    /// Delete the input(s) after the Markdown has been written.
    pub cleanup: bool,
}

impl ConversionJob {
    /// A single-document job writing `<output_dir>/<stem>.md`.
    pub fn document(
        path: impl Into<PathBuf>,
        output_dir: &Path,
        image_mode: ImageMode,
        cleanup: bool,
    ) -> Self {
        let path = path.into();
        let output_path = output_path_for(&path, output_dir);
        Self {
            input: JobInput::Document(path),
            output_path,
            image_mode,
            cleanup,
        }
    }

    /// A multi-image job writing `<output_dir>/<output_name>.md`.
    ///
    /// Inputs are sorted so the service sees slides in file-name order.
    pub fn image_batch(
        mut images: Vec<PathBuf>,
        output_dir: &Path,
        output_name: &str,
        image_mode: ImageMode,
    ) -> Self {
        images.sort();
        Self {
            input: JobInput::ImageBatch(images),
            output_path: output_dir.join(format!("{output_name}.md")),
            image_mode,
            cleanup: false,
        }
    }

    /// Every input path in send order.
    pub fn inputs(&self) -> &[PathBuf] {
        match &self.input {
            JobInput::Document(p) => std::slice::from_ref(p),
            JobInput::ImageBatch(ps) => ps,
        }
    }

    /// The path whose existence gates dispatch.
    pub fn primary_input(&self) -> Option<&Path> {
        self.inputs().first().map(PathBuf::as_path)
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.input, JobInput::ImageBatch(_))
    }

    /// Human-facing name for logs and progress lines.
    pub fn label(&self) -> String {
        match &self.input {
            JobInput::Document(p) => file_name(p),
            JobInput::ImageBatch(ps) => {
                let name = self
                    .output_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "batch".into());
                format!("{name} ({} images)", ps.len())
            }
        }
    }
}

/// `<output_dir>/<input stem>.md`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    output_dir.join(format!("{stem}.md"))
}

/// Slide images directly inside `dir`, sorted by path.
pub fn collect_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_path(p))
        .collect();
    images.sort();
    Ok(images)
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Copy `input` into `staging_dir` and return the staged path.
///
/// When the input already lives at the staged location nothing is copied.
/// Pair with `cleanup` so the staged copy, not the caller's original, is
/// deleted after a successful conversion.
pub fn stage_input(input: &Path, staging_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(staging_dir)?;
    let dest = staging_dir.join(input.file_name().unwrap_or(input.as_os_str()));

    let same = match (std::fs::canonicalize(input), std::fs::canonicalize(&dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        std::fs::copy(input, &dest)?;
        info!("Staged {} → {}", input.display(), staging_dir.display());
    }
    Ok(dest)
}

fn file_name(p: &Path) -> String {
    p.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_output_path_replaces_extension() {
        let job = ConversionJob::document(
            "/data/in/report.final.pdf",
            Path::new("/data/out"),
            ImageMode::Strip,
            false,
        );
        assert_eq!(job.output_path, PathBuf::from("/data/out/report.final.md"));
        assert_eq!(job.label(), "report.final.pdf");
        assert!(!job.is_batch());
    }

    #[test]
    fn image_batch_sorts_inputs() {
        let job = ConversionJob::image_batch(
            vec!["/s/slide10.png".into(), "/s/slide02.jpg".into(), "/s/slide01.jpg".into()],
            Path::new("/out"),
            "deck",
            ImageMode::EmbedFull,
        );
        assert_eq!(
            job.inputs(),
            &[
                PathBuf::from("/s/slide01.jpg"),
                PathBuf::from("/s/slide02.jpg"),
                PathBuf::from("/s/slide10.png"),
            ]
        );
        assert_eq!(job.primary_input(), Some(Path::new("/s/slide01.jpg")));
        assert_eq!(job.output_path, PathBuf::from("/out/deck.md"));
        assert_eq!(job.label(), "deck (3 images)");
    }

    #[test]
    fn image_extension_filter() {
        assert!(is_image_path(Path::new("a.JPG")));
        assert!(is_image_path(Path::new("a.jpeg")));
        assert!(is_image_path(Path::new("a.png")));
        assert!(!is_image_path(Path::new("a.pdf")));
        assert!(!is_image_path(Path::new("noext")));
    }

    #[test]
    fn collect_images_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt", "c.JPEG"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let found = collect_images(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.JPEG"]);
    }

    #[test]
    fn stage_input_copies_once() {
        let src_dir = tempfile::tempdir().unwrap();
        let stage_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("doc.pdf");
        std::fs::write(&src, b"%PDF-1.7").unwrap();

        let staged = stage_input(&src, stage_dir.path()).unwrap();
        assert_eq!(staged, stage_dir.path().join("doc.pdf"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"%PDF-1.7");

        // Staging the staged copy is a no-op.
        let again = stage_input(&staged, stage_dir.path()).unwrap();
        assert_eq!(again, staged);
        assert!(src.exists());
    }
}
