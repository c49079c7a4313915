//! ImageNormalizer: rewrite embedded images in Markdown as compact WebP.
//!
//! Two passes, in order:
//!
//! 1. **Placeholder substitution** (batch jobs only): every no-text slide
//!    placeholder whose member name matches a sidecar image on disk is
//!    replaced by that image, inlined as WebP.
//! 2. **Inline re-encoding**: every `![alt](data:image/{png,jpeg,jpg};base64,…)`
//!    is decoded and re-encoded through [`crate::pipeline::encode`].
//!
//! The matching strategy (regular expressions) is internal; callers only see
//! `normalize(markdown, sidecars) -> markdown`.

use crate::config::NormalizerConfig;
use crate::pipeline::encode::{self, WEBP_MIME};
use crate::pipeline::postprocess::RE_NO_TEXT_PLACEHOLDER;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

static RE_INLINE_RASTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(data:image/(?:jpeg|png|jpg);base64,([A-Za-z0-9+/=]+)\)").unwrap()
});

/// Re-encodes embedded raster images. Construct once per run.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    settings: NormalizerConfig,
    active: bool,
}

impl ImageNormalizer {
    /// Create a normalizer, probing the WebP codec once.
    ///
    /// A codec that cannot be initialised disables normalization for the
    /// whole run; Markdown then passes through with its original images.
    pub fn new(settings: &NormalizerConfig) -> Self {
        let active = settings.enabled
            && match encode::probe_codec(settings) {
                Ok(()) => true,
                Err(e) => {
                    warn!("WebP codec unavailable — skipping image normalization: {e}");
                    false
                }
            };
        Self {
            settings: settings.clone(),
            active,
        }
    }

    /// Whether [`normalize`](Self::normalize) will transform anything.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn settings(&self) -> &NormalizerConfig {
        &self.settings
    }

    /// Apply both passes. A no-op when inactive.
    pub fn normalize(&self, markdown: &str, sidecars: Option<&[PathBuf]>) -> String {
        if !self.active {
            return markdown.to_string();
        }

        let markdown = match sidecars {
            Some(paths) if !paths.is_empty() => self.substitute_placeholders(markdown, paths),
            _ => markdown.to_string(),
        };
        self.reencode_inline(&markdown)
    }

    fn substitute_placeholders(&self, markdown: &str, sidecars: &[PathBuf]) -> String {
        let by_stem: HashMap<String, &Path> = sidecars
            .iter()
            .filter_map(|p| Some((stem_of(p.file_name()?.to_str()?), p.as_path())))
            .collect();

        RE_NO_TEXT_PLACEHOLDER
            .replace_all(markdown, |caps: &Captures<'_>| {
                let stem = stem_of(&caps[1]);
                let Some(path) = by_stem.get(&stem).filter(|p| p.is_file()) else {
                    return caps[0].to_string();
                };
                let embedded = std::fs::read(path)
                    .map_err(|e| e.to_string())
                    .and_then(|raw| {
                        encode::reencode_to_webp_b64(&raw, &self.settings).map_err(|e| e.to_string())
                    });
                match embedded {
                    Ok(b64) => {
                        info!("  Embedded from disk: {}", path.display());
                        data_uri_image(&stem, &b64)
                    }
                    Err(e) => {
                        warn!("Could not embed {}: {e}", path.display());
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    fn reencode_inline(&self, markdown: &str) -> String {
        RE_INLINE_RASTER
            .replace_all(markdown, |caps: &Captures<'_>| {
                let alt = &caps[1];
                match encode::reencode_b64_to_webp_b64(&caps[2], &self.settings) {
                    Ok(b64) => data_uri_image(alt, &b64),
                    Err(e) => {
                        warn!("Keeping original encoding for image '{alt}': {e}");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

fn data_uri_image(alt: &str, b64: &str) -> String {
    format!("![{alt}](data:{WEBP_MIME};base64,{b64})")
}

/// File name without its last extension.
fn stem_of(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::postprocess::no_text_placeholder;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(w: u32, h: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 120, 200])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn disabled_normalizer_is_identity() {
        let n = ImageNormalizer::new(&NormalizerConfig::disabled());
        assert!(!n.is_active());
        let md = format!(
            "![x](data:image/png;base64,{})",
            STANDARD.encode(encoded(4, 4, ImageFormat::Png))
        );
        assert_eq!(n.normalize(&md, None), md);
    }

    #[test]
    fn inline_png_becomes_webp_with_same_alt() {
        let n = ImageNormalizer::new(&NormalizerConfig::default());
        let md = format!(
            "Intro\n\n![Figure 2](data:image/png;base64,{})\n\nOutro",
            STANDARD.encode(encoded(40, 20, ImageFormat::Png))
        );
        let out = n.normalize(&md, None);
        assert!(out.starts_with("Intro\n\n![Figure 2](data:image/webp;base64,"));
        assert!(out.ends_with(")\n\nOutro"));
        assert!(!out.contains("image/png"));
    }

    #[test]
    fn undecodable_image_is_left_alone() {
        let n = ImageNormalizer::new(&NormalizerConfig::default());
        let md = "![broken](data:image/png;base64,AAAA)";
        assert_eq!(n.normalize(md, None), md);
    }

    #[test]
    fn other_mime_types_are_ignored() {
        let n = ImageNormalizer::new(&NormalizerConfig::default());
        let md = "![g](data:image/gif;base64,R0lGODlh)";
        assert_eq!(n.normalize(md, None), md);
    }

    #[test]
    fn placeholder_replaced_from_matching_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let slide = dir.path().join("slide2.jpg");
        std::fs::write(&slide, encoded(30, 30, ImageFormat::Jpeg)).unwrap();

        let n = ImageNormalizer::new(&NormalizerConfig::default());
        let md = format!(
            "<!-- slide1.md -->\nHello\n\n---\n\n<!-- slide2.md -->\n{}",
            no_text_placeholder("slide2.md")
        );
        let out = n.normalize(&md, Some(&[slide]));

        assert!(out.contains("<!-- slide2.md -->\n![slide2](data:image/webp;base64,"));
        assert!(!out.contains("no extractable text"));
    }

    #[test]
    fn placeholder_without_sidecar_is_kept() {
        let n = ImageNormalizer::new(&NormalizerConfig::default());
        let md = no_text_placeholder("ghost.md");
        let out = n.normalize(&md, Some(&[PathBuf::from("/nope/other.png")]));
        assert_eq!(out, md);
    }

    #[test]
    fn stem_of_drops_last_extension() {
        assert_eq!(stem_of("slide_01.md"), "slide_01");
        assert_eq!(stem_of("a.b.md"), "a.b");
        assert_eq!(stem_of("plain"), "plain");
    }
}
