//! ImageNormalizer round trips on realistic image sizes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use docling2md::{ImageNormalizer, NormalizerConfig};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

static RE_WEBP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(data:image/webp;base64,([A-Za-z0-9+/=]+)\)").unwrap());

fn jpeg(w: u32, h: u32) -> Vec<u8> {
    // A gradient so the encoder has real content to work with.
    let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

fn decode_webp(md: &str) -> Vec<DynamicImage> {
    RE_WEBP
        .captures_iter(md)
        .map(|c| {
            let raw = STANDARD.decode(&c[2]).unwrap();
            image::load_from_memory_with_format(&raw, ImageFormat::WebP).unwrap()
        })
        .collect()
}

#[test]
fn test_large_jpeg_is_bounded_and_keeps_aspect_ratio() {
    let n = ImageNormalizer::new(&NormalizerConfig::default());
    assert!(n.is_active());

    let md = format!(
        "# Deck\n\n![wide](data:image/jpeg;base64,{})\n",
        STANDARD.encode(jpeg(4000, 3000))
    );
    let out = n.normalize(&md, None);

    assert!(out.starts_with("# Deck\n\n![wide](data:image/webp;base64,"));
    let images = decode_webp(&out);
    assert_eq!(images.len(), 1);
    let (w, h) = images[0].dimensions();
    assert!(w <= 1920 && h <= 1080, "got {w}x{h}");
    // 4:3 fitted into 1920x1080 is height-bound: 1440x1080.
    assert_eq!(h, 1080);
    assert!((w as i64 - 1440).abs() <= 1, "got width {w}");
}

#[test]
fn test_small_images_are_not_upscaled() {
    let n = ImageNormalizer::new(&NormalizerConfig::default());
    let md = format!("![s](data:image/jpg;base64,{})", STANDARD.encode(jpeg(120, 90)));
    let images = decode_webp(&n.normalize(&md, None));
    assert_eq!(images[0].dimensions(), (120, 90));
}

#[test]
fn test_unbounded_dimension_is_ignored() {
    let settings = NormalizerConfig::new(true, 65, 4, 0, 100);
    let n = ImageNormalizer::new(&settings);
    let md = format!("![t](data:image/jpeg;base64,{})", STANDARD.encode(jpeg(400, 800)));
    let images = decode_webp(&n.normalize(&md, None));
    assert_eq!(images[0].dimensions(), (50, 100));
}

#[test]
fn test_normalize_is_idempotent() {
    let n = ImageNormalizer::new(&NormalizerConfig::default());
    let md = format!(
        "a\n\n![x](data:image/jpeg;base64,{})\n\nb",
        STANDARD.encode(jpeg(2600, 1400))
    );

    let once = n.normalize(&md, None);
    let first = decode_webp(&once);
    assert_eq!(first.len(), 1);
    let (w, h) = first[0].dimensions();
    assert!(w <= 1920 && h <= 1080, "got {w}x{h}");
    assert!(w < 2600, "first pass must downscale");

    // The WebP output is no longer a rewrite target, so a second pass is a no-op.
    let twice = n.normalize(&once, None);
    assert_eq!(once, twice);
    assert_eq!(decode_webp(&twice)[0].dimensions(), (w, h));
}

#[test]
fn test_mixed_document_keeps_surrounding_text() {
    let n = ImageNormalizer::new(&NormalizerConfig::default());
    let md = format!(
        "Intro\n\n![one](data:image/jpeg;base64,{a})\n\nMiddle ![bad](data:image/png;base64,AAAA) text\n\n![two](data:image/jpeg;base64,{b})\n\nEnd",
        a = STANDARD.encode(jpeg(50, 50)),
        b = STANDARD.encode(jpeg(60, 40)),
    );
    let out = n.normalize(&md, None);

    assert!(out.starts_with("Intro\n\n![one](data:image/webp;base64,"));
    assert!(out.contains("Middle ![bad](data:image/png;base64,AAAA) text"));
    assert!(out.ends_with(")\n\nEnd"));
    assert_eq!(decode_webp(&out).len(), 2);
}
