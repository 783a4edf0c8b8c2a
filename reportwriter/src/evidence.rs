//! Evidence file handling
//!
//! Evidence referenced inline is either an image, embedded with a thin
//! border, or a text capture rendered as a code block. Other uploads are
//! not renderable inline.

use crate::error::ReportError;
use crate::report_config::{parse_hex_color, ReportSettings};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Extensions embedded as pictures
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Extensions embedded as monospace text
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "log", "md"];

/// Prefix of the bordered copy written next to an image
pub const BORDER_PREFIX: &str = "border_";

/// How an evidence file can be rendered inline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    Image,
    Text,
    /// Not renderable inline
    Other,
}

impl EvidenceKind {
    /// Classify a file by its extension, case-insensitively
    pub fn classify(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            EvidenceKind::Image
        } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            EvidenceKind::Text
        } else {
            EvidenceKind::Other
        }
    }
}

/// Border drawn around image evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderStyle {
    pub color: [u8; 3],
    /// Width in pixels
    pub width: u32,
}

impl Default for BorderStyle {
    fn default() -> Self {
        Self {
            color: [0x2d, 0x2b, 0x6b],
            width: 1,
        }
    }
}

impl BorderStyle {
    /// Border configured in the report settings, falling back to the default colour
    pub fn from_settings(settings: &ReportSettings) -> Self {
        let color = parse_hex_color(&settings.border_color).unwrap_or_else(|| {
            log::warn!(
                "Invalid border colour '{}'; using the default",
                settings.border_color
            );
            BorderStyle::default().color
        });
        Self {
            color,
            width: settings.border_width,
        }
    }
}

/// Path of the bordered copy of an image
pub fn bordered_path(original: &Path) -> PathBuf {
    let file_name = original
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    original.with_file_name(format!("{}{}", BORDER_PREFIX, file_name))
}

/// Write a bordered copy of an image next to the original
///
/// The copy is regenerated from the untouched original every time, so the
/// output is identical across calls. It is written to a per-thread temporary
/// file and renamed into place, so concurrent renders never observe a
/// partial file.
pub fn bordered_copy(original: &Path, border: &BorderStyle) -> Result<PathBuf, ReportError> {
    let target = bordered_path(original);
    let source = image::open(original)?;

    let (width, height) = (source.width(), source.height());
    let [r, g, b] = border.color;
    let mut canvas = RgbaImage::from_pixel(
        width + 2 * border.width,
        height + 2 * border.width,
        Rgba([r, g, b, 255]),
    );
    image::imageops::overlay(
        &mut canvas,
        &source.to_rgba8(),
        i64::from(border.width),
        i64::from(border.width),
    );

    let mut encoded = Cursor::new(Vec::new());
    if is_jpeg(original) {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
            .write_to(&mut encoded, ImageFormat::Jpeg)?;
    } else {
        canvas.write_to(&mut encoded, ImageFormat::Png)?;
    }

    let staging = target.with_file_name(format!(
        ".{}.{:?}.tmp",
        target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        std::thread::current().id()
    ));
    std::fs::write(&staging, encoded.into_inner())?;
    std::fs::rename(&staging, &target)?;

    log::debug!(
        "Wrote bordered copy of {} to {}",
        original.display(),
        target.display()
    );
    Ok(target)
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
}

/// Read a text capture, replacing invalid UTF-8
pub fn read_text_evidence(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
