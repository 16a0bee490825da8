//! Drawing detections onto frames and saving captures.

use crate::constants::stream::{
    BOX_COLOR, BOX_THICKNESS, CAPTURE_JPEG_QUALITY, LABEL_FONT_SIZE, LABEL_TEXT_COLOR,
    SYSTEM_FONT_PATHS,
};
use crate::error::{Error, Result};
use ab_glyph::{FontArc, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

// Label bar geometry. Without a font the bar is sized per character.
const LABEL_CHAR_WIDTH: u32 = 11;
const LABEL_HEIGHT: u32 = 22;
const LABEL_PADDING: u32 = 3;

/// Font used to write label text into the label bar.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
    scale: PxScale,
}

impl LabelFont {
    /// Load a TrueType or OpenType font file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::FontLoad {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let font = FontArc::try_from_vec(data).map_err(|e| Error::FontLoad {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        Ok(Self {
            font,
            scale: PxScale::from(LABEL_FONT_SIZE),
        })
    }

    /// First usable font among well-known system locations.
    pub fn discover() -> Option<Self> {
        SYSTEM_FONT_PATHS
            .iter()
            .map(Path::new)
            .filter(|path| path.is_file())
            .find_map(|path| match Self::load(path) {
                Ok(font) => {
                    debug!("Using label font {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    debug!("Skipping label font {}: {e}", path.display());
                    None
                }
            })
    }

    /// Rendered `(width, height)` of `text`.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, &self.font, text)
    }
}

/// Confidence rounded up to two decimals.
///
/// The product is first rounded to four decimals so that binary noise such as
/// `0.87f32 -> 0.8700000047` does not bump the result to the next hundredth.
pub fn ceil_confidence(confidence: f32) -> f64 {
    let scaled = (f64::from(confidence) * 100.0 * 1e4).round() / 1e4;
    scaled.ceil() / 100.0
}

/// Label drawn next to a box, e.g. `"pothole 0.88"`.
pub fn format_label(category: &str, confidence: f64) -> String {
    format!("{category} {confidence:.2}")
}

/// Draw a box outline and a filled label bar above its top-left corner.
///
/// With a font, `label` is written into the bar. Coordinates are clamped to
/// the image; degenerate boxes are ignored.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
pub fn draw_detection(
    image: &mut RgbImage,
    bbox: [f32; 4],
    label: &str,
    font: Option<&LabelFont>,
) {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return;
    }

    let clamp_x = |v: f32| (v.max(0.0) as u32).min(w - 1);
    let clamp_y = |v: f32| (v.max(0.0) as u32).min(h - 1);
    let (x1, y1, x2, y2) = (
        clamp_x(bbox[0]),
        clamp_y(bbox[1]),
        clamp_x(bbox[2]),
        clamp_y(bbox[3]),
    );
    if x1 >= x2 || y1 >= y2 {
        return;
    }

    let color = Rgb(BOX_COLOR);
    for t in 0..BOX_THICKNESS {
        let (bw, bh) = ((x2 - x1 + 1).saturating_sub(2 * t), (y2 - y1 + 1).saturating_sub(2 * t));
        if bw == 0 || bh == 0 {
            break;
        }
        let rect = Rect::at((x1 + t) as i32, (y1 + t) as i32).of_size(bw, bh);
        draw_hollow_rect_mut(image, rect, color);
    }

    let bar_width = match font {
        Some(font) => font.measure(label).0 + 2 * LABEL_PADDING,
        None => label.chars().count() as u32 * LABEL_CHAR_WIDTH,
    }
    .max(1);
    let bar_top = y1.saturating_sub(LABEL_HEIGHT);
    let bar_height = (y1 - bar_top).max(1);
    let bar = Rect::at(x1 as i32, bar_top as i32).of_size(bar_width, bar_height);
    draw_filled_rect_mut(image, bar, color);

    if let Some(font) = font {
        let text_height = font.measure(label).1;
        let text_top = bar_top + bar_height.saturating_sub(text_height) / 2;
        draw_text_mut(
            image,
            Rgb(LABEL_TEXT_COLOR),
            (x1 + LABEL_PADDING) as i32,
            text_top as i32,
            font.scale,
            &font.font,
            label,
        );
    }
}

/// Save `image` as a JPEG capture.
pub fn save_capture(image: &RgbImage, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::FrameWrite {
        path: path.to_path_buf(),
        source: image::ImageError::IoError(e),
    })?;
    let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), CAPTURE_JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|e| Error::FrameWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ceil_confidence() {
        assert_eq!(ceil_confidence(0.87), 0.87);
        assert_eq!(ceil_confidence(0.871), 0.88);
        assert_eq!(ceil_confidence(0.5), 0.5);
        assert_eq!(ceil_confidence(0.401), 0.41);
    }

    #[test]
    fn test_format_label() {
        assert_eq!(format_label("pothole", 0.88), "pothole 0.88");
        assert_eq!(format_label("crack", 0.5), "crack 0.50");
    }

    #[test]
    fn test_draw_marks_box_edges() {
        let mut image = RgbImage::new(64, 64);
        draw_detection(&mut image, [10.0, 30.0, 40.0, 50.0], "pothole 0.9", None);

        assert_eq!(*image.get_pixel(10, 40), Rgb(BOX_COLOR));
        assert_eq!(*image.get_pixel(12, 40), Rgb(BOX_COLOR));
        assert_eq!(*image.get_pixel(40, 40), Rgb(BOX_COLOR));
        assert_eq!(*image.get_pixel(25, 40), Rgb([0, 0, 0]));
        // Label bar sits above the box.
        assert_eq!(*image.get_pixel(12, 20), Rgb(BOX_COLOR));
    }

    #[test]
    fn test_draw_ignores_degenerate_and_offscreen() {
        let mut image = RgbImage::new(16, 16);
        draw_detection(&mut image, [5.0, 5.0, 5.0, 9.0], "x", None);
        draw_detection(&mut image, [-20.0, -20.0, -10.0, -10.0], "x", None);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_label_text_drawn_with_font() {
        // Runs only where a system font is installed.
        let Some(font) = LabelFont::discover() else {
            return;
        };
        let mut image = RgbImage::new(200, 80);
        draw_detection(&mut image, [10.0, 40.0, 150.0, 70.0], "pothole 0.88", Some(&font));

        // Text blends into the magenta bar, which spans rows 18..40.
        let bar = Rgb(BOX_COLOR);
        let marked = (12..150)
            .flat_map(|x| (19..39).map(move |y| (x, y)))
            .filter(|&(x, y)| {
                let p = *image.get_pixel(x, y);
                p != bar && p != Rgb([0, 0, 0])
            })
            .count();
        assert!(marked > 0);
        assert_eq!(*image.get_pixel(80, 55), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_font_load_rejects_non_font() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("not-a-font.ttf");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(
            LabelFont::load(&path),
            Err(Error::FontLoad { .. })
        ));
        assert!(matches!(
            LabelFont::load(&dir.path().join("missing.ttf")),
            Err(Error::FontLoad { .. })
        ));
    }

    #[test]
    fn test_save_capture_writes_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.jpg");
        save_capture(&RgbImage::new(8, 8), &path).unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), 8);
    }
}
