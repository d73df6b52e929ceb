use std::fmt;
use std::path::Path;

use chrono::{Local, NaiveDate};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::{LayoutKind, PixelBuffer};
use crate::session::{Session, SessionError};

// ============================================================================
// IMAGE EXPORT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_name)
    }
}

#[derive(Debug)]
pub enum ExportError {
    Io(std::io::Error),
    Encode(image::ImageError),
    EmptyCanvas,
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io(e) => write!(f, "I/O error: {}", e),
            ExportError::Encode(e) => write!(f, "Encoding error: {}", e),
            ExportError::EmptyCanvas => write!(f, "Canvas has no pixels to export"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

impl From<image::ImageError> for ExportError {
    fn from(e: image::ImageError) -> Self {
        ExportError::Encode(e)
    }
}

/// `sketch-YYYY-MM-DD.<ext>`
pub fn export_filename(format: ExportFormat, date: NaiveDate) -> String {
    format!("sketch-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Export filename stamped with today's local date.
pub fn default_export_filename(format: ExportFormat) -> String {
    export_filename(format, Local::now().date_naive())
}

/// Composite over opaque white, the way a browser flattens a canvas to JPEG.
pub fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        let a = p[3] as f32 / 255.0;
        let mix = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)).round() as u8;
        image::Rgb([mix(p[0]), mix(p[1]), mix(p[2])])
    })
}

/// Encode fully in memory. Nothing touches the filesystem here, so a failed
/// encode leaves no partial file behind.
pub fn encode_image(image: &RgbaImage, format: ExportFormat, quality: u8) -> Result<Vec<u8>, ExportError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ExportError::EmptyCanvas);
    }
    let mut out = Vec::new();
    match format {
        ExportFormat::Png => {
            PngEncoder::new(&mut out).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg => {
            let rgb = flatten_on_white(image);
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
    }
    Ok(out)
}

/// Encode the session's export composite and write it to `path`.
pub fn export_to_file(session: &Session, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
    let bytes = session.export_image(format).inspect_err(|e| {
        log_err!("Export to {} failed: {}", path.display(), e);
    })?;
    std::fs::write(path, &bytes).inspect_err(|e| {
        log_err!("Writing {} failed: {}", path.display(), e);
    })?;
    log_info!("Exported {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

// ============================================================================
// SESSION FILES (.skp)
// ============================================================================

const SKP_MAGIC_V1: &str = "SKP1";

#[derive(Serialize, Deserialize)]
pub struct SessionFileV1 {
    pub magic: String,
    pub layout: LayoutKind,
    pub grid_visible: bool,
    pub width: u32,
    pub height: u32,
    /// Committed buffer, row-major RGBA.
    pub pixels: Vec<u8>,
}

#[derive(Debug)]
pub enum SessionFileError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl fmt::Display for SessionFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFileError::Io(e) => write!(f, "I/O error: {}", e),
            SessionFileError::Serialize(e) => write!(f, "Serialization error: {}", e),
            SessionFileError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for SessionFileError {}

impl From<std::io::Error> for SessionFileError {
    fn from(e: std::io::Error) -> Self {
        SessionFileError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SessionFileError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SessionFileError::Serialize(e.to_string())
    }
}

impl From<SessionError> for SessionFileError {
    fn from(e: SessionError) -> Self {
        SessionFileError::InvalidFormat(e.to_string())
    }
}

pub fn build_session_file(session: &Session) -> SessionFileV1 {
    let canvas = session.canvas();
    SessionFileV1 {
        magic: SKP_MAGIC_V1.to_string(),
        layout: canvas.layout.kind,
        grid_visible: canvas.layout.grid_visible,
        width: canvas.width(),
        height: canvas.height(),
        pixels: canvas.committed.as_raw().to_vec(),
    }
}

pub fn encode_session(session: &Session) -> Result<Vec<u8>, SessionFileError> {
    Ok(bincode::serialize(&build_session_file(session))?)
}

/// Decode a session file into its layout, grid flag and pixels.
pub fn decode_session(raw: &[u8]) -> Result<(LayoutKind, bool, PixelBuffer), SessionFileError> {
    // bincode writes the magic String as an 8-byte length then its bytes
    if raw.len() < 12 {
        return Err(SessionFileError::InvalidFormat("File too small".into()));
    }
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != SKP_MAGIC_V1 {
        return Err(SessionFileError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let file: SessionFileV1 = bincode::deserialize(raw)?;
    let (w, h) = file.layout.dimensions();
    if (file.width, file.height) != (w, h) {
        return Err(SessionFileError::InvalidFormat(format!(
            "Layout {} needs {}x{} but file stores {}x{}",
            file.layout.config_name(),
            w,
            h,
            file.width,
            file.height
        )));
    }
    let image = RgbaImage::from_raw(file.width, file.height, file.pixels).ok_or_else(|| {
        SessionFileError::InvalidFormat("Pixel data length does not match dimensions".into())
    })?;
    Ok((file.layout, file.grid_visible, PixelBuffer::from_image(image)))
}

pub fn save_session(session: &mut Session, path: &Path) -> Result<(), SessionFileError> {
    let bytes = encode_session(session)?;
    std::fs::write(path, bytes)?;
    session.mark_clean();
    log_info!("Session saved to {}", path.display());
    Ok(())
}

/// Load a session file into `session`, replacing its canvas and history.
pub fn load_session(session: &mut Session, path: &Path) -> Result<(), SessionFileError> {
    let raw = std::fs::read(path)?;
    let (layout, grid, pixels) = decode_session(&raw).inspect_err(|e| {
        log_err!("Loading {} failed: {}", path.display(), e);
    })?;
    session.load_pixels(layout, grid, pixels)?;
    log_info!("Session loaded from {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tools::Tool;
    use image::Rgba;

    #[test]
    fn filename_is_date_stamped() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_filename(ExportFormat::Png, date), "sketch-2024-03-07.png");
        assert_eq!(export_filename(ExportFormat::Jpeg, date), "sketch-2024-03-07.jpg");
    }

    #[test]
    fn format_names() {
        assert_eq!(ExportFormat::from_name("JPEG"), Some(ExportFormat::Jpeg));
        assert_eq!(ExportFormat::from_path(Path::new("a/b.png")), Some(ExportFormat::Png));
        assert_eq!(ExportFormat::from_name("gif"), None);
    }

    #[test]
    fn png_keeps_alpha() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, Rgba([10, 20, 30, 128]));
        let bytes = encode_image(&img, ExportFormat::Png, 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn jpeg_flattens_to_white() {
        let img = RgbaImage::new(8, 8);
        let bytes = encode_image(&img, ExportFormat::Jpeg, 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c >= 250)));
    }

    #[test]
    fn empty_canvas_is_rejected() {
        let img = RgbaImage::new(0, 0);
        assert!(matches!(encode_image(&img, ExportFormat::Png, 80), Err(ExportError::EmptyCanvas)));
    }

    #[test]
    fn session_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.skp");

        let mut s = Session::default();
        s.set_layout(LayoutKind::Landscape);
        s.set_grid_visible(true);
        s.select_tool(Tool::FillBucket);
        s.set_color_hex("#336699");
        s.pointer_down(5.0, 5.0);
        save_session(&mut s, &path).unwrap();

        let mut loaded = Session::default();
        load_session(&mut loaded, &path).unwrap();
        assert_eq!(loaded.layout().kind, LayoutKind::Landscape);
        assert!(loaded.layout().grid_visible);
        assert_eq!(loaded.canvas().committed, s.canvas().committed);
        assert!(!loaded.can_undo());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut raw = bincode::serialize(&SessionFileV1 {
            magic: "NOPE".into(),
            layout: LayoutKind::Portrait,
            grid_visible: false,
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        })
        .unwrap();
        assert!(matches!(decode_session(&raw), Err(SessionFileError::InvalidFormat(_))));
        raw.truncate(4);
        assert!(matches!(decode_session(&raw), Err(SessionFileError::InvalidFormat(_))));
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let raw = bincode::serialize(&SessionFileV1 {
            magic: SKP_MAGIC_V1.into(),
            layout: LayoutKind::Portrait,
            grid_visible: false,
            width: 842,
            height: 595,
            pixels: vec![0; 842 * 595 * 4],
        })
        .unwrap();
        assert!(matches!(decode_session(&raw), Err(SessionFileError::InvalidFormat(_))));
    }

    #[test]
    fn failed_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.png");
        let s = Session::default();
        assert!(matches!(export_to_file(&s, &path, ExportFormat::Png), Err(ExportError::Io(_))));
        assert!(!path.exists());
    }
}
