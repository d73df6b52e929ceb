//! Persistent user settings stored as `key=value` lines.

use std::path::{Path, PathBuf};

use crate::canvas::LayoutKind;
use crate::components::colors::{format_hex, parse_hex};
use crate::keybindings::KeyBindings;

const SETTINGS_FILE_NAME: &str = "sketchpad_settings.cfg";

#[derive(Clone, Debug, PartialEq)]
pub struct SketchSettings {
    /// Maximum number of undo steps (history depth, floor snapshot included)
    pub max_undo_steps: usize,
    /// Per-channel RGB tolerance used by the flood fill boundary test
    pub fill_color_threshold: u8,
    /// Alpha cutoff separating "transparent" from "painted" during flood fill
    pub fill_alpha_threshold: u8,
    pub pencil_opacity: f32,
    /// The marker ignores the user opacity and always paints at this alpha
    pub marker_opacity: f32,
    pub spray_opacity: f32,
    pub wet_brush_opacity: f32,
    /// Alpha at the far end of each wet-brush segment
    pub wet_brush_tail_alpha: f32,
    /// JPEG export quality, 1-100
    pub jpeg_quality: u8,
    pub default_layout: LayoutKind,
    pub default_thickness: u32,
    pub default_color: [u8; 3],
    pub keybindings: KeyBindings,
}

impl Default for SketchSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 20,
            fill_color_threshold: 10,
            fill_alpha_threshold: 10,
            pencil_opacity: 0.5,
            marker_opacity: 0.5,
            spray_opacity: 0.3,
            wet_brush_opacity: 0.7,
            wet_brush_tail_alpha: 0.5,
            jpeg_quality: 80,
            default_layout: LayoutKind::Portrait,
            default_thickness: 5,
            default_color: [0, 0, 0],
            keybindings: KeyBindings::default(),
        }
    }
}

impl SketchSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/sketchpad/sketchpad_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Sketchpad\sketchpad_settings.cfg
    /// On macOS:   ~/Library/Application Support/Sketchpad/sketchpad_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("Sketchpad").join(SETTINGS_FILE_NAME));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Sketchpad")
                    .join(SETTINGS_FILE_NAME),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("sketchpad").join(SETTINGS_FILE_NAME))
        }
    }

    /// Load settings from the platform location (defaults if missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse config text. Unknown keys are ignored; malformed values keep
    /// their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_undo_steps" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.max_undo_steps = v.max(1);
                    }
                }
                "fill_color_threshold" => {
                    if let Ok(v) = val.parse() { s.fill_color_threshold = v; }
                }
                "fill_alpha_threshold" => {
                    if let Ok(v) = val.parse() { s.fill_alpha_threshold = v; }
                }
                "pencil_opacity" => {
                    if let Some(v) = parse_unit(val) { s.pencil_opacity = v; }
                }
                "marker_opacity" => {
                    if let Some(v) = parse_unit(val) { s.marker_opacity = v; }
                }
                "spray_opacity" => {
                    if let Some(v) = parse_unit(val) { s.spray_opacity = v; }
                }
                "wet_brush_opacity" => {
                    if let Some(v) = parse_unit(val) { s.wet_brush_opacity = v; }
                }
                "wet_brush_tail_alpha" => {
                    if let Some(v) = parse_unit(val) { s.wet_brush_tail_alpha = v; }
                }
                "jpeg_quality" => {
                    if let Ok(v) = val.parse::<u8>() {
                        s.jpeg_quality = v.clamp(1, 100);
                    }
                }
                "default_layout" => {
                    if let Some(kind) = LayoutKind::from_name(val) { s.default_layout = kind; }
                }
                "default_thickness" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.default_thickness = v.max(1);
                    }
                }
                "default_color" => {
                    if let Some(c) = parse_hex(val) { s.default_color = c; }
                }
                _ => {
                    if let Some(action) = key.strip_prefix("keybind.") {
                        s.keybindings.load_config_line(action, val);
                    }
                }
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let mut content = format!(
            "max_undo_steps={}\n\
             fill_color_threshold={}\n\
             fill_alpha_threshold={}\n\
             pencil_opacity={}\n\
             marker_opacity={}\n\
             spray_opacity={}\n\
             wet_brush_opacity={}\n\
             wet_brush_tail_alpha={}\n\
             jpeg_quality={}\n\
             default_layout={}\n\
             default_thickness={}\n\
             default_color={}\n",
            self.max_undo_steps,
            self.fill_color_threshold,
            self.fill_alpha_threshold,
            self.pencil_opacity,
            self.marker_opacity,
            self.spray_opacity,
            self.wet_brush_opacity,
            self.wet_brush_tail_alpha,
            self.jpeg_quality,
            self.default_layout.config_name(),
            self.default_thickness,
            format_hex(self.default_color),
        );
        for line in self.keybindings.to_config_lines() {
            content.push_str(&line);
            content.push('\n');
        }
        content
    }

    /// Save settings to the platform location
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }
}

fn parse_unit(val: &str) -> Option<f32> {
    val.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}
