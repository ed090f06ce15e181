//! Configuration module for keybindings and viewer settings.
//!
//! Settings and shortcut overrides live in `config.ini` inside the user's
//! config directory. A missing or unreadable file is never fatal: the
//! built-in defaults are used and a template is written for the next run.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::{debug, info, warn};

use crate::geometry::{Edge, DEFAULT_MINIMUM_SIZE, DEFAULT_SNAP_DISTANCE};

const DEFAULT_CONFIG_INI: &str = include_str!("../config.ini");

/// Image resampling filter types for scaling operations.
/// Listed from fastest (lowest quality) to slowest (highest quality).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFilter {
    /// Nearest neighbor - fastest, pixelated look (good for pixel art)
    Nearest,
    /// Triangle (bilinear) - fast, smooth but can be blurry
    Triangle,
    /// Catmull-Rom - good balance of speed and quality (recommended default)
    CatmullRom,
    /// Gaussian - smooth results, slightly soft
    Gaussian,
    /// Lanczos3 - highest quality, sharpest results, slowest
    Lanczos3,
}

impl ImageFilter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" | "point" | "nn" => Some(Self::Nearest),
            "triangle" | "bilinear" | "linear" => Some(Self::Triangle),
            "catmullrom" | "catmull-rom" | "catmull_rom" | "cubic" => Some(Self::CatmullRom),
            "gaussian" | "gauss" => Some(Self::Gaussian),
            "lanczos" | "lanczos3" | "sinc" => Some(Self::Lanczos3),
            _ => None,
        }
    }

    /// Convert to image crate's FilterType
    pub fn to_image_filter(&self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    /// Nearest neighbor - sharp pixels, no smoothing
    Nearest,
    /// Linear (bilinear) - smooth interpolation between pixels
    Linear,
}

impl TextureFilter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" | "point" | "nn" | "sharp" => Some(Self::Nearest),
            "linear" | "bilinear" | "smooth" => Some(Self::Linear),
            _ => None,
        }
    }

    /// Convert to egui TextureOptions
    pub fn to_egui_options(&self) -> egui::TextureOptions {
        match self {
            Self::Nearest => egui::TextureOptions::NEAREST,
            Self::Linear => egui::TextureOptions::LINEAR,
        }
    }
}

/// All bindable actions of a viewer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PreviousImage,
    NextImage,
    MaximizePanel,
    TogglePanelDivisor,
    HalfOfWindow(Edge),
    HalfOfSelf(Edge),
    FocusNextPanel,
    FocusPreviousPanel,
    // Context-menu actions, unbound by default.
    NewWindow,
    NewPanel,
    CloneWindow,
    ToggleLock,
    ToggleTitleBar,
    FitToImage,
    ResetZoom,
    RemovePanel,
    CloseWindow,
}

impl Action {
    pub fn from_str(s: &str) -> Option<Action> {
        let normalized: String = s.trim().to_lowercase().chars().filter(|c| *c != '_' && *c != '-').collect();
        match normalized.as_str() {
            "previousimage" | "previmage" | "prev" => Some(Action::PreviousImage),
            "nextimage" | "next" => Some(Action::NextImage),
            "maximizepanel" | "maximizeimage" | "maximize" => Some(Action::MaximizePanel),
            "togglepaneldivisor" | "changepaneldivisor" => Some(Action::TogglePanelDivisor),
            "halfofwindowleft" | "halfofallleft" => Some(Action::HalfOfWindow(Edge::Left)),
            "halfofwindowright" | "halfofallright" => Some(Action::HalfOfWindow(Edge::Right)),
            "halfofwindowup" | "halfofallup" => Some(Action::HalfOfWindow(Edge::Up)),
            "halfofwindowdown" | "halfofalldown" => Some(Action::HalfOfWindow(Edge::Down)),
            "halfofselfleft" => Some(Action::HalfOfSelf(Edge::Left)),
            "halfofselfright" => Some(Action::HalfOfSelf(Edge::Right)),
            "halfofselfup" => Some(Action::HalfOfSelf(Edge::Up)),
            "halfofselfdown" => Some(Action::HalfOfSelf(Edge::Down)),
            "focusnextpanel" => Some(Action::FocusNextPanel),
            "focuspreviouspanel" | "focusprevpanel" => Some(Action::FocusPreviousPanel),
            "newwindow" => Some(Action::NewWindow),
            "newpanel" | "newwidget" => Some(Action::NewPanel),
            "clonewindow" | "clone" => Some(Action::CloneWindow),
            "togglelock" | "locktowindow" => Some(Action::ToggleLock),
            "toggletitlebar" | "toggletitle" => Some(Action::ToggleTitleBar),
            "fittoimage" => Some(Action::FitToImage),
            "resetzoom" => Some(Action::ResetZoom),
            "removepanel" | "removewidget" => Some(Action::RemovePanel),
            "closewindow" | "exit" | "close" => Some(Action::CloseWindow),
            _ => None,
        }
    }

    /// Whether the action rearranges panels, which locked mode forbids.
    pub fn edits_layout(&self) -> bool {
        matches!(
            self,
            Action::HalfOfWindow(_) | Action::HalfOfSelf(_) | Action::FocusNextPanel | Action::FocusPreviousPanel
        )
    }
}

/// A key plus the modifiers held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub key: egui::Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyChord {
    pub const fn key(key: egui::Key) -> Self {
        Self { key, ctrl: false, shift: false, alt: false }
    }

    pub const fn ctrl(key: egui::Key) -> Self {
        Self { key, ctrl: true, shift: false, alt: false }
    }

    pub const fn alt(key: egui::Key) -> Self {
        Self { key, ctrl: false, shift: false, alt: true }
    }

    pub fn from_egui(key: egui::Key, modifiers: &egui::Modifiers) -> Self {
        Self {
            key,
            ctrl: modifiers.command || modifiers.ctrl,
            shift: modifiers.shift,
            alt: modifiers.alt,
        }
    }

    /// Parse `ctrl+alt+left` style strings. Modifiers may appear in any order.
    pub fn parse(s: &str) -> Option<Self> {
        let mut chord_key = None;
        let (mut ctrl, mut shift, mut alt) = (false, false, false);

        for part in s.trim().to_lowercase().split('+') {
            match part.trim() {
                "ctrl" | "control" | "cmd" => ctrl = true,
                "shift" => shift = true,
                "alt" | "option" => alt = true,
                other => {
                    if chord_key.is_some() {
                        return None;
                    }
                    chord_key = Some(parse_key(other)?);
                }
            }
        }

        chord_key.map(|key| Self { key, ctrl, shift, alt })
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("ctrl+")?;
        }
        if self.shift {
            f.write_str("shift+")?;
        }
        if self.alt {
            f.write_str("alt+")?;
        }
        write!(f, "{}", format!("{:?}", self.key).to_lowercase())
    }
}

/// Parse a single key name. Accepts egui's names plus a few aliases
/// ("left", "page_up", "esc", "num5", "plus").
fn parse_key(s: &str) -> Option<egui::Key> {
    let name = s.trim().to_lowercase().replace('_', "");
    let canonical = match name.as_str() {
        "left" | "arrowleft" => "ArrowLeft",
        "right" | "arrowright" => "ArrowRight",
        "up" | "arrowup" => "ArrowUp",
        "down" | "arrowdown" => "ArrowDown",
        "pageup" => "PageUp",
        "pagedown" => "PageDown",
        "esc" | "escape" => "Escape",
        "enter" | "return" => "Enter",
        "space" | "spacebar" => "Space",
        "del" | "delete" => "Delete",
        "ins" | "insert" => "Insert",
        "home" => "Home",
        "end" => "End",
        "tab" => "Tab",
        "backspace" => "Backspace",
        "minus" => "Minus",
        "plus" | "equals" => "Equals",
        other => {
            let other = other.strip_prefix("num").filter(|d| !d.is_empty()).unwrap_or(other);
            return egui::Key::from_name(&other.to_uppercase());
        }
    };
    egui::Key::from_name(canonical)
}

/// One chord per action; chords map to at most one action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keymap {
    bindings: HashMap<KeyChord, Action>,
}

impl Keymap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        use egui::Key;

        let mut keymap = Self::empty();
        for (action, chord) in [
            (Action::HalfOfWindow(Edge::Left), KeyChord::ctrl(Key::ArrowLeft)),
            (Action::HalfOfWindow(Edge::Right), KeyChord::ctrl(Key::ArrowRight)),
            (Action::HalfOfWindow(Edge::Up), KeyChord::ctrl(Key::ArrowUp)),
            (Action::HalfOfWindow(Edge::Down), KeyChord::ctrl(Key::ArrowDown)),
            (Action::HalfOfSelf(Edge::Left), KeyChord::alt(Key::ArrowLeft)),
            (Action::HalfOfSelf(Edge::Right), KeyChord::alt(Key::ArrowRight)),
            (Action::HalfOfSelf(Edge::Up), KeyChord::alt(Key::ArrowUp)),
            (Action::HalfOfSelf(Edge::Down), KeyChord::alt(Key::ArrowDown)),
            (Action::PreviousImage, KeyChord::key(Key::ArrowLeft)),
            (Action::NextImage, KeyChord::key(Key::ArrowRight)),
            (Action::MaximizePanel, KeyChord::key(Key::ArrowUp)),
            (Action::TogglePanelDivisor, KeyChord::key(Key::ArrowDown)),
            (Action::FocusNextPanel, KeyChord::key(Key::PageUp)),
            (Action::FocusPreviousPanel, KeyChord::key(Key::PageDown)),
        ] {
            keymap.bind(action, chord);
        }
        keymap
    }

    /// Bind `chord` to `action`, dropping whatever chord the action had
    /// before so an override never leaves two triggers behind.
    pub fn bind(&mut self, action: Action, chord: KeyChord) {
        self.bindings.retain(|_, bound| *bound != action);
        self.bindings.insert(chord, action);
    }

    pub fn lookup(&self, chord: &KeyChord) -> Option<Action> {
        self.bindings.get(chord).copied()
    }

    pub fn chord_for(&self, action: Action) -> Option<KeyChord> {
        self.bindings.iter().find(|(_, a)| **a == action).map(|(chord, _)| *chord)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Tunables read from the `[Settings]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Pixel threshold for edge and neighbor snapping
    pub snap_distance: i32,
    /// Smallest width/height a panel can be resized to
    pub minimum_panel_size: i32,
    /// Zoom multiplier per wheel notch towards the user
    pub zoom_in_factor: f64,
    /// Zoom multiplier per wheel notch away from the user
    pub zoom_out_factor: f64,
    /// Controller tick interval in milliseconds
    pub controller_interval_ms: u64,
    /// How often a window checks for images sent from other windows
    pub inbound_poll_ms: u64,
    /// Budget for decoded + scaled bitmaps, in megabytes
    pub cache_capacity_mb: u64,
    /// Decode on a background worker instead of the UI thread
    pub decode_in_background: bool,
    pub scale_filter: ImageFilter,
    pub texture_filter: TextureFilter,
    /// Window background color as RGB (0-255)
    pub background_rgb: [u8; 3],
    /// Panel fill behind the image
    pub panel_rgb: [u8; 3],
    pub border_rgb: [u8; 3],
    pub focused_border_rgb: [u8; 3],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            snap_distance: DEFAULT_SNAP_DISTANCE,
            minimum_panel_size: DEFAULT_MINIMUM_SIZE,
            zoom_in_factor: 1.1,
            zoom_out_factor: 0.9,
            controller_interval_ms: 500,
            inbound_poll_ms: 1000,
            cache_capacity_mb: 256,
            decode_in_background: true,
            scale_filter: ImageFilter::CatmullRom,
            texture_filter: TextureFilter::Linear,
            background_rgb: [0, 0, 0],
            panel_rgb: [128, 128, 128],
            border_rgb: [255, 255, 255],
            focused_border_rgb: [0, 255, 255],
        }
    }
}

impl Settings {
    pub fn cache_capacity_bytes(&self) -> u64 {
        self.cache_capacity_mb.saturating_mul(1024 * 1024)
    }

    fn apply(&mut self, key: &str, value: &str) -> bool {
        match key {
            "snap_distance" => set_parsed(value, |v: i32| self.snap_distance = v.clamp(1, 200)),
            "minimum_panel_size" | "minimum_size" => {
                set_parsed(value, |v: i32| self.minimum_panel_size = v.clamp(10, 2000))
            }
            "zoom_in_factor" => set_parsed(value, |v: f64| self.zoom_in_factor = v.clamp(1.001, 4.0)),
            "zoom_out_factor" => set_parsed(value, |v: f64| self.zoom_out_factor = v.clamp(0.25, 0.999)),
            "controller_interval_ms" => {
                set_parsed(value, |v: u64| self.controller_interval_ms = v.clamp(100, 5000))
            }
            "inbound_poll_ms" => set_parsed(value, |v: u64| self.inbound_poll_ms = v.clamp(100, 10_000)),
            "cache_capacity_mb" => set_parsed(value, |v: u64| self.cache_capacity_mb = v.clamp(16, 16_384)),
            "decode_in_background" => parse_bool(value).map(|v| self.decode_in_background = v).is_some(),
            "scale_filter" => ImageFilter::from_str(value).map(|v| self.scale_filter = v).is_some(),
            "texture_filter" => TextureFilter::from_str(value).map(|v| self.texture_filter = v).is_some(),
            "background_rgb" => parse_rgb_triplet(value).map(|v| self.background_rgb = v).is_some(),
            "panel_rgb" => parse_rgb_triplet(value).map(|v| self.panel_rgb = v).is_some(),
            "border_rgb" => parse_rgb_triplet(value).map(|v| self.border_rgb = v).is_some(),
            "focused_border_rgb" => parse_rgb_triplet(value).map(|v| self.focused_border_rgb = v).is_some(),
            _ => false,
        }
    }
}

fn set_parsed<T: std::str::FromStr>(value: &str, apply: impl FnOnce(T)) -> bool {
    match value.parse::<T>() {
        Ok(v) => {
            apply(v);
            true
        }
        Err(_) => false,
    }
}

/// Application configuration loaded from INI file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub settings: Settings,
    pub keymap: Keymap,
}

impl Config {
    pub fn defaults() -> Self {
        Self { settings: Settings::default(), keymap: Keymap::with_defaults() }
    }

    /// Directory holding `config.ini` and the log file.
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "frameless-viewer").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.ini"))
    }

    /// Load from the user config directory, writing the template on first run.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("no home directory; using built-in configuration");
                Self::defaults()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            if let Some(dir) = path.parent() {
                let _ = fs::create_dir_all(dir);
            }
            match fs::write(path, DEFAULT_CONFIG_INI) {
                Ok(()) => info!(path = %path.display(), "wrote default configuration"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not write default configuration"),
            }
            return Self::parse_ini(DEFAULT_CONFIG_INI);
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse_ini(&content),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read configuration; using defaults");
                Self::defaults()
            }
        }
    }

    /// Parse INI content on top of the defaults. Unknown sections, keys and
    /// malformed values are skipped.
    pub fn parse_ini(content: &str) -> Self {
        let mut config = Self::defaults();

        let mut in_shortcuts_section = false;
        let mut in_settings_section = false;

        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Check for section headers
            if line.starts_with('[') && line.ends_with(']') {
                let section = &line[1..line.len() - 1];
                in_shortcuts_section = section.eq_ignore_ascii_case("shortcuts")
                    || section.eq_ignore_ascii_case("keybindings");
                in_settings_section = section.eq_ignore_ascii_case("settings");
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if in_shortcuts_section {
                match (Action::from_str(key), KeyChord::parse(value)) {
                    (Some(action), Some(chord)) => config.keymap.bind(action, chord),
                    _ => debug!(key, value, "ignoring shortcut entry"),
                }
            } else if in_settings_section && !config.settings.apply(&key.to_lowercase(), value) {
                debug!(key, value, "ignoring settings entry");
            }
        }

        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_rgb_triplet(value: &str) -> Option<[u8; 3]> {
    let parts: Vec<&str> = value
        .split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 {
        return None;
    }
    let r = parts[0].parse::<u8>().ok()?;
    let g = parts[1].parse::<u8>().ok()?;
    let b = parts[2].parse::<u8>().ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Key;

    #[test]
    fn test_default_keymap_table() {
        let keymap = Keymap::with_defaults();
        assert_eq!(keymap.len(), 14);
        assert_eq!(keymap.lookup(&KeyChord::key(Key::ArrowRight)), Some(Action::NextImage));
        assert_eq!(keymap.lookup(&KeyChord::ctrl(Key::ArrowUp)), Some(Action::HalfOfWindow(Edge::Up)));
        assert_eq!(keymap.lookup(&KeyChord::alt(Key::ArrowDown)), Some(Action::HalfOfSelf(Edge::Down)));
        assert_eq!(keymap.lookup(&KeyChord::key(Key::PageUp)), Some(Action::FocusNextPanel));
        assert_eq!(keymap.lookup(&KeyChord::key(Key::A)), None);
    }

    #[test]
    fn test_override_replaces_existing_chord() {
        let mut keymap = Keymap::with_defaults();
        keymap.bind(Action::NextImage, KeyChord::key(Key::N));

        assert_eq!(keymap.lookup(&KeyChord::key(Key::N)), Some(Action::NextImage));
        assert_eq!(keymap.lookup(&KeyChord::key(Key::ArrowRight)), None);
        assert_eq!(keymap.len(), 14);
    }

    #[test]
    fn test_chord_parse_and_display() {
        let chord = KeyChord::parse("Alt + Ctrl + left").unwrap();
        assert_eq!(chord, KeyChord { key: Key::ArrowLeft, ctrl: true, shift: false, alt: true });
        assert_eq!(chord.to_string(), "ctrl+alt+arrowleft");
        assert_eq!(KeyChord::parse("ctrl+a+b"), None);
        assert_eq!(KeyChord::parse("ctrl+"), None);
        assert_eq!(KeyChord::parse("pagedown"), Some(KeyChord::key(Key::PageDown)));
    }

    #[test]
    fn test_key_aliases() {
        assert_eq!(parse_key("page_up"), Some(Key::PageUp));
        assert_eq!(parse_key("num5"), Some(Key::Num5));
        assert_eq!(parse_key("F11"), Some(Key::F11));
        assert_eq!(parse_key("plus"), Some(Key::Equals));
        assert_eq!(parse_key("nope"), None);
        let chord = KeyChord::ctrl(Key::Num0);
        assert_eq!(KeyChord::parse(&chord.to_string()), Some(chord));
    }

    #[test]
    fn test_action_names_accept_aliases() {
        assert_eq!(Action::from_str("next_image"), Some(Action::NextImage));
        assert_eq!(Action::from_str("halfOfAllLeft"), Some(Action::HalfOfWindow(Edge::Left)));
        assert_eq!(Action::from_str("focus-prev-panel"), Some(Action::FocusPreviousPanel));
        assert_eq!(Action::from_str("bogus"), None);
    }

    #[test]
    fn test_parse_ini_applies_overrides_and_settings() {
        let ini = "\
; comment
[Shortcuts]
next_image = n
toggle_lock = ctrl+l
garbage line
prev_image = not-a-key

[Settings]
snap_distance = 12
zoom_in_factor = 1.25
background_rgb = 10, 20, 30
texture_filter = nearest
cache_capacity_mb = oops
";
        let config = Config::parse_ini(ini);
        assert_eq!(config.keymap.lookup(&KeyChord::key(Key::N)), Some(Action::NextImage));
        assert_eq!(config.keymap.chord_for(Action::NextImage), Some(KeyChord::key(Key::N)));
        assert_eq!(config.keymap.lookup(&KeyChord::ctrl(Key::L)), Some(Action::ToggleLock));
        assert_eq!(config.keymap.lookup(&KeyChord::key(Key::ArrowLeft)), Some(Action::PreviousImage));
        assert_eq!(config.settings.snap_distance, 12);
        assert_eq!(config.settings.zoom_in_factor, 1.25);
        assert_eq!(config.settings.background_rgb, [10, 20, 30]);
        assert_eq!(config.settings.texture_filter, TextureFilter::Nearest);
        assert_eq!(config.settings.cache_capacity_mb, Settings::default().cache_capacity_mb);
    }

    #[test]
    fn test_embedded_template_matches_defaults() {
        assert_eq!(Config::parse_ini(DEFAULT_CONFIG_INI), Config::defaults());
    }

    #[test]
    fn test_load_from_missing_file_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");
        let config = Config::load_from(&path);
        assert_eq!(config, Config::defaults());
        assert!(path.exists());
    }
}
