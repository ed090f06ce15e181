//! Image decoding and directory listing.
//! Supports JPG, PNG, WEBP, GIF, BMP/DIB, ICO and TIFF files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageReader, RgbaImage};
use tracing::debug;

use crate::error::{Result, ViewerError};

/// Supported image extensions
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "dib", "ico", "tiff", "tif"];

/// Check if a file is a supported image
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Get all images in the same directory as the given path, in natural
/// case-insensitive order.
pub fn get_images_in_directory(path: &Path) -> Vec<PathBuf> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        Some(_) => Path::new("."),
        None => return Vec::new(),
    };

    let mut images: Vec<PathBuf> = std::fs::read_dir(parent)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_supported_image(p))
        .collect();

    images.sort_by(|a, b| {
        natord::compare(
            a.file_name().unwrap_or_default().to_str().unwrap_or(""),
            b.file_name().unwrap_or_default().to_str().unwrap_or(""),
        )
    });

    images
}

/// Decoded RGBA bitmap of one file.
#[derive(Debug)]
pub struct DecodedImage {
    pub path: PathBuf,
    pub pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(path: PathBuf, pixels: RgbaImage) -> Self {
        Self { path, pixels: Arc::new(pixels) }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Approximate heap footprint, used as the cache weight.
    pub fn byte_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// The codec collaborator: turns a path into pixels or fails.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RgbaImage>;
}

/// Codec backed by the `image` crate, sniffing the real format from the
/// file contents so mislabelled files still load.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    fn decode(&self, path: &Path) -> Result<RgbaImage> {
        if !is_supported_image(path) {
            return Err(ViewerError::UnsupportedFormat(path.to_path_buf()));
        }

        let reader = ImageReader::open(path)
            .map_err(|source| ViewerError::Io { path: path.to_path_buf(), source })?
            .with_guessed_format()
            .map_err(|source| ViewerError::Io { path: path.to_path_buf(), source })?;

        let img = reader
            .decode()
            .map_err(|source| ViewerError::Decode { path: path.to_path_buf(), source })?;

        let rgba = img.to_rgba8();
        debug!(path = %path.display(), width = rgba.width(), height = rgba.height(), "decoded image");
        Ok(rgba)
    }
}

/// Direction for paging through a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Previous,
    Next,
}

/// Image files next to the current one, in display order.
///
/// A finite, order-stable enumeration recomputed whenever the current path
/// changes. Entries are matched by file name, so relative and absolute spellings
/// of the same file page identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiblingFiles {
    files: Vec<PathBuf>,
}

impl SiblingFiles {
    pub fn scan(path: &Path) -> Self {
        Self { files: get_images_in_directory(path) }
    }

    pub fn from_paths(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The entry before/after `current`, wrapping at both ends.
    ///
    /// A `current` that is not listed behaves like a position just before the
    /// first entry: `Next` yields the first file, `Previous` the last.
    pub fn adjacent(&self, current: &Path, direction: PageDirection) -> Option<&Path> {
        let len = self.files.len();
        if len == 0 {
            return None;
        }

        let name = current.file_name();
        let index = self.files.iter().position(|p| p.file_name() == name);

        let target = match (direction, index) {
            (PageDirection::Next, Some(i)) => (i + 1) % len,
            (PageDirection::Next, None) => 0,
            (PageDirection::Previous, Some(0)) | (PageDirection::Previous, None) => len - 1,
            (PageDirection::Previous, Some(i)) => i - 1,
        };
        self.files.get(target).map(PathBuf::as_path)
    }
}

/// Simple natural sort comparison for filenames
pub mod natord {
    pub fn compare(a: &str, b: &str) -> std::cmp::Ordering {
        let mut a_chars = a.chars().peekable();
        let mut b_chars = b.chars().peekable();

        loop {
            match (a_chars.peek(), b_chars.peek()) {
                (None, None) => return std::cmp::Ordering::Equal,
                (None, Some(_)) => return std::cmp::Ordering::Less,
                (Some(_), None) => return std::cmp::Ordering::Greater,
                (Some(&ac), Some(&bc)) => {
                    if ac.is_ascii_digit() && bc.is_ascii_digit() {
                        let a_num = take_digits(&mut a_chars);
                        let b_num = take_digits(&mut b_chars);
                        match compare_digit_runs(&a_num, &b_num) {
                            std::cmp::Ordering::Equal => continue,
                            other => return other,
                        }
                    } else {
                        let ac_lower = ac.to_lowercase().next().unwrap_or(ac);
                        let bc_lower = bc.to_lowercase().next().unwrap_or(bc);
                        match ac_lower.cmp(&bc_lower) {
                            std::cmp::Ordering::Equal => {
                                a_chars.next();
                                b_chars.next();
                                continue;
                            }
                            other => return other,
                        }
                    }
                }
            }
        }
    }

    /// Numeric order of two digit runs of any length: leading zeros are
    /// ignored, then the longer run is larger, then digits compare in order.
    fn compare_digit_runs(a: &str, b: &str) -> std::cmp::Ordering {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }

    // `take_while` would also swallow the first non-digit.
    fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
        let mut digits = String::new();
        while let Some(&c) = chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            chars.next();
        }
        digits
    }
}
