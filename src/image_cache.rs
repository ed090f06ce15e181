//! Decoded and viewport-scaled bitmaps, shared between panels and windows.
//!
//! Both layers are byte-weighted `moka` caches: entries may be evicted at any
//! time and are simply decoded or rescaled again on the next request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::RgbaImage;
use moka::sync::Cache;
use tracing::{debug, trace};

use crate::error::Result;
use crate::image_loader::{DecodedImage, ImageCodec};

/// A bitmap resized for one panel at one zoom level.
#[derive(Debug)]
pub struct ScaledImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<RgbaImage>,
}

impl ScaledImage {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScaledKey {
    path: PathBuf,
    width: u32,
    height: u32,
}

fn weight(bytes: usize) -> u32 {
    u32::try_from(bytes).unwrap_or(u32::MAX)
}

pub struct ImageCache {
    codec: Box<dyn ImageCodec>,
    filter: FilterType,
    originals: Cache<PathBuf, Arc<DecodedImage>>,
    scaled: Cache<ScaledKey, Arc<ScaledImage>>,
}

impl ImageCache {
    /// `capacity_bytes` is split evenly between originals and scaled variants.
    pub fn new(codec: Box<dyn ImageCodec>, capacity_bytes: u64, filter: FilterType) -> Self {
        let half = (capacity_bytes / 2).max(1);
        let originals = Cache::builder()
            .max_capacity(half)
            .weigher(|_path: &PathBuf, image: &Arc<DecodedImage>| weight(image.byte_size()))
            .build();
        let scaled = Cache::builder()
            .max_capacity(half)
            .weigher(|_key: &ScaledKey, image: &Arc<ScaledImage>| weight(image.pixels.as_raw().len()))
            .build();

        Self { codec, filter, originals, scaled }
    }

    /// Decoded image for `path`, decoding on a miss. Failures are not cached.
    pub fn image(&self, path: &Path) -> Result<Arc<DecodedImage>> {
        if let Some(hit) = self.originals.get(path) {
            trace!(path = %path.display(), "decode cache hit");
            return Ok(hit);
        }

        let pixels = self.codec.decode(path)?;
        let decoded = Arc::new(DecodedImage::new(path.to_path_buf(), pixels));
        self.originals.insert(path.to_path_buf(), decoded.clone());
        Ok(decoded)
    }

    /// `source` resized to exactly `width`×`height`.
    ///
    /// Native-size requests share the source pixels without copying.
    pub fn scaled(&self, source: &Arc<DecodedImage>, width: u32, height: u32) -> Arc<ScaledImage> {
        let key = ScaledKey { path: source.path.clone(), width, height };
        if let Some(hit) = self.scaled.get(&key) {
            return hit;
        }

        let pixels = if source.dimensions() == (width, height) {
            source.pixels.clone()
        } else {
            debug!(path = %source.path.display(), width, height, "rescaling");
            Arc::new(image::imageops::resize(source.pixels.as_ref(), width, height, self.filter))
        };

        let scaled = Arc::new(ScaledImage { path: source.path.clone(), width, height, pixels });
        self.scaled.insert(key, scaled.clone());
        scaled
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.originals.contains_key(path)
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("filter", &self.filter)
            .field("originals", &self.originals.entry_count())
            .field("scaled", &self.scaled.entry_count())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ViewerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Produces a solid bitmap sized from the file stem, e.g. `40x30.png`.
    /// Stems that don't parse fail like a corrupt file would.
    pub(crate) struct CountingCodec {
        pub calls: Arc<AtomicUsize>,
    }

    impl ImageCodec for CountingCodec {
        fn decode(&self, path: &Path) -> Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let parsed = stem
                .split_once('x')
                .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)));
            match parsed {
                Some((w, h)) => Ok(RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 255]))),
                None => Err(ViewerError::UnsupportedFormat(path.to_path_buf())),
            }
        }
    }

    fn counting_cache() -> (ImageCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ImageCache::new(
            Box::new(CountingCodec { calls: calls.clone() }),
            64 * 1024 * 1024,
            FilterType::Nearest,
        );
        (cache, calls)
    }

    #[test]
    fn test_decode_once_then_hit() {
        let (cache, calls) = counting_cache();
        let a = cache.image(Path::new("/img/40x30.png")).unwrap();
        let b = cache.image(Path::new("/img/40x30.png")).unwrap();
        assert_eq!(a.dimensions(), (40, 30));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (cache, calls) = counting_cache();
        assert!(cache.image(Path::new("/img/broken.png")).is_err());
        assert!(cache.image(Path::new("/img/broken.png")).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.contains(Path::new("/img/broken.png")));
    }

    #[test]
    fn test_scaled_shares_pixels_at_native_size() {
        let (cache, _) = counting_cache();
        let source = cache.image(Path::new("/img/40x30.png")).unwrap();

        let native = cache.scaled(&source, 40, 30);
        assert!(Arc::ptr_eq(&native.pixels, &source.pixels));

        let half = cache.scaled(&source, 20, 15);
        assert_eq!(half.size(), (20, 15));
        assert_eq!(half.pixels.dimensions(), (20, 15));
        assert!(Arc::ptr_eq(&half, &cache.scaled(&source, 20, 15)));
    }
}
