//! Baseline timings for the per-frame hot paths: fitting, snapping and
//! scaled-bitmap lookups.
//!
//! Run with: cargo bench --bench perf_baseline

use std::path::Path;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use frameless_viewer::geometry::{display_size, fit_within, PanelRect, Snapper};
use frameless_viewer::image_cache::ImageCache;
use frameless_viewer::image_loader::{DecodedImage, ImageCodec, SiblingFiles};
use frameless_viewer::Result;

/// Solid bitmaps sized from the file stem ("800x600.png"), no disk access.
struct SyntheticCodec;

impl ImageCodec for SyntheticCodec {
    fn decode(&self, path: &Path) -> Result<RgbaImage> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("1x1");
        let (w, h) = stem.split_once('x').unwrap_or(("1", "1"));
        let (w, h) = (w.parse().unwrap_or(1), h.parse().unwrap_or(1));
        Ok(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])))
    }
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    for &(w, h) in &[(640u32, 480u32), (4000, 3000), (300, 9000)] {
        group.bench_with_input(BenchmarkId::new("display_size", format!("{w}x{h}")), &(w, h), |b, &size| {
            b.iter(|| {
                let fitted = fit_within(black_box(size), (1280, 720));
                let zoomed = display_size(black_box(size), (1280, 720), 1.21);
                (fitted, zoomed)
            })
        });
    }
    group.finish();
}

fn bench_snapping(c: &mut Criterion) {
    let snapper = Snapper { distance: 20, enabled: true };
    let area = (1920, 1080);
    let panel = PanelRect::new(0, 0, 300, 200);

    let mut group = c.benchmark_group("snap");
    for count in [1usize, 8, 32] {
        let siblings: Vec<PanelRect> = (0..count)
            .map(|i| PanelRect::new((i as i32 % 6) * 310, (i as i32 / 6) * 210, 300, 200))
            .collect();
        group.bench_with_input(BenchmarkId::new("move_to", count), &siblings, |b, siblings| {
            b.iter(|| snapper.move_to(black_box(panel), 905, 407, area, siblings.iter().copied()))
        });
    }
    group.finish();
}

fn bench_scaled_cache(c: &mut Criterion) {
    let cache = ImageCache::new(Box::new(SyntheticCodec), 1 << 28, FilterType::Triangle);
    let source: Arc<DecodedImage> = cache.image(Path::new("/bench/2000x1500.png")).unwrap();

    c.bench_function("scaled_cache_hit", |b| {
        cache.scaled(&source, 800, 600);
        b.iter(|| cache.scaled(black_box(&source), 800, 600))
    });

    c.bench_function("sibling_adjacent", |b| {
        let files = SiblingFiles::from_paths((0..2000).map(|i| format!("/bench/{i}.png").into()).collect());
        let current = Path::new("/bench/1500.png");
        b.iter(|| files.adjacent(black_box(current), frameless_viewer::image_loader::PageDirection::Next))
    });
}

criterion_group!(benches, bench_fit, bench_snapping, bench_scaled_cache);
criterion_main!(benches);
