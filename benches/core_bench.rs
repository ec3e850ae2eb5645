use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use powerhex_core::{
    fingerprint,
    record::{Metadata, NewScan},
    store::ScanStore,
    verdict::{self, ScanVerdict},
};

fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(256, 256, |x, y| Rgb([x as u8, y as u8, (x ^ y) as u8]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out
}

fn bench_fingerprint(c: &mut Criterion) {
    let png = sample_png();
    c.bench_function("file_hash_256px", |b| {
        b.iter(|| fingerprint::file_hash(black_box(&png)))
    });
    c.bench_function("extract_metadata_256px", |b| {
        b.iter(|| fingerprint::extract_metadata(black_box(&png)))
    });
}

fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify", |b| {
        b.iter(|| verdict::classify(black_box(0.61), black_box(0.79)))
    });
}

fn bench_store(c: &mut Criterion) {
    // 临时库，不落到工作目录
    let store = ScanStore::temporary().unwrap();
    let confidence = 0.72;
    let scan = NewScan {
        filename: "bench.png".to_string(),
        file_hash: "mock_sha256".to_string(),
        result: ScanVerdict::from_confidence(confidence),
        confidence,
        metadata: Metadata::new(),
    };

    c.bench_function("create_scan", |b| {
        b.iter(|| store.create_scan(scan.clone()).unwrap())
    });

    let id = store.create_scan(scan.clone()).unwrap();
    c.bench_function("set_then_clear_flag", |b| {
        b.iter(|| {
            store.set_flag(id, "Other").unwrap();
            store.clear_flag(id).unwrap();
        })
    });

    c.bench_function("aggregate", |b| b.iter(|| store.aggregate().unwrap()));
}

criterion_group!(benches, bench_fingerprint, bench_classify, bench_store);
criterion_main!(benches);
