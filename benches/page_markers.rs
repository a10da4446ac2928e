//! Page Marker Benchmarks
//!
//! Encoding, decoding and selection over large packed documents.
//!
//! Run with: `cargo bench --bench page_markers`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use folio_ocr::pages::{decode_pages, encode_pages, PageResult, PageSelectionService};

/// Build a document of `page_count` pages with a paragraph each
fn create_pages(page_count: u32) -> Vec<PageResult> {
    (1..=page_count)
        .map(|n| {
            let text = format!(
                "Page {} of the benchmark document. The quick brown fox jumps over the lazy dog.\n",
                n
            )
            .repeat(20);
            PageResult::new(n, text, 90.0)
        })
        .collect()
}

fn bench_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_markers");
    group.measurement_time(Duration::from_secs(5));

    for page_count in [10u32, 100, 500] {
        let pages = create_pages(page_count);
        let packed = encode_pages(&pages);

        group.bench_with_input(BenchmarkId::new("encode", page_count), &pages, |b, pages| {
            b.iter(|| black_box(encode_pages(black_box(pages))))
        });
        group.bench_with_input(BenchmarkId::new("decode", page_count), &packed, |b, packed| {
            b.iter(|| black_box(decode_pages(black_box(packed))))
        });
    }

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let packed = encode_pages(&create_pages(500));
    let wanted: Vec<u32> = (1..=500).step_by(7).collect();

    let mut group = c.benchmark_group("page_selection");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("uncached", |b| {
        let service = PageSelectionService::default();
        b.iter(|| black_box(service.extract_selected_pages(&packed, black_box(&wanted), None)))
    });

    group.bench_function("cached", |b| {
        let service = PageSelectionService::default();
        b.iter(|| {
            black_box(service.extract_selected_pages(&packed, black_box(&wanted), Some("bench")))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_encode_decode, bench_selection);
criterion_main!(benches);
