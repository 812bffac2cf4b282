//! Benchmarks for page text reconstruction and search at varying run counts.
//!
//! Run with: `cargo bench --bench layout_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use restamp::layout::{reconstruct_page, LayoutConfig};
use restamp::matcher::{Matcher, SearchOptions};
use restamp::provider::{GlyphRun, PageRuns};

/// Generate a page of `run_count` word-sized runs laid out in rows, the way
/// word processors emit one run per word.
fn generate_runs(run_count: usize) -> PageRuns {
    let words = [
        "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing",
        "elit", "sed", "tempor", "needle", "labore",
    ];
    let font_size = 11.0;
    let mut runs = Vec::with_capacity(run_count);
    let mut x = 72.0;
    let mut y = 720.0;

    for i in 0..run_count {
        let word = words[i % words.len()];
        let width = word.len() as f64 * font_size * 0.5;
        if x + width > 540.0 {
            x = 72.0;
            y -= font_size * 1.3;
        }
        runs.push(GlyphRun {
            text: word.to_string(),
            transform: [font_size, 0.0, 0.0, font_size, x, y],
            width: Some(width),
            font_name: Some("F1".to_string()),
            font_size: Some(font_size),
            ends_line: false,
        });
        x += width + font_size * 0.3;
    }

    PageRuns {
        page_index: 0,
        page_width: 612.0,
        page_height: 792.0,
        runs,
    }
}

fn bench_reconstruct_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconstruct_page");
    let config = LayoutConfig::default();

    for &count in &[50usize, 500, 5_000] {
        let page = generate_runs(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("runs", count), &page, |b, page| {
            b.iter(|| black_box(reconstruct_page(black_box(page), &config)));
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let config = LayoutConfig::default();
    let page = generate_runs(5_000);
    let text = reconstruct_page(&page, &config).text;
    let matcher = Matcher::new(&SearchOptions::new("needle")).unwrap();

    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("literal_5k_runs", |b| {
        b.iter(|| black_box(matcher.spans(black_box(&text))));
    });

    let whole_word = Matcher::new(&SearchOptions {
        search: "needle".to_string(),
        case_sensitive: false,
        whole_word: true,
    })
    .unwrap();
    group.bench_function("whole_word_5k_runs", |b| {
        b.iter(|| black_box(whole_word.spans(black_box(&text))));
    });

    group.finish();
}

criterion_group!(benches, bench_reconstruct_page, bench_search);

criterion_main!(benches);
