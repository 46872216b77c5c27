//! Benchmarks for the ranking engine.

#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use promptvault::ranking::{RankMode, rank};
use promptvault::{Prompt, RankingConfig};

const NOW: u64 = 1_700_000_000_000;

fn make_prompts(count: usize) -> Vec<Prompt> {
    (0..count)
        .map(|i| Prompt {
            id: format!("p-{i}"),
            owner_id: "user-1".to_string(),
            slug: format!("prompt-{i:05}"),
            name: format!("Prompt {i}"),
            description: String::new(),
            content: "body text".to_string(),
            parameters: Vec::new(),
            tags: Vec::new(),
            search_text: String::new(),
            pinned: i % 17 == 0,
            favorited: i % 5 == 0,
            usage_count: (i as u64 * 7) % 200,
            last_used_at: if i % 3 == 0 {
                Some(NOW - (i as u64 % 60) * 86_400_000)
            } else {
                None
            },
            created_at: NOW,
            updated_at: NOW,
        })
        .collect()
}

fn bench_rank(c: &mut Criterion) {
    let weights = RankingConfig::default();
    let mut group = c.benchmark_group("rank");

    for size in [50, 500, 5000] {
        let prompts = make_prompts(size);
        group.bench_with_input(BenchmarkId::new("list", size), &prompts, |b, prompts| {
            b.iter(|| {
                rank(
                    black_box(prompts.clone()),
                    &weights,
                    RankMode::List,
                    NOW,
                )
            });
        });
        group.bench_with_input(BenchmarkId::new("search", size), &prompts, |b, prompts| {
            b.iter(|| {
                rank(
                    black_box(prompts.clone()),
                    &weights,
                    RankMode::Search,
                    NOW,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rank);
criterion_main!(benches);
