//! Pure ranking engine for prompt candidates.
//!
//! `rank` is deterministic given its inputs and performs no I/O, which makes
//! it the most exhaustively unit-tested component. The score combines four
//! weighted signals:
//!
//! ```text
//! usage    = ln(1 + usage_count) * weights.usage
//! recency  = exp(-(now - last_used_at) / (half_life_days * 86_400_000)) * weights.recency
//! favorite = favorited ? weights.favorite : 0
//! pinned   = pinned    ? weights.pinned   : 0
//! ```
//!
//! List mode groups pinned prompts first and used-before-unused within each
//! group; search mode orders purely by score so textual relevance (already
//! reflected in candidate selection) is not buried under pinning.

use std::cmp::Ordering;

use crate::config::RankingConfig;
use crate::models::Prompt;

/// Milliseconds per day, for half-life decay.
const MS_PER_DAY: f64 = 86_400_000.0;

/// Which sort policy to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMode {
    /// Unfiltered list view: pinned-first, used-first, then score.
    List,
    /// Free-text search view: score only, no grouping.
    Search,
}

/// Computes the engagement score for a single candidate.
///
/// Deterministic for fixed inputs. `now_ms` is passed in rather than read from
/// the clock so repeated calls agree.
#[must_use]
pub fn score(prompt: &Prompt, weights: &RankingConfig, now_ms: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let usage = (1.0 + prompt.usage_count as f64).ln() * weights.usage_weight;

    let recency = match prompt.last_used_at {
        Some(last) if last > 0 => {
            #[allow(clippy::cast_precision_loss)]
            let age_ms = now_ms as f64 - last as f64;
            let half_life_ms = weights.half_life_days * MS_PER_DAY;
            (-age_ms / half_life_ms).exp() * weights.recency_weight
        },
        _ => 0.0,
    };

    let favorite = if prompt.favorited {
        weights.favorite_weight
    } else {
        0.0
    };
    let pinned = if prompt.pinned {
        weights.pinned_weight
    } else {
        0.0
    };

    usage + recency + favorite + pinned
}

/// Ranks a candidate set and returns it in final order.
///
/// List mode: pinned before unpinned, used before never-used, then score
/// descending, last-used descending, slug ascending. Search mode: score
/// descending, last-used descending, slug ascending. Empty input returns
/// empty output.
#[must_use]
pub fn rank(
    candidates: Vec<Prompt>,
    weights: &RankingConfig,
    mode: RankMode,
    now_ms: u64,
) -> Vec<Prompt> {
    let mut scored: Vec<(f64, Prompt)> = candidates
        .into_iter()
        .map(|prompt| (score(&prompt, weights, now_ms), prompt))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        let grouping = match mode {
            RankMode::List => b
                .pinned
                .cmp(&a.pinned)
                .then_with(|| b.has_been_used().cmp(&a.has_been_used())),
            RankMode::Search => Ordering::Equal,
        };
        grouping
            .then_with(|| score_b.partial_cmp(score_a).unwrap_or(Ordering::Equal))
            .then_with(|| {
                b.last_used_at
                    .unwrap_or(0)
                    .cmp(&a.last_used_at.unwrap_or(0))
            })
            .then_with(|| a.slug.cmp(&b.slug))
    });

    scored.into_iter().map(|(_, prompt)| prompt).collect()
}
