//! Maximal Marginal Relevance selection.
//!
//! `MMR = λ · sim(query, doc) − (1 − λ) · max sim(doc, selected)`
//!
//! λ = 1.0 is pure relevance, λ = 0.0 pure diversity.

use super::types::Candidate;

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Select up to `k` candidates balancing relevance to `query` against redundancy.
///
/// Output order is selection order, so the first element is always the most relevant
/// candidate.
pub fn mmr_select(query: &[f32], candidates: Vec<Candidate>, k: usize, lambda: f32) -> Vec<Candidate> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let lambda = lambda.clamp(0.0, 1.0);
    let k = k.min(candidates.len());
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, &candidate.vector))
        .collect();

    let mut remaining: Vec<(Candidate, f32)> = candidates.into_iter().zip(relevance).collect();
    let mut selected: Vec<Candidate> = Vec::with_capacity(k);

    while selected.len() < k && !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (idx, (candidate, relevance)) in remaining.iter().enumerate() {
            let redundancy = selected
                .iter()
                .map(|chosen| cosine_similarity(&candidate.vector, &chosen.vector))
                .fold(0.0_f32, f32::max);
            let score = lambda * relevance - (1.0 - lambda) * redundancy;
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }

        let (best, _) = remaining.remove(best_idx);
        selected.push(best);
    }

    selected
}
