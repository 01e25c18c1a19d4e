//! FEATURE 1: SPECIES RARITY
//!
//! Inverse frequency of a species within the batch. A species seen once
//! anywhere gets rarity 1.0; a species shared by N records gets 1/N for each
//! member. Record order has no effect.

use crate::data::TreeRecord;
use crate::utils::count_by;
use rustc_hash::FxHashMap;

/// Result of the rarity pass
#[derive(Debug, Clone)]
pub struct RarityResult {
    /// Records sharing each record's species (aligned with the batch)
    pub species_count: Vec<usize>,
    /// 1 / species_count
    pub species_rarity: Vec<f64>,
    /// Species -> record count for the whole batch
    pub counts: FxHashMap<String, usize>,
}

pub fn calculate_species_rarity(records: &[TreeRecord]) -> RarityResult {
    let counts = count_by(records, |r| r.species.as_str());

    let species_count: Vec<usize> = records
        .iter()
        .map(|r| counts.get(r.species.as_str()).copied().unwrap_or(1))
        .collect();

    let species_rarity: Vec<f64> = species_count.iter().map(|&c| rarity(c)).collect();

    RarityResult {
        species_count,
        species_rarity,
        counts: counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }
}

/// Rarity of a species seen `count` times (count >= 1)
pub fn rarity(count: usize) -> f64 {
    1.0 / count as f64
}
