//! Whole-batch grouped aggregates
//!
//! Map/reduce over a full batch: every record contributes a key, the reduce
//! step folds per-key accumulators. Results depend on the entire batch, so
//! these are never computed incrementally.

use rustc_hash::FxHashMap;

/// Number of items per key
pub fn count_by<'a, T, F>(items: &'a [T], key: F) -> FxHashMap<&'a str, usize>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}

/// Running count/sum/min/max for one key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupAccumulator {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for GroupAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl GroupAccumulator {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Per-key accumulators of one numeric value
pub fn accumulate_by<'a, T, K, V>(items: &'a [T], key: K, value: V) -> FxHashMap<&'a str, GroupAccumulator>
where
    K: Fn(&'a T) -> &'a str,
    V: Fn(&'a T) -> f64,
{
    let mut groups: FxHashMap<&str, GroupAccumulator> = FxHashMap::default();
    for item in items {
        groups.entry(key(item)).or_default().push(value(item));
    }
    groups
}

/// Keys sorted by count descending, ties alphabetically
pub fn top_n_by_count<'a>(counts: &FxHashMap<&'a str, usize>, n: usize) -> Vec<(&'a str, usize)> {
    let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Tree {
        species: String,
        height: f64,
    }

    fn trees() -> Vec<Tree> {
        [("A", 10.0), ("B", 4.0), ("A", 20.0), ("C", 1.0), ("A", 30.0), ("B", 6.0)]
            .into_iter()
            .map(|(s, h)| Tree { species: s.to_string(), height: h })
            .collect()
    }

    #[test]
    fn test_count_by() {
        let trees = trees();
        let counts = count_by(&trees, |t| t.species.as_str());
        assert_eq!(counts.get("A"), Some(&3));
        assert_eq!(counts.get("B"), Some(&2));
        assert_eq!(counts.get("C"), Some(&1));
        assert_eq!(counts.values().sum::<usize>(), trees.len());
    }

    #[test]
    fn test_accumulate_by() {
        let trees = trees();
        let groups = accumulate_by(&trees, |t| t.species.as_str(), |t| t.height);
        let a = groups.get("A").unwrap();
        assert_eq!(a.count, 3);
        assert_relative_eq!(a.mean().unwrap(), 20.0);
        assert_relative_eq!(a.min, 10.0);
        assert_relative_eq!(a.max, 30.0);
        assert!(GroupAccumulator::default().mean().is_none());
    }

    #[test]
    fn test_top_n_ties_alphabetical() {
        let trees = trees();
        let counts = count_by(&trees, |t| t.species.as_str());
        assert_eq!(top_n_by_count(&counts, 2), vec![("A", 3), ("B", 2)]);

        let flat = count_by(&trees[..2], |t| t.species.as_str());
        assert_eq!(top_n_by_count(&flat, 5), vec![("A", 1), ("B", 1)]);
    }
}
