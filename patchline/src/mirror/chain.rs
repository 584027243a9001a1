//! Patch chain assembly.

use std::collections::BTreeMap;

use crate::model::PatchStep;

/// Build the longest linear run of diffs ending at the newest version.
///
/// Starting from `newest`, repeatedly take the diff that produces the
/// current version, preferring the shortest hop, until no diff leads back
/// any further. The result is ordered oldest step first and every step's
/// `from` equals the previous step's `to`.
pub fn contiguous_chain(newest: u32, diffs: &[PatchStep]) -> Vec<PatchStep> {
    let mut by_target: BTreeMap<u32, &PatchStep> = BTreeMap::new();
    for step in diffs.iter().filter(|s| s.from > 0 && s.from < s.to) {
        by_target
            .entry(step.to)
            .and_modify(|existing| {
                if step.from > existing.from {
                    *existing = step;
                }
            })
            .or_insert(step);
    }

    let mut chain = Vec::new();
    let mut current = newest;
    while let Some(step) = by_target.get(&current) {
        chain.push((*step).clone());
        current = step.from;
    }
    chain.reverse();
    chain
}

/// Full-build steps for every known version, oldest first.
pub fn full_build_steps(mut builds: Vec<PatchStep>) -> Vec<PatchStep> {
    builds.retain(|s| s.from == 0);
    builds.sort_by_key(|s| s.to);
    builds.dedup_by_key(|s| s.to);
    builds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(from: u32, to: u32) -> PatchStep {
        PatchStep::new(from, to, format!("https://m/{}~{}", from, to))
    }

    #[test]
    fn test_linear_chain() {
        let chain = contiguous_chain(4, &[diff(1, 2), diff(2, 3), diff(3, 4)]);
        let edges: Vec<(u32, u32)> = chain.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(edges, vec![(1, 2), (2, 3), (3, 4)]);
    }

    #[test]
    fn test_gap_keeps_only_suffix() {
        let chain = contiguous_chain(5, &[diff(1, 2), diff(3, 4), diff(4, 5)]);
        let edges: Vec<(u32, u32)> = chain.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(edges, vec![(3, 4), (4, 5)]);
    }

    #[test]
    fn test_no_diff_into_newest_is_empty() {
        assert!(contiguous_chain(9, &[diff(1, 2)]).is_empty());
    }

    #[test]
    fn test_prefers_shortest_hop() {
        let chain = contiguous_chain(5, &[diff(2, 5), diff(4, 5), diff(3, 4)]);
        let edges: Vec<(u32, u32)> = chain.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(edges, vec![(3, 4), (4, 5)]);
    }

    #[test]
    fn test_chain_is_linear() {
        let chain = contiguous_chain(6, &[diff(1, 3), diff(3, 6), diff(2, 3)]);
        for pair in chain.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[test]
    fn test_full_build_fallback_sorted_unique() {
        let steps = full_build_steps(vec![
            PatchStep::new(0, 3, "c"),
            PatchStep::new(0, 1, "a"),
            PatchStep::new(0, 3, "c2"),
            PatchStep::new(2, 3, "d"),
        ]);
        let targets: Vec<u32> = steps.iter().map(|s| s.to).collect();
        assert_eq!(targets, vec![1, 3]);
    }
}
