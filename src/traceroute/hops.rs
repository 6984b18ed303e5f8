//! Hop tables built from per-TTL probe outcomes
//!
//! Outcomes arrive in a slot vector indexed by TTL, one slot per worker.
//! [`HopTable::from_slots`] merges them sequentially after every worker has
//! finished, and [`HopTable::compact`] applies the terminal-hop repair.

use crate::probe::{ProbeOutcome, ProbeStatus};
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;

/// Sparse mapping of hop index to outcome, before compaction
///
/// A `Reached` outcome whose address was already recorded at a lower index
/// is dropped, so the table may have gaps. Timeouts are always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopTable {
    entries: BTreeMap<u8, ProbeOutcome>,
}

impl HopTable {
    /// Build the table from slots where `slots[i]` holds the outcome of TTL `i + 1`
    ///
    /// Empty slots (a worker that never reported) are recorded as timeouts.
    pub fn from_slots(slots: Vec<Option<ProbeOutcome>>) -> Self {
        let mut entries = BTreeMap::new();
        let mut recorded: HashSet<IpAddr> = HashSet::new();

        for (index, slot) in slots.into_iter().enumerate() {
            let Ok(ttl) = u8::try_from(index + 1) else {
                break;
            };
            let outcome = slot.unwrap_or_else(|| ProbeOutcome::timed_out(ttl));

            match outcome.status {
                ProbeStatus::IntermediateHop | ProbeStatus::TimedOut => {}
                ProbeStatus::Reached => {
                    if recorded.contains(&outcome.addr) {
                        continue;
                    }
                }
            }

            if !outcome.is_timeout() {
                recorded.insert(outcome.addr);
            }
            entries.insert(ttl, outcome);
        }

        Self { entries }
    }

    /// Build a table directly from index/outcome pairs
    pub fn from_entries(entries: impl IntoIterator<Item = (u8, ProbeOutcome)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Number of surviving entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the outcome recorded at a hop index
    pub fn get(&self, index: u8) -> Option<&ProbeOutcome> {
        self.entries.get(&index)
    }

    /// Iterate entries in ascending hop index order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &ProbeOutcome)> {
        self.entries.iter().map(|(index, outcome)| (*index, outcome))
    }

    /// Relocate the terminal hop next to the last other surviving hop
    ///
    /// Only the highest index moves: it is re-keyed to the second-highest
    /// index plus one (1 when it is the only entry). Gaps further down the
    /// table are left as they are.
    pub fn compact(mut self) -> CompactedHopTable {
        if let Some((_, last)) = self.entries.pop_last() {
            let second_index = self.entries.keys().next_back().copied().unwrap_or(0);
            self.entries.insert(second_index + 1, last);
        }

        CompactedHopTable {
            entries: self.entries,
        }
    }
}

/// Hop table after the terminal-hop repair, ready for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactedHopTable {
    entries: BTreeMap<u8, ProbeOutcome>,
}

impl CompactedHopTable {
    /// Number of hops
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no hops were discovered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the outcome displayed at a hop index
    pub fn get(&self, index: u8) -> Option<&ProbeOutcome> {
        self.entries.get(&index)
    }

    /// Iterate hops in ascending display index order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &ProbeOutcome)> {
        self.entries.iter().map(|(index, outcome)| (*index, outcome))
    }

    /// Hop indices in display order
    pub fn indices(&self) -> Vec<u8> {
        self.entries.keys().copied().collect()
    }

    /// Addresses in display order, sentinel addresses included
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.entries.values().map(|outcome| outcome.addr).collect()
    }

    /// Whether any hop reached the destination
    pub fn destination_reached(&self) -> bool {
        self.entries
            .values()
            .any(|outcome| outcome.status == ProbeStatus::Reached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SENTINEL_ADDR;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn slots(outcomes: Vec<ProbeOutcome>) -> Vec<Option<ProbeOutcome>> {
        outcomes.into_iter().map(Some).collect()
    }

    #[test]
    fn test_duplicate_reached_collapses_to_lowest_ttl() {
        let b = ip("93.184.216.34");
        let mut outcomes = vec![
            ProbeOutcome::timed_out(1),
            ProbeOutcome::timed_out(2),
            ProbeOutcome::intermediate(3, ip("10.0.0.1")),
        ];
        outcomes.extend((4..=9).map(|ttl| ProbeOutcome::reached(ttl, b)));

        let table = HopTable::from_slots(slots(outcomes));

        assert_eq!(table.len(), 4);
        let reached: Vec<u8> = table
            .iter()
            .filter(|(_, o)| o.status == ProbeStatus::Reached && o.addr == b)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(reached, vec![4]);
        assert!(table.get(5).is_none());
        assert!(table.get(9).is_none());
    }

    #[test]
    fn test_timeouts_are_never_suppressed() {
        let max_hops = 30u8;
        let outcomes = (1..max_hops).map(ProbeOutcome::timed_out).collect();

        let table = HopTable::from_slots(slots(outcomes));

        assert_eq!(table.len(), usize::from(max_hops - 1));
        assert!(table.iter().all(|(_, o)| o.addr == SENTINEL_ADDR && o.is_timeout()));
    }

    #[test]
    fn test_missing_slot_becomes_timeout() {
        let table = HopTable::from_slots(vec![
            Some(ProbeOutcome::intermediate(1, ip("192.168.1.1"))),
            None,
        ]);
        assert_eq!(table.get(2), Some(&ProbeOutcome::timed_out(2)));
    }

    #[test]
    fn test_repeated_intermediate_hops_are_kept() {
        let router = ip("10.0.0.1");
        let table = HopTable::from_slots(slots(vec![
            ProbeOutcome::intermediate(1, router),
            ProbeOutcome::intermediate(2, router),
        ]));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_reached_matching_earlier_router_is_suppressed() {
        let addr = ip("10.0.0.1");
        let table = HopTable::from_slots(slots(vec![
            ProbeOutcome::intermediate(1, addr),
            ProbeOutcome::reached(2, addr),
        ]));
        assert_eq!(table.len(), 1);
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_compaction_is_noop_without_gaps() {
        let table = HopTable::from_slots(slots(vec![
            ProbeOutcome::timed_out(1),
            ProbeOutcome::timed_out(2),
            ProbeOutcome::intermediate(3, ip("10.0.0.1")),
            ProbeOutcome::reached(4, ip("93.184.216.34")),
        ]));
        let expected: Vec<(u8, ProbeOutcome)> = table.iter().map(|(i, o)| (i, *o)).collect();

        let compacted = table.compact();
        let actual: Vec<(u8, ProbeOutcome)> = compacted.iter().map(|(i, o)| (i, *o)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_compaction_of_all_timeouts_is_noop() {
        let table = HopTable::from_slots(slots((1..5).map(ProbeOutcome::timed_out).collect()));
        let compacted = table.compact();
        assert_eq!(compacted.indices(), vec![1, 2, 3, 4]);
        assert!(!compacted.destination_reached());
    }

    #[test]
    fn test_compaction_relocates_terminal_hop() {
        let b = ip("93.184.216.34");
        let table = HopTable::from_entries([
            (1, ProbeOutcome::timed_out(1)),
            (2, ProbeOutcome::timed_out(2)),
            (3, ProbeOutcome::intermediate(3, ip("10.0.0.1"))),
            (9, ProbeOutcome::reached(9, b)),
        ]);

        let compacted = table.compact();

        assert_eq!(compacted.indices(), vec![1, 2, 3, 4]);
        let terminal = compacted.get(4).unwrap();
        assert_eq!(terminal.addr, b);
        assert_eq!(terminal.status, ProbeStatus::Reached);
        // The probe's own TTL is preserved
        assert_eq!(terminal.ttl, 9);
        assert!(compacted.get(9).is_none());
    }

    #[test]
    fn test_compaction_only_moves_highest_index() {
        let table = HopTable::from_entries([
            (1, ProbeOutcome::intermediate(1, ip("10.0.0.1"))),
            (4, ProbeOutcome::intermediate(4, ip("10.0.0.4"))),
            (8, ProbeOutcome::reached(8, ip("93.184.216.34"))),
        ]);

        let compacted = table.compact();
        // The gap between 1 and 4 stays
        assert_eq!(compacted.indices(), vec![1, 4, 5]);
    }

    #[test]
    fn test_compaction_of_single_entry() {
        let table = HopTable::from_entries([(7, ProbeOutcome::reached(7, ip("127.0.0.1")))]);
        let compacted = table.compact();
        assert_eq!(compacted.indices(), vec![1]);
    }

    #[test]
    fn test_compaction_of_empty_table() {
        let compacted = HopTable::from_slots(Vec::new()).compact();
        assert!(compacted.is_empty());
    }
}
