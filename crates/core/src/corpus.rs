//! Grouping and lookups over the full dividend corpus.
//!
//! The corpus is an ordered list of [`NetuidGroup`]s. Netuids appear in first-seen order,
//! hotkeys within a group in insertion order, and duplicate `(netuid, hotkey)` rows are
//! appended rather than merged.

use std::collections::HashMap;

use crate::types::{DividendRecord, Hotkey, HotkeyDividend, Netuid, NetuidDividend, NetuidGroup};

/// Incrementally groups dividend rows by netuid.
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    groups: Vec<NetuidGroup>,
    index: HashMap<Netuid, usize>,
}

impl CorpusBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row to its netuid group, creating the group on first sight.
    pub fn push(&mut self, record: DividendRecord) {
        let entry = HotkeyDividend {
            hotkey: record.hotkey,
            dividend: record.dividend,
        };
        match self.index.get(&record.netuid) {
            Some(&pos) => self.groups[pos].hotkeys.push(entry),
            None => {
                self.index.insert(record.netuid, self.groups.len());
                self.groups.push(NetuidGroup {
                    netuid: record.netuid,
                    hotkeys: vec![entry],
                });
            }
        }
    }

    /// Number of rows pushed so far.
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.hotkeys.len()).sum()
    }

    /// Finish and return the ordered groups.
    pub fn finish(self) -> Vec<NetuidGroup> {
        self.groups
    }
}

impl FromIterator<DividendRecord> for CorpusBuilder {
    fn from_iter<I: IntoIterator<Item = DividendRecord>>(iter: I) -> Self {
        let mut builder = CorpusBuilder::new();
        for record in iter {
            builder.push(record);
        }
        builder
    }
}

/// First dividend recorded for `(netuid, hotkey)`.
pub fn find_pair(groups: &[NetuidGroup], netuid: Netuid, hotkey: &Hotkey) -> Option<f64> {
    groups
        .iter()
        .filter(|g| g.netuid == netuid)
        .flat_map(|g| g.hotkeys.iter())
        .find(|h| &h.hotkey == hotkey)
        .map(|h| h.dividend)
}

/// Hotkey entries of one netuid; empty when the netuid is absent.
pub fn hotkeys_for_netuid(groups: &[NetuidGroup], netuid: Netuid) -> Vec<HotkeyDividend> {
    groups
        .iter()
        .find(|g| g.netuid == netuid)
        .map(|g| g.hotkeys.clone())
        .unwrap_or_default()
}

/// Every `(netuid, dividend)` entry of `hotkey`, in corpus order.
pub fn netuids_for_hotkey(groups: &[NetuidGroup], hotkey: &Hotkey) -> Vec<NetuidDividend> {
    let mut results = Vec::new();
    for group in groups {
        for entry in group.hotkeys.iter().filter(|h| &h.hotkey == hotkey) {
            results.push(NetuidDividend {
                netuid: group.netuid,
                dividend: entry.dividend,
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Hotkey {
        Hotkey::from_account([byte; 32])
    }

    fn record(netuid: Netuid, byte: u8, dividend: f64) -> DividendRecord {
        DividendRecord {
            netuid,
            hotkey: key(byte),
            dividend,
        }
    }

    fn sample() -> Vec<NetuidGroup> {
        [
            record(5, 1, 1.0),
            record(2, 1, 2.0),
            record(5, 2, 3.0),
            record(5, 1, 4.0),
        ]
        .into_iter()
        .collect::<CorpusBuilder>()
        .finish()
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let groups = sample();
        let netuids: Vec<_> = groups.iter().map(|g| g.netuid).collect();
        assert_eq!(netuids, vec![5, 2]);

        let dividends: Vec<_> = groups[0].hotkeys.iter().map(|h| h.dividend).collect();
        assert_eq!(dividends, vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_duplicate_pairs_append() {
        let groups = sample();
        let dup = groups[0].hotkeys.iter().filter(|h| h.hotkey == key(1)).count();
        assert_eq!(dup, 2);
    }

    #[test]
    fn test_find_pair_returns_first_entry() {
        let groups = sample();
        assert_eq!(find_pair(&groups, 5, &key(1)), Some(1.0));
        assert_eq!(find_pair(&groups, 2, &key(1)), Some(2.0));
        assert_eq!(find_pair(&groups, 2, &key(2)), None);
        assert_eq!(find_pair(&groups, 9, &key(1)), None);
    }

    #[test]
    fn test_hotkeys_for_netuid() {
        let groups = sample();
        assert_eq!(hotkeys_for_netuid(&groups, 5).len(), 3);
        assert!(hotkeys_for_netuid(&groups, 7).is_empty());
    }

    #[test]
    fn test_netuids_for_hotkey() {
        let groups = sample();
        let hits = netuids_for_hotkey(&groups, &key(1));
        let pairs: Vec<_> = hits.iter().map(|h| (h.netuid, h.dividend)).collect();
        assert_eq!(pairs, vec![(5, 1.0), (5, 4.0), (2, 2.0)]);
        assert!(netuids_for_hotkey(&groups, &key(9)).is_empty());
    }
}
