//! Channel to receiver/frequency mapping

use serde::Deserialize;
use tracing::warn;

/// Maximum number of entries consulted when resolving a channel
pub const MAX_FREQMAP: usize = 16;

/// One row of the frequency map: which SDR and frequency feed a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FreqMapEntry {
    pub channel: i32,
    pub sdr: i32,
    /// Frequency in Hz
    pub freq: i32,
}

/// Ordered frequency map, first matching channel wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreqMap {
    entries: Vec<FreqMapEntry>,
}

impl FreqMap {
    pub fn new(mut entries: Vec<FreqMapEntry>) -> Self {
        if entries.len() > MAX_FREQMAP {
            warn!(
                "Frequency map has {} entries, only the first {} are used",
                entries.len(),
                MAX_FREQMAP
            );
            entries.truncate(MAX_FREQMAP);
        }
        Self { entries }
    }

    /// Look up `(sdr, freq)` for a channel, `(0, 0)` when it is not mapped
    pub fn resolve(&self, channel: i32) -> (i32, i32) {
        self.entries
            .iter()
            .take(MAX_FREQMAP)
            .find(|entry| entry.channel == channel)
            .map_or((0, 0), |entry| (entry.sdr, entry.freq))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<FreqMapEntry>> for FreqMap {
    fn from(entries: Vec<FreqMapEntry>) -> Self {
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(channel: i32, sdr: i32, freq: i32) -> FreqMapEntry {
        FreqMapEntry { channel, sdr, freq }
    }

    #[test]
    fn resolves_mapped_channel() {
        let map = FreqMap::new(vec![entry(0, 1, 144_390_000), entry(1, 2, 144_800_000)]);
        assert_eq!(map.resolve(0), (1, 144_390_000));
        assert_eq!(map.resolve(1), (2, 144_800_000));
    }

    #[test]
    fn unmapped_channel_is_zero() {
        let map = FreqMap::new(vec![entry(0, 1, 144_390_000)]);
        assert_eq!(map.resolve(3), (0, 0));
        assert_eq!(FreqMap::default().resolve(0), (0, 0));
    }

    #[test]
    fn first_match_wins() {
        let map = FreqMap::new(vec![entry(2, 7, 1), entry(2, 8, 2)]);
        assert_eq!(map.resolve(2), (7, 1));
    }

    #[test]
    fn entries_beyond_limit_are_ignored() {
        let mut entries: Vec<_> = (0..MAX_FREQMAP as i32).map(|c| entry(c, 1, 1)).collect();
        entries.push(entry(99, 5, 5));
        let map = FreqMap::from(entries);

        assert_eq!(map.len(), MAX_FREQMAP);
        assert_eq!(map.resolve(99), (0, 0));
    }
}
