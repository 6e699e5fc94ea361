//! ICAO address trust tracking
//!
//! Address/parity downlinks XOR the transmitter's ICAO address into the
//! CRC, so every noise burst that survives the slicer yields a
//! syntactically plausible address. The filter keeps two maps: addresses
//! proven by a parity/interrogator downlink (trusted) and addresses seen
//! only on address/parity downlinks (candidates). A candidate is promoted
//! once enough valid frames repeat it; idle entries age out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

/// How many address/parity sightings are required before an unknown ICAO
/// address is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfidenceLevel {
    /// Trust on first sight.
    Low,
    /// Two sightings.
    #[default]
    Medium,
    /// Five sightings.
    High,
}

impl ConfidenceLevel {
    pub(crate) fn required_frames(self) -> u32 {
        match self {
            ConfidenceLevel::Low => 1,
            ConfidenceLevel::Medium => 2,
            ConfidenceLevel::High => 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CandidateEntry {
    last_seen: Instant,
    valid_frames: u32,
}

#[derive(Default)]
struct Maps {
    trusted: HashMap<u32, Instant>,
    candidates: HashMap<u32, CandidateEntry>,
}

/// Shared trust state. One lock covers both maps, so a promotion moves an
/// address atomically and an address is never in both at once.
pub struct IcaoFilter {
    maps: Mutex<Maps>,
    threshold: u32,
    timeout: Duration,
}

impl IcaoFilter {
    pub fn new(confidence: ConfidenceLevel, timeout: Duration) -> Self {
        Self {
            maps: Mutex::new(Maps::default()),
            threshold: confidence.required_frames(),
            timeout,
        }
    }

    /// Record a parity/interrogator sighting. The CRC proves the address,
    /// so it is promoted (or refreshed) unconditionally. Always emits.
    pub fn note_interrogator(&self, icao: u32, now: Instant) -> bool {
        let mut maps = self.maps.lock();
        maps.candidates.remove(&icao);
        if maps.trusted.insert(icao, now).is_none() {
            debug!("trusting {:06x} (parity downlink)", icao);
        }
        true
    }

    /// Record an address/parity sighting. Trusted addresses refresh and
    /// emit; unknown addresses accumulate confidence first.
    pub fn note_address(&self, icao: u32, now: Instant) -> bool {
        let mut maps = self.maps.lock();

        if let Some(seen) = maps.trusted.get_mut(&icao) {
            *seen = now;
            return true;
        }

        let count = match maps.candidates.get_mut(&icao) {
            Some(entry) => {
                entry.valid_frames += 1;
                entry.last_seen = now;
                entry.valid_frames
            }
            None => {
                maps.candidates.insert(
                    icao,
                    CandidateEntry {
                        last_seen: now,
                        valid_frames: 1,
                    },
                );
                1
            }
        };

        if count < self.threshold {
            return false;
        }

        maps.candidates.remove(&icao);
        maps.trusted.insert(icao, now);
        debug!("trusting {:06x} after {} frames", icao, count);
        true
    }

    /// Whether an address is currently trusted.
    pub fn is_trusted(&self, icao: u32) -> bool {
        self.maps.lock().trusted.contains_key(&icao)
    }

    /// Number of (trusted, candidate) addresses currently tracked.
    pub fn tracked(&self) -> (usize, usize) {
        let maps = self.maps.lock();
        (maps.trusted.len(), maps.candidates.len())
    }

    /// Drop every entry idle for longer than the configured timeout.
    pub fn sweep(&self, now: Instant) {
        let mut maps = self.maps.lock();
        let timeout = self.timeout;
        let before = maps.trusted.len() + maps.candidates.len();

        maps.trusted
            .retain(|_, seen| now.duration_since(*seen) <= timeout);
        maps.candidates
            .retain(|_, entry| now.duration_since(entry.last_seen) <= timeout);

        let evicted = before - maps.trusted.len() - maps.candidates.len();
        if evicted > 0 {
            debug!("evicted {} idle addresses", evicted);
        }
    }

    #[cfg(test)]
    fn candidate_frames(&self, icao: u32) -> Option<u32> {
        self.maps
            .lock()
            .candidates
            .get(&icao)
            .map(|entry| entry.valid_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(180);

    fn filter(confidence: ConfidenceLevel) -> IcaoFilter {
        IcaoFilter::new(confidence, TIMEOUT)
    }

    #[test]
    fn test_interrogator_trusts_immediately() {
        let filter = filter(ConfidenceLevel::Medium);
        let now = Instant::now();

        assert!(filter.note_interrogator(0xABCDEF, now));
        assert!(filter.is_trusted(0xABCDEF));
        assert_eq!(filter.tracked(), (1, 0));
    }

    #[test]
    fn test_address_requires_threshold() {
        let filter = filter(ConfidenceLevel::Medium);
        let now = Instant::now();

        assert!(!filter.note_address(0x4840D6, now));
        assert!(!filter.is_trusted(0x4840D6));
        assert_eq!(filter.candidate_frames(0x4840D6), Some(1));

        // Second sighting promotes, emits, and clears the candidate.
        assert!(filter.note_address(0x4840D6, now));
        assert!(filter.is_trusted(0x4840D6));
        assert_eq!(filter.candidate_frames(0x4840D6), None);
        assert_eq!(filter.tracked(), (1, 0));
    }

    #[test]
    fn test_low_confidence_trusts_first_sight() {
        let filter = filter(ConfidenceLevel::Low);
        assert!(filter.note_address(0x123456, Instant::now()));
        assert!(filter.is_trusted(0x123456));
    }

    #[test]
    fn test_high_confidence_needs_five() {
        let filter = filter(ConfidenceLevel::High);
        let now = Instant::now();

        for _ in 0..4 {
            assert!(!filter.note_address(0x123456, now));
        }
        assert_eq!(filter.candidate_frames(0x123456), Some(4));
        assert!(filter.note_address(0x123456, now));
        assert!(filter.is_trusted(0x123456));
    }

    #[test]
    fn test_interrogator_promotes_pending_candidate() {
        let filter = filter(ConfidenceLevel::High);
        let now = Instant::now();

        filter.note_address(0x123456, now);
        assert!(filter.note_interrogator(0x123456, now));
        assert_eq!(filter.tracked(), (1, 0));
        // The address/parity path now refreshes instead of counting.
        assert!(filter.note_address(0x123456, now));
    }

    #[test]
    fn test_trust_survives_until_timeout() {
        let filter = filter(ConfidenceLevel::Medium);
        let now = Instant::now();

        filter.note_interrogator(0xABCDEF, now);
        filter.sweep(now + Duration::from_secs(179));
        assert!(filter.is_trusted(0xABCDEF));

        // A refresh restarts the clock.
        filter.note_address(0xABCDEF, now + Duration::from_secs(100));
        filter.sweep(now + Duration::from_secs(250));
        assert!(filter.is_trusted(0xABCDEF));
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let filter = filter(ConfidenceLevel::Medium);
        let now = Instant::now();

        filter.note_interrogator(0xABCDEF, now);
        filter.note_address(0x4840D6, now);
        filter.sweep(now + Duration::from_secs(181));
        assert!(!filter.is_trusted(0xABCDEF));
        assert_eq!(filter.tracked(), (0, 0));

        // A formerly trusted address starts over as a candidate.
        assert!(!filter.note_address(0xABCDEF, now + Duration::from_secs(200)));
        assert_eq!(filter.candidate_frames(0xABCDEF), Some(1));
    }
}
