//! Pipeline configuration

use std::time::Duration;

use crate::icao::ConfidenceLevel;

/// Default idle timeout before a tracked ICAO address is evicted.
pub const DEFAULT_ICAO_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone)]
pub struct Config {
    /// Sightings required before an address/parity ICAO is trusted.
    pub confidence: ConfidenceLevel,
    /// Tracked addresses idle for longer than this are evicted.
    pub icao_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            confidence: ConfidenceLevel::default(),
            icao_timeout: DEFAULT_ICAO_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.confidence, ConfidenceLevel::Medium);
        assert_eq!(config.icao_timeout, Duration::from_secs(180));
    }
}
