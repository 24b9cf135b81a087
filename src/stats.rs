use std::fmt;

use serde::Serialize;

/// Counters for one logical cache. Updated only by the access and flush
/// paths, read at reporting time. Traffic is counted in words.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub accesses: u64,
    pub misses: u64,
    pub replacements: u64,
    pub demand_fetches: u64,
    pub copies_back: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.accesses - self.misses
    }

    /// NaN when no accesses were made; reported as-is rather than masked.
    pub fn miss_rate(&self) -> f64 {
        self.misses as f64 / self.accesses as f64
    }
}

/// Instruction- and data-side statistics. In unified mode the two sides
/// still count separately: the split is by access kind, not by cache.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct Stats {
    pub inst: CacheStats,
    pub data: CacheStats,
}

impl Stats {
    pub fn total_demand_fetches(&self) -> u64 {
        self.inst.demand_fetches + self.data.demand_fetches
    }

    pub fn total_copies_back(&self) -> u64 {
        self.inst.copies_back + self.data.copies_back
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** CACHE STATISTICS ***")?;
        writeln!(f, "  INSTRUCTIONS")?;
        writeln!(f, "  accesses:  {}", self.inst.accesses)?;
        writeln!(f, "  misses:    {}", self.inst.misses)?;
        writeln!(f, "  miss rate: {:.6}", self.inst.miss_rate())?;
        writeln!(f, "  replace:   {}", self.inst.replacements)?;
        writeln!(f, "  DATA")?;
        writeln!(f, "  accesses:  {}", self.data.accesses)?;
        writeln!(f, "  misses:    {}", self.data.misses)?;
        writeln!(f, "  miss rate: {:.6}", self.data.miss_rate())?;
        writeln!(f, "  replace:   {}", self.data.replacements)?;
        writeln!(f, "  TRAFFIC (in words)")?;
        writeln!(f, "  demand fetch:  {}", self.total_demand_fetches())?;
        write!(f, "  copies back:   {}", self.total_copies_back())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_are_derived() {
        let stats = CacheStats {
            accesses: 10,
            misses: 3,
            ..CacheStats::default()
        };
        assert_eq!(stats.hits(), 7);
        assert!((stats.miss_rate() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn miss_rate_of_idle_cache_is_nan() {
        assert!(CacheStats::default().miss_rate().is_nan());
    }

    #[test]
    fn traffic_sums_both_sides() {
        let stats = Stats {
            inst: CacheStats {
                demand_fetches: 8,
                ..CacheStats::default()
            },
            data: CacheStats {
                demand_fetches: 4,
                copies_back: 5,
                ..CacheStats::default()
            },
        };
        assert_eq!(stats.total_demand_fetches(), 12);
        assert_eq!(stats.total_copies_back(), 5);
    }
}
