use crate::cache::{Cache, Fill};
use crate::config::{Config, ConfigError};
use crate::stats::Stats;
use crate::trace::AccessKind;

/// Which logical side an access belongs to. Statistics are always kept
/// per side, even when both sides share one unified cache.
#[derive(Debug, Clone, Copy)]
enum Side {
    Inst,
    Data,
}

/// The instruction/data routing. `Unified` is a single shared cache, so
/// both access paths see the same sets, occupancy, and LRU order.
#[derive(Debug)]
enum Caches {
    Unified(Cache),
    Split { inst: Cache, data: Cache },
}

/// Composition root: owns the configuration, the cache(s), and the
/// statistics. One value per trace replay; there is no global state.
#[derive(Debug)]
pub struct Simulator {
    config: Config,
    caches: Caches,
    stats: Stats,
}

impl Simulator {
    /// Validates the geometry and builds the cache(s). Consuming the
    /// `Config` here is what makes "reconfigure after build" and "build
    /// twice" impossible to express.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let caches = if config.split {
            Caches::Split {
                inst: Cache::new(config.inst_size, config.block_size, config.assoc),
                data: Cache::new(config.data_size, config.block_size, config.assoc),
            }
        } else {
            Caches::Unified(Cache::new(
                config.unified_size,
                config.block_size,
                config.assoc,
            ))
        };
        Ok(Simulator {
            config,
            caches,
            stats: Stats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Replay one trace record. Marker records are ignored entirely.
    pub fn access(&mut self, addr: u32, kind: AccessKind) {
        match kind {
            AccessKind::InstLoad => self.read(addr, Side::Inst),
            AccessKind::DataLoad => self.read(addr, Side::Data),
            AccessKind::DataStore => self.write(addr),
            AccessKind::Marker => {}
        }
    }

    fn cache_mut(caches: &mut Caches, side: Side) -> &mut Cache {
        match (caches, side) {
            (Caches::Unified(cache), _) => cache,
            (Caches::Split { inst, .. }, Side::Inst) => inst,
            (Caches::Split { data, .. }, Side::Data) => data,
        }
    }

    /// Instruction fetches and data loads share one algorithm; only the
    /// routed cache and the charged side differ.
    fn read(&mut self, addr: u32, side: Side) {
        let words_per_block = self.config.words_per_block();
        let write_back = self.config.write_back;

        let cache = Self::cache_mut(&mut self.caches, side);
        let a = cache.split_addr(addr);
        let fill = cache.fill(a);

        let mut dirty_victim = false;
        {
            let stats = match side {
                Side::Inst => &mut self.stats.inst,
                Side::Data => &mut self.stats.data,
            };
            stats.accesses += 1;
            if let Fill::Miss { evicted } = fill {
                stats.misses += 1;
                stats.demand_fetches += words_per_block;
                if let Some(victim) = evicted {
                    stats.replacements += 1;
                    dirty_victim = victim.dirty;
                }
            }
        }
        // Dirty evictions are data traffic no matter which side caused
        // them; only stores dirty a line in the first place.
        if write_back && dirty_victim {
            self.stats.data.copies_back += words_per_block;
        }
    }

    fn write(&mut self, addr: u32) {
        let words_per_block = self.config.words_per_block();
        let write_back = self.config.write_back;
        let write_alloc = self.config.write_alloc;

        let cache = Self::cache_mut(&mut self.caches, Side::Data);
        let a = cache.split_addr(addr);
        let stats = &mut self.stats.data;
        stats.accesses += 1;

        if write_alloc {
            match cache.fill(a) {
                Fill::Hit => {}
                Fill::Miss { evicted } => {
                    stats.misses += 1;
                    stats.demand_fetches += words_per_block;
                    if let Some(victim) = evicted {
                        stats.replacements += 1;
                        if write_back && victim.dirty {
                            stats.copies_back += words_per_block;
                        }
                    }
                }
            }
            // The stored-to line is now at the head of its set.
            if write_back {
                cache.mark_head_dirty(a.set);
            } else {
                // Write-through forwards every store, hit or miss.
                stats.copies_back += 1;
            }
        } else if cache.probe(a) {
            if write_back {
                cache.mark_head_dirty(a.set);
            } else {
                stats.copies_back += 1;
            }
        } else {
            // No-write-allocate miss: the cache is untouched. The store
            // goes straight to memory under write-through, one word.
            stats.misses += 1;
            if !write_back {
                stats.copies_back += 1;
            }
        }
    }

    /// End-of-trace drain: every dirty line costs one full-block
    /// copy-back and becomes clean. Idempotent.
    pub fn flush(&mut self) {
        let drained = match &mut self.caches {
            Caches::Unified(cache) => cache.drain_dirty(),
            Caches::Split { inst, data } => inst.drain_dirty() + data.drain_dirty(),
        };
        self.stats.data.copies_back += drained * self.config.words_per_block();
    }
}
