use std::collections::VecDeque;
use std::ops::Not;

/// An address split against one cache's geometry.
#[derive(Debug, Clone, Copy)]
pub struct Addr {
    pub set: usize,
    pub tag: u32,
}

#[derive(Debug)]
struct BitSection {
    shift: usize,
    mask: u32,
}

impl BitSection {
    fn apply(&self, num: u32) -> u32 {
        (num >> self.shift) & self.mask
    }
}

/// A resident block: tag at block-address granularity plus the dirty flag.
/// No data is carried; the model only tracks presence and modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    pub tag: u32,
    pub dirty: bool,
}

/// One set's resident lines, most recently used first. Occupancy is the
/// deque length, bounded by the associativity.
#[derive(Debug, Default)]
struct Set {
    lines: VecDeque<CacheLine>,
}

/// Outcome of a fill-style lookup. Empty and insertable misses collapse
/// into `Miss { evicted: None }`: both charge a demand fetch and neither
/// counts as a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Hit,
    Miss { evicted: Option<CacheLine> },
}

/// One physical cache: `n_sets` LRU sets of `assoc` ways. In unified mode
/// a single `Cache` value serves both the instruction and data paths, so
/// either kind of access can evict the other kind's lines.
#[derive(Debug)]
pub struct Cache {
    pub size: usize,
    pub assoc: usize,
    pub n_sets: usize,
    set_sec: BitSection,
    tag_sec: BitSection,
    sets: Vec<Set>,
}

impl Cache {
    /// Geometry must already satisfy `Config::validate`; the power-of-two
    /// checks here are the constructor restating its precondition.
    pub fn new(size: usize, block_size: usize, assoc: usize) -> Self {
        let n_sets = size / (block_size * assoc);
        assert!(block_size.is_power_of_two());
        assert!(n_sets.is_power_of_two());

        let set_shift = block_size.ilog2() as usize;
        let set_sec = BitSection {
            shift: set_shift,
            mask: n_sets as u32 - 1,
        };
        let tag_sec = BitSection {
            shift: n_sets.ilog2() as usize + set_shift,
            mask: 0u32.not(),
        };

        Cache {
            size,
            assoc,
            n_sets,
            set_sec,
            tag_sec,
            sets: std::iter::repeat_with(Set::default).take(n_sets).collect(),
        }
    }

    pub fn split_addr(&self, addr: u32) -> Addr {
        Addr {
            set: self.set_sec.apply(addr) as usize,
            tag: self.tag_sec.apply(addr),
        }
    }

    pub fn occupancy(&self, set: usize) -> usize {
        self.sets[set].lines.len()
    }

    /// Look up `addr` and make its block resident, maintaining LRU order.
    ///
    /// Hit: the line moves to the head. Miss with spare capacity: a clean
    /// line is inserted at the head. Miss in a full set: the tail is
    /// evicted (returned so the caller can account a dirty write-back)
    /// and a clean line takes the head. After any outcome the addressed
    /// tag is the head of its set.
    pub fn fill(&mut self, addr: Addr) -> Fill {
        let assoc = self.assoc;
        let set = &mut self.sets[addr.set];

        if let Some(pos) = set.lines.iter().position(|line| line.tag == addr.tag) {
            if pos != 0 {
                let line = set.lines.remove(pos).unwrap();
                set.lines.push_front(line);
            }
            return Fill::Hit;
        }

        let evicted = if set.lines.len() == assoc {
            set.lines.pop_back()
        } else {
            None
        };
        set.lines.push_front(CacheLine {
            tag: addr.tag,
            dirty: false,
        });
        Fill::Miss { evicted }
    }

    /// Look up `addr` without allocating. A hit is promoted to the head;
    /// a miss leaves the set untouched. This is the no-write-allocate
    /// store path.
    pub fn probe(&mut self, addr: Addr) -> bool {
        let set = &mut self.sets[addr.set];
        match set.lines.iter().position(|line| line.tag == addr.tag) {
            Some(pos) => {
                if pos != 0 {
                    let line = set.lines.remove(pos).unwrap();
                    set.lines.push_front(line);
                }
                true
            }
            None => false,
        }
    }

    /// Mark the most recently used line of `set` dirty. Only meaningful
    /// straight after a `fill`/`probe` hit put the stored-to line at the
    /// head.
    pub fn mark_head_dirty(&mut self, set: usize) {
        if let Some(line) = self.sets[set].lines.front_mut() {
            line.dirty = true;
        }
    }

    /// Clear every dirty line, returning how many were dirty. The caller
    /// charges one full-block copy-back per cleared line.
    pub fn drain_dirty(&mut self) -> u64 {
        let mut drained = 0;
        for set in &mut self.sets {
            for line in &mut set.lines {
                if line.dirty {
                    line.dirty = false;
                    drained += 1;
                }
            }
        }
        drained
    }

    #[cfg(test)]
    fn tags(&self, set: usize) -> Vec<u32> {
        self.sets[set].lines.iter().map(|line| line.tag).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2 sets, 4B blocks, direct mapped
    fn tiny() -> Cache {
        Cache::new(8, 4, 1)
    }

    #[test]
    fn splits_index_and_tag() {
        let cache = tiny();
        let a = cache.split_addr(0x1c);
        assert_eq!(a.set, 1);
        assert_eq!(a.tag, 0x3);

        // 64 sets of 16B, 2-way
        let cache = Cache::new(2048, 16, 2);
        let a = cache.split_addr(0xdead_beef);
        assert_eq!(a.set, (0xdead_beef >> 4) & 0x3f);
        assert_eq!(a.tag, 0xdead_beef >> 10);
    }

    #[test]
    fn fill_into_empty_set_evicts_nothing() {
        let mut cache = tiny();
        let a = cache.split_addr(0x0);
        assert_eq!(cache.fill(a), Fill::Miss { evicted: None });
        assert_eq!(cache.occupancy(0), 1);
        assert_eq!(cache.fill(a), Fill::Hit);
        assert_eq!(cache.occupancy(0), 1);
    }

    #[test]
    fn full_set_evicts_the_tail() {
        let mut cache = tiny();
        let first = cache.split_addr(0x0);
        let second = cache.split_addr(0x10);
        assert_eq!(cache.fill(first), Fill::Miss { evicted: None });
        match cache.fill(second) {
            Fill::Miss { evicted: Some(victim) } => assert_eq!(victim.tag, first.tag),
            other => panic!("expected replacement, got {other:?}"),
        }
        assert_eq!(cache.occupancy(0), 1);
    }

    #[test]
    fn hit_promotes_to_head() {
        let mut cache = Cache::new(32, 4, 4);
        for addr in [0x00, 0x20, 0x40] {
            let a = cache.split_addr(addr);
            cache.fill(a);
        }
        // order now 0x40, 0x20, 0x00
        let a = cache.split_addr(0x20);
        assert_eq!(cache.fill(a), Fill::Hit);
        assert_eq!(cache.tags(0), vec![0x20 >> 3, 0x40 >> 3, 0x00 >> 3]);
    }

    #[test]
    fn lru_victim_reflects_promotion() {
        let mut cache = Cache::new(8, 4, 2);
        let a0 = cache.split_addr(0x00);
        let a1 = cache.split_addr(0x08);
        let a2 = cache.split_addr(0x10);
        cache.fill(a0);
        cache.fill(a1);
        // touch a0 so a1 becomes the victim
        assert_eq!(cache.fill(a0), Fill::Hit);
        match cache.fill(a2) {
            Fill::Miss { evicted: Some(victim) } => assert_eq!(victim.tag, a1.tag),
            other => panic!("expected eviction of {:#x}, got {other:?}", a1.tag),
        }
    }

    #[test]
    fn probe_does_not_allocate() {
        let mut cache = tiny();
        let a = cache.split_addr(0x0);
        assert!(!cache.probe(a));
        assert_eq!(cache.occupancy(0), 0);
        cache.fill(a);
        assert!(cache.probe(a));
    }

    #[test]
    fn drain_clears_dirty_once() {
        let mut cache = tiny();
        let a = cache.split_addr(0x0);
        cache.fill(a);
        cache.mark_head_dirty(a.set);
        assert_eq!(cache.drain_dirty(), 1);
        assert_eq!(cache.drain_dirty(), 0);
    }
}
