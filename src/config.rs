use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Word granularity for traffic accounting, in bytes.
pub const WORD_SIZE: usize = 4;

pub const DEFAULT_CACHE_SIZE: usize = 8192;
pub const DEFAULT_BLOCK_SIZE: usize = 16;
pub const DEFAULT_ASSOC: usize = 1;

/// One cache parameter, as named by the CLI flags and the config file.
///
/// `UnifiedSize` forces a unified cache; `InstSize`/`DataSize` force a
/// split one. The write-policy pairs simply overwrite each other, last
/// setter wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    BlockSize(usize),
    UnifiedSize(usize),
    InstSize(usize),
    DataSize(usize),
    Associativity(usize),
    WriteBack,
    WriteThrough,
    WriteAlloc,
    NoWriteAlloc,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("block size {0} is not a power of two")]
    BlockSizeNotPow2(usize),
    #[error("block size {0} is smaller than the {WORD_SIZE}-byte word")]
    BlockSmallerThanWord(usize),
    #[error("associativity {0} is not a power of two")]
    AssocNotPow2(usize),
    #[error("{name} cache size {size} is not block size {block_size} x associativity {assoc} x a whole number of sets")]
    SizeNotMultiple {
        name: &'static str,
        size: usize,
        block_size: usize,
        assoc: usize,
    },
    #[error("{name} cache has {n_sets} sets, which is not a power of two")]
    SetsNotPow2 { name: &'static str, n_sets: usize },
}

/// Cache shape and write policy. Pure value holder; geometry is only
/// validated when the simulator is built from it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub block_size: usize,
    pub unified_size: usize,
    pub inst_size: usize,
    pub data_size: usize,
    pub assoc: usize,
    pub split: bool,
    /// Write-back when true, write-through when false.
    pub write_back: bool,
    /// Write-allocate when true, no-write-allocate when false.
    pub write_alloc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: DEFAULT_BLOCK_SIZE,
            unified_size: DEFAULT_CACHE_SIZE,
            inst_size: DEFAULT_CACHE_SIZE,
            data_size: DEFAULT_CACHE_SIZE,
            assoc: DEFAULT_ASSOC,
            split: false,
            write_back: true,
            write_alloc: true,
        }
    }
}

impl Config {
    pub fn set(&mut self, param: Parameter) {
        match param {
            Parameter::BlockSize(v) => self.block_size = v,
            Parameter::UnifiedSize(v) => {
                self.split = false;
                self.unified_size = v;
            }
            Parameter::InstSize(v) => {
                self.split = true;
                self.inst_size = v;
            }
            Parameter::DataSize(v) => {
                self.split = true;
                self.data_size = v;
            }
            Parameter::Associativity(v) => self.assoc = v,
            Parameter::WriteBack => self.write_back = true,
            Parameter::WriteThrough => self.write_back = false,
            Parameter::WriteAlloc => self.write_alloc = true,
            Parameter::NoWriteAlloc => self.write_alloc = false,
        }
    }

    pub fn words_per_block(&self) -> u64 {
        (self.block_size / WORD_SIZE) as u64
    }

    /// Checks the whole geometry up front instead of letting the set-count
    /// division truncate silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.block_size.is_power_of_two() {
            return Err(ConfigError::BlockSizeNotPow2(self.block_size));
        }
        if self.block_size < WORD_SIZE {
            return Err(ConfigError::BlockSmallerThanWord(self.block_size));
        }
        if !self.assoc.is_power_of_two() {
            return Err(ConfigError::AssocNotPow2(self.assoc));
        }
        for (name, size) in self.sizes() {
            let way_bytes = self.block_size * self.assoc;
            if size == 0 || size % way_bytes != 0 {
                return Err(ConfigError::SizeNotMultiple {
                    name,
                    size,
                    block_size: self.block_size,
                    assoc: self.assoc,
                });
            }
            let n_sets = size / way_bytes;
            if !n_sets.is_power_of_two() {
                return Err(ConfigError::SetsNotPow2 { name, n_sets });
            }
        }
        Ok(())
    }

    /// The sizes in play under the current split flag, with the names
    /// used in diagnostics and reports.
    fn sizes(&self) -> Vec<(&'static str, usize)> {
        if self.split {
            vec![("instruction", self.inst_size), ("data", self.data_size)]
        } else {
            vec![("unified", self.unified_size)]
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache Settings:")?;
        if self.split {
            writeln!(f, "\tSplit I- D-cache")?;
            writeln!(f, "\tI-cache size: \t{}", self.inst_size)?;
            writeln!(f, "\tD-cache size: \t{}", self.data_size)?;
        } else {
            writeln!(f, "\tUnified I- D-cache")?;
            writeln!(f, "\tSize: \t{}", self.unified_size)?;
        }
        writeln!(f, "\tAssociativity: \t{}", self.assoc)?;
        writeln!(f, "\tBlock size: \t{}", self.block_size)?;
        writeln!(
            f,
            "\tWrite policy: \t{}",
            if self.write_back { "WRITE BACK" } else { "WRITE THROUGH" }
        )?;
        write!(
            f,
            "\tAllocation policy: \t{}",
            if self.write_alloc {
                "WRITE ALLOCATE"
            } else {
                "WRITE NO ALLOCATE"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_size_clears_split() {
        let mut config = Config::default();
        config.set(Parameter::InstSize(4096));
        assert!(config.split);
        config.set(Parameter::UnifiedSize(16384));
        assert!(!config.split);
        assert_eq!(config.unified_size, 16384);
    }

    #[test]
    fn inst_or_data_size_forces_split() {
        let mut config = Config::default();
        config.set(Parameter::DataSize(2048));
        assert!(config.split);
        assert_eq!(config.data_size, 2048);
    }

    #[test]
    fn write_policy_pairs_overwrite() {
        let mut config = Config::default();
        config.set(Parameter::WriteThrough);
        assert!(!config.write_back);
        config.set(Parameter::WriteBack);
        assert!(config.write_back);
        config.set(Parameter::NoWriteAlloc);
        assert!(!config.write_alloc);
    }

    #[test]
    fn default_geometry_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_pow2_block_size() {
        let mut config = Config::default();
        config.set(Parameter::BlockSize(24));
        assert_eq!(config.validate(), Err(ConfigError::BlockSizeNotPow2(24)));
    }

    #[test]
    fn rejects_block_smaller_than_word() {
        let mut config = Config::default();
        config.set(Parameter::BlockSize(2));
        assert_eq!(config.validate(), Err(ConfigError::BlockSmallerThanWord(2)));
    }

    #[test]
    fn rejects_size_that_truncates() {
        let mut config = Config::default();
        config.set(Parameter::UnifiedSize(100));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SizeNotMultiple { .. })
        ));
    }

    #[test]
    fn rejects_non_pow2_set_count() {
        let mut config = Config::default();
        // 48B / (16B x 1 way) = 3 sets
        config.set(Parameter::UnifiedSize(48));
        assert_eq!(
            config.validate(),
            Err(ConfigError::SetsNotPow2 {
                name: "unified",
                n_sets: 3
            })
        );
    }

    #[test]
    fn split_validates_both_sizes() {
        let mut config = Config::default();
        config.set(Parameter::InstSize(4096));
        config.set(Parameter::DataSize(100));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SizeNotMultiple { name: "data", .. })
        ));
    }

    #[test]
    fn config_from_json() {
        let config: Config = serde_json::from_str(
            r#"{"block_size": 32, "inst_size": 4096, "data_size": 8192, "split": true, "write_back": false}"#,
        )
        .unwrap();
        assert_eq!(config.block_size, 32);
        assert!(config.split);
        assert!(!config.write_back);
        assert_eq!(config.validate(), Ok(()));
    }
}
