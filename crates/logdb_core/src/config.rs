//! Log file configuration.

/// Configuration for opening a log file.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the log file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether `flush` syncs to durable storage (`fsync`).
    ///
    /// Disabling trades crash durability for speed; the in-memory
    /// dictionary stays correct either way.
    pub sync_on_flush: bool,

    /// Compaction trigger: rewrite the log when the number of physical
    /// records exceeds `compaction_ratio` times the number of live keys.
    pub compaction_ratio: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_flush: true,
            compaction_ratio: 2,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the log file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether `flush` syncs to durable storage.
    #[must_use]
    pub const fn sync_on_flush(mut self, value: bool) -> Self {
        self.sync_on_flush = value;
        self
    }

    /// Sets the compaction trigger ratio.
    #[must_use]
    pub const fn compaction_ratio(mut self, ratio: u64) -> Self {
        self.compaction_ratio = ratio;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_flush);
        assert_eq!(config.compaction_ratio, 2);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_flush(false)
            .compaction_ratio(4);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_flush);
        assert_eq!(config.compaction_ratio, 4);
    }
}
