use std::time::Duration;
use typed_builder::TypedBuilder;

/// Default delay after which a pending fetch is reported as slow.
pub const DEFAULT_SLOW_AFTER: Duration = Duration::from_secs(3);

/// Default hard ceiling on a single metadata fetch.
pub const DEFAULT_HARD_TIMEOUT: Duration = Duration::from_secs(20);

/// Default number of previews kept in memory.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

/// Timing and sizing knobs for the preview pipeline.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PreviewConfig {
    /// How long a fetch may run before it is surfaced as slow.
    #[builder(default = DEFAULT_SLOW_AFTER)]
    pub slow_after: Duration,
    /// How long a fetch may run before it is abandoned as failed.
    #[builder(default = DEFAULT_HARD_TIMEOUT)]
    pub hard_timeout: Duration,
    /// Maximum number of previews held in memory.
    #[builder(default = DEFAULT_MEMORY_CAPACITY)]
    pub memory_capacity: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.slow_after, Duration::from_secs(3));
        assert_eq!(config.hard_timeout, Duration::from_secs(20));
        assert_eq!(config.memory_capacity, 10_000);
    }

    #[test]
    fn builder_overrides() {
        let config = PreviewConfig::builder()
            .hard_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.hard_timeout, Duration::from_secs(5));
        assert_eq!(config.slow_after, DEFAULT_SLOW_AFTER);
    }
}
