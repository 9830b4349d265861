use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Default number of programs (and per-stage modules) kept resident.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(50 * 1024) {
    Some(n) => n,
    None => unreachable!(),
};

/// Version stamp written into every persisted entry.
pub const DEFAULT_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCacheConfig {
    pub capacity: NonZeroUsize,
    /// Base directory for persisted programs; `None` disables persistence.
    pub cache_dir: Option<PathBuf>,
    pub version: String,
    /// Save evicted programs that were never written to disk.
    pub persist: bool,
    /// Answer compile/link failures with a solid magenta program instead of an error.
    pub fallback_on_error: bool,
    pub module_capacity: NonZeroUsize,
}

impl Default for ShaderCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cache_dir: None,
            version: DEFAULT_VERSION.to_owned(),
            persist: true,
            fallback_on_error: false,
            module_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl ShaderCacheConfig {
    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_fallback_on_error(mut self, fallback: bool) -> Self {
        self.fallback_on_error = fallback;
        self
    }

    pub fn with_module_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.module_capacity = capacity;
        self
    }

    /// Persistence is active only with a directory configured.
    pub fn persistence_enabled(&self) -> bool {
        self.persist && self.cache_dir.is_some()
    }
}
