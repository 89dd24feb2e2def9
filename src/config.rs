use crate::archive::acquirer::DEFAULT_TIMEOUT;
use crate::archive::parser::Coercion;
use crate::comfort::categories::{self, CategoryTables};
use crate::utils::get_cache_dir;
use bon::Builder;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for an [`crate::EpwComfort`] client.
///
/// # Examples
///
/// ```
/// use epw_comfort::{ComfortConfig, Coercion};
/// use std::time::Duration;
///
/// let config = ComfortConfig::builder()
///     .timeout(Duration::from_secs(20))
///     .coercion(Coercion::IntegerOnly)
///     .use_cache(false)
///     .build();
/// assert_eq!(config.timeout, Duration::from_secs(20));
/// assert!(config.resolved_cache_dir().is_none());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ComfortConfig {
    /// Directory for station and archive caches. Defaults to
    /// `epw_comfort_cache` inside the system cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Limit for a single download.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    #[builder(default)]
    pub coercion: Coercion,
    /// Tables used to label UTCI values. Defaults to the process-wide tables.
    #[builder(default = categories::global().clone())]
    pub categories: CategoryTables,
    /// Whether downloaded documents and archives are cached on disk.
    #[builder(default = true)]
    pub use_cache: bool,
}

impl Default for ComfortConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ComfortConfig {
    /// The cache directory to use, or `None` when caching is off or no
    /// directory can be determined.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if !self.use_cache {
            return None;
        }
        self.cache_dir.clone().or_else(get_cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ComfortConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.coercion, Coercion::Numeric);
        assert!(config.use_cache);
        assert_eq!(config.categories, CategoryTables::defaults());
        assert_eq!(config.resolved_cache_dir(), get_cache_dir());
    }

    #[test]
    fn explicit_cache_dir_wins() {
        let config = ComfortConfig::builder()
            .cache_dir(PathBuf::from("/tmp/epw"))
            .build();
        assert_eq!(config.resolved_cache_dir(), Some(PathBuf::from("/tmp/epw")));
    }
}
