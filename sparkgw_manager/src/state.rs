use ::std::sync::Arc;

use crate::{cache::CacheReader, cluster::ClusterApi, repository::ApplicationRepository};

/// Shared state of all handlers.
pub(crate) struct AppState<C> {
    repository: Arc<ApplicationRepository<C>>,
    cache: CacheReader,
    default_log_lines: i64,
    watch_max_failures: u32,
}

// derive(Clone) would require `C: Clone`
impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: self.cache.clone(),
            default_log_lines: self.default_log_lines,
            watch_max_failures: self.watch_max_failures,
        }
    }
}

impl<C: ClusterApi> AppState<C> {
    pub fn new(
        repository: ApplicationRepository<C>,
        cache: CacheReader,
        default_log_lines: i64,
        watch_max_failures: u32,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            cache,
            default_log_lines,
            watch_max_failures,
        }
    }

    pub fn repository(&self) -> &ApplicationRepository<C> {
        &self.repository
    }

    pub fn default_log_lines(&self) -> i64 {
        self.default_log_lines
    }

    pub fn is_ready(&self) -> bool {
        self.cache.is_ready(self.watch_max_failures)
    }
}
