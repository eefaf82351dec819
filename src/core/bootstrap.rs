//! Wiring of the mediation layer for one repository.
//!
//! [`Session::open`] builds the stack from a [`ConduitConfig`]: one
//! [`ConcurrencyLimiter`], a [`CliRunner`] sharing it, a [`CliService`] for the
//! repository and, unless disabled, a [`CachedService`] around it.
//! [`Session::watch`] starts a [`ChangeWatcher`] on the resolved git directory;
//! on each notification the caller runs [`Session::refresh`] and re-queries.

use crate::core::{
    cache::CachedService,
    config::ConduitConfig,
    error::Result,
    git::CliService,
    limiter::ConcurrencyLimiter,
    runner::{CliRunner, ProcessRunner},
    service::GitService,
    watcher::{ChangeWatcher, Refresh},
};
use log::debug;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

enum Backend {
    Cached(CachedService<CliService>),
    Direct(CliService),
}

pub struct Session {
    backend: Backend,
    limiter: Arc<ConcurrencyLimiter>,
    config: ConduitConfig,
}

impl Session {
    /// Open the repository containing `path` with a limiter of its own.
    pub fn open<P: AsRef<Path>>(path: P, config: &ConduitConfig) -> Result<Self> {
        let limiter = Arc::new(ConcurrencyLimiter::new(config.max_concurrent_processes));
        Self::open_with_limiter(path, config, limiter)
    }

    /// Open with a limiter shared with other sessions, so the process cap
    /// covers every repository this application has open.
    pub fn open_with_limiter<P: AsRef<Path>>(
        path: P,
        config: &ConduitConfig,
        limiter: Arc<ConcurrencyLimiter>,
    ) -> Result<Self> {
        let runner = CliRunner::with_program(
            &config.git_program,
            Arc::clone(&limiter),
            config.timeouts(),
        );
        Self::open_with_runner(path, config, Arc::new(runner), limiter)
    }

    pub fn open_with_runner<P: AsRef<Path>>(
        path: P,
        config: &ConduitConfig,
        runner: Arc<dyn ProcessRunner>,
        limiter: Arc<ConcurrencyLimiter>,
    ) -> Result<Self> {
        let cli = CliService::open(path, runner)?.with_max_diff_bytes(config.max_diff_bytes);
        let backend = if config.cache_enabled {
            debug!(
                "caching reads for {:?} (max {} entries)",
                config.cache_ttl(),
                config.cache_max_entries
            );
            Backend::Cached(CachedService::with_capacity(
                cli,
                config.cache_ttl(),
                config.cache_max_entries,
            ))
        } else {
            Backend::Direct(cli)
        };

        Ok(Self {
            backend,
            limiter,
            config: config.clone(),
        })
    }

    pub fn service(&self) -> &dyn GitService {
        match &self.backend {
            Backend::Cached(cached) => cached,
            Backend::Direct(cli) => cli,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.backend, Backend::Cached(_))
    }

    /// Forget cached reads so the next query sees the repository as it is now.
    pub fn refresh(&self) {
        if let Backend::Cached(cached) = &self.backend {
            cached.invalidate();
        }
    }

    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    /// Watch the git directory with the configured debounce.
    pub fn watch(&self) -> Result<(ChangeWatcher, Receiver<Refresh>)> {
        ChangeWatcher::start(self.service().git_dir(), self.config.watch_debounce())
    }
}
