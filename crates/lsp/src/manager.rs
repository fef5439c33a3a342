// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The language-server pool.
//!
//! At most `max_concurrent` live servers across all languages. One start
//! per language at a time; a per-language circuit breaker guards against
//! flapping commands; idle processes are swept on a timer. The map lock
//! is never held across subprocess I/O.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mayla_core::Language;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::config::ServerRegistry;
use crate::error::LspError;
use crate::process::{LspProcess, ProcessState};
use crate::root::detect_project_root;

/// How often the idle sweep looks for evictable processes.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Pool tunables.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Live servers across all languages.
    pub max_concurrent: usize,
    /// Quiet period after which a ready server is stopped.
    pub idle_timeout: Duration,
    pub breaker: BreakerConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            idle_timeout: Duration::from_secs(600),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Snapshot of one pool slot for the status surface.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub language: Language,
    pub state: ProcessState,
    pub root: String,
    pub requests: u64,
    pub errors: u64,
}

/// Owns every language-server subprocess.
pub struct LspManager {
    registry: ServerRegistry,
    config: ManagerConfig,
    procs: Mutex<HashMap<Language, Arc<LspProcess>>>,
    start_gates: Mutex<HashMap<Language, Arc<AsyncMutex<()>>>>,
    breakers: Mutex<HashMap<Language, CircuitBreaker>>,
    restarts: Mutex<HashMap<Language, u32>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl LspManager {
    pub fn new(registry: ServerRegistry, config: ManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            config,
            procs: Mutex::new(HashMap::new()),
            start_gates: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
            restarts: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Whether any server is configured for the language.
    pub fn supports(&self, language: Language) -> bool {
        self.registry.supports(language)
    }

    /// Get a ready server for `language` suitable for `file`, starting or
    /// restarting one as needed.
    pub async fn get_or_start(
        &self,
        language: Language,
        file: &Path,
    ) -> Result<Arc<LspProcess>, LspError> {
        let config = self
            .registry
            .config_for(language)
            .ok_or(LspError::NoServer(language))?
            .clone();
        let root = detect_project_root(file, &config.root_patterns);

        // Fast path: a ready server for the same root
        let stale = {
            let mut procs = self.procs.lock();
            let reusable = procs
                .get(&language)
                .filter(|proc| proc.is_ready() && proc.root() == root)
                .map(Arc::clone);
            if let Some(proc) = reusable {
                proc.touch();
                return Ok(proc);
            }
            procs.remove(&language)
        };
        if let Some(stale) = stale {
            debug!(language = %language, "stopping server with stale root/state");
            stale.stop().await;
        }

        // One start per language at a time
        let gate = {
            let mut gates = self.start_gates.lock();
            Arc::clone(gates.entry(language).or_default())
        };
        let _guard = gate.lock().await;

        // Someone else may have started it while we waited
        {
            let procs = self.procs.lock();
            if let Some(proc) = procs.get(&language) {
                if proc.is_ready() && proc.root() == root {
                    proc.touch();
                    return Ok(Arc::clone(proc));
                }
            }
        }

        // Circuit breaker and restart cap
        {
            let mut breakers = self.breakers.lock();
            let breaker = breakers
                .entry(language)
                .or_insert_with(|| CircuitBreaker::new(self.config.breaker));
            if !breaker.allow() {
                return Err(LspError::Unavailable(language));
            }
        }
        {
            let restarts = self.restarts.lock();
            if restarts.get(&language).copied().unwrap_or(0) >= config.max_restarts {
                self.record_failure(language);
                return Err(LspError::RestartLimit(language));
            }
        }

        // Respect the concurrency cap before spawning
        self.evict_for_capacity().await;

        match LspProcess::start(config, root).await {
            Ok(process) => {
                let process = Arc::new(process);
                self.record_success(language);
                self.procs.lock().insert(language, Arc::clone(&process));
                Ok(process)
            }
            Err(e) => {
                warn!(language = %language, error = %e, "language server start failed");
                self.record_failure(language);
                *self.restarts.lock().entry(language).or_insert(0) += 1;
                Err(e)
            }
        }
    }

    fn record_success(&self, language: Language) {
        let mut breakers = self.breakers.lock();
        if let Some(breaker) = breakers.get_mut(&language) {
            breaker.record_success();
        }
    }

    fn record_failure(&self, language: Language) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers
            .entry(language)
            .or_insert_with(|| CircuitBreaker::new(self.config.breaker));
        breaker.record_failure();
    }

    /// If the pool is at capacity, stop the oldest-accessed ready server.
    async fn evict_for_capacity(&self) {
        loop {
            let victim = {
                let mut procs = self.procs.lock();
                let ready = procs.values().filter(|p| p.is_ready()).count();
                if ready < self.config.max_concurrent {
                    return;
                }
                let oldest = procs
                    .iter()
                    .filter(|(_, p)| p.is_ready())
                    .min_by_key(|(_, p)| p.last_access())
                    .map(|(lang, _)| *lang);
                oldest.and_then(|lang| procs.remove(&lang))
            };
            match victim {
                Some(victim) => {
                    info!(language = %victim.language(), "evicting server for capacity");
                    victim.stop().await;
                }
                None => return,
            }
        }
    }

    /// Spawn the periodic idle sweep. Runs until `shutdown_all`.
    pub fn spawn_idle_sweep(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        self.tracker.spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = manager.cancel.cancelled() => break,
                    _ = tick.tick() => manager.evict_idle().await,
                }
            }
        });
        self.tracker.close();
    }

    /// Stop every ready process whose idle time exceeds the timeout.
    pub async fn evict_idle(&self) {
        let victims: Vec<Arc<LspProcess>> = {
            let mut procs = self.procs.lock();
            let expired: Vec<Language> = procs
                .iter()
                .filter(|(_, p)| p.is_ready() && p.idle_for() >= self.config.idle_timeout)
                .map(|(lang, _)| *lang)
                .collect();
            expired.iter().filter_map(|lang| procs.remove(lang)).collect()
        };
        for victim in victims {
            info!(language = %victim.language(), "evicting idle server");
            victim.stop().await;
        }
    }

    /// Number of ready servers right now.
    pub fn ready_count(&self) -> usize {
        self.procs.lock().values().filter(|p| p.is_ready()).count()
    }

    /// Snapshot for the status surface.
    pub fn pool_status(&self) -> Vec<PoolEntry> {
        self.procs
            .lock()
            .values()
            .map(|p| PoolEntry {
                language: p.language(),
                state: p.state(),
                root: p.root().to_string_lossy().into_owned(),
                requests: p.request_count(),
                errors: p.error_count(),
            })
            .collect()
    }

    /// Stop the sweep task and every server.
    pub async fn shutdown_all(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        let procs: Vec<Arc<LspProcess>> = self.procs.lock().drain().map(|(_, p)| p).collect();
        for proc in procs {
            proc.stop().await;
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
