// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The application container.
//!
//! Every component is constructed here and injected explicitly; there is no
//! package-level mutable state. Tests assemble the same container around an
//! in-memory store.

use crate::api_key::ApiKeyProvider;
use crate::config::Config;
use crate::init::InitTracker;
use crate::rate_limit::RateTiers;
use ccdash_core::{Clock, IdGen, SystemClock, UuidIdGen};
use ccdash_engine::{Executor, ExecutorConfig, SafetyChecker, SafetyConfig, Scheduler, TaskFailure};
use ccdash_ingest::{Ingester, Predictor, WindowEngine};
use ccdash_storage::Store;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared application state handed to every handler.
pub type AppState = Arc<App>;

pub struct App {
    pub config: Config,
    pub store: Store,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGen>,
    pub ingester: Ingester,
    pub windows: WindowEngine,
    pub predictor: Predictor,
    pub executor: Executor,
    pub init: InitTracker,
    pub rate: RateTiers,
    pub api_key: String,
}

impl App {
    /// Open the store at the configured path and assemble the container.
    /// Fatal errors here exit the server with code 1.
    pub fn build(config: Config) -> anyhow::Result<AppState> {
        let store = Store::open(&config.db_path)?;
        let api_key = ApiKeyProvider::from_conventional_locations()
            .ensure(config.api_key.as_deref())?;
        Ok(Self::assemble(
            config,
            store,
            api_key,
            Arc::new(SystemClock),
            Arc::new(UuidIdGen),
        ))
    }

    /// Assemble around an existing store, clock, and id source (tests use
    /// an in-memory store, a fake clock, and sequential ids).
    pub fn assemble(
        config: Config,
        store: Store,
        api_key: String,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGen>,
    ) -> AppState {
        let safety = Arc::new(SafetyChecker::new(SafetyConfig {
            disabled: config.disable_safety_check,
            assistant_binary: config.assistant_binary.clone(),
            ..SafetyConfig::default()
        }));
        let executor = Executor::new(
            store.clone(),
            ExecutorConfig {
                assistant_binary: config.assistant_binary.clone(),
                ..ExecutorConfig::default()
            },
            safety,
            Arc::clone(&clock),
        );
        let ingester = Ingester::new(store.clone(), config.log_root.clone());
        let windows = WindowEngine::new(store.clone());
        let predictor = Predictor::new(store.clone(), Arc::clone(&clock));
        let init = InitTracker::new(clock.now());

        Arc::new(App {
            rate: RateTiers::new(),
            config,
            store,
            clock,
            ids,
            ingester,
            windows,
            predictor,
            executor,
            init,
            api_key,
        })
    }

    /// Start the background machinery: failure sink, executor workers, and
    /// the scheduler tick.
    pub fn start_background(self: &Arc<Self>, shutdown: CancellationToken) {
        let (failures_tx, mut failures_rx) = mpsc::channel::<TaskFailure>(32);

        tokio::spawn(async move {
            while let Some(failure) = failures_rx.recv().await {
                tracing::error!(task = %failure.task, message = %failure.message, "background task failed");
            }
        });

        self.executor.start(shutdown.clone(), failures_tx.clone());
        let _scheduler = Scheduler::new(
            self.store.clone(),
            Arc::clone(&self.clock),
            self.executor.queue(),
        )
        .with_tick(self.config.scheduler_tick)
        .start(shutdown, failures_tx);
    }
}
