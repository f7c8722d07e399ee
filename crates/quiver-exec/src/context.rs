//! Execution context: worker pool handle, configuration, and memory budget.

use std::future::Future;
use std::sync::Arc;

use quiver_core::config::EngineConfig;
use quiver_core::Error;
use quiver_mem::MemoryPool;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;

use crate::error::{ExecError, Result};

/// Shared by every plan built from it. Cloning is cheap.
#[derive(Clone)]
pub struct ExecContext {
    handle: Handle,
    // Present when this context owns its worker pool.
    _runtime: Option<Arc<Runtime>>,
    config: EngineConfig,
    budget: MemoryPool,
    pulls: Arc<Semaphore>,
}

impl ExecContext {
    /// Build a dedicated worker pool sized by `max_parallel_tasks`.
    ///
    /// Must be created and dropped outside of any async context.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.max_parallel_tasks)
            .thread_name("quiver-worker")
            .enable_time()
            .build()
            .map_err(|e| ExecError::Runtime(e.to_string()))?;
        let handle = runtime.handle().clone();
        Ok(Self::assemble(handle, Some(Arc::new(runtime)), config.clone()))
    }

    /// Borrow the ambient tokio runtime with default configuration.
    pub fn current() -> Result<Self> {
        Self::current_with(&EngineConfig::default())
    }

    pub fn current_with(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current()
            .map_err(|e| Error::InvalidState(format!("no ambient tokio runtime: {e}")))?;
        Ok(Self::assemble(handle, None, config.clone()))
    }

    fn assemble(handle: Handle, runtime: Option<Arc<Runtime>>, config: EngineConfig) -> Self {
        Self {
            handle,
            _runtime: runtime,
            budget: MemoryPool::new(config.mem_cap_bytes),
            pulls: Arc::new(Semaphore::new(config.max_parallel_tasks)),
            config,
        }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn budget(&self) -> &MemoryPool {
        &self.budget
    }

    /// Caps concurrent source pulls on the blocking pool.
    pub(crate) fn pull_permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.pulls)
    }

    /// Drive `future` to completion on this context's pool. Must not be
    /// called from within an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }
}
