//! # Runtime
//!
//! Runtime presets for the [Tokio](https://tokio.rs) async runtime used by pinrig binaries.
//!
//! ## Profiles
//! * **Realtime**: a current-thread scheduler. The machine loop, its ticker and its
//!   event tap all live on one thread, so machine state never crosses threads.
//! * **Service**: a multi-threaded scheduler sized from available parallelism, for
//!   tools that validate many configs or serve observers.
//!
//! ## Example
//!
//! ```rust,ignore
//! #[pinrig_runtime::main(realtime)]
//! async fn main() -> anyhow::Result<()> {
//!     Ok(())
//! }
//! ```

pub use anyhow::Result;
pub use pinrig_derive::main;

use anyhow::anyhow;
use std::{sync::OnceLock, thread::available_parallelism, time::Duration};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

const DEFAULT_WORKER_THREADS: usize = 4;
/// 2 `MiB`.
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const MIN_STACK_SIZE: usize = 1024 * 1024;
const MAX_STACK_SIZE: usize = 16 * 1024 * 1024;
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(60);
const DEFAULT_THREAD_NAME: &str = "pinrig-worker";

static WORKER_THREADS: OnceLock<usize> = OnceLock::new();

/// Detects the number of worker threads from `TOKIO_WORKER_THREADS` or the hardware.
fn get_worker_threads() -> usize {
    *WORKER_THREADS.get_or_init(|| {
        std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0 && n <= 1024)
            .unwrap_or_else(|| {
                available_parallelism()
                    .map(std::num::NonZero::get)
                    .unwrap_or(DEFAULT_WORKER_THREADS)
            })
    })
}

/// Scheduler flavor of a [`RuntimeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    CurrentThread,
    MultiThread,
}

/// Configuration for the Tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub flavor: Flavor,
    pub worker_threads: usize,
    pub stack_size: usize,
    pub thread_name: String,
    pub thread_keep_alive: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::service()
    }
}

impl RuntimeConfig {
    /// Single-threaded preset for the machine loop.
    #[must_use = "Use this configuration for deterministic machine loops"]
    pub fn realtime() -> Self {
        Self {
            flavor: Flavor::CurrentThread,
            worker_threads: 1,
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: "pinrig-rt".to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }

    /// Multi-threaded preset.
    #[must_use = "Use this configuration for multi-threaded tools"]
    pub fn service() -> Self {
        Self {
            flavor: Flavor::MultiThread,
            worker_threads: get_worker_threads(),
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            thread_keep_alive: THREAD_KEEP_ALIVE,
        }
    }

    #[must_use = "Customize the number of worker threads for the runtime"]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.clamp(1, 1024);
        self
    }

    #[must_use = "Customize the stack size for worker threads"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        self
    }

    #[must_use = "Customize the thread name"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.thread_name =
            if name.trim().is_empty() { DEFAULT_THREAD_NAME.to_owned() } else { name };
        self
    }
}

/// Creates a new Tokio runtime from a [`RuntimeConfig`].
///
/// All drivers (I/O, time, signals) are enabled. Worker count and stack size are clamped
/// to sane bounds before building.
///
/// # Errors
///
/// Returns an [`anyhow::Error`] if the OS refuses to create the runtime threads.
pub fn build_runtime_with_config(config: &RuntimeConfig) -> Result<Runtime> {
    let config = config
        .clone()
        .with_worker_threads(config.worker_threads)
        .with_stack_size(config.stack_size)
        .with_thread_name(config.thread_name.clone());
    debug!(config = ?config, "Building tokio runtime");

    let mut builder = match config.flavor {
        Flavor::CurrentThread => Builder::new_current_thread(),
        Flavor::MultiThread => {
            let mut builder = Builder::new_multi_thread();
            builder.worker_threads(config.worker_threads);
            builder
        },
    };
    builder
        .thread_name(&config.thread_name)
        .thread_stack_size(config.stack_size)
        .thread_keep_alive(config.thread_keep_alive)
        .enable_all();

    builder.build().map_err(|e| anyhow!("Failed to initialize runtime: {e}"))
}
