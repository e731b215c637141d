//! Process-wide working directory changes for tests.
//!
//! The working directory is shared by every thread of the test binary, so each
//! [`CwdGuard`] holds a global lock for its whole lifetime: guards in parallel
//! tests run one after another instead of observing each other's directory.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

static CWD_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static HOLDS_CWD_LOCK: Cell<bool> = const { Cell::new(false) };
}

/// Changes the working directory and restores the original one on drop.
///
/// Restoration also runs while unwinding from a panic. A poisoned lock (a
/// previous guard's owner panicked) is recovered since the directory was
/// restored before the lock was released.
#[derive(Debug)]
pub struct CwdGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl CwdGuard {
    /// Enter `path`, blocking until no other guard is active.
    ///
    /// Errors instead of deadlocking when the calling thread already holds a
    /// guard.
    pub fn enter(path: &Path) -> Result<Self> {
        if HOLDS_CWD_LOCK.with(Cell::get) {
            bail!("working directory guard is already held by this thread");
        }
        let lock = CWD_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let original = std::env::current_dir().context("read current directory")?;
        std::env::set_current_dir(path)
            .with_context(|| format!("change directory to {}", path.display()))?;
        HOLDS_CWD_LOCK.with(|held| held.set(true));
        debug!(from = %original.display(), to = %path.display(), "entered working directory");
        Ok(Self {
            original,
            _lock: lock,
        })
    }

    /// Directory that was current before the guard was entered.
    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.original) {
            warn!(err = %err, dir = %self.original.display(), "failed to restore working directory");
        } else {
            debug!(dir = %self.original.display(), "restored working directory");
        }
        HOLDS_CWD_LOCK.with(|held| held.set(false));
    }
}
