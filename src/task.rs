use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Run flag handed to a task loop. Cancellation is cooperative: the loop
/// checks the flag once per cycle and never mid-computation.
#[derive(Clone)]
pub struct RunFlag(Arc<AtomicCell<bool>>);

impl RunFlag {
    pub fn is_running(&self) -> bool {
        self.0.load()
    }
}

/// Start/stop plumbing shared by the sampler and both estimators.
///
/// `start` is a no-op while the task already runs, so calling it twice
/// never produces a second loop. `stop` clears the flag and joins: once
/// it returns, the loop has exited and touches no more shared state. It
/// may block for up to one cycle period while the loop reaches its next
/// flag check, and a loop stuck in a blocking frontend call stalls it
/// indefinitely.
pub struct Lifecycle {
    name: &'static str,
    running: Arc<AtomicCell<bool>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Lifecycle {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Arc::new(AtomicCell::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load()
    }

    pub fn start(&self, run: impl FnOnce(RunFlag) + Send + 'static) -> Result<(), TaskError> {
        let mut handle = self.handle.lock();

        if self.running.load() {
            return Ok(());
        }

        self.running.store(true);
        let flag = RunFlag(self.running.clone());

        let spawned = thread::Builder::new()
            .name(self.name.to_string())
            .spawn(move || run(flag));

        match spawned {
            Ok(new_handle) => {
                *handle = Some(new_handle);
                Ok(())
            }
            Err(source) => {
                self.running.store(false);

                Err(TaskError::Spawn {
                    name: self.name,
                    source,
                })
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false);

        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}
