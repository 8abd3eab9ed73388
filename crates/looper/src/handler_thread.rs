use crate::environment::LooperEnvironment;
use crate::error::LooperError;
use crate::looper::Looper;
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// A thread with its own looper, running until the looper quits.
#[derive(Debug)]
pub struct HandlerThread {
    name: String,
    looper: Arc<Looper>,
    handle: Option<JoinHandle<()>>,
}

impl HandlerThread {
    /// Spawns the thread and waits until its looper is prepared.
    pub fn start(environment: &Arc<LooperEnvironment>, name: impl Into<String>) -> Result<Self, LooperError> {
        let name = name.into();
        let (ready_tx, ready_rx) = mpsc::channel();
        let environment = Arc::clone(environment);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let prepared = environment.prepare();
                drop(environment);
                match prepared {
                    Ok(looper) => {
                        let _ = ready_tx.send(Ok(Arc::clone(&looper)));
                        looper.run();
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                }
            })
            .map_err(|err| LooperError::Spawn(err.to_string()))?;

        let looper = ready_rx.recv().map_err(|err| LooperError::Spawn(err.to_string()))??;
        debug!(thread = %name, looper = looper.id(), "handler thread started");
        Ok(Self { name, looper, handle: Some(handle) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn looper(&self) -> &Arc<Looper> {
        &self.looper
    }

    pub fn quit(&self) -> Result<(), LooperError> {
        self.looper.quit()
    }

    /// Quits the looper and waits for the thread to finish.
    pub fn join(mut self) -> Result<(), LooperError> {
        self.looper.quit_unchecked();
        match self.handle.take() {
            Some(handle) => {
                handle.join().map_err(|_| LooperError::Spawn(format!("handler thread {} panicked", self.name)))
            }
            None => Ok(()),
        }
    }
}

impl Drop for HandlerThread {
    fn drop(&mut self) {
        self.looper.quit_unchecked();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
