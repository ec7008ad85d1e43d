//! Background thread helpers shared by the dispatcher and the poller

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A named thread whose exit can be awaited with a deadline
pub(crate) struct Worker {
    name: String,
    handle: JoinHandle<()>,
    done: mpsc::Receiver<()>,
}

impl Worker {
    /// Spawn `body` on a thread called `name`
    pub(crate) fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                body();
                let _ = done_tx.send(());
            })?;
        Ok(Self {
            name: name.to_string(),
            handle,
            done,
        })
    }

    /// True once the thread body has returned or unwound
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait up to `timeout` for the thread to finish
    ///
    /// Returns the worker back if it is still running, so the caller can
    /// decide whether to detach it or wait on it later.
    pub(crate) fn join_timeout(self, timeout: Duration) -> Option<Self> {
        match self.done.recv_timeout(timeout) {
            // Disconnected means the body unwound without signalling
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.join();
                None
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("{} did not stop within {:?}", self.name, timeout);
                Some(self)
            }
        }
    }

    /// Block until the thread has finished
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            tracing::error!("{} thread panicked", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_finished_worker() {
        let worker = Worker::spawn("quick", || {}).unwrap();
        assert!(worker.join_timeout(Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_join_times_out() {
        let worker = Worker::spawn("slow", || thread::sleep(Duration::from_millis(300))).unwrap();
        assert!(!worker.is_finished());
        let worker = worker.join_timeout(Duration::from_millis(20)).unwrap();
        assert!(!worker.is_finished());
        worker.join();
    }

    #[test]
    fn test_join_after_panic() {
        let worker = Worker::spawn("panicky", || panic!("worker failure")).unwrap();
        assert!(worker.join_timeout(Duration::from_secs(1)).is_none());
    }
}
