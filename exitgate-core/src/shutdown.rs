use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

/// A single cancellation signal cloned into every accept and connection
/// task (spec §5 "Cancellation"). Observing the signal ends the current
/// suspension and unwinds the task, closing sockets on the way out.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn fire(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    pub fn new() -> (ShutdownHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (ShutdownHandle { tx }, Self { rx })
    }

    /// Resolves once shutdown has been signaled. Await this in a
    /// `tokio::select!` alongside the task's normal suspension points.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    pub fn is_signaled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Await `fut`, but give up and return `None` once `grace` has elapsed
/// since shutdown was signaled — the orchestrator's grace-deadline for
/// draining in-flight relays before force-closing (spec §4.6, §8 law 10).
pub async fn with_grace_deadline<F, T>(grace: Duration, fut: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    timeout(grace, fut).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_resolves_after_fire() {
        let (handle, mut signal) = ShutdownSignal::new();
        assert!(!signal.is_signaled());
        handle.fire();
        signal.cancelled().await;
        assert!(signal.is_signaled());
    }

    #[tokio::test]
    async fn grace_deadline_times_out_a_never_resolving_future() {
        let result = with_grace_deadline(Duration::from_millis(10), std::future::pending::<()>()).await;
        assert!(result.is_none());
    }
}
