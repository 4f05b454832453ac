use tokio::sync::watch;

/// Owned by whatever displays a form. Aborting it, or dropping it, cancels any
/// submission still waiting on the scoring service.
#[derive(Debug)]
pub struct FormLifetime {
    sender: watch::Sender<bool>,
}

impl FormLifetime {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            receiver: Some(self.sender.subscribe()),
        }
    }

    pub fn abort(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for FormLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FormLifetime {
    fn drop(&mut self) {
        self.sender.send_replace(true);
    }
}

/// Receiving side of a [`FormLifetime`].
#[derive(Debug, Clone)]
pub struct AbortSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl AbortSignal {
    /// A signal that never fires, for forms without an owning view.
    pub fn never() -> Self {
        Self { receiver: None }
    }

    pub fn is_aborted(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|receiver| *receiver.borrow())
    }

    /// Resolves once the owning lifetime aborts or goes away.
    pub async fn aborted(&self) {
        let Some(receiver) = &self.receiver else {
            return std::future::pending().await;
        };
        let mut receiver = receiver.clone();
        // An error means the sender dropped, which also counts as aborted.
        let _ = receiver.wait_for(|aborted| *aborted).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn dropping_the_lifetime_fires_the_signal() {
        let lifetime = FormLifetime::new();
        let signal = lifetime.signal();
        assert!(!signal.is_aborted());

        drop(lifetime);
        tokio::time::timeout(Duration::from_secs(1), signal.aborted())
            .await
            .expect("signal resolves after drop");
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn never_signal_stays_pending() {
        let signal = AbortSignal::never();
        let outcome = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(outcome.is_err());
        assert!(!signal.is_aborted());
    }
}
