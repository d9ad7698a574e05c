use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// The external renderer's entry point.
///
/// Called with no payload: the renderer pulls the clock and the current
/// snapshot itself. Implementations must return promptly and must not call
/// back into the face; the tick path invokes this while holding its fire gate.
pub trait Renderer: Send + Sync + 'static {
    fn request_redraw(&self);
}

/// Redraw requests as a wakeup for a render loop.
///
/// Requests that arrive while the loop is busy coalesce into one wakeup;
/// `count` still reports every request.
#[derive(Debug, Default)]
pub struct RedrawSignal {
    notify: Notify,
    requested: AtomicUsize,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once at least one redraw was requested since the last wakeup.
    pub async fn requested(&self) {
        self.notify.notified().await;
    }
}

impl Renderer for RedrawSignal {
    fn request_redraw(&self) {
        self.requested.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn requests_coalesce_into_one_wakeup() {
        let signal = Arc::new(RedrawSignal::new());
        signal.request_redraw();
        signal.request_redraw();
        assert_eq!(signal.count(), 2);

        tokio::time::timeout(Duration::from_secs(1), signal.requested())
            .await
            .expect("stored permit wakes the loop");

        let second = tokio::time::timeout(Duration::from_millis(20), signal.requested()).await;
        assert!(second.is_err());
    }
}
