use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

pub const DEFAULT_SIGNAL_WINDOW: Duration = Duration::from_millis(1000);

/// Transient "export is ready" signal.
///
/// [`export_now`](Self::export_now) publishes the export location for a
/// short window. Whatever embeds the session watches the signal and turns it
/// into a one-shot download or open. The backend's response is never
/// observed here, so export failures do not reach the operation state.
#[derive(Clone)]
pub struct ExportTrigger {
    url: Url,
    window: Duration,
    signal: Arc<watch::Sender<Option<Url>>>,
    armed: Arc<Mutex<u64>>,
}

impl ExportTrigger {
    pub fn new(url: Url, window: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            url,
            window,
            signal: Arc::new(tx),
            armed: Arc::new(Mutex::new(0)),
        }
    }

    /// Raises the signal and schedules it to clear after the window. Needs a
    /// tokio runtime. Callers only offer this while the batch is non-empty.
    pub fn export_now(&self) {
        let ticket = {
            let mut armed = self.armed.lock();
            *armed += 1;
            *armed
        };
        self.signal.send_replace(Some(self.url.clone()));
        log::debug!("export signal raised for {}", self.url);

        let signal = Arc::clone(&self.signal);
        let armed = Arc::clone(&self.armed);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // A newer trigger owns the signal now.
            if *armed.lock() == ticket {
                signal.send_replace(None);
                log::debug!("export signal cleared");
            }
        });
    }

    pub fn is_active(&self) -> bool {
        self.signal.borrow().is_some()
    }

    pub fn current(&self) -> Option<Url> {
        self.signal.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Url>> {
        self.signal.subscribe()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
