use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::alerting::domain::alert_sink::{AlertSink, SinkError};

/// Fire-and-forget wrapper that plays alerts on a dedicated thread.
///
/// At most one alert waits behind the one currently playing; further fires
/// are dropped rather than queued, so a slow or hung audio device can never
/// stall the frame loop. Failures of the inner sink are logged on the
/// worker thread. Dropping waits at most [`SHUTDOWN_GRACE`] for the worker;
/// a player that is still stuck after that is left behind.
pub struct AsyncAlertSink {
    name: String,
    tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    /// Disconnects when the worker exits.
    exited: Receiver<()>,
}

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

impl AsyncAlertSink {
    pub fn new(inner: Box<dyn AlertSink>) -> Self {
        let name = format!("async({})", inner.name());
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        let (exit_tx, exited) = crossbeam_channel::bounded::<()>(0);
        let handle = std::thread::spawn(move || {
            let _exit_tx = exit_tx;
            for () in rx {
                if let Err(e) = inner.fire() {
                    log::warn!("Alert sink '{}' failed: {e}", inner.name());
                }
            }
        });
        Self {
            name,
            tx: Some(tx),
            handle: Some(handle),
            exited,
        }
    }
}

impl AlertSink for AsyncAlertSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn fire(&self) -> Result<(), SinkError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(SinkError::Unavailable("alert worker stopped".into()));
        };
        match tx.try_send(()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(())) => {
                log::debug!("Alert dropped: previous alert still playing");
                Ok(())
            }
            Err(TrySendError::Disconnected(())) => {
                Err(SinkError::Unavailable("alert worker stopped".into()))
            }
        }
    }
}

impl Drop for AsyncAlertSink {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once pending alerts play.
        self.tx.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.exited.recv_timeout(SHUTDOWN_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Alert sink '{}' still playing, not waiting for it", self.name);
            }
            _ => {
                let _ = handle.join();
            }
        }
    }
}
