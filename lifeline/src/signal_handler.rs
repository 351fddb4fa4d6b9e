use anyhow::{Context, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGHUP
    ConfigReload,
    /// SIGTERM or SIGINT
    Shutdown,
}

/// Scheduler signal streams, registered once for the life of the runtime.
///
/// Signals arriving while the scheduler is busy reconciling are queued by
/// the streams and delivered on the next call to [`SignalHandler::next`].
pub struct SignalHandler {
    hangup: Signal,
    terminate: Signal,
    interrupt: Signal,
}

impl SignalHandler {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup()).context("failed to listen for SIGHUP")?,
            terminate: signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?,
            interrupt: signal(SignalKind::interrupt()).context("failed to listen for SIGINT")?,
        })
    }

    /// Next scheduler event. A closed stream ends the scheduler.
    pub async fn next(&mut self) -> SignalEvent {
        let (name, received, event) = tokio::select! {
            r = self.hangup.recv() => ("SIGHUP", r, SignalEvent::ConfigReload),
            r = self.terminate.recv() => ("SIGTERM", r, SignalEvent::Shutdown),
            r = self.interrupt.recv() => ("SIGINT", r, SignalEvent::Shutdown),
        };
        if received.is_none() {
            warn!(target: "lifeline_sched", signal = name, "signal stream closed, shutting down");
            return SignalEvent::Shutdown;
        }
        info!(target: "lifeline_sched", signal = name, event = ?event, "received signal");
        event
    }
}
