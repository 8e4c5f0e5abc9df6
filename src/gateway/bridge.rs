//! OS signal bridge
//!
//! Receives control signals on the tokio runtime and hands each one to the
//! gateway on a blocking thread, so a slow handler (a topic being spoken, a
//! recorder being killed) never delays delivery of the next signal.

use super::{ControlSignal, SignalGateway};
use crate::error::VoxtalkError;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn listen(control: ControlSignal) -> Result<Signal, VoxtalkError> {
    signal(SignalKind::from_raw(control.signal_number())).map_err(|e| {
        VoxtalkError::Config(format!(
            "Failed to set up handler for {} (signal {}): {}",
            control,
            control.signal_number(),
            e
        ))
    })
}

/// Install handlers for every control signal and start dispatching.
///
/// Handler errors that must stop the daemon are sent on `fatal`.
pub fn spawn(
    gateway: Arc<SignalGateway>,
    fatal: mpsc::UnboundedSender<VoxtalkError>,
) -> Result<JoinHandle<()>, VoxtalkError> {
    let mut toggle = listen(ControlSignal::Toggle)?;
    let mut force_on = listen(ControlSignal::ForceOn)?;
    let mut force_off = listen(ControlSignal::ForceOff)?;
    let mut lang = listen(ControlSignal::Lang)?;
    let mut memory = listen(ControlSignal::Memory)?;
    let mut topic = listen(ControlSignal::TriggerTopic)?;

    Ok(tokio::spawn(async move {
        loop {
            let control = tokio::select! {
                Some(()) = toggle.recv() => ControlSignal::Toggle,
                Some(()) = force_on.recv() => ControlSignal::ForceOn,
                Some(()) = force_off.recv() => ControlSignal::ForceOff,
                Some(()) = lang.recv() => ControlSignal::Lang,
                Some(()) = memory.recv() => ControlSignal::Memory,
                Some(()) = topic.recv() => ControlSignal::TriggerTopic,
                else => break,
            };
            tracing::debug!("Received signal {} ({})", control.signal_number(), control);

            let gateway = gateway.clone();
            let fatal = fatal.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = gateway.dispatch(control) {
                    tracing::error!("{} failed: {}", control, e);
                    let _ = fatal.send(e);
                }
            });
        }
        tracing::debug!("Signal bridge stopped");
    }))
}
