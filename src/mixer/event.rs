use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel as channel;

use crate::{midi, osc};

/// Events a client publishes on its event channel.
#[derive(Clone, Debug)]
pub enum MixerEvent {
    Connected,
    Disconnected,
    /// State reported over UDP: an address and its current values.
    Osc(osc::Msg),
    /// State reported over the Mackie Control stream.
    Midi(midi::Event),
    /// Socket failure outside of a connection attempt.
    Error(Arc<super::Error>),
}

impl From<osc::Msg> for MixerEvent {
    fn from(msg: osc::Msg) -> Self {
        Self::Osc(msg)
    }
}

impl From<midi::Event> for MixerEvent {
    fn from(event: midi::Event) -> Self {
        Self::Midi(event)
    }
}

impl From<super::Error> for MixerEvent {
    fn from(err: super::Error) -> Self {
        Self::Error(Arc::new(err))
    }
}

/// Capacity of each listener's queue.
pub(crate) const QUEUE_LEN: usize = 1024;

/// Listeners of a client's events.
///
/// Each listener gets its own bounded queue and sees every event emitted
/// after it registered. Emitting never blocks the reactor: an event is
/// dropped for a listener whose queue is full, and listeners whose
/// receiver was dropped are forgotten.
#[derive(Clone, Debug, Default)]
pub(crate) struct EventSink(Arc<Mutex<Vec<channel::Sender<MixerEvent>>>>);

impl EventSink {
    pub fn listen(&self) -> channel::Receiver<MixerEvent> {
        let (tx, rx) = channel::bounded(QUEUE_LEN);
        self.listeners().push(tx);

        rx
    }

    pub fn emit(&self, event: impl Into<MixerEvent>) {
        let event = event.into();

        self.listeners()
            .retain(|listener| match listener.try_send(event.clone()) {
                Ok(()) => true,
                Err(channel::TrySendError::Full(_)) => {
                    log::trace!("Listener lagging, dropping {event:?}");
                    true
                }
                Err(channel::TrySendError::Disconnected(_)) => false,
            });
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<channel::Sender<MixerEvent>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
