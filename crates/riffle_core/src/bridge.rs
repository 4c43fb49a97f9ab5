//! Event Bridge
//!
//! Native callbacks arrive on engine-owned threads and must not touch the
//! player. The sink handed to the engine only forwards into a channel; a
//! dedicated event thread drains it in order and applies each event to the
//! core. Host listeners each get their own receiver.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use riffle_engine::{EventSink, NativeEvent};
use tracing::{debug, info};

use crate::message::{BridgeMessage, PlayerEvent};

/// Fan-out of player events to every subscribed listener
#[derive(Default)]
pub(crate) struct Listeners {
    senders: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl Listeners {
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver to all listeners, forgetting the ones that hung up
    pub fn emit(&self, event: PlayerEvent) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }
}

/// Sink for the native engine: forwards into the bridge channel
pub(crate) fn native_sink(tx: Sender<BridgeMessage>) -> EventSink {
    Arc::new(move |event: NativeEvent| {
        // Receiver gone means the player is shutting down
        let _ = tx.send(BridgeMessage::Native(event));
    })
}

/// Spawn the event thread; `handler` sees native events in arrival order
pub(crate) fn spawn_event_thread<F>(
    rx: Receiver<BridgeMessage>,
    mut handler: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnMut(NativeEvent) + Send + 'static,
{
    thread::Builder::new()
        .name("riffle-events".into())
        .spawn(move || {
            info!("Event thread started");
            while let Ok(message) = rx.recv() {
                match message {
                    BridgeMessage::Native(event) => {
                        debug!("Native event: {:?}", event);
                        handler(event);
                    }
                    BridgeMessage::Shutdown => break,
                }
            }
            info!("Event thread stopped");
        })
}
