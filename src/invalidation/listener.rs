use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, select};

use crate::error::Result;
use crate::invalidation::InvalidationEvent;
use crate::registry::Registry;

/// Background subscriber that feeds received events into
/// [`Registry::apply_invalidation`].
///
/// The thread exits when the event channel disconnects or when the listener
/// is stopped or dropped.
#[derive(Debug)]
pub struct InvalidationListener {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl InvalidationListener {
    pub fn start(registry: Arc<Registry>, events: Receiver<InvalidationEvent>) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(format!("ii-invalidation-{}", registry.instance_id()))
            .spawn(move || {
                loop {
                    select! {
                        recv(events) -> msg => match msg {
                            Ok(event) => registry.apply_invalidation(&event),
                            Err(_) => break,
                        },
                        recv(stop_rx) -> _ => break,
                    }
                }
                log::debug!("Invalidation listener for {} stopped", registry.instance_id());
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender wakes the select.
        self.stop.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Invalidation listener thread panicked");
        }
    }
}

impl Drop for InvalidationListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}
