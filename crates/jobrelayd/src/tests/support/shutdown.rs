//! Shutdown signal double released from the test thread.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::process::shutdown::{ShutdownError, ShutdownSignal};

/// Blocks until the paired sender fires or is dropped.
pub struct ChannelShutdown {
    receiver: Mutex<Receiver<()>>,
}

impl ChannelShutdown {
    /// Returns the signal and the trigger that releases it.
    #[must_use]
    pub fn new() -> (Self, Sender<()>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                receiver: Mutex::new(receiver),
            },
            sender,
        )
    }
}

impl ShutdownSignal for ChannelShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        let receiver = self.receiver.lock().expect("shutdown receiver lock");
        drop(receiver.recv());
        Ok(())
    }
}
