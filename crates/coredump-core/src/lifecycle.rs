//! HTTP server lifecycle driven by network events.
//!
//! The server is started when the network comes up and stopped when it goes
//! away. Instead of a shared global handle, the bootstrap code owns one
//! [`ServerSlot`] and hands it by `&mut` to the two transition functions.

use std::fmt::Display;

use tracing::{error, info};

/// Either no server, or exactly one running server.
#[derive(Debug)]
pub enum ServerSlot<S> {
    Stopped,
    Running(S),
}

impl<S> Default for ServerSlot<S> {
    fn default() -> Self {
        ServerSlot::Stopped
    }
}

impl<S> ServerSlot<S> {
    pub fn new() -> Self {
        ServerSlot::Stopped
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ServerSlot::Running(_))
    }

    pub fn server(&self) -> Option<&S> {
        match self {
            ServerSlot::Running(server) => Some(server),
            ServerSlot::Stopped => None,
        }
    }

    /// Start the server if none is running.
    ///
    /// A failed start is logged and leaves the slot stopped. Returns whether
    /// a server is running afterwards.
    pub fn on_connect<E, F>(&mut self, start: F) -> bool
    where
        E: Display,
        F: FnOnce() -> Result<S, E>,
    {
        if self.is_running() {
            return true;
        }

        info!("Starting webserver");
        match start() {
            Ok(server) => {
                *self = ServerSlot::Running(server);
                true
            }
            Err(err) => {
                error!("Error starting server: {}", err);
                false
            }
        }
    }

    /// Stop the running server, if any, moving it out of the slot.
    pub fn on_disconnect<F>(&mut self, stop: F)
    where
        F: FnOnce(S),
    {
        if let ServerSlot::Running(server) = std::mem::take(self) {
            info!("Stopping webserver");
            stop(server);
        }
    }
}
