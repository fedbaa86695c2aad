//! Listener lifecycle for the command channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::transport::{CommandListener, ConnectionHandler, ListenerError, ListenerHandle};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// A listener that is accepting connections.
pub trait RunningListener: Send {
    /// Address the listener is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Stops accepting and waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the accept loop panicked.
    fn stop(self: Box<Self>) -> Result<(), ListenerError>;
}

/// Binds listeners on behalf of [`CommandChannelServer`].
pub trait ListenerBinder: Send + Sync {
    /// Resolves and binds `(host, port)` and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when resolution, binding or startup fails.
    fn bind(
        &self,
        host: &str,
        port: u16,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Box<dyn RunningListener>, ListenerError>;
}

/// Binder backed by [`CommandListener`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpListenerBinder;

impl ListenerBinder for TcpListenerBinder {
    fn bind(
        &self,
        host: &str,
        port: u16,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Box<dyn RunningListener>, ListenerError> {
        let handle = CommandListener::bind(host, port)?.start(handler)?;
        Ok(Box::new(handle))
    }
}

impl RunningListener for ListenerHandle {
    fn local_addr(&self) -> SocketAddr {
        Self::local_addr(self)
    }

    fn stop(self: Box<Self>) -> Result<(), ListenerError> {
        self.shutdown();
        self.join()
    }
}

/// The command channel server: a pipeline plus at most one listener.
pub struct CommandChannelServer {
    handler: Arc<dyn ConnectionHandler>,
    binder: Box<dyn ListenerBinder>,
    listener: Option<Box<dyn RunningListener>>,
}

impl CommandChannelServer {
    /// Builds a server that binds through `binder` and serves connections
    /// with `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn ConnectionHandler>, binder: Box<dyn ListenerBinder>) -> Self {
        Self {
            handler,
            binder,
            listener: None,
        }
    }

    /// Binds `(host, port)` and starts accepting on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::AlreadyListening`] if a listener is running,
    /// or the binder's error when binding fails.
    pub fn start_listening(&mut self, host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
        if let Some(listener) = &self.listener {
            return Err(ListenerError::AlreadyListening {
                addr: listener.local_addr(),
            });
        }
        let listener = self.binder.bind(host, port, Arc::clone(&self.handler))?;
        let address = listener.local_addr();
        info!(target: SERVER_TARGET, %address, "listening for commands");
        self.listener = Some(listener);
        Ok(address)
    }

    /// Stops the listener if one is running. Safe to call repeatedly.
    pub fn stop_listening(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let address = listener.local_addr();
        match listener.stop() {
            Ok(()) => info!(target: SERVER_TARGET, %address, "stopped listening"),
            Err(error) => warn!(
                target: SERVER_TARGET,
                %address,
                error = %error,
                "listener did not stop cleanly"
            ),
        }
    }

    /// Address of the running listener.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|listener| listener.local_addr())
    }
}

impl Drop for CommandChannelServer {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl std::fmt::Debug for CommandChannelServer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("CommandChannelServer")
            .field("listening", &self.local_addr())
            .finish_non_exhaustive()
    }
}

/// Creates the server once the connection pipeline is known.
pub trait ServerFactory: Send + Sync {
    /// Builds a server that is not yet listening.
    fn create(&self, handler: Arc<dyn ConnectionHandler>) -> CommandChannelServer;
}

/// Factory for servers bound to real TCP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpServerFactory;

impl ServerFactory for TcpServerFactory {
    fn create(&self, handler: Arc<dyn ConnectionHandler>) -> CommandChannelServer {
        CommandChannelServer::new(handler, Box::new(TcpListenerBinder))
    }
}
