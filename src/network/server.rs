//! UDP Server
//!
//! Receives request datagrams, feeds them to the engine and sends the
//! replies back to each sender.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::engine::{Engine, Reply};
use crate::error::{MemdbError, Result};
use crate::event::{Notifier, UdpNotifier};
use crate::protocol::{encode_response, Response};

/// UDP server for memdb
pub struct Server {
    config: Config,
    engine: Engine,
    socket: UdpSocket,
    notifier: Box<dyn Notifier + Send>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the request socket and start notification delivery
    pub fn bind(config: Config, engine: Engine) -> Result<Self> {
        let notifier = UdpNotifier::start(&config.notify_host)?;
        Self::with_notifier(config, engine, Box::new(notifier))
    }

    /// Bind with a caller-supplied notification sink
    pub fn with_notifier(
        config: Config,
        engine: Engine,
        notifier: Box<dyn Notifier + Send>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(&config.listen_addr)?;
        // The receive timeout doubles as the cooperative timer
        socket.set_read_timeout(Some(config.tick_interval()))?;

        tracing::info!(addr = %socket.local_addr()?, "Listening for requests");

        Ok(Self {
            config,
            engine,
            socket,
            notifier,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Flag that stops `run()` after the current iteration
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Serve until shut down (blocking)
    pub fn run(&mut self) -> Result<()> {
        // One spare byte detects oversized datagrams
        let mut buf = vec![0u8; self.config.max_request_len + 1];

        while !self.shutdown.load(Ordering::Relaxed) {
            let replies = match self.socket.recv_from(&mut buf) {
                Ok((len, from)) if len > self.config.max_request_len => {
                    tracing::debug!(%from, len, "Dropping oversized request");
                    let error = MemdbError::InvalidRequest(format!(
                        "request exceeds {} bytes",
                        self.config.max_request_len
                    ));
                    vec![Reply {
                        to: Some(from),
                        response: Response::error(None, &error),
                    }]
                }
                Ok((len, from)) => self.engine.handle_datagram(&buf[..len], Some(from), Instant::now()),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.engine.tick(Instant::now())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Receive failed");
                    continue;
                }
            };

            self.send_replies(replies);
            for notification in self.engine.take_notifications() {
                self.notifier.deliver(notification);
            }
        }

        self.engine.sync()?;
        tracing::info!("Server stopped");
        Ok(())
    }

    fn send_replies(&self, replies: Vec<Reply>) {
        for reply in replies {
            let Some(to) = reply.to else {
                continue;
            };

            match encode_response(&reply.response) {
                Ok(bytes) => {
                    if let Err(e) = self.socket.send_to(&bytes, to) {
                        tracing::warn!(%to, error = %e, "Failed to send reply");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to encode reply"),
            }
        }
    }
}
