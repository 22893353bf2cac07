//! Notification delivery
//!
//! The engine never blocks on subscribers: notifications go into a
//! bounded channel and a background thread sends them. When the channel
//! is full the notification is dropped with a warning.

use std::net::UdpSocket;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Sender};

use crate::error::Result;

use super::SubscriberTarget;

/// Queue depth of the delivery thread
const DELIVERY_QUEUE_SIZE: usize = 1024;

/// One datagram for one subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: SubscriberTarget,
    pub payload: Vec<u8>,
}

/// Sink for notifications
pub trait Notifier {
    fn deliver(&self, notification: Notification);
}

/// Sends notifications to `notify_host:<port>` over UDP
pub struct UdpNotifier {
    sender: Option<Sender<Notification>>,
    handle: Option<JoinHandle<()>>,
}

impl UdpNotifier {
    /// Bind an ephemeral socket and start the delivery thread
    pub fn start(notify_host: &str) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        let host = notify_host.to_string();
        let (sender, receiver) = bounded::<Notification>(DELIVERY_QUEUE_SIZE);

        let handle = std::thread::Builder::new()
            .name("memdb-notify".to_string())
            .spawn(move || {
                tracing::debug!("Notification thread started");
                // Ends once every sender is dropped
                for notification in receiver {
                    let addr = (host.as_str(), notification.target.port);
                    if let Err(e) = socket.send_to(&notification.payload, addr) {
                        tracing::warn!(
                            port = notification.target.port,
                            pid = notification.target.pid,
                            error = %e,
                            "Failed to deliver notification"
                        );
                    }
                }
                tracing::debug!("Notification thread stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }
}

impl Notifier for UdpNotifier {
    fn deliver(&self, notification: Notification) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        if sender.try_send(notification).is_err() {
            tracing::warn!("Notification queue full, dropping notification");
        }
    }
}

impl Drop for UdpNotifier {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain and exit
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
