//! Process-wide shutdown token.
//!
//! A monotone flag threaded into every blocking loop. The signal
//! handler and the console `shutdown` command both just trigger it;
//! triggering also nudges the manager's accept loop awake with a
//! loopback connection, so shutdown latency is bounded by readiness
//! rather than a poll interval.

use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    wake_addr: Mutex<Option<SocketAddr>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Register the listener that `trigger` should wake.
    pub fn set_wake_addr(&self, addr: SocketAddr) {
        *self.inner.wake_addr.lock() = Some(addr);
    }

    /// Set the flag (first caller wins) and wake the accept loop.
    pub fn trigger(&self) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(addr) = *self.inner.wake_addr.lock() {
            // A wildcard bind address is not connectable; aim at
            // loopback on the same port.
            let addr = if addr.ip().is_unspecified() {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
            } else {
                addr
            };
            let _ = TcpStream::connect_timeout(&addr, Duration::from_millis(200));
        }
    }
}
