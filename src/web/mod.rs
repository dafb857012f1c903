//! HTTP control API and live event feed.
//!
//! Every route funnels into the shared [`Dispatcher`], so web requests obey
//! the same cooldown and serialization as the physical buttons.

pub mod handlers;
pub mod router;
pub mod websocket;

// Re-export commonly used items
pub use crate::config::WebConfig;
pub use router::create_app;

use crate::dispatch::{BroadcastSink, Dispatcher};
use crate::error::{RemoteError, Result};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub events: BroadcastSink,
    pub gpio_enabled: bool,
    pub ws_clients: Arc<AtomicUsize>,
    pub max_ws_clients: usize,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        events: BroadcastSink,
        gpio_enabled: bool,
        max_ws_clients: usize,
    ) -> Self {
        Self {
            dispatcher,
            events,
            gpio_enabled,
            ws_clients: Arc::new(AtomicUsize::new(0)),
            max_ws_clients,
        }
    }
}

/// Serve the API until `shutdown` resolves.
pub async fn start_web_server<F>(config: WebConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(&config, state);

    let addr = config.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RemoteError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    let shown = if addr.ip().is_unspecified() {
        SocketAddr::new(local_ip_address(), addr.port())
    } else {
        addr
    };
    info!("Web interface available at http://{}/", shown);
    info!("Live events at ws://{}/ws", shown);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RemoteError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}

/// Best guess at this host's LAN address, falling back to loopback.
///
/// Connecting a UDP socket sends nothing; it only makes the kernel pick the
/// outbound interface.
pub fn local_ip_address() -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect("8.8.8.8:80")?;
        Ok(socket.local_addr()?.ip())
    };
    match probe() {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            tracing::debug!("Error getting IP address: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_ip_is_ipv4_or_loopback() {
        let ip = local_ip_address();
        assert!(!ip.is_unspecified());
    }
}
