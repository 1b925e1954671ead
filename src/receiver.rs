//! UECS-CCM UDP multicast receiver
//!
//! Joins 224.0.0.1:16520 and drains datagrams on a background task,
//! applying every decoded packet to the [`SensorCache`]. Decode failures
//! are absorbed; socket errors back off for a second and retry. Shutdown
//! is cooperative via a cancellation token and joins the task before the
//! socket is released.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::SensorCache;
use crate::error::Result;
use crate::protocol::{parse_ccm_xml, MULTICAST_ADDR, MULTICAST_PORT, RECV_BUFFER_SIZE};

/// Create a nonblocking UDP socket bound to the CCM port with multicast
/// membership on all interfaces. Reuse-address is set so monitor tools can
/// listen alongside the bridge.
pub fn bind_multicast_socket() -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let bind_addr: SocketAddr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, MULTICAST_PORT));
    socket.bind(&bind_addr.into())?;
    socket.join_multicast_v4(&MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_nonblocking(true)?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// Background multicast receiver feeding a [`SensorCache`].
pub struct CcmReceiver {
    cache: Arc<SensorCache>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CcmReceiver {
    pub fn new(cache: Arc<SensorCache>) -> Self {
        Self {
            cache,
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    /// Bind the multicast socket and spawn the drain loop.
    ///
    /// Bind or group-join failure is fatal: the bridge cannot function
    /// without its multicast membership.
    pub fn start(&mut self) -> Result<()> {
        let socket = bind_multicast_socket()?;
        let cache = Arc::clone(&self.cache);
        let token = self.shutdown.clone();
        self.task = Some(tokio::spawn(receive_loop(socket, cache, token)));
        info!("CCM receiver started on {MULTICAST_ADDR}:{MULTICAST_PORT}");
        Ok(())
    }

    /// Signal the drain loop and wait for it to exit; the socket is
    /// released only after the task has been joined.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("CCM receiver stopped");
    }
}

async fn receive_loop(socket: UdpSocket, cache: Arc<SensorCache>, shutdown: CancellationToken) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, addr)) => {
                    let source_ip = addr.ip().to_string();
                    let packets = parse_ccm_xml(&buf[..len], &source_ip);
                    if packets.is_empty() {
                        // Garbled or foreign traffic, dropped per contract.
                        debug!("undecodable datagram ({len} bytes) from {source_ip}");
                    }
                    for packet in packets {
                        cache.update(packet).await;
                    }
                }
                Err(e) => {
                    warn!("CCM receive error: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
