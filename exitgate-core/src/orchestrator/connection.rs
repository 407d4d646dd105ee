use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::codec::{
    CipherSuite, ConnectRequest, Destination, Handshake, KeySchedule, RecordReader, RecordWriter,
    HANDSHAKE_LEN,
};
use crate::config::TimeoutConfig;
use crate::error::ConnError;
use crate::security::AdmissionControl;
use crate::selector::{ExitAddress, SelectTarget, Selector};
use crate::snat;
use crate::stats::StatsRegistry;
use crate::telemetry::Metrics;

use super::bufpool::BufPool;
use super::relay::{relay, RelayTimeouts};

/// Shared, read-only services every connection task borrows. Constructed
/// once at startup and handed to each accepted connection as an `Arc`.
pub struct ConnectionServices {
    pub selector: Arc<Selector>,
    pub admission: Arc<AdmissionControl>,
    pub stats: Arc<StatsRegistry>,
    pub metrics: Option<Arc<Metrics>>,
    pub bufpool: Arc<BufPool>,
    pub timeout: TimeoutConfig,
    pub auth_secret: Arc<Vec<u8>>,
    pub cipher_suite: CipherSuite,
    pub tls_reloader: Arc<crate::tls::TlsReloader>,
}

/// Releases the admission slot this connection was counted against,
/// however the connection ends (success, protocol error, or an early
/// `return`).
struct AdmissionGuard {
    admission: Arc<AdmissionControl>,
    addr: IpAddr,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.admission.release(self.addr);
    }
}

/// Run the full per-connection state machine (spec §4.6 steps 2-8) for a
/// TCP stream already admitted by the accept loop. Errors are logged and
/// end the connection; nothing here is fatal to the process.
pub async fn handle_connection(services: Arc<ConnectionServices>, tcp: TcpStream, peer_addr: SocketAddr) {
    let _guard = AdmissionGuard { admission: services.admission.clone(), addr: peer_addr.ip() };

    let acceptor = services.tls_reloader.current();
    let tls_stream = match acceptor.accept(tcp).await {
        Ok(stream) => stream,
        Err(e) => {
            debug!(%peer_addr, "TLS handshake failed: {e}");
            return;
        }
    };

    if let Err(e) = run_tunnel(&services, tls_stream, peer_addr).await {
        if let Some(metrics) = &services.metrics {
            metrics.errors_total.add(1, &[]);
        }
        debug!(%peer_addr, "connection ended: {e}");
    }
}

async fn run_tunnel(
    services: &Arc<ConnectionServices>,
    mut tls: tokio_rustls::server::TlsStream<TcpStream>,
    peer_addr: SocketAddr,
) -> Result<(), ConnError> {
    let keys = KeySchedule::derive(&services.auth_secret, services.cipher_suite);

    // Handshake: a fixed-length plaintext frame, not record-framed.
    let mut frame = [0u8; HANDSHAKE_LEN];
    tls.read_exact(&mut frame).await?;
    Handshake::decode(&frame, &keys).map_err(|e| {
        if let Some(metrics) = &services.metrics {
            metrics.handshake_failures_total.add(1, &[]);
        }
        e
    })?;

    let mut request_reader = RecordReader::new(keys.cipher());
    let mut reply_writer = RecordWriter::new(keys.cipher());

    let request_bytes = request_reader.read_record(&mut tls).await?;
    let request = ConnectRequest::decode(&request_bytes)?;
    let dest = request.destination;
    let host_port = dest.host_port();

    let target = SelectTarget {
        host: match &dest {
            Destination::Domain(host, _) => Some(host.as_str()),
            _ => None,
        },
        ip: match &dest {
            Destination::Ipv4(addr, _) => Some(IpAddr::V4(*addr)),
            Destination::Ipv6(addr, _) => Some(IpAddr::V6(*addr)),
            Destination::Domain(..) => None,
        },
        port: dest.port(),
    };

    let selection = services.selector.select(&target);
    if let Some(metrics) = &services.metrics {
        metrics.exit_selections_total.add(1, &[]);
    }
    let exit = match selection {
        Ok(exit) => exit,
        Err(e) => {
            reply_failure(&mut reply_writer, &mut tls).await;
            return Err(e);
        }
    };

    let dial_started = Instant::now();
    let dial_timeout = Duration::from_millis(services.timeout.dial_ms);
    let outbound = match dial(exit, &dest, dial_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            services.stats.record_dial_failure(exit.address);
            if let Some(metrics) = &services.metrics {
                metrics.dial_failures_total.add(1, &[]);
            }
            reply_failure(&mut reply_writer, &mut tls).await;
            return Err(e);
        }
    };
    if let Some(metrics) = &services.metrics {
        metrics
            .dial_duration_seconds
            .record(dial_started.elapsed().as_secs_f64(), &[]);
    }
    let dial_latency_ms = dial_started.elapsed().as_millis() as u64;
    services.selector.record_latency(exit.address, dial_latency_ms);
    services.stats.record_latency(exit.address, dial_latency_ms);

    reply_writer.write_record(&mut tls, &[0u8]).await?;

    exit.on_connect();
    services.stats.record_connect(exit.address, &host_port);
    if let Some(metrics) = &services.metrics {
        metrics.connections_total.add(1, &[]);
        metrics.connections_active.add(1, &[]);
    }

    let relay_started = Instant::now();
    let relay_timeouts = RelayTimeouts::from_config(&services.timeout);
    let (sent, received) = relay(tls, outbound, request_reader, reply_writer, relay_timeouts, &services.bufpool).await;

    let total = sent + received;
    exit.on_disconnect(total);
    services.stats.record_close(exit.address, &host_port, sent, received);
    if let Some(metrics) = &services.metrics {
        metrics.connections_active.add(-1, &[]);
        metrics.bytes_relayed_total.add(total, &[]);
        metrics
            .relay_duration_seconds
            .record(relay_started.elapsed().as_secs_f64(), &[]);
    }
    info!(%peer_addr, exit = %exit.address, destination = %host_port, sent, received, "connection closed");

    Ok(())
}

async fn reply_failure<W: tokio::io::AsyncWrite + Unpin>(writer: &mut RecordWriter, stream: &mut W) {
    if let Err(e) = writer.write_record(stream, &[0xff]).await {
        warn!("failed to send failure reply: {e}");
    }
}

async fn dial(exit: &ExitAddress, dest: &Destination, dial_timeout: Duration) -> Result<TcpStream, ConnError> {
    let resolved = resolve(dest).await?;
    let socket = match resolved {
        IpAddr::V4(_) => TcpSocket::new_v4(),
        IpAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|e| ConnError::DialFailed(e.to_string()))?;

    snat::mark_socket(&socket, exit.mark)?;

    let target = SocketAddr::new(resolved, dest.port());
    match timeout(dial_timeout, socket.connect(target)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ConnError::DialFailed(e.to_string())),
        Err(_) => Err(ConnError::DialTimeout),
    }
}

async fn resolve(dest: &Destination) -> Result<IpAddr, ConnError> {
    match dest {
        Destination::Ipv4(addr, _) => Ok(IpAddr::V4(*addr)),
        Destination::Ipv6(addr, _) => Ok(IpAddr::V6(*addr)),
        Destination::Domain(host, port) => {
            let lookup = format!("{host}:{port}");
            tokio::net::lookup_host(&lookup)
                .await
                .map_err(|e| ConnError::DialFailed(format!("dns lookup failed: {e}")))?
                .next()
                .map(|addr| addr.ip())
                .ok_or_else(|| ConnError::DialFailed(format!("no addresses found for {host}")))
        }
    }
}
