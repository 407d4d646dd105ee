use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::server::TlsStream;
use tracing::debug;

use crate::codec::{decode_data, encode_data, RecordReader, RecordWriter};
use crate::config::TimeoutConfig;
use crate::orchestrator::bufpool::BufPool;

/// Per-operation deadlines for [`relay`] (spec §4.6 "read, write, idle,
/// and dial timeouts are each configurable"). `read`/`write` bound a
/// single read/write syscall once it has been issued; `idle` bounds how
/// long a direction may wait for its *next* read to even start, and is
/// the one that actually detects a silent, otherwise-healthy connection.
/// A read is bounded by whichever of `read`/`idle` is tighter, since
/// either one firing should end the direction.
#[derive(Debug, Clone, Copy)]
pub struct RelayTimeouts {
    pub read: Duration,
    pub write: Duration,
    pub idle: Duration,
}

impl RelayTimeouts {
    pub fn from_config(cfg: &TimeoutConfig) -> Self {
        Self {
            read: Duration::from_millis(cfg.read_ms),
            write: Duration::from_millis(cfg.write_ms),
            idle: Duration::from_millis(cfg.idle_ms),
        }
    }

    fn read_deadline(&self) -> Duration {
        self.read.min(self.idle)
    }
}

/// Bidirectionally relay between the encrypted client tunnel and the
/// plaintext destination socket (spec §4.6 step 7). `request_reader` and
/// `reply_writer` are the same record reader/writer that decoded the
/// Connect request and encoded the success reply — reusing them here
/// keeps each direction's nonce counter monotonic across the request and
/// the data records that follow it, rather than restarting a fresh
/// nonce sequence (and a fresh random prefix) mid-connection.
///
/// Each direction runs as its own task-like future inside a `select!`;
/// whichever hits EOF or an error first ends the relay and drops the
/// other, which cancels it (spec: "the first task to return with an
/// error or EOF signals the other to cancel"). Both byte counters
/// reflect everything transferred up to that point, including by the
/// cancelled side.
///
/// No splice fast path: every byte crosses the AEAD boundary (the client
/// side is Data-record framed, the destination side is raw), so there is
/// no leg where "neither side needs per-byte inspection" — the spec's
/// splice allowance doesn't apply to this codec.
pub async fn relay(
    client: TlsStream<TcpStream>,
    dest: TcpStream,
    request_reader: RecordReader,
    reply_writer: RecordWriter,
    timeouts: RelayTimeouts,
    bufpool: &BufPool,
) -> (u64, u64) {
    let (client_r, client_w) = tokio::io::split(client);
    let (dest_r, dest_w) = dest.into_split();

    let sent = Arc::new(AtomicU64::new(0));
    let received = Arc::new(AtomicU64::new(0));

    let upload = upload_loop(client_r, dest_w, request_reader, timeouts, sent.clone());
    let download = download_loop(dest_r, client_w, reply_writer, timeouts, bufpool, received.clone());

    tokio::select! {
        _ = upload => {}
        _ = download => {}
    }

    (sent.load(Ordering::Relaxed), received.load(Ordering::Relaxed))
}

async fn upload_loop<R, W>(
    mut client_r: R,
    mut dest_w: W,
    mut reader: RecordReader,
    timeouts: RelayTimeouts,
    sent: Arc<AtomicU64>,
) where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    loop {
        let record = match timeout(timeouts.read_deadline(), reader.read_record(&mut client_r)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                debug!("upload direction ending: {e}");
                return;
            }
            Err(_) => {
                debug!("upload direction idle timeout");
                return;
            }
        };
        let payload = match decode_data(&record) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("upload direction bad data record: {e}");
                return;
            }
        };
        match timeout(timeouts.write, dest_w.write_all(payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return,
            Err(_) => {
                debug!("upload direction write timeout");
                return;
            }
        }
        sent.fetch_add(payload.len() as u64, Ordering::Relaxed);
    }
}

async fn download_loop<R, W>(
    mut dest_r: R,
    mut client_w: W,
    mut writer: RecordWriter,
    timeouts: RelayTimeouts,
    bufpool: &BufPool,
    received: Arc<AtomicU64>,
) where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    loop {
        let mut buf = bufpool.checkout();
        let n = match timeout(timeouts.read_deadline(), dest_r.read(&mut buf)).await {
            Ok(Ok(0)) => return,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => return,
            Err(_) => {
                debug!("download direction idle timeout");
                return;
            }
        };
        let frame = encode_data(&buf[..n]);
        match timeout(timeouts.write, writer.write_record(&mut client_w, &frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return,
            Err(_) => {
                debug!("download direction write timeout");
                return;
            }
        }
        received.fetch_add(n as u64, Ordering::Relaxed);
    }
}
