use std::io;

use tokio::net::TcpSocket;

use crate::error::ConnError;

/// Apply `SO_MARK` to an unconnected TCP socket before `connect()`
/// (spec §4.5 `mark_socket`). A no-op stub compiles on non-Linux targets
/// so the orchestrator's dial path never needs a platform `cfg` of its
/// own; SNAT is simply skipped there.
#[cfg(target_os = "linux")]
pub fn mark_socket(socket: &TcpSocket, mark: u32) -> Result<(), ConnError> {
    let sock2 = socket2::SockRef::from(socket);
    sock2.set_mark(mark).map_err(|e: io::Error| ConnError::DialFailed(format!("SO_MARK: {e}")))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn mark_socket(_socket: &TcpSocket, _mark: u32) -> Result<(), ConnError> {
    Ok(())
}
