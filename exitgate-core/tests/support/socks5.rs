//! A minimal SOCKS5 CONNECT decoder used only by integration tests.
//!
//! Real SOCKS5 client-facing termination lives outside this core (spec
//! collaborator interface); this harness exists to drive tests through the
//! same bytes a local SOCKS5 client would send, translating a CONNECT
//! request into the `Destination` the tunnel core's wire protocol carries.
//! Grounded on ztunnel's `proxy/socks5.rs` CONNECT-only handler.

use std::io::{Error, ErrorKind, Result};
use std::net::{Ipv4Addr, Ipv6Addr};

use exitgate_core::codec::Destination;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const VERSION: u8 = 0x05;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

fn protocol_error(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidData, msg.into())
}

/// Drive the client half of a no-auth SOCKS5 CONNECT handshake over `stream`
/// and return the destination the client asked for.
pub async fn decode_connect<S>(stream: &mut S) -> Result<Destination>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await?;
    if greeting[0] != VERSION {
        return Err(protocol_error(format!("unsupported SOCKS version {:#x}", greeting[0])));
    }
    let nmethods = greeting[1] as usize;
    let mut methods = vec![0u8; nmethods];
    stream.read_exact(&mut methods).await?;
    if !methods.contains(&0x00) {
        return Err(protocol_error("client does not offer no-auth method"));
    }
    stream.write_all(&[VERSION, 0x00]).await?;

    let mut request_head = [0u8; 4];
    stream.read_exact(&mut request_head).await?;
    if request_head[0] != VERSION {
        return Err(protocol_error("unsupported SOCKS version in request"));
    }
    if request_head[1] != CMD_CONNECT {
        return Err(protocol_error(format!("only CONNECT is supported, got {:#x}", request_head[1])));
    }
    let atyp = request_head[3];

    let destination = match atyp {
        ATYP_IPV4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            let port = read_port(stream).await?;
            Destination::Ipv4(Ipv4Addr::from(octets), port)
        }
        ATYP_IPV6 => {
            let mut octets = [0u8; 16];
            stream.read_exact(&mut octets).await?;
            let port = read_port(stream).await?;
            Destination::Ipv6(Ipv6Addr::from(octets), port)
        }
        ATYP_DOMAIN => {
            let mut len = [0u8];
            stream.read_exact(&mut len).await?;
            let mut host = vec![0u8; len[0] as usize];
            stream.read_exact(&mut host).await?;
            let port = read_port(stream).await?;
            let host = String::from_utf8(host).map_err(|_| protocol_error("domain is not valid utf-8"))?;
            Destination::Domain(host, port)
        }
        other => return Err(protocol_error(format!("unsupported address type {other:#x}"))),
    };

    // Dummy bound-address reply; real clients ignore the payload for CONNECT.
    let reply = [VERSION, 0x00, 0x00, ATYP_IPV4, 0, 0, 0, 0, 0, 0];
    stream.write_all(&reply).await?;

    Ok(destination)
}

async fn read_port<S: tokio::io::AsyncRead + Unpin>(stream: &mut S) -> Result<u16> {
    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;
    Ok(u16::from_be_bytes(port))
}

/// Encode a client-side no-auth CONNECT request for `destination`, the bytes
/// a real SOCKS5 library would send on the wire.
pub fn encode_connect(destination: &Destination) -> Vec<u8> {
    let mut buf = vec![VERSION, 1, 0x00, VERSION, CMD_CONNECT, 0x00];
    match destination {
        Destination::Ipv4(addr, port) => {
            buf.push(ATYP_IPV4);
            buf.extend_from_slice(&addr.octets());
            buf.extend_from_slice(&port.to_be_bytes());
        }
        Destination::Ipv6(addr, port) => {
            buf.push(ATYP_IPV6);
            buf.extend_from_slice(&addr.octets());
            buf.extend_from_slice(&port.to_be_bytes());
        }
        Destination::Domain(host, port) => {
            buf.push(ATYP_DOMAIN);
            buf.push(host.len() as u8);
            buf.extend_from_slice(host.as_bytes());
            buf.extend_from_slice(&port.to_be_bytes());
        }
    }
    buf
}
