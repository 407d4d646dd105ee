#![forbid(unsafe_code)]

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{ConnError, ConnResult};

pub const MSG_CONNECT: u8 = 0x01;
pub const MSG_DATA: u8 = 0x03;

const ADDR_IPV4: u8 = 0x01;
const ADDR_DOMAIN: u8 = 0x03;
const ADDR_IPV6: u8 = 0x04;

/// The destination carried by a Connect request (spec §6 address types).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Ipv4(Ipv4Addr, u16),
    Domain(String, u16),
    Ipv6(Ipv6Addr, u16),
}

impl Destination {
    pub fn port(&self) -> u16 {
        match self {
            Destination::Ipv4(_, port) | Destination::Domain(_, port) | Destination::Ipv6(_, port) => *port,
        }
    }

    /// A stable `"host:port"` rendering used as input to the
    /// destination-hash selector and as the stats key.
    pub fn host_port(&self) -> String {
        match self {
            Destination::Ipv4(addr, port) => format!("{addr}:{port}"),
            Destination::Domain(host, port) => format!("{host}:{port}"),
            Destination::Ipv6(addr, port) => format!("[{addr}]:{port}"),
        }
    }
}

/// The Connect request frame (spec §4.1 item 2): type(1) | address-type(1) |
/// address-length(1) | address bytes | port(2, BE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub destination: Destination,
}

impl ConnectRequest {
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![MSG_CONNECT];
        match &self.destination {
            Destination::Ipv4(addr, port) => {
                buf.push(ADDR_IPV4);
                buf.push(4);
                buf.extend_from_slice(&addr.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            Destination::Ipv6(addr, port) => {
                buf.push(ADDR_IPV6);
                buf.push(16);
                buf.extend_from_slice(&addr.octets());
                buf.extend_from_slice(&port.to_be_bytes());
            }
            Destination::Domain(host, port) => {
                buf.push(ADDR_DOMAIN);
                buf.push(host.len() as u8);
                buf.extend_from_slice(host.as_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> ConnResult<Self> {
        if bytes.len() < 3 {
            return Err(ConnError::BadFraming("connect request too short".to_string()));
        }
        if bytes[0] != MSG_CONNECT {
            return Err(ConnError::BadFraming("expected connect message type".to_string()));
        }
        let addr_type = bytes[1];
        let addr_len = bytes[2] as usize;
        if addr_len == 0 {
            return Err(ConnError::BadFraming("empty destination address".to_string()));
        }
        let rest = &bytes[3..];
        if rest.len() < addr_len + 2 {
            return Err(ConnError::BadFraming("truncated connect request".to_string()));
        }
        let addr_bytes = &rest[..addr_len];
        let port = u16::from_be_bytes(
            rest[addr_len..addr_len + 2]
                .try_into()
                .expect("2-byte slice"),
        );

        let destination = match addr_type {
            ADDR_IPV4 => {
                if addr_len != 4 {
                    return Err(ConnError::BadFraming("ipv4 address must be 4 bytes".to_string()));
                }
                let octets: [u8; 4] = addr_bytes.try_into().expect("checked length");
                Destination::Ipv4(Ipv4Addr::from(octets), port)
            }
            ADDR_IPV6 => {
                if addr_len != 16 {
                    return Err(ConnError::BadFraming("ipv6 address must be 16 bytes".to_string()));
                }
                let octets: [u8; 16] = addr_bytes.try_into().expect("checked length");
                Destination::Ipv6(Ipv6Addr::from(octets), port)
            }
            ADDR_DOMAIN => {
                let host = std::str::from_utf8(addr_bytes)
                    .map_err(|_| ConnError::BadFraming("domain is not valid utf-8".to_string()))?
                    .to_string();
                Destination::Domain(host, port)
            }
            other => {
                return Err(ConnError::BadFraming(format!("unknown address type: {other:#x}")))
            }
        };

        Ok(Self { destination })
    }
}

/// Wrap a relay payload as a Data record's plaintext: type(1) | payload.
pub fn encode_data(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.push(MSG_DATA);
    buf.extend_from_slice(payload);
    buf
}

/// Strip the Data-record type prefix, returning the raw payload bytes.
pub fn decode_data(bytes: &[u8]) -> ConnResult<&[u8]> {
    match bytes.split_first() {
        Some((&MSG_DATA, rest)) => Ok(rest),
        Some(_) => Err(ConnError::BadFraming("expected data message type".to_string())),
        None => Err(ConnError::BadFraming("empty data record".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_round_trips() {
        let encoded = encode_data(b"payload bytes");
        assert_eq!(decode_data(&encoded).unwrap(), b"payload bytes");
    }

    #[test]
    fn round_trips_ipv4() {
        let req = ConnectRequest::new(Destination::Ipv4(Ipv4Addr::new(93, 184, 216, 34), 443));
        let bytes = req.encode();
        assert_eq!(ConnectRequest::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn round_trips_domain() {
        let req = ConnectRequest::new(Destination::Domain("example.com".to_string(), 443));
        let bytes = req.encode();
        assert_eq!(ConnectRequest::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn round_trips_ipv6() {
        let req = ConnectRequest::new(Destination::Ipv6(Ipv6Addr::LOCALHOST, 80));
        let bytes = req.encode();
        assert_eq!(ConnectRequest::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn rejects_empty_address() {
        let bytes = vec![MSG_CONNECT, ADDR_DOMAIN, 0, 0, 80];
        assert!(ConnectRequest::decode(&bytes).is_err());
    }

    #[test]
    fn rejects_unknown_address_type() {
        let bytes = vec![MSG_CONNECT, 0x99, 1, b'a', 0, 80];
        assert!(ConnectRequest::decode(&bytes).is_err());
    }
}
