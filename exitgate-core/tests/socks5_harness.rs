//! Exercises the SOCKS5 test harness end to end: a fake client sends a
//! CONNECT request over an in-memory duplex pipe, the harness decodes it the
//! way a local SOCKS5 listener would, and the result is re-encoded as the
//! tunnel core's own `ConnectRequest` frame to prove the two surfaces agree
//! on the destination.

mod support;

use exitgate_core::codec::{ConnectRequest, Destination};
use support::socks5;

#[tokio::test]
async fn connect_request_for_ipv4_round_trips_through_harness_and_wire_codec() {
    let (mut client, mut server) = tokio::io::duplex(256);
    let destination = Destination::Ipv4(std::net::Ipv4Addr::new(93, 184, 216, 34), 443);

    let client_bytes = socks5::encode_connect(&destination);
    let send = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        client.write_all(&client_bytes).await.unwrap();
        let mut reply = [0u8; 10];
        use tokio::io::AsyncReadExt;
        client.read_exact(&mut reply).await.unwrap();
        reply
    });

    let decoded = socks5::decode_connect(&mut server).await.unwrap();
    assert_eq!(decoded, destination);

    let reply = send.await.unwrap();
    assert_eq!(reply[0], 0x05);
    assert_eq!(reply[1], 0x00, "harness must report success");

    let wire = ConnectRequest::new(decoded).encode();
    assert_eq!(ConnectRequest::decode(&wire).unwrap().destination, destination);
}

#[tokio::test]
async fn connect_request_for_domain_round_trips_through_harness_and_wire_codec() {
    let (mut client, mut server) = tokio::io::duplex(256);
    let destination = Destination::Domain("example.com".to_string(), 8443);

    let client_bytes = socks5::encode_connect(&destination);
    let send = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        client.write_all(&client_bytes).await.unwrap();
        let mut reply = [0u8; 10];
        use tokio::io::AsyncReadExt;
        client.read_exact(&mut reply).await.unwrap();
    });

    let decoded = socks5::decode_connect(&mut server).await.unwrap();
    assert_eq!(decoded, destination);
    send.await.unwrap();

    let wire = ConnectRequest::new(decoded).encode();
    assert_eq!(ConnectRequest::decode(&wire).unwrap().destination, destination);
}

#[tokio::test]
async fn rejects_auth_method_without_no_auth_offer() {
    let (mut client, mut server) = tokio::io::duplex(64);
    use tokio::io::AsyncWriteExt;
    tokio::spawn(async move {
        // Greeting offers only username/password (0x02), never no-auth.
        client.write_all(&[0x05, 1, 0x02]).await.unwrap();
    });

    let result = socks5::decode_connect(&mut server).await;
    assert!(result.is_err());
}
