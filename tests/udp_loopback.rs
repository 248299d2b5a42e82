//! End-to-end tests over loopback UDP sockets.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use rstest::rstest;
use tokio::{net::UdpSocket, time::timeout};
use udpfrag::{
    Encryption,
    Error,
    ID_SIZE,
    Readiness,
    ReceiverConfig,
    SendError,
    Sender,
    SenderConfig,
    UdpTransport,
};
use udpfrag_testing::loopback_pair;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[rstest]
#[case::single_datagram(100)]
#[case::fragmented(5_000)]
#[tokio::test]
async fn payload_crosses_loopback(#[case] len: usize) {
    let (mut sender, mut receiver) =
        loopback_pair(SenderConfig::default().with_packet_size(512), ReceiverConfig::default()).await;
    let payload: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();

    sender.send(&payload).await.expect("send");
    let message = timeout(RECV_TIMEOUT, receiver.recv())
        .await
        .expect("message before timeout")
        .expect("receive");

    assert_eq!(message.payload, payload);
    assert_eq!(message.head.from, Some(sender.local_addr()));
    assert!(message.head.id.is_some());
}

#[tokio::test]
async fn encrypted_payload_crosses_loopback() {
    let secret = "5a".repeat(32);
    let encryption = Encryption::from_hex_secret(&secret).expect("secret");
    let (mut sender, mut receiver) = loopback_pair(
        SenderConfig::default()
            .with_packet_size(256)
            .with_encryption(encryption.clone()),
        ReceiverConfig::default().with_decryption(encryption),
    )
    .await;

    sender.send("sealed greetings").await.expect("send");
    let message = timeout(RECV_TIMEOUT, receiver.recv())
        .await
        .expect("message before timeout")
        .expect("receive");
    assert_eq!(message.payload, &b"sealed greetings"[..]);
    assert!(message.head.origin_size > message.head.size);
}

#[tokio::test]
async fn many_fragments_survive_backpressure() {
    // More fragments than the transport's high-water mark.
    let (mut sender, mut receiver) =
        loopback_pair(SenderConfig::default().with_packet_size(64), ReceiverConfig::default()).await;
    let payload = vec![0xC3_u8; 40 * 200];

    let recv = tokio::spawn(async move { timeout(RECV_TIMEOUT, receiver.recv()).await });
    sender.send(&payload).await.expect("send");

    let message = recv
        .await
        .expect("receiver task")
        .expect("message before timeout")
        .expect("receive");
    assert_eq!(message.payload.len(), payload.len());
}

#[tokio::test]
async fn closed_sender_refuses_payloads() {
    let (mut sender, _receiver) = loopback_pair(SenderConfig::default(), ReceiverConfig::default()).await;
    assert_eq!(sender.close(), 0);
    assert!(matches!(
        sender.send("late").await,
        Err(Error::Send(SendError::Closed))
    ));
}

#[rstest]
#[case::single_slot(1)]
#[case::two_slots(2)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn saturated_transport_always_signals_readiness(#[case] high_water: usize) {
    let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let sink = UdpSocket::bind(loopback).await.expect("bind sink");
    let peer = sink.local_addr().expect("sink address");
    let socket = Arc::new(UdpSocket::bind(loopback).await.expect("bind sender"));

    let transport = UdpTransport::spawn(socket, peer, high_water);
    let config = SenderConfig::default().with_packet_size(ID_SIZE + 4);
    let mut sender = Sender::new(transport, config).expect("config");

    for round in 0..500 {
        let outcome = sender.write([0x5A_u8; 12]).expect("write");
        assert_eq!(outcome.datagrams, 3);
        let mut ready = outcome.ready;
        while !ready {
            timeout(Duration::from_secs(2), sender.transport().ready())
                .await
                .unwrap_or_else(|_| {
                    panic!(
                        "no readiness in round {round}: {} in flight, {} pending",
                        sender.transport().in_flight(),
                        sender.pending()
                    )
                });
            ready = sender.on_transport_ready() == Readiness::Drained;
        }
        outcome.completion.await.expect("datagrams sent");
    }
    drop(sink);
}
