//! Integration tests for encrypted fragments.

use bytes::Bytes;
use rstest::{fixture, rstest};
use udpfrag::{
    Defragmenter,
    Encryption,
    FnCipher,
    ReceiverConfig,
    Sender,
    SenderConfig,
    Warning,
    cipher::CipherError,
};
use udpfrag_testing::{ScriptedTransport, feed, seeded_generator};

const SECRET: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

#[fixture]
fn encryption() -> Encryption { Encryption::from_hex_secret(SECRET).expect("valid secret") }

fn encrypted_datagrams(encryption: Encryption, payload: &[u8], seed: u64) -> Vec<Bytes> {
    let config = SenderConfig::default()
        .with_packet_size(128)
        .with_encryption(encryption);
    let mut sender = Sender::with_generator(ScriptedTransport::unbounded(), config, seeded_generator(seed))
        .expect("valid config");
    let _ = sender.write(payload).expect("write");
    sender.transport().sent().to_vec()
}

#[rstest]
fn corrupted_datagram_is_isolated(encryption: Encryption) {
    let mut receiver =
        Defragmenter::new(ReceiverConfig::default().with_decryption(encryption.clone())).expect("config");
    let mut warnings = receiver.warnings().expect("listener");

    let mut corrupted = encrypted_datagrams(encryption.clone(), b"tampered", 1)[0].to_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x01;
    assert!(feed(&receiver, [Bytes::from(corrupted)]).is_empty());
    assert!(matches!(
        warnings.try_recv().expect("warning emitted"),
        Warning::DecryptionFailed { .. }
    ));

    let payload = vec![0x42_u8; 400];
    let messages = feed(&receiver, encrypted_datagrams(encryption, &payload, 2));
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, payload);
    assert!(warnings.try_recv().is_err());
}

#[rstest]
fn mismatched_secret_never_delivers(encryption: Encryption) {
    let other = Encryption::from_hex_secret(&"ff".repeat(32)).expect("valid secret");
    let mut receiver = Defragmenter::new(ReceiverConfig::default().with_decryption(other)).expect("config");
    let mut warnings = receiver.warnings().expect("listener");

    let datagrams = encrypted_datagrams(encryption, b"not for you", 3);
    let count = datagrams.len();
    assert!(feed(&receiver, datagrams).is_empty());
    for _ in 0..count {
        assert!(matches!(
            warnings.try_recv(),
            Ok(Warning::DecryptionFailed { .. })
        ));
    }
}

#[rstest]
fn origin_size_reports_wire_bytes(encryption: Encryption) {
    let receiver =
        Defragmenter::new(ReceiverConfig::default().with_decryption(encryption.clone())).expect("config");
    let payload = vec![7_u8; 300];
    let datagrams = encrypted_datagrams(encryption, &payload, 4);
    let wire: usize = datagrams.iter().map(Bytes::len).sum();

    let message = feed(&receiver, datagrams).pop().expect("delivered");
    assert_eq!(message.head.size, 300);
    assert_eq!(message.head.origin_size, wire);
    assert!(wire > 300);
}

#[test]
fn custom_cipher_round_trips() {
    let xor = || {
        FnCipher::new(
            |input: &[u8]| Ok(input.iter().map(|b| b ^ 0x5A).collect()),
            |input: &[u8]| {
                if input.is_empty() {
                    return Err(CipherError::Decrypt("empty datagram".into()));
                }
                Ok(input.iter().map(|b| b ^ 0x5A).collect())
            },
            0,
        )
    };
    let receiver =
        Defragmenter::new(ReceiverConfig::default().with_decryption(Encryption::custom(xor())))
            .expect("config");
    let datagrams = encrypted_datagrams(Encryption::custom(xor()), b"custom transform", 5);

    let messages = feed(&receiver, datagrams);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload, &b"custom transform"[..]);
}
