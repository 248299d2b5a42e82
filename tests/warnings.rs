//! Tests for warnings raised on the receive path.
//!
//! Every warning is both logged and forwarded to the listener channel.

use bytes::Bytes;
use rstest::rstest;
use udpfrag::{
    DatagramHead,
    Defragmenter,
    ID_SIZE,
    MessageIdentifier,
    ReceiverConfig,
    Warning,
    WarningSink,
};
use udpfrag_testing::{LoggerHandle, logger};

#[rstest]
fn malformed_datagram_is_logged(mut logger: LoggerHandle) {
    let receiver = Defragmenter::new(ReceiverConfig::default()).expect("config");
    assert!(
        receiver
            .handle_datagram(Bytes::from_static(&[0; 7]), DatagramHead::default())
            .is_none()
    );

    let record = logger
        .find(log::Level::Warn, "cannot hold an identifier")
        .expect("warning logged");
    assert!(record.contains("7 bytes"), "unexpected record: {record}");
}

#[rstest]
fn conflicting_total_is_logged_and_forwarded(mut logger: LoggerHandle) {
    let mut receiver = Defragmenter::new(ReceiverConfig::default()).expect("config");
    let mut warnings = receiver.warnings().expect("listener");

    let stamp = |total, index| {
        let mut id = MessageIdentifier::from_bytes([4; ID_SIZE]);
        id.set_fragment_meta(total, index).expect("meta fits");
        let mut datagram = id.as_bytes().to_vec();
        datagram.push(b'x');
        Bytes::from(datagram)
    };
    assert!(receiver.handle_datagram(stamp(2, 0), DatagramHead::default()).is_none());
    assert!(receiver.handle_datagram(stamp(5, 1), DatagramHead::default()).is_none());

    let Ok(Warning::InvalidFragment { key, index, total }) = warnings.try_recv() else {
        panic!("expected an invalid fragment warning");
    };
    assert_eq!((index, total), (1, 5));
    assert!(
        logger
            .find(log::Level::Warn, &format!("invalid fragment 1/5 for message {key}"))
            .is_some()
    );
    assert_eq!(receiver.collector().len(), 1, "original entry is untouched");
}

#[rstest]
fn log_only_sink_still_logs(mut logger: LoggerHandle) {
    WarningSink::log_only().emit(Warning::DecryptionFailed {
        reason: "bad tag".into(),
    });
    assert!(
        logger
            .find(log::Level::Warn, "decryption failed: bad tag")
            .is_some()
    );
}

#[test]
fn dropped_listener_does_not_fail_emission() {
    let (sink, listener) = WarningSink::channel();
    drop(listener);
    sink.emit(Warning::MalformedIdentifier { len: 1 });
}
