//! Integration tests for evicting incomplete messages.
//!
//! These run with Tokio's clock paused so sweep timing is deterministic.

use std::time::Duration;

use rstest::rstest;
use tokio::time;
use udpfrag::{DatagramHead, Defragmenter, ReceiverConfig, Warning};
use udpfrag_testing::{FAST_GC_EXPIRATION, FAST_GC_INTERVAL, TEST_CLOCK_MS, fast_gc, fragment};

#[rstest]
#[tokio::test(start_paused = true)]
async fn missing_fragment_is_reported_once_within_window(fast_gc: ReceiverConfig) {
    let mut receiver = Defragmenter::new(fast_gc).expect("config");
    let mut warnings = receiver.warnings().expect("listener");
    receiver.start();

    let batch = fragment(b"abcdefgh", 3, 5);
    let key = batch.key();
    let mut frames = batch.into_iter();
    let held_back = frames.next().expect("first fragment");
    for frame in frames {
        assert!(
            receiver
                .handle_datagram(frame.into_datagram(), DatagramHead::default())
                .is_none()
        );
    }
    assert_eq!(receiver.collector().len(), 1);

    time::sleep(FAST_GC_INTERVAL + FAST_GC_EXPIRATION + Duration::from_millis(1)).await;
    assert_eq!(
        warnings.try_recv().expect("eviction reported"),
        Warning::MissingMessage {
            key,
            sent_at_ms: TEST_CLOCK_MS
        }
    );
    assert!(receiver.collector().is_empty());

    time::sleep(FAST_GC_INTERVAL * 4).await;
    assert!(warnings.try_recv().is_err(), "reported exactly once");

    // The late fragment opens a fresh entry instead of completing the old one.
    assert!(
        receiver
            .handle_datagram(held_back.into_datagram(), DatagramHead::default())
            .is_none()
    );
    let entry = receiver.collector().get(&key).map(|e| e.accumulator().received_count());
    assert_eq!(entry, Some(1));
    receiver.stop();
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn completed_message_is_never_reported_missing(fast_gc: ReceiverConfig) {
    let mut receiver = Defragmenter::new(fast_gc).expect("config");
    let mut warnings = receiver.warnings().expect("listener");
    receiver.start();

    let batch = fragment(b"quick delivery", 4, 6);
    let mut frames: Vec<_> = batch.into_iter().map(|f| f.into_datagram()).collect();
    let last = frames.pop().expect("fragments");
    for frame in frames {
        assert!(receiver.handle_datagram(frame, DatagramHead::default()).is_none());
    }
    time::sleep(FAST_GC_EXPIRATION / 2).await;
    assert!(receiver.handle_datagram(last, DatagramHead::default()).is_some());

    time::sleep((FAST_GC_INTERVAL + FAST_GC_EXPIRATION) * 2).await;
    assert!(warnings.try_recv().is_err());
    receiver.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_discards_partial_messages_without_delivery() {
    let config = ReceiverConfig::default().with_gc(Duration::from_secs(1), Duration::from_secs(2));
    let mut receiver = Defragmenter::new(config).expect("config");
    let mut warnings = receiver.warnings().expect("listener");
    receiver.start();

    let first = fragment(b"partial", 2, 8).into_iter().next().expect("fragment");
    assert!(
        receiver
            .handle_datagram(first.into_datagram(), DatagramHead::default())
            .is_none()
    );
    receiver.stop();
    assert!(receiver.collector().is_empty());

    time::sleep(Duration::from_secs(10)).await;
    assert!(warnings.try_recv().is_err());
}
