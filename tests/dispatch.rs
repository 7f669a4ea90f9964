// Routing and filtering behavior of the logger dispatcher, observed
// through in-memory recorders.

use fanlog::{
    Direction, LogError, LogMessage, Logger, MemoryRecorder, MsgFlags, Recorder, RecorderId,
};
use std::time::Duration;
use tokio::time::Instant;

async fn wait_until(check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn rid(s: &str) -> RecorderId {
    RecorderId::from(s)
}

async fn logger_with_default_recorder() -> (Logger, MemoryRecorder) {
    let logger = Logger::new();
    let rec = MemoryRecorder::new();
    rec.listen();
    logger
        .register_recorder("rec", rec.interface(), true)
        .await
        .unwrap();
    logger.initialise(&[]).await.unwrap();
    (logger, rec)
}

#[tokio::test]
async fn basic_route_delivers_content_and_flags() {
    let (logger, rec) = logger_with_default_recorder().await;

    logger.write(MsgFlags::INFO, "hello").await.unwrap();

    assert!(wait_until(|| rec.records().len() == 1).await);
    let records = rec.records();
    assert_eq!(records[0].content(), "hello");
    assert_eq!(records[0].flags(), MsgFlags::INFO);
}

#[tokio::test]
async fn severity_protector_picks_by_recorder_order() {
    let (logger, rec) = logger_with_default_recorder().await;

    logger
        .write(MsgFlags::ERROR | MsgFlags::INFO, "x")
        .await
        .unwrap();
    assert!(wait_until(|| rec.records().len() == 1).await);
    assert_eq!(rec.records()[0].flags(), MsgFlags::ERROR);

    rec.clear();
    logger
        .change_severity_order(&rid("rec"), MsgFlags::INFO, Direction::Before, MsgFlags::ERROR)
        .await
        .unwrap();
    logger
        .write(MsgFlags::ERROR | MsgFlags::INFO, "x")
        .await
        .unwrap();
    assert!(wait_until(|| rec.records().len() == 1).await);
    assert_eq!(rec.records()[0].flags(), MsgFlags::INFO);
}

#[tokio::test]
async fn severity_mask_filters_silently() {
    let (logger, rec) = logger_with_default_recorder().await;
    logger
        .set_severity_mask(
            &rid("rec"),
            MsgFlags::SEVERITY_ALL & !MsgFlags::CRITICAL & !MsgFlags::ERROR,
        )
        .await
        .unwrap();

    logger.write(MsgFlags::CRITICAL, "silent").await.unwrap();
    logger.write(MsgFlags::WARNING, "loud").await.unwrap();

    assert!(wait_until(|| rec.records().len() == 1).await);
    settle().await;
    let records = rec.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content(), "loud");
    assert_eq!(records[0].flags(), MsgFlags::WARNING);
}

#[tokio::test]
async fn zero_mask_mutes_recorder() {
    let (logger, rec) = logger_with_default_recorder().await;
    logger
        .set_severity_mask(&rid("rec"), MsgFlags::empty())
        .await
        .unwrap();

    for _ in 0..5 {
        logger.write(MsgFlags::ERROR, "muted").await.unwrap();
    }
    settle().await;
    assert!(rec.records().is_empty());
}

#[tokio::test]
async fn unknown_recipient_reported_in_batch() {
    let (logger, rec) = logger_with_default_recorder().await;

    let mut msg = LogMessage::with_text("to both");
    msg.set_flags(MsgFlags::NOTICE);
    let err = logger
        .write_msg(&[rid("rec"), rid("ghost")], msg)
        .await
        .unwrap_err();

    let br = err.as_batch().expect("batch result");
    assert_eq!(br.errors().len(), 1);
    assert!(matches!(
        br.errors().get(&rid("ghost")),
        Some(LogError::WrongRecorderId)
    ));
    assert_eq!(br.successful(), &[rid("rec")]);

    assert!(wait_until(|| rec.records().len() == 1).await);
    assert_eq!(rec.records()[0].content(), "to both");
}

#[tokio::test]
async fn unspecified_severity_becomes_info() {
    let (logger, rec) = logger_with_default_recorder().await;

    logger.write(MsgFlags::empty(), "plain").await.unwrap();

    assert!(wait_until(|| rec.records().len() == 1).await);
    assert_eq!(rec.records()[0].flags(), MsgFlags::INFO);
}

#[tokio::test]
async fn exactly_one_severity_bit_after_dispatch() {
    let (logger, rec) = logger_with_default_recorder().await;

    logger
        .write(
            MsgFlags::WARNING | MsgFlags::DEBUG | MsgFlags::CUSTOM_B1 | MsgFlags::CUSTOM_B3,
            "multi",
        )
        .await
        .unwrap();

    assert!(wait_until(|| rec.records().len() == 1).await);
    let flags = rec.records()[0].flags();
    assert_eq!(flags.severity().bits().count_ones(), 1);
    assert_eq!(flags.severity(), MsgFlags::WARNING);
    // attribute bits ride along untouched
    assert!(flags.contains(MsgFlags::CUSTOM_B3));
}

#[tokio::test]
async fn recipients_resolve_severity_independently() {
    let logger = Logger::new();
    let first = MemoryRecorder::new();
    let second = MemoryRecorder::new();
    first.listen();
    second.listen();
    logger
        .register_recorder("first", first.interface(), true)
        .await
        .unwrap();
    logger
        .register_recorder("second", second.interface(), true)
        .await
        .unwrap();
    logger.initialise(&[]).await.unwrap();

    // the second recorder prefers INFO over ERROR
    logger
        .change_severity_order(&rid("second"), MsgFlags::INFO, Direction::Before, MsgFlags::ERROR)
        .await
        .unwrap();

    logger
        .write(MsgFlags::ERROR | MsgFlags::INFO, "split")
        .await
        .unwrap();

    assert!(wait_until(|| first.records().len() == 1 && second.records().len() == 1).await);
    assert_eq!(first.records()[0].flags(), MsgFlags::ERROR);
    assert_eq!(second.records()[0].flags(), MsgFlags::INFO);
}

#[tokio::test]
async fn stack_trace_attached_once_for_all_recipients() {
    let logger = Logger::new();
    let first = MemoryRecorder::new();
    let second = MemoryRecorder::new();
    first.listen();
    second.listen();
    logger
        .register_recorder("first", first.interface(), true)
        .await
        .unwrap();
    logger
        .register_recorder("second", second.interface(), true)
        .await
        .unwrap();
    logger.initialise(&[]).await.unwrap();

    logger
        .write(MsgFlags::ERROR | MsgFlags::STACK_TRACE, "trouble")
        .await
        .unwrap();

    assert!(wait_until(|| first.records().len() == 1 && second.records().len() == 1).await);
    let a = first.records()[0].content().to_string();
    let b = second.records()[0].content().to_string();
    assert_eq!(a, b, "all recipients must see the same augmented content");
    assert!(a.starts_with("trouble\n"));
    assert_eq!(a.matches("---------- stack trace ----------").count(), 1);
}

#[tokio::test]
async fn short_stack_trace_is_compacted() {
    let (logger, rec) = logger_with_default_recorder().await;

    logger
        .write(MsgFlags::ERROR | MsgFlags::STACK_TRACE_SHORT, "trouble")
        .await
        .unwrap();

    assert!(wait_until(|| rec.records().len() == 1).await);
    let content = rec.records()[0].content().to_string();
    assert!(content.contains("---------- stack trace ----------"));
    assert!(content.ends_with("---------------------------------"));
}

#[tokio::test]
async fn write_before_initialise_is_rejected() {
    let logger = Logger::new();
    let rec = MemoryRecorder::new();
    rec.listen();
    logger
        .register_recorder("rec", rec.interface(), true)
        .await
        .unwrap();

    let err = logger.write(MsgFlags::INFO, "early").await.unwrap_err();
    assert!(matches!(err, LogError::NotInitialised));
}

#[tokio::test]
async fn no_defaults_and_no_recipients_is_rejected() {
    let logger = Logger::new();
    let rec = MemoryRecorder::new();
    rec.listen();
    logger
        .register_recorder("rec", rec.interface(), false)
        .await
        .unwrap();
    logger.initialise(&[]).await.unwrap();

    let err = logger.write(MsgFlags::INFO, "nowhere").await.unwrap_err();
    assert!(matches!(err, LogError::NotWhereToWrite));

    // an explicit recipient still works
    let mut msg = LogMessage::with_text("direct");
    msg.set_flags(MsgFlags::INFO);
    logger.write_msg(&[rid("rec")], msg).await.unwrap();
    assert!(wait_until(|| rec.records().len() == 1).await);
}

#[tokio::test]
async fn delivery_order_is_preserved_per_recipient() {
    let (logger, rec) = logger_with_default_recorder().await;

    for i in 0..20 {
        logger
            .write(MsgFlags::INFO, format!("message {i}"))
            .await
            .unwrap();
    }

    assert!(wait_until(|| rec.records().len() == 20).await);
    let contents: Vec<String> = rec
        .records()
        .iter()
        .map(|m| m.content().to_string())
        .collect();
    let expected: Vec<String> = (0..20).map(|i| format!("message {i}")).collect();
    assert_eq!(contents, expected);
}
