// Fan-out walkthrough: one logger feeding a console recorder and an
// in-memory recorder with different severity policies.
//
// Run with: cargo run --example fanout_demo

use anyhow::Result;
use fanlog::{Direction, Logger, MemoryRecorder, MsgFlags, Recorder, StreamRecorder};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let logger = Logger::new();

    let console = StreamRecorder::with_prefix(std::io::stdout(), "[demo]");
    let capture = MemoryRecorder::new();
    console.listen();
    capture.listen();

    logger
        .register_recorder("console", console.interface(), true)
        .await?;
    logger
        .register_recorder("capture", capture.interface(), true)
        .await?;
    logger.initialise(&[]).await?;

    // the console ignores anything below warning
    logger
        .set_severity_mask(&"console".into(), MsgFlags::SEVERITY_MAJOR)
        .await?;

    logger.write(MsgFlags::INFO, "engine started").await?;
    logger.write(MsgFlags::WARNING, "queue three-quarters full").await?;
    logger
        .write(MsgFlags::ERROR | MsgFlags::INFO, "worker lost, recovering")
        .await?;

    // the capture recorder now prefers INFO when both bits are set
    logger
        .change_severity_order(
            &"capture".into(),
            MsgFlags::INFO,
            Direction::Before,
            MsgFlags::ERROR,
        )
        .await?;
    logger
        .write(MsgFlags::ERROR | MsgFlags::INFO, "ambiguous event")
        .await?;

    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("--- capture recorder saw ---");
    for record in capture.records() {
        println!("{} {}", record.flags(), record.content());
    }

    logger.close().await;
    console.interface().stop().await?;
    capture.interface().stop().await?;
    Ok(())
}
