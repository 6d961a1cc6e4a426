//! Bus sinks used by the `schedule` command

use async_trait::async_trait;
use can_codec::{BusError, BusSink, Frame};

/// Prints every frame to stdout with a UTC timestamp
pub struct StdoutSink {
    frames: u64,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { frames: 0 }
    }
}

#[async_trait]
impl BusSink for StdoutSink {
    async fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.frames += 1;
        println!(
            "{} #{:<6} {}",
            chrono::Utc::now().format("%H:%M:%S%.3f"),
            self.frames,
            frame
        );
        Ok(())
    }
}
