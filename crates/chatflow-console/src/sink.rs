use async_trait::async_trait;
use chatflow_core::{OutboundMessage, ResponseSink, Result};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

/// Prints delivered messages to stdout, one per line.
pub struct ConsoleSink {
    out: Mutex<Stdout>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl ResponseSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, msg: &OutboundMessage) -> Result<()> {
        let line = format!("bot> {}\n", msg.text);
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| chatflow_core::FlowError::Delivery(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| chatflow_core::FlowError::Delivery(e.to_string()))
    }
}
