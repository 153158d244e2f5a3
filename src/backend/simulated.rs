use std::time::Duration;

use async_trait::async_trait;

use super::ReplyBackend;
use crate::error::Result;
use crate::state::ChatMessage;

pub const SIMULATED_REPLY: &str = "This is a simulated response. Connect your backend API here.";

/// Stand-in backend: waits a fixed delay, then answers with a canned reply.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    delay: Duration,
    reply: String,
}

impl SimulatedBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            reply: SIMULATED_REPLY.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_reply(delay: Duration, reply: impl Into<String>) -> Self {
        Self {
            delay,
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ReplyBackend for SimulatedBackend {
    async fn reply(&self, history: &[ChatMessage]) -> Result<String> {
        tracing::debug!(
            messages = history.len(),
            delay_ms = self.delay.as_millis() as u64,
            "simulating reply"
        );
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }

    fn name(&self) -> String {
        "Simulated".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_delay() {
        let backend = SimulatedBackend::new(Duration::from_secs(1));
        let started = tokio::time::Instant::now();
        let reply = backend.reply(&[ChatMessage::user("hello")]).await.unwrap();
        assert_eq!(reply, SIMULATED_REPLY);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_custom_reply() {
        let backend = SimulatedBackend::with_reply(Duration::ZERO, "ok");
        assert_eq!(backend.reply(&[]).await.unwrap(), "ok");
    }
}
