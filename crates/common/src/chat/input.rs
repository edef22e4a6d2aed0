use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

/// Source of operator input lines for a session's write loop.
///
/// Lines keep their trailing newline. `None` means the input is exhausted.
#[async_trait]
pub trait InputSource: Send + 'static {
    async fn next_line(&mut self) -> Option<String>;
}

/// One subscription to the process-wide stdin fan-out
#[async_trait]
impl InputSource for broadcast::Receiver<String> {
    async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.recv().await {
                Ok(line) => return Some(line),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "input fell behind, dropped lines");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl InputSource for mpsc::Receiver<String> {
    async fn next_line(&mut self) -> Option<String> {
        self.recv().await
    }
}

#[async_trait]
impl InputSource for mpsc::UnboundedReceiver<String> {
    async fn next_line(&mut self) -> Option<String> {
        self.recv().await
    }
}
