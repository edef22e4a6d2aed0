use std::io::{self, Write};

use common::chat::{EventReceiver, SessionEvent};

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";
const BANNER_WIDTH: usize = 80;

/// Draws session events onto a terminal-like writer.
///
/// Prompts are held back until the welcome banner is out, and nothing is
///  drawn after the farewell.
pub struct Renderer<W: Write> {
    out: W,
    name: String,
    welcomed: bool,
    finished: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, name: impl Into<String>) -> Self {
        Self {
            out,
            name: name.into(),
            welcomed: false,
            finished: false,
        }
    }

    /// Drain events until every sender is gone
    pub async fn run(mut self, mut events: EventReceiver) -> W {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.render(&event) {
                tracing::debug!("failed to draw {:?}: {}", event, e);
            }
        }
        self.out
    }

    pub fn render(&mut self, event: &SessionEvent) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }

        match event {
            SessionEvent::Welcome { name } => {
                let rule = "=".repeat(BANNER_WIDTH);
                write!(
                    self.out,
                    "\r{rule}\nHello {GREEN}{name}{RESET}\nWelcome to Chatting App\n\
                     Instructions: Type a message and press enter to send it\n{rule}\n"
                )?;
                self.welcomed = true;
                self.prompt()?;
            }
            SessionEvent::Started { peer } => {
                writeln!(self.out, "\rChatting with {GREEN}{peer}{RESET}")?;
            }
            SessionEvent::Received { sender, text } => {
                write!(self.out, "\r{GREEN}{sender}{RESET} < {text}")?;
                if !text.ends_with('\n') {
                    writeln!(self.out)?;
                }
            }
            SessionEvent::Sent { text } => {
                tracing::debug!(len = text.len(), "message sent");
            }
            SessionEvent::SendFailed { reason } => {
                tracing::warn!("send failed: {}", reason);
                writeln!(self.out, "\rCould not send message, please try again")?;
            }
            SessionEvent::FrameDropped { reason } => {
                tracing::warn!("dropped incoming frame: {}", reason);
            }
            SessionEvent::Prompt => {
                if self.welcomed {
                    self.prompt()?;
                }
            }
            SessionEvent::Farewell { name } => {
                writeln!(
                    self.out,
                    "\rClosing Chat Application\nGoodbye {GREEN}{name}{RESET}!"
                )?;
                self.finished = true;
            }
            SessionEvent::Closed { peer, reason } => {
                writeln!(self.out, "\r{GREEN}{peer}{RESET} left the chat ({reason})")?;
            }
        }
        self.out.flush()
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{GREEN}{}{RESET} > ", self.name)?;
        self.out.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::chat::{event_channel, CloseReason};

    fn draw(events: &[SessionEvent]) -> String {
        let mut renderer = Renderer::new(Vec::new(), "alice");
        for event in events {
            renderer.render(event).unwrap();
        }
        String::from_utf8(renderer.out).unwrap()
    }

    #[test]
    fn test_welcome_banner_then_prompt() {
        let out = draw(&[SessionEvent::Welcome {
            name: "alice".to_string(),
        }]);
        assert!(out.contains(&"=".repeat(80)));
        assert!(out.contains("Welcome to Chatting App"));
        assert!(out.contains("Instructions: Type a message and press enter to send it"));
        assert!(out.ends_with(&format!("{GREEN}alice{RESET} > ")));
    }

    #[test]
    fn test_prompts_wait_for_welcome() {
        let out = draw(&[SessionEvent::Prompt]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_received_line_always_ends() {
        let out = draw(&[SessionEvent::Received {
            sender: "bob".to_string(),
            text: "no newline".to_string(),
        }]);
        assert_eq!(out, format!("\r{GREEN}bob{RESET} < no newline\n"));
    }

    #[test]
    fn test_farewell_is_drawn_once() {
        let farewell = SessionEvent::Farewell {
            name: "alice".to_string(),
        };
        let out = draw(&[
            farewell.clone(),
            farewell,
            SessionEvent::Closed {
                peer: "bob".to_string(),
                reason: CloseReason::Shutdown,
            },
        ]);
        assert_eq!(out.matches("Goodbye").count(), 1);
        assert!(out.contains("Closing Chat Application"));
        assert!(!out.contains("left the chat"));
    }

    #[test]
    fn test_send_failure_notice() {
        let out = draw(&[SessionEvent::SendFailed {
            reason: "broken pipe".to_string(),
        }]);
        assert!(out.contains("Could not send message, please try again"));
    }

    #[tokio::test]
    async fn test_run_drains_until_senders_drop() {
        let (tx, rx) = event_channel();
        tx.send(SessionEvent::Started {
            peer: "bob".to_string(),
        })
        .unwrap();
        drop(tx);

        let out = Renderer::new(Vec::new(), "alice").run(rx).await;
        assert!(String::from_utf8(out).unwrap().contains("Chatting with"));
    }
}
