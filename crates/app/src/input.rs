use std::io::BufRead;
use std::thread;
use std::time::Duration;

use common::chat::{EventSender, SessionEvent};
use tokio::sync::broadcast;

/// Lines typed but not yet taken by the slowest session
pub const INPUT_CAPACITY: usize = 64;

/// Read failures in a row before input is treated as gone
const MAX_CONSECUTIVE_ERRORS: u32 = 5;
/// Pause after a failed read, multiplied by the failures so far
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Read operator lines on a dedicated thread and fan them out to every
///  session. Lines keep their trailing newline. The channel closes when
///  the reader reaches end of input or keeps failing.
pub fn spawn_line_reader<R>(
    reader: R,
    events: EventSender,
) -> (broadcast::Receiver<String>, thread::JoinHandle<()>)
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = broadcast::channel(INPUT_CAPACITY);
    let handle = thread::spawn(move || read_lines(reader, tx, events));
    (rx, handle)
}

fn read_lines<R: BufRead>(mut reader: R, tx: broadcast::Sender<String>, events: EventSender) {
    let mut errors = 0;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                tracing::debug!("input closed");
                return;
            }
            Ok(_) => {
                errors = 0;
                // nobody listening yet is fine; the line is simply dropped
                let _ = tx.send(line);
            }
            Err(e) => {
                errors += 1;
                tracing::error!("error reading from stdin: {}", e);
                if errors >= MAX_CONSECUTIVE_ERRORS {
                    tracing::error!("giving up on stdin after {} failed reads", errors);
                    return;
                }
                let _ = events.send(SessionEvent::Prompt);
                thread::sleep(ERROR_BACKOFF * errors);
            }
        }
    }
}
