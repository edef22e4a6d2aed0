mod event;
mod input;
mod message;
mod session;

pub use event::{event_channel, CloseReason, EventReceiver, EventSender, SessionEvent};
pub use input::InputSource;
pub use message::{ChatMessage, CodecError, FRAME_DELIMITER};
pub use session::{CloseSignal, Session, SessionHandle, SessionState};
