mod message_text;
mod notification;
mod push_request;
mod push_subscription;

pub use message_text::MessageText;
pub use notification::*;
pub use push_request::*;
pub use push_subscription::*;
