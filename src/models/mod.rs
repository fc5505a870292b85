mod notification;
mod push_subscription;

pub use notification::*;
pub use push_subscription::*;
