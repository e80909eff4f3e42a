//! Core SMTP types.

mod reply;
mod stage;

pub use reply::{Reply, ReplyCode};
pub use stage::Stage;
