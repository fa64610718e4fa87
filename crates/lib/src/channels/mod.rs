//! Messaging channels (LINE).
//!
//! Webhook payload types, signature verification, and the reply client. Event handling
//! talks to the channel through [`ReplyChannel`] so it can be exercised without the network.

mod handle;
mod line;
pub mod signature;

pub use handle::ReplyChannel;
pub use line::{
    ChannelError, EventMessage, LineChannel, ReplyMessage, ReplyRequest, WebhookBody,
    WebhookEvent, LINE_API_BASE,
};
