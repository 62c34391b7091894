//! WhatsApp Cloud API transport: webhook signature verification, inbound
//! payload parsing, and the outbound message client. Everything channel
//! specific lives here; the conversation runtime never sees webhook JSON.

pub mod client;
pub mod payload;
pub mod signature;

pub use client::{MessageSender, NoopSender, SendError, WhatsAppClient};
pub use payload::{parse_webhook, InboundText, PayloadError};
pub use signature::{sign_body, verify_signature, SignatureError};
