//! Remote realtime inference service
//!
//! - `RealtimeSessionClient`: capability the session controller depends on
//! - `HttpRealtimeClient`: HTTPS session negotiation + WebSocket audio transport
//! - `messages`: wire types for negotiation, audio frames and text chat

pub mod client;
pub mod http_client;
pub mod messages;

pub use client::{RealtimeSessionClient, Session, SessionRequest};
pub use http_client::HttpRealtimeClient;
pub use messages::{ChatMessage, ClientEvent, ServerEvent, SessionResponse};
