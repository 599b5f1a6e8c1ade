//! Shared types for the AscendEX pro streaming API
//!
//! This crate provides the wire and domain types used across the workspace.
//! It has minimal dependencies and can be used independently.
//!
//! # Key Types
//!
//! - [`Channel`] - Streaming channels
//! - [`Order`], [`BestOrderBook`] - Top-of-book quote
//! - [`AuthRequest`], [`SubscribeRequest`], [`PongMessage`] - Outbound requests
//! - [`InboundMessage`], [`MessageKind`] - Classified server messages
//! - [`StreamError`] - Error types

pub mod book;
pub mod enums;
pub mod error;
pub mod inbound;
pub mod messages;

// Re-export commonly used types
pub use book::*;
pub use enums::*;
pub use error::*;
pub use inbound::*;
pub use messages::*;

// Re-export uuid for users building cancel requests
pub use uuid::Uuid;
