//! Credentials and request signing for the AscendEX pro streaming API
//!
//! The stream handshake proves identity by signing `"<timestamp>stream"`
//! with the account secret (HMAC-SHA256, base64 encoded).
//!
//! # Example
//!
//! ```no_run
//! use ascend_auth::{auth_payload, Credentials};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load credentials from environment
//!     let creds = Credentials::from_env()?;
//!     creds.validate()?;
//!
//!     let sig = creds.sign(&auth_payload(1_700_000_000_000))?;
//!     println!("{} -> {}", creds.endpoint_url(), sig);
//!
//!     Ok(())
//! }
//! ```

mod credentials;
mod error;
mod signer;

pub use credentials::Credentials;
pub use error::{AuthError, AuthResult};
pub use signer::{auth_payload, sign, STREAM_PATH_TAG};
