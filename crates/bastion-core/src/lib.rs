//! # bastion-core
//!
//! The trait seams shared by the Bastion layers:
//! - [`traits::SignatureScheme`], implemented by the identity crate's HMAC
//!   and Ed25519 schemes
//! - [`traits::RecordSink`], implemented by the runtime's JSONL log
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bastion_core::traits::{RecordSink, SignatureScheme};
//! ```

pub mod traits;

pub use traits::{JwsKeys, RecordSink, SignatureScheme};
