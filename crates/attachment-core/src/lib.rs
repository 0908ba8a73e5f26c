//! # attachment-core — Foundational Types for the Attachment Service
//!
//! Leaf crate of the workspace. It defines the attachment metadata record,
//! the filter language spoken to metadata stores, integrity-hash
//! classification and the HTTP content-negotiation helpers shared by the
//! storage, federation and API crates.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `attachment-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

#![deny(missing_docs)]

pub mod accept;
pub mod disposition;
pub mod error;
pub mod filter;
pub mod hash;
pub mod record;

pub use accept::{negotiate_json_attachment, parse_accept, MediaRange, Representation};
pub use disposition::{attachment_disposition, filename_from_disposition};
pub use error::HashError;
pub use filter::{Column, Comparison, Condition, Filter, FilterValue};
pub use hash::{identify, normalize_integrity_hash, HashEncoding};
pub use record::{AttachmentPatch, AttachmentRecord, NewAttachment, JSON_FILENAME};
