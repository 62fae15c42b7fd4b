//! # weft-core
//!
//! Shared primitives for the weft toolkit.
//!
//! This crate provides:
//! - Panic capture into displayable error values
//! - Coded errors carrying a numeric code and an optional cause
//! - Recovery wrappers that turn panicking callables into error-returning ones
//! - An ordered scatter/gather task group with bounded concurrency
//! - A base64 page-token codec

pub mod error;
pub mod group;
pub mod page_token;
pub mod recover;

pub use error::{CodedError, CoreError, PanicError};
pub use group::ValueGroup;
pub use page_token::{decode_page_token, encode_page_token};
pub use recover::{recover, recover_err, recover_value, spawn_recovered, spawn_recovered_in};
