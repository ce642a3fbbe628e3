//! # Media Module
//!
//! Source file handles, collection items and the accepted-input gate.

pub mod types;

pub use types::{ItemId, MediaFile, MediaItem, Thumbnail, ACCEPTED_MEDIA_TYPE};
