//! # Collection Module
//!
//! The ordered, user-editable list of clips. Order is significant: it is the
//! order the clips are concatenated in on export.

pub mod store;

pub use store::{CollectionChange, CollectionSnapshot, MediaCollection};
