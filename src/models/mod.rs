//! Core data models for the photo relay.
//!
//! `PhotoRecord` mirrors the document stored per photo and serializes
//! naturally as camelCase JSON via `serde`.

pub mod photo;
