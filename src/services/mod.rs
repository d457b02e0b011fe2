//! Backend services: object storage, metadata store, and the photo flows
//! composed from them.

pub mod metadata_store;
pub mod object_store;
pub mod photo_service;
