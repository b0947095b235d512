//! Vidora Core - Byte-range video streaming and video storage
//!
//! This crate provides the building blocks of the Vidora video server:
//! `Range` header parsing, bounded chunked file reads, streaming response
//! assembly, the video catalog, upload storage and configuration.

pub mod config;
pub mod storage;
pub mod streaming;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::VidoraConfig;
pub use storage::{CatalogError, InMemoryCatalog, StoreError, VideoCatalog, VideoStore};
pub use streaming::{RangeError, ReadError, ResponseAssembler, ResponseDescriptor, StreamRequest};
