//! Integration tests for Vidora
//!
//! These tests drive the streaming engine and the HTTP API together:
//! range semantics on real files, uploads followed by playback, and
//! directory ingestion feeding the stream endpoint.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/range_validation.rs"]
mod range_validation;

#[path = "integration/streaming_workflow.rs"]
mod streaming_workflow;

#[path = "integration/ingest_workflow.rs"]
mod ingest_workflow;
