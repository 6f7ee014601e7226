//! Local object-store simulator.
//!
//! Emulates a cloud blob store on local disk: buckets and slash-separated
//! keys under `<root>/buckets`, content-addressed metadata records under
//! `<root>/metadata`, and an append-only audit log at
//! `<root>/logs/operations.log`.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{StorageError, StorageResult};
pub use services::{
    audit_log::AuditLog,
    backup_service::BackupService,
    hasher::ContentHasher,
    metadata_store::MetadataStore,
    monitor::StorageMonitor,
    object_repository::ObjectRepository,
};
