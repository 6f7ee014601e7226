//! Storage components, leaves first: hashing, staging, metadata records and
//! the audit log underneath the object repository; the backup orchestrator
//! and monitor on top of it.

pub mod audit_log;
pub mod backup_service;
pub mod hasher;
pub mod metadata_store;
pub mod monitor;
pub mod object_repository;
pub mod staging;
