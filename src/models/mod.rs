//! Core data models for the object-store simulator.
//!
//! These entities describe stored objects, audit log lines and backup runs.
//! They serialize as JSON via `serde` using the field names of the on-disk
//! layout.

pub mod audit;
pub mod backup;
pub mod object;
