//! Goma Core: domain models, validation, error types, and repository
//! traits for tenant-scoped role-based access control.
//!
//! This crate has no database dependency. Persistence lives in
//! `goma-db`; orchestration lives in `goma-rbac`.

pub mod error;
pub mod models;
pub mod repository;
pub mod validation;
