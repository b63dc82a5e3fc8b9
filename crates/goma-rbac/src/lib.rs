//! Goma RBAC: role loading, permission catalog seeding, and
//! authorization checks over the `goma-core` repository traits.

pub mod service;

pub use service::RbacService;
