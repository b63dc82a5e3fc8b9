//! Domain models for Goma.
//!
//! Each entity comes with `Create*` and `Update*` input types consumed
//! by the repositories in [`crate::repository`].

pub mod permission;
pub mod role;
pub mod tenant;
