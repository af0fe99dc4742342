//! Public facade crate for `paperdrop`.
//!
//! No IO lives here. The collaborator traits and data model come from
//! `paperdrop-core`; concrete implementations live in `paperdrop-local`.

pub use paperdrop_core::*;
