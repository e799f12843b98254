//! Versioned artifact index.
//!
//! This crate keeps the metadata layer of a bundle repository client: a
//! persisted mapping from artifact name to versions and their digests,
//! constraint-based lookup, fill-gaps merging of indices from several
//! sources, and the home-directory layout the index lives in.

pub mod constraint;
pub mod error;
pub mod home;
pub mod index;

pub use constraint::Constraint;
pub use error::{IndexError, IndexResult};
pub use home::{Home, HomeConfig};
pub use index::{DEFAULT_INDEX_MODE, VersionIndex};
