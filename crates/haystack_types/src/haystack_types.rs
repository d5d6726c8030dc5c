//! Haystack Types - Core value types for the tagging model
//!
//! This crate contains the pure data structures shared by the index cache and
//! its collaborators: tag values, tag dictionaries, references, component
//! handles and the identities used to correlate remote data.

mod ids;
mod tags;
mod value;

pub use ids::*;
pub use tags::*;
pub use value::*;
