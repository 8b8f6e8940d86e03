//! Query options and paged results.
//!
//! # Responsibility
//! - Replace per-combination query overloads with one options value.
//! - Define the paged result returned by paged queries.

pub mod options;
pub mod paged;
