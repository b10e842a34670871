#![warn(clippy::pedantic)]
//! Source reader and typed statement tree for CIL policies.
//!
//! [`parser`] turns text into a generic list tree, [`builder`] maps that tree
//! onto typed [`nodes::Statement`]s stored in an [`arena::Arena`].
pub mod arena;
pub mod builder;
pub mod errors;
pub mod nodes;
pub mod parser;
pub mod refs;
