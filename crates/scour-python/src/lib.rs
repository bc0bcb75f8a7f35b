//! Python language support for scour.
//!
//! Wraps the external parser (`tree-sitter-python`) behind an addressable
//! tree model with position-preserving unparse, and implements the concrete
//! refactoring strategies over it.

pub mod facts;
pub mod ops;
pub mod resolve;
pub mod tree;
