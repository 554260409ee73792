//! Request interpretation: free text to a structured acquisition request.
//!
//! Purely rule based and free of I/O. See [`parse`].

mod parser;
mod types;

pub use parser::parse;
pub use types::*;
