//! Export functionality for sequence counters.

mod sequences;

pub use sequences::*;
