//! Domain models for MRN allocation.

mod facility;
mod mrn;
mod patient;
mod sequence;

pub use facility::*;
pub use mrn::*;
pub use patient::*;
pub use sequence::*;
