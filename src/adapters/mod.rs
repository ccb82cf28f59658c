//! Adapters for external collaborators.
//!
//! The opener launches viewers and browsers; downloads receives copies of
//! purchased PDFs.

pub mod delivery;
pub mod opener;

pub use delivery::Downloads;
pub use opener::{Opener, SystemOpener};
