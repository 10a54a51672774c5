//! Report page layout and PDF serialization.

pub mod layout;
pub mod pdf;
