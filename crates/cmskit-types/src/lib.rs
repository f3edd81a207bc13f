#![forbid(unsafe_code)]
#![doc = "Common error codes and algorithm identifiers shared by the cmskit crates."]

pub mod algorithm;
pub mod error;

pub use algorithm::*;
pub use error::*;
