//! Real implementations of the collaborator traits from `sentinel-core`.

pub mod clock;
pub mod http;
pub mod stats;

pub use clock::*;
pub use http::*;
pub use stats::*;
