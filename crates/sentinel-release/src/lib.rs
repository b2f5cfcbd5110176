pub mod actuator;
pub mod notes;
pub mod publisher;
pub mod rollout;

pub use actuator::*;
pub use notes::*;
pub use publisher::*;
pub use rollout::*;
