pub mod health;
pub mod http;
pub mod model;
pub mod probes;
pub mod retry;
pub mod secret;
pub mod system;

pub use health::*;
pub use http::*;
pub use model::*;
pub use probes::*;
pub use retry::*;
pub use secret::*;
pub use system::*;
