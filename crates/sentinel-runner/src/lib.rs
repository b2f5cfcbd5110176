pub mod alerts;
pub mod config_gate;
pub mod effects;
pub mod metrics;
pub mod policy;
pub mod runner;
pub mod settings;

pub use alerts::*;
pub use config_gate::*;
pub use effects::*;
pub use metrics::*;
pub use policy::*;
pub use runner::*;
pub use settings::*;
