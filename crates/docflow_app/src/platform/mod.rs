mod app;
mod config;
mod effects;
mod logging;
mod render;

pub use app::Session;
pub use config::{ConfigOverrides, DocflowConfig};
pub use effects::EffectRunner;
pub use logging::initialize as initialize_logging;
