pub mod model_loaders;
pub mod readiness;

pub use model_loaders::*;
pub use readiness::require_ready;
