pub mod fallback;
pub mod metrics;
pub mod providers;

pub use fallback::{FallbackOrchestrator, ModelList};
pub use self::metrics::{get_metrics, init_metrics};
