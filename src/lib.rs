pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use config::AnalysisConfig;
pub use pipeline::answers::{Answer, SmartAccumulator};
pub use pipeline::dispatch::{ModelClient, ModelRequest, ModelResponse};
pub use pipeline::ingest::{PageSource, PlainTextSource};
pub use pipeline::question_bank::{self, QuestionBank};
pub use pipeline::{AnalysisError, AnalysisResult, AnalysisRunner, ProgressEvent};

/// Initialize tracing for embedding binaries. Library consumers that own
/// their subscriber should skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Specsift starting v{}", config::APP_VERSION);
}
