#![deny(unsafe_code)]
//! Run orchestration: dataset jobs, fallback substitution and logging setup.

pub mod config;
pub mod coordinator;
pub mod fallback;
pub mod logging;
pub mod pipeline;

pub use config::{
    CONFIG_ENV_VAR, DatasetConfig, LoggingConfig, RUN_CONFIG_FILE, ReferenceConfig, RunConfig,
    config_root,
};
pub use coordinator::{NamedOutput, OutputShape, RunCoordinator, RunReport, SourceOutput};
pub use fallback::{FallbackSnapshot, FallbackStore, SourceCitation};
pub use logging::{LogConfig, LogFormat, init_logging, init_logging_with_writer};
pub use pipeline::{DatasetJob, RowSource, run_configured};
