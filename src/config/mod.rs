//! Configuration loading, specification and validation.

mod parser;
mod spec;
mod validator;

pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use spec::{EngineSettings, ReconcileDoc, TargetConfig, TransportKind};
pub use validator::{ConfigValidator, ValidationIssue, ValidationResult};
