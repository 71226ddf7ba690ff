pub mod settings;

pub use settings::{IssuerSettings, LoggingConfig, MockCaConfig, ServerConfig, Settings};
