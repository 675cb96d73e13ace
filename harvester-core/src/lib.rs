pub mod api;
pub mod config;
pub mod extract;
pub mod model;
pub mod platform;
pub mod service;

pub use api::{AppState, router, serve};
pub use config::{Config, ConfigError, EngineConfig, StorageConfig};
pub use extract::{Extractor, NO_DOCUMENTS_MESSAGE, summarize};
pub use model::{ExtractionRequest, ExtractionResult, ExtractionStatus};
pub use platform::PlatformTable;
pub use service::{build_extractor, build_store};

pub use harvester_scanner::{ErrorKind, PlatformHint};
