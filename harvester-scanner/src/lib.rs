pub mod dummy;
pub mod error;
pub mod navigator;
pub mod result;
pub mod store;
pub mod transfer;
pub mod validator;

pub use dummy::{DummyNavigator, DummyTransfer};
pub use error::{EngineError, ErrorKind, ScanError, StoreError};
pub use navigator::{
    EngineReport, HttpAutomationEngine, NavigationEngine, NavigationSession, NavigationTask, Navigator,
    PlatformHint,
};
pub use result::{
    Destination, DocumentCandidate, NavigationOutcome, SessionContext, SessionCookie, TransferOutcome,
};
pub use store::{FsObjectStore, ObjectStore, S3ObjectStore, S3Settings};
pub use transfer::{Transfer, TransferManager, TransferPolicy};
pub use validator::{CandidateValidator, DocumentRule};
