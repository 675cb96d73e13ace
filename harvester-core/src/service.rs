use crate::config::{Config, StorageConfig};
use crate::extract::Extractor;
use harvester_scanner::{
    DummyNavigator, DummyTransfer, FsObjectStore, HttpAutomationEngine, NavigationSession,
    Navigator, ObjectStore, S3ObjectStore, ScanError, Transfer, TransferManager,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const NAVIGATION_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Open the configured object store.
pub async fn build_store(storage: &StorageConfig) -> Arc<dyn ObjectStore> {
    match storage {
        StorageConfig::Emulated { root } => {
            info!("Using filesystem object store at {}", root.display());
            Arc::new(FsObjectStore::new(root.clone()))
        }
        StorageConfig::S3 { .. } => {
            let settings = storage.s3_settings().unwrap_or_default();
            Arc::new(S3ObjectStore::connect(settings).await)
        }
    }
}

/// Wire the live or dummy collaborators into an extractor.
pub async fn build_extractor(config: &Config) -> Result<Extractor, ScanError> {
    let store = build_store(&config.storage).await;

    let (navigator, transfer): (Arc<dyn Navigator>, Arc<dyn Transfer>) = match &config.engine {
        Some(engine) if !config.dummy_mode => {
            let client = HttpAutomationEngine::new(&engine.endpoint)?
                .with_api_key(engine.api_key.clone())
                .with_headless(engine.headless);
            let session = NavigationSession::new(Arc::new(client))
                .with_timeout(config.navigation_timeout)
                .with_max_retries(config.navigation_retries)
                .with_retry_delay(NAVIGATION_RETRY_DELAY);
            let manager = TransferManager::new(store)?.with_policy(config.transfer);
            info!("Live mode: engine at {}", engine.endpoint);
            let navigator: Arc<dyn Navigator> = Arc::new(session);
            let transfer: Arc<dyn Transfer> = Arc::new(manager);
            (navigator, transfer)
        }
        _ => {
            info!("Dummy mode: canned navigation, listing-based transfer");
            let navigator: Arc<dyn Navigator> = Arc::new(DummyNavigator::new());
            let transfer: Arc<dyn Transfer> = Arc::new(DummyTransfer::new(store));
            (navigator, transfer)
        }
    };

    Ok(Extractor::new(navigator, transfer).with_request_deadline(config.request_deadline))
}
