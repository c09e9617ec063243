use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    config::{Config, MEMORY_DATABASE},
    errors::{Error, Result},
    providers::{
        files::{FileStorage, LocalFileStorage},
        payments::{PaymentProvider, StripeClient},
    },
    store::{MemoryStore, Store, SurrealStore},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub files: Arc<dyn FileStorage>,
    pub payments: Option<Arc<dyn PaymentProvider>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn init(config: Config) -> Result<Self> {
        let store: Arc<dyn Store> = if config.database_url == MEMORY_DATABASE {
            warn!("DATABASE_URL is `memory`; data is lost on restart");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(SurrealStore::init(&config).await?)
        };
        info!("Store backend: {}", store.backend_tag());

        let payments = match &config.stripe_secret_key {
            Some(key) => Some(Arc::new(StripeClient::new(key.clone())) as Arc<dyn PaymentProvider>),
            None => {
                warn!("STRIPE_SECRET_KEY not set, billing endpoints answer 503");
                None
            }
        };

        Ok(Self {
            store,
            files: Arc::new(LocalFileStorage::new(&config.upload_dir)),
            payments,
            config: Arc::new(config),
        })
    }

    pub fn payments(&self) -> Result<&dyn PaymentProvider> {
        self.payments.as_deref().ok_or(Error::PaymentsUnavailable)
    }

    #[cfg(test)]
    pub fn for_tests(
        store: Arc<dyn Store>,
        files: Arc<dyn FileStorage>,
        payments: Option<Arc<dyn PaymentProvider>>,
    ) -> Self {
        Self {
            store,
            files,
            payments,
            config: Arc::new(crate::config::test_config()),
        }
    }
}
