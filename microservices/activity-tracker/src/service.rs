//! Microservice wiring: store selection, HTTP serving, background purge

use async_trait::async_trait;
use pulse_core::{HealthStatus, PulseError, PulseService, ReadinessStatus, Result, ServiceConfig};
use pulse_store::{CountingStore, LumaDbStore, MemoryStore};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{self, AppState};
use crate::config::{StoreBackend, StoreSettings, TrackerConfig};
use crate::tracker::ActivityTracker;

pub struct ActivityTrackerService {
    config: ServiceConfig,
    store_settings: StoreSettings,
    state: AppState,
    shutdown: watch::Sender<bool>,
}

impl ActivityTrackerService {
    /// Read all configuration from the environment and connect the store.
    pub async fn from_env() -> Result<Self> {
        let config = ServiceConfig::from_env()?;
        let store_settings = StoreSettings::from_env()?;
        let tracker_config = TrackerConfig::from_env();

        info!(
            backend = ?store_settings.backend,
            window_hours = tracker_config.default_status_window_hours,
            threshold = tracker_config.default_threshold,
            ttl_hours = tracker_config.counters_ttl_hours,
            "Loaded activity tracker configuration"
        );

        let store = connect_store(&store_settings).await?;
        let tracker = Arc::new(ActivityTracker::new(store, tracker_config));
        Ok(Self::from_parts(config, store_settings, tracker))
    }

    pub fn from_parts(
        config: ServiceConfig,
        store_settings: StoreSettings,
        tracker: Arc<ActivityTracker>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            store_settings,
            state: AppState::new(tracker),
            shutdown,
        }
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn tracker(&self) -> Arc<ActivityTracker> {
        self.state.tracker.clone()
    }

    fn spawn_purge_loop(&self) -> JoinHandle<()> {
        let store = self.state.tracker.store();
        let every = self.store_settings.purge_interval;
        let mut stop = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                let stopping = tokio::select! {
                    _ = ticker.tick() => false,
                    _ = stop.wait_for(|stopped| *stopped) => true,
                };
                if stopping {
                    break;
                }
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "Expired keys purged"),
                    Err(e) => warn!(error = %e, "Purge of expired keys failed"),
                }
            }
        })
    }
}

/// Build the configured store and make sure it answers before serving.
pub async fn connect_store(settings: &StoreSettings) -> Result<Arc<dyn CountingStore>> {
    let store: Arc<dyn CountingStore> = match settings.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::LumaDb => {
            let store = LumaDbStore::connect(&settings.pool)?;
            store.ensure_schema().await?;
            Arc::new(store)
        }
    };

    if !store.is_healthy().await {
        return Err(PulseError::Unavailable(
            "counting store did not answer health check".to_string(),
        ));
    }
    Ok(store)
}

#[async_trait]
impl PulseService for ActivityTrackerService {
    fn service_id(&self) -> &'static str {
        api::SERVICE_ID
    }

    async fn health(&self) -> HealthStatus {
        self.state.health()
    }

    async fn ready(&self) -> ReadinessStatus {
        self.state.readiness().await
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down Activity Tracker");
        self.shutdown.send_replace(true);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.config.http_bind).await?;
        info!(http = %self.config.http_bind, "Activity Tracker listening");

        let purge = self.spawn_purge_loop();
        let mut stop = self.shutdown.subscribe();
        let app = api::create_router(self.state.clone());

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.wait_for(|stopped| *stopped).await;
            })
            .await;

        purge.abort();
        served?;
        Ok(())
    }
}
