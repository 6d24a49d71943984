use http::Uri;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::{
    cache::{CacheKey, CachedResponse},
    error::WorkerError,
    request::WorkerRequest,
    worker::ServiceWorker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    /// Install failed, this worker will never activate
    Redundant,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    pub state: LifecycleState,
    pub controls_clients: bool,
    pub skip_waiting: bool,
}

impl Lifecycle {
    pub fn new(skip_waiting: bool) -> Self {
        Self {
            state: LifecycleState::Parsed,
            controls_clients: false,
            skip_waiting,
        }
    }
}

impl ServiceWorker {
    pub fn state(&self) -> LifecycleState {
        self.lifecycle().state
    }

    pub fn controls_clients(&self) -> bool {
        self.lifecycle().controls_clients
    }

    fn set_state(&self, state: LifecycleState) {
        self.lifecycle().state = state;
    }

    /// Install then, if skip waiting is set, activate
    pub async fn start(&self) -> Result<LifecycleState, WorkerError> {
        self.install().await?;

        let skip_waiting = self.lifecycle().skip_waiting;
        if skip_waiting {
            self.activate().await?;
        }

        Ok(self.state())
    }

    /// Pre-caches the static assets. Either every asset is stored or none are
    #[instrument(skip(self), fields(cache = %self.config.static_cache_name))]
    pub async fn install(&self) -> Result<(), WorkerError> {
        self.set_state(LifecycleState::Installing);

        match self.precache().await {
            Ok(count) => {
                info!("Install successful, cached {count} assets");
                self.set_state(LifecycleState::Installed);
                Ok(())
            },
            Err(e) => {
                error!("Install failed: {e}");
                self.set_state(LifecycleState::Redundant);
                Err(e)
            },
        }
    }

    async fn precache(&self) -> Result<usize, WorkerError> {
        let namespace = &self.config.static_cache_name;
        self.caches.open(namespace).await?;

        let fetches = self.config.static_assets.iter().map(|asset| async move {
            let request = WorkerRequest::get(asset.parse::<Uri>()?);
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|source| WorkerError::Install { asset: asset.clone(), source })?;

            if !response.is_success() {
                return Err(WorkerError::InstallStatus {
                    asset: asset.clone(),
                    status: response.status,
                });
            }

            Ok::<_, WorkerError>((
                CacheKey::for_url(asset),
                CachedResponse::from_response(&response)?,
            ))
        });

        let entries = futures::future::try_join_all(fetches).await?;
        let count = entries.len();
        self.caches.put_all(namespace, entries).await?;

        Ok(count)
    }

    /// Deletes every namespace that isn't current and claims the clients.
    /// Returns the evicted namespaces
    #[instrument(skip(self))]
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        let state = self.state();
        if state == LifecycleState::Redundant {
            return Err(WorkerError::InvalidState(state));
        }
        self.set_state(LifecycleState::Activating);

        let mut evicted = Vec::new();
        for name in self.caches.namespaces().await? {
            if self.config.is_current_cache(&name) {
                continue;
            }
            if self.caches.delete_namespace(&name).await? {
                info!("Evicted stale cache {name}");
                evicted.push(name);
            }
        }

        self.set_state(LifecycleState::Activated);
        self.claim();

        Ok(evicted)
    }

    /// Activates a waiting worker now. Before install it only marks the
    /// worker so activation follows install
    pub async fn skip_waiting(&self) -> Result<(), WorkerError> {
        let waiting = {
            let mut lifecycle = self.lifecycle();
            lifecycle.skip_waiting = true;
            lifecycle.state == LifecycleState::Installed
        };

        if waiting {
            self.activate().await?;
        }

        Ok(())
    }

    /// Take control of requests without waiting for a reload
    pub fn claim(&self) {
        let mut lifecycle = self.lifecycle();
        if !lifecycle.controls_clients {
            info!("Claimed clients");
        }
        lifecycle.controls_clients = true;
    }
}
