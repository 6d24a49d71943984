use shared::model::{ControlMessage, ControlReply};
use tracing::{info, instrument};

use crate::{
    error::{CacheError, WorkerError},
    worker::ServiceWorker,
};

impl ServiceWorker {
    /// Handles a message from the hosting page. `None` means nothing is
    /// posted back
    #[instrument(skip(self))]
    pub async fn handle_message(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ControlReply>, WorkerError> {
        match message {
            ControlMessage::SkipWaiting => {
                info!("worker_message got SKIP_WAITING");
                self.skip_waiting().await?;
                Ok(None)
            },
            ControlMessage::GetCacheSize => {
                let size = self.cache_size().await?;
                Ok(Some(ControlReply::CacheSize(size)))
            },
            ControlMessage::ClearCache => {
                let cleared = self.clear_caches().await?;
                info!("Cleared {cleared} caches");
                Ok(Some(ControlReply::CacheCleared))
            },
            ControlMessage::Unknown(raw) => {
                info!("worker_message got unexpected message: {raw}");
                Ok(None)
            },
        }
    }

    /// Bytes stored across every namespace
    pub async fn cache_size(&self) -> Result<u64, CacheError> {
        let mut total = 0;
        for name in self.caches.namespaces().await? {
            total += self.caches.namespace_size(&name).await?;
        }
        Ok(total)
    }

    /// Deletes every namespace, current ones included
    pub async fn clear_caches(&self) -> Result<usize, CacheError> {
        let mut cleared = 0;
        for name in self.caches.namespaces().await? {
            if self.caches.delete_namespace(&name).await? {
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}
