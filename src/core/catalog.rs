//! Background catalog operations that report through the event channel.
//!
//! Every mutation (pull or delete) is followed by a fresh listing so the
//! presentation layer never shows a stale inventory.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::models::{self, ModelDescriptor};
use crate::core::config::ConnectionConfig;
use crate::core::error::OperationError;
use crate::core::events::{CoreEvent, EventSink};
use crate::core::transport::Transport;

#[derive(Clone, Debug)]
pub struct ModelCatalog {
    transport: Transport,
    events: EventSink,
}

impl ModelCatalog {
    pub fn new(transport: Transport, events: EventSink) -> Self {
        Self { transport, events }
    }

    /// List models without posting any event.
    pub async fn list(
        &self,
        connection: &ConnectionConfig,
    ) -> Result<Vec<ModelDescriptor>, OperationError> {
        models::list_models(&self.transport, connection).await
    }

    pub async fn check_connection(&self, connection: &ConnectionConfig) -> bool {
        models::check_connection(&self.transport, connection).await
    }

    /// Re-fetch the inventory and post `CatalogUpdated` or `CatalogError`.
    pub fn refresh(
        &self,
        connection: &ConnectionConfig,
    ) -> JoinHandle<Result<Vec<ModelDescriptor>, OperationError>> {
        let catalog = self.clone();
        let connection = connection.clone();
        tokio::spawn(async move { catalog.refresh_now(&connection).await })
    }

    /// Download `name`, posting each progress report, then `PullFinished`,
    /// then the refreshed inventory.
    pub fn pull(
        &self,
        connection: &ConnectionConfig,
        name: &str,
        insecure: bool,
    ) -> JoinHandle<Result<(), OperationError>> {
        let catalog = self.clone();
        let connection = connection.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            info!(model = %name, insecure, "Pulling model");
            let result = catalog.run_pull(&connection, &name, insecure).await;
            match &result {
                Ok(()) => info!(model = %name, "Pull finished"),
                Err(err) => warn!(model = %name, error_kind = err.kind(), error = %err, "Pull failed"),
            }
            catalog.events.post(CoreEvent::PullFinished(result.clone()));
            let _ = catalog.refresh_now(&connection).await;
            result
        })
    }

    /// Delete `name`, post `DeleteFinished`, then the refreshed inventory.
    pub fn delete(
        &self,
        connection: &ConnectionConfig,
        name: &str,
    ) -> JoinHandle<Result<(), OperationError>> {
        let catalog = self.clone();
        let connection = connection.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let result = models::delete_model(&catalog.transport, &connection, &name).await;
            match &result {
                Ok(()) => info!(model = %name, "Model deleted"),
                Err(err) => warn!(model = %name, error_kind = err.kind(), error = %err, "Delete failed"),
            }
            catalog.events.post(CoreEvent::DeleteFinished(result.clone()));
            let _ = catalog.refresh_now(&connection).await;
            result
        })
    }

    async fn run_pull(
        &self,
        connection: &ConnectionConfig,
        name: &str,
        insecure: bool,
    ) -> Result<(), OperationError> {
        let mut stream = models::pull_model(&self.transport, connection, name, insecure).await?;
        while let Some(event) = stream.next_event().await {
            let event = event?;
            debug!(progress = %event, "Pull progress");
            self.events.post(CoreEvent::PullProgress(event));
        }
        Ok(())
    }

    async fn refresh_now(
        &self,
        connection: &ConnectionConfig,
    ) -> Result<Vec<ModelDescriptor>, OperationError> {
        let result = self.list(connection).await;
        match &result {
            Ok(models) => {
                self.events.post(CoreEvent::CatalogUpdated(models.clone()));
            }
            Err(err) => {
                debug!(error_kind = err.kind(), "Catalog refresh failed");
                self.events.post(CoreEvent::CatalogError(err.clone()));
            }
        }
        result
    }
}
