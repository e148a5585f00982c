//! The single path through which a plug's relay is switched.

use std::sync::Arc;

use domain::models::Plug;
use domain::services::{PlugRegistry, StoreError, TelemetryClient, TelemetryError, ToggleOutcome};
use thiserror::Error;
use tracing::info;

/// Who asked for the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOrigin {
    User,
    AutoShutdown,
}

impl ToggleOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            ToggleOrigin::User => "user",
            ToggleOrigin::AutoShutdown => "auto_shutdown",
        }
    }
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Plug {0} is protected against remote toggling")]
    Protected(i64),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The device was toggled but its new state could not be recorded.
    #[error("Plug toggled but state not persisted: {0}")]
    Store(#[from] StoreError),
}

/// Toggles plugs and records the commanded state.
pub struct PlugControlService {
    registry: Arc<dyn PlugRegistry>,
    client: Arc<dyn TelemetryClient>,
}

impl PlugControlService {
    pub fn new(registry: Arc<dyn PlugRegistry>, client: Arc<dyn TelemetryClient>) -> Self {
        Self { registry, client }
    }

    /// Flip the plug's relay and persist the resulting on/off state.
    ///
    /// User toggles of protected plugs are refused without contacting the
    /// device. Auto-shutdown is governed by the plug's threshold alone.
    pub async fn toggle(
        &self,
        plug: &Plug,
        origin: ToggleOrigin,
    ) -> Result<ToggleOutcome, ControlError> {
        if origin == ToggleOrigin::User && plug.protected {
            return Err(ControlError::Protected(plug.id));
        }

        let outcome = self.client.toggle(&plug.url).await?;
        self.registry
            .set_plug_state(plug.id, outcome.is_on_now())
            .await?;

        info!(
            plug_id = plug.id,
            plug_name = %plug.name,
            origin = origin.as_str(),
            is_on = outcome.is_on_now(),
            "Plug toggled"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::services::{InMemoryStore, MockTelemetryClient, StoreOp};

    const URL: &str = "http://plug.local";

    fn setup(client: MockTelemetryClient) -> (Arc<InMemoryStore>, Arc<MockTelemetryClient>, PlugControlService) {
        let store = Arc::new(InMemoryStore::new());
        let client = Arc::new(client);
        let service = PlugControlService::new(store.clone(), client.clone());
        (store, client, service)
    }

    #[tokio::test]
    async fn test_toggle_persists_new_state() {
        let (store, client, service) = setup(MockTelemetryClient::new().with_toggle(
            URL,
            Ok(ToggleOutcome {
                was_on_before_toggle: true,
            }),
        ));
        let plug = store.add_plug("Heater", URL, true, Some(5.0));

        let outcome = service.toggle(&plug, ToggleOrigin::User).await.unwrap();

        assert!(!outcome.is_on_now());
        assert!(!store.plug(plug.id).unwrap().is_on);
        assert_eq!(client.toggle_calls(), vec![URL.to_string()]);
    }

    #[tokio::test]
    async fn test_user_toggle_of_protected_plug_is_refused() {
        let (store, client, service) = setup(MockTelemetryClient::new());
        let plug = store.add_plug("Fridge", URL, true, None);
        store.protect_plug(plug.id);
        let plug = store.plug(plug.id).unwrap();

        let err = service.toggle(&plug, ToggleOrigin::User).await.unwrap_err();

        assert!(matches!(err, ControlError::Protected(id) if id == plug.id));
        assert!(client.toggle_calls().is_empty());
        assert!(store.plug(plug.id).unwrap().is_on);
    }

    #[tokio::test]
    async fn test_auto_shutdown_ignores_protection() {
        let (store, client, service) = setup(MockTelemetryClient::new());
        let plug = store.add_plug("Fridge", URL, true, Some(1.0));
        store.protect_plug(plug.id);
        let plug = store.plug(plug.id).unwrap();

        service
            .toggle(&plug, ToggleOrigin::AutoShutdown)
            .await
            .unwrap();

        assert_eq!(client.toggle_calls().len(), 1);
        assert!(!store.plug(plug.id).unwrap().is_on);
    }

    #[tokio::test]
    async fn test_device_failure_leaves_state_untouched() {
        let (store, _client, service) = setup(
            MockTelemetryClient::new().with_toggle(URL, Err(TelemetryError::Timeout)),
        );
        let plug = store.add_plug("Lamp", URL, true, None);

        let err = service.toggle(&plug, ToggleOrigin::User).await.unwrap_err();

        assert!(matches!(err, ControlError::Telemetry(TelemetryError::Timeout)));
        assert_eq!(store.call_count(StoreOp::SetPlugState), 0);
        assert!(store.plug(plug.id).unwrap().is_on);
    }

    #[tokio::test]
    async fn test_store_failure_after_toggle_is_reported() {
        let (store, client, service) = setup(MockTelemetryClient::new());
        let plug = store.add_plug("Lamp", URL, true, None);
        store.fail(StoreOp::SetPlugState);

        let err = service.toggle(&plug, ToggleOrigin::User).await.unwrap_err();

        assert!(matches!(err, ControlError::Store(_)));
        assert_eq!(client.toggle_calls().len(), 1);
    }
}
