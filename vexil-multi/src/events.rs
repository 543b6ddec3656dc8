//! Child event fan-in
//!
//! One loop per child that exposes an event channel. Configuration changes
//! are forwarded as `<facade>/<child>`; ready, stale and error events update
//! the child's status and publish a facade event when the aggregate changes.

use crate::hooks::panic_message;
use crate::provider::FacadeState;
use crate::registry::RegisteredProvider;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};
use vexil_core::{
    CancellationToken, ErrorType, EventChannel, ProviderEvent, ProviderEventType, ProviderStatus,
};

/// Spawn a loop for every child with an event channel
pub(crate) fn spawn_event_loops(
    state: &Arc<FacadeState>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    state
        .registry
        .iter()
        .filter_map(|child| {
            let channel = child.provider().event_channel()?;
            debug!(provider = %child.name(), "Subscribing to provider events");
            Some(tokio::spawn(run_event_loop(
                state.clone(),
                child.clone(),
                channel,
                cancel.clone(),
            )))
        })
        .collect()
}

async fn run_event_loop(
    state: Arc<FacadeState>,
    child: Arc<RegisteredProvider>,
    channel: EventChannel,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = channel.recv() => event,
        };

        let Some(event) = event else {
            debug!(provider = %child.name(), "Provider event channel closed");
            break;
        };

        trace!(provider = %child.name(), event_type = %event.event_type, "Received provider event");

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handle_event(&state, &child, event))) {
            let message = panic_message(panic.as_ref());
            error!(provider = %child.name(), error = %message, "Failed to process provider event");
            publish(
                &state,
                ProviderEvent::error(state.name.clone(), ErrorType::General).with_message(format!(
                    "failed to process event from '{}': {}",
                    child.name(),
                    message
                )),
            );
        }
    }

    trace!(provider = %child.name(), "Event loop stopped");
}

fn handle_event(state: &FacadeState, child: &RegisteredProvider, event: ProviderEvent) {
    let child_status = match event.event_type {
        ProviderEventType::ConfigurationChanged => {
            let mut forwarded = event;
            forwarded.provider_name = format!("{}/{}", state.name, child.name());
            publish(state, forwarded);
            return;
        }
        ProviderEventType::Ready => ProviderStatus::Ready,
        ProviderEventType::Stale => ProviderStatus::Stale,
        ProviderEventType::Error if event.error_type == Some(ErrorType::ProviderFatal) => {
            ProviderStatus::Fatal
        }
        ProviderEventType::Error => ProviderStatus::Error,
    };

    let Some(change) = state
        .status
        .update_child(&state.registry, child.name(), child_status)
    else {
        return;
    };

    let reason = format!("provider '{}' is now {}", child.name(), child_status);
    let facade_event = match change.current {
        ProviderStatus::Ready => ProviderEvent::ready(state.name.clone()),
        ProviderStatus::Stale => ProviderEvent::stale(state.name.clone()),
        ProviderStatus::Fatal => ProviderEvent::error(state.name.clone(), ErrorType::ProviderFatal),
        ProviderStatus::Error => ProviderEvent::error(
            state.name.clone(),
            event.error_type.unwrap_or(ErrorType::General),
        ),
        ProviderStatus::NotReady => return,
    };

    debug!(status = %change.current, "Publishing facade status change");
    publish(state, facade_event.with_message(reason));
}

/// Send on the facade channel; false if the event was dropped
fn publish(state: &FacadeState, event: ProviderEvent) -> bool {
    let event_type = event.event_type;
    let sent = state.events.send(event);
    if !sent {
        trace!(name = %state.name, %event_type, "Facade event channel closed, event dropped");
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ProviderEntry, ProviderRegistry};
    use std::time::Duration;
    use vexil_core::FeatureProvider;
    use vexil_testing::MockProvider;

    fn state(providers: Vec<Arc<MockProvider>>) -> Arc<FacadeState> {
        let registry = ProviderRegistry::build(
            providers
                .into_iter()
                .map(|p| ProviderEntry::new(p as Arc<dyn FeatureProvider>))
                .collect(),
        )
        .unwrap();
        Arc::new(FacadeState::new("Multi", registry))
    }

    async fn next_event(channel: &EventChannel) -> ProviderEvent {
        tokio::time::timeout(Duration::from_secs(1), channel.recv())
            .await
            .expect("event expected")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_configuration_changed_is_forwarded() {
        let child = Arc::new(MockProvider::new("flagd"));
        let state = state(vec![child.clone()]);
        let cancel = CancellationToken::new();
        let handles = spawn_event_loops(&state, &cancel);

        child.emit(ProviderEvent::configuration_changed(
            "flagd",
            vec!["new-ui".to_string()],
        ));

        let event = next_event(&state.events).await;
        assert_eq!(event.provider_name, "Multi/flagd");
        assert_eq!(event.event_type, ProviderEventType::ConfigurationChanged);
        assert_eq!(event.flags_changed, vec!["new-ui"]);

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_status_events_published_on_change_only() {
        let a = Arc::new(MockProvider::new("a"));
        let b = Arc::new(MockProvider::new("b"));
        let state = state(vec![a.clone(), b.clone()]);
        let cancel = CancellationToken::new();
        let _handles = spawn_event_loops(&state, &cancel);

        // aggregate turns Ready once both children are
        a.emit(ProviderEvent::ready("a"));
        b.emit(ProviderEvent::ready("b"));

        let event = next_event(&state.events).await;
        assert_eq!(event.event_type, ProviderEventType::Ready);
        assert_eq!(event.provider_name, "Multi");

        a.emit(ProviderEvent::stale("a"));
        let event = next_event(&state.events).await;
        assert_eq!(event.event_type, ProviderEventType::Stale);

        b.emit(ProviderEvent::error("b", ErrorType::ProviderFatal));
        let event = next_event(&state.events).await;
        assert_eq!(event.event_type, ProviderEventType::Error);
        assert_eq!(event.error_type, Some(ErrorType::ProviderFatal));
        assert_eq!(state.registry.get("b").unwrap().status(), ProviderStatus::Fatal);

        cancel.cancel();
    }

    #[tokio::test]
    async fn test_loops_stop_on_cancel() {
        let a = Arc::new(MockProvider::new("a"));
        let state = state(vec![a.clone()]);
        let cancel = CancellationToken::new();
        let handles = spawn_event_loops(&state, &cancel);

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        a.emit(ProviderEvent::configuration_changed("a", Vec::new()));
        tokio::task::yield_now().await;
        assert!(state.events.try_recv().is_none());
    }

    #[test]
    fn test_publish_reports_delivery() {
        let state = state(vec![Arc::new(MockProvider::new("a"))]);

        assert!(publish(&state, ProviderEvent::stale("Multi")));
        let event = state.events.try_recv().unwrap();
        assert_eq!(event.event_type, ProviderEventType::Stale);
    }
}
