// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event publishing.
//!
//! Sync errors are surfaced as `Warning` events on the `CSIDriverDeployment`
//! so that `kubectl describe` shows them next to the conditions. Publishing is
//! fire-and-forget: a failed event is logged and never fails a reconcile.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Event reason of a failed sync step
pub const REASON_SYNC_ERROR: &str = "SyncError";

/// Event action of the reconcile loop
pub const ACTION_RECONCILE: &str = "Reconcile";

/// Publishes events about a reconciled object.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a `Warning` event on `object`.
    async fn publish_warning(&self, object: &ObjectReference, reason: &str, message: &str);
}

/// Production publisher wrapping [`kube::runtime::events::Recorder`].
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher that reports as `controller_name`.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish_warning(&self, object: &ObjectReference, reason: &str, message: &str) {
        let event = Event {
            type_: EventType::Warning,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: ACTION_RECONCILE.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object).await {
            warn!(reason, error = %e, "Failed to publish Kubernetes event");
        }
    }
}
