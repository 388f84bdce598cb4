// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use csi_operator::crd::{
    CSIDriverDeployment, CSIDriverDeploymentSpec, ManagementState, NodeUpdateStrategy,
    StorageClassTemplate,
};
use k8s_openapi::api::core::v1::{Container, Namespace, PodSpec, PodTemplateSpec};
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::client::Client;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

pub const DRIVER_NAME: &str = "csi.ovirt.org";
pub const DRIVER_SOCKET: &str = "/var/lib/csi/sockets/pluginproxy/csi.sock";

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([
                ("test".to_string(), "integration".to_string()),
                ("managed-by".to_string(), "csi-operator-test".to_string()),
            ])),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Pod template running a single container named `container`
pub fn driver_template(container: &str) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(BTreeMap::from([("app".to_string(), container.to_string())])),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: container.to_string(),
                image: Some(format!("quay.io/ovirt/{container}:latest")),
                ..Default::default()
            }],
            ..Default::default()
        }),
    }
}

pub fn storage_class_template(name: &str, default: Option<bool>) -> StorageClassTemplate {
    StorageClassTemplate {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        default,
        parameters: Some(BTreeMap::from([(
            "storageDomainName".to_string(),
            "data".to_string(),
        )])),
        ..Default::default()
    }
}

/// A valid `CSIDriverDeployment` with node and controller templates and one storage class
pub fn sample_deployment(namespace: &str, name: &str) -> CSIDriverDeployment {
    let mut cr = CSIDriverDeployment::new(
        name,
        CSIDriverDeploymentSpec {
            management_state: ManagementState::Managed,
            driver_name: DRIVER_NAME.to_string(),
            driver_per_node_template: driver_template("node-driver"),
            driver_controller_template: Some(driver_template("controller-driver")),
            driver_socket: DRIVER_SOCKET.to_string(),
            node_update_strategy: NodeUpdateStrategy::Rolling,
            probe_period_seconds: None,
            probe_timeout_seconds: None,
            storage_class_templates: vec![storage_class_template(
                &format!("{name}-sc"),
                Some(false),
            )],
            container_images: None,
        },
    );
    cr.metadata.namespace = Some(namespace.to_string());
    cr
}

/// Poll `check` every second until it returns true or `timeout` elapses
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        sleep(Duration::from_secs(1)).await;
    }
    false
}
