// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object generators: the desired child objects of a `CSIDriverDeployment`.
//!
//! Every function in this module is pure. Given the same resource and the same
//! [`OperatorConfig`] it returns the same object, field for field, which is what
//! lets the applier decide that nothing changed.
//!
//! # Socket layout
//!
//! The driver container listens on `spec.driverSocket`, e.g. `/var/lib/csi/csi.sock`.
//! The directory part of that path is the mount point of the `csi-driver` volume in
//! the driver container. Sidecars mount the same volume at `/csi`, so they reach the
//! socket as `/csi/csi.sock`. On nodes the volume is the host directory
//! `<kubeletRoot>/plugins/<sanitized driver name>`, which is also where kubelet
//! finds the socket after registration.

use crate::config::OperatorConfig;
use crate::constants::{
    ATTACHER_CONTAINER_NAME, CLOUD_CREDENTIALS_SECRET_SUFFIX,
    CLUSTER_ROLE_BINDING_PREFIX, CREDENTIALS_REQUEST_SUFFIX, DAEMONSET_SUFFIX,
    DEFAULT_PROBE_TIMEOUT_SECONDS, DEFAULT_STORAGE_CLASS_ANNOTATION, DEPLOYMENT_SUFFIX,
    DRIVER_SOCKET_MOUNT_PATH, DRIVER_SOCKET_VOLUME, ENV_ADDRESS, ENV_DRIVER_REG_SOCK_PATH,
    ENV_KUBE_NODE_NAME, KUBELET_ROOT_VOLUME, LEADER_ELECTION_ROLE_BINDING_PREFIX,
    LIVENESS_PROBE_CONTAINER_NAME, LIVENESS_PROBE_FAILURE_THRESHOLD, LIVENESS_PROBE_PATH,
    LIVENESS_PROBE_PORT, LIVENESS_PROBE_PORT_NAME, PROVISIONER_CONTAINER_NAME, RBAC_API_GROUP,
    REGISTRAR_CONTAINER_NAME, REGISTRATION_MOUNT_PATH, REGISTRATION_VOLUME,
    SIDECAR_CSI_ADDRESS_ARG, SIDECAR_LOG_LEVEL_ARG,
};
use crate::crd::{CSIDriverDeployment, NodeUpdateStrategy, StorageClassTemplate};
use crate::labels::{owner_labels, DAEMONSET_LABEL, DEPLOYMENT_LABEL};
use crate::openshift::{ClusterOperator, ClusterOperatorSpec, CredentialsRequest, CredentialsRequestSpec};
use k8s_openapi::api::apps::v1::{
    DaemonSet, DaemonSetSpec, DaemonSetUpdateStrategy, Deployment, DeploymentSpec,
    DeploymentStrategy,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource, HTTPGetAction,
    HostPathVolumeSource, ObjectFieldSelector, ObjectReference, PodTemplateSpec, Probe,
    ServiceAccount, Volume, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, RoleBinding, RoleRef, Subject,
};
use k8s_openapi::api::storage::v1::{CSIDriver, CSIDriverSpec, StorageClass};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Characters that are not safe in a directory name.
static UNSAFE_DRIVER_NAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9.-]").expect("static regex is valid")
});

// ============================================================================
// Names
// ============================================================================

/// Replace every character of `driver` that is unsafe in a path with `-`.
#[must_use]
pub fn sanitize_driver_name(driver: &str) -> String {
    UNSAFE_DRIVER_NAME_CHARS.replace_all(driver, "-").into_owned()
}

/// Split a socket path into its directory and file name.
///
/// A bare file name yields the directory `.`. Validation only admits absolute
/// socket paths, so generated workloads never mount a relative directory.
#[must_use]
pub fn driver_socket_parts(socket: &str) -> (String, String) {
    let path = Path::new(socket);
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = match path.parent().map(|p| p.to_string_lossy().into_owned()) {
        Some(dir) if !dir.is_empty() => dir,
        Some(_) => ".".to_string(),
        None => "/".to_string(),
    };
    (dir, file)
}

fn join_path(dir: &str, file: &str) -> String {
    Path::new(dir).join(file).to_string_lossy().into_owned()
}

fn namespace_of(cr: &CSIDriverDeployment) -> String {
    cr.namespace().unwrap_or_default()
}

#[must_use]
pub fn service_account_name(cr: &CSIDriverDeployment) -> String {
    cr.name_any()
}

/// Cluster-wide unique name derived from the resource uid.
#[must_use]
pub fn cluster_role_binding_name(cr: &CSIDriverDeployment) -> String {
    format!(
        "{CLUSTER_ROLE_BINDING_PREFIX}{}",
        cr.metadata.uid.as_deref().unwrap_or_default()
    )
}

#[must_use]
pub fn leader_election_role_binding_name(cr: &CSIDriverDeployment) -> String {
    format!("{LEADER_ELECTION_ROLE_BINDING_PREFIX}{}", cr.name_any())
}

#[must_use]
pub fn daemon_set_name(cr: &CSIDriverDeployment) -> String {
    format!("{}{DAEMONSET_SUFFIX}", cr.name_any())
}

#[must_use]
pub fn deployment_name(cr: &CSIDriverDeployment) -> String {
    format!("{}{DEPLOYMENT_SUFFIX}", cr.name_any())
}

#[must_use]
pub fn credentials_request_name(cr: &CSIDriverDeployment) -> String {
    format!("{}{CREDENTIALS_REQUEST_SUFFIX}", cr.name_any())
}

// ============================================================================
// Ownership
// ============================================================================

/// Controller owner reference pointing at `cr`.
#[must_use]
pub fn build_owner_reference(cr: &CSIDriverDeployment) -> OwnerReference {
    OwnerReference {
        api_version: CSIDriverDeployment::api_version(&()).to_string(),
        kind: CSIDriverDeployment::kind(&()).to_string(),
        name: cr.name_any(),
        uid: cr.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Metadata of a cluster-scoped child: owner labels only.
fn cluster_meta(cr: &CSIDriverDeployment, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        labels: Some(owner_labels(&namespace_of(cr), &cr.name_any())),
        ..Default::default()
    }
}

/// Metadata of a namespaced child: owner labels and a controller reference.
fn namespaced_meta(cr: &CSIDriverDeployment, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace_of(cr)),
        labels: Some(owner_labels(&namespace_of(cr), &cr.name_any())),
        owner_references: Some(vec![build_owner_reference(cr)]),
        ..Default::default()
    }
}

// ============================================================================
// Images
// ============================================================================

/// Sidecar images after applying the per-resource overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedImages {
    pub attacher: String,
    pub provisioner: String,
    pub driver_registrar: String,
    pub liveness_probe: String,
}

#[must_use]
pub fn resolve_images(cr: &CSIDriverDeployment, config: &OperatorConfig) -> ResolvedImages {
    let overrides = cr.spec.container_images.clone().unwrap_or_default();
    let defaults = &config.default_images;
    ResolvedImages {
        attacher: overrides
            .attacher_image
            .unwrap_or_else(|| defaults.attacher_image.clone()),
        provisioner: overrides
            .provisioner_image
            .unwrap_or_else(|| defaults.provisioner_image.clone()),
        driver_registrar: overrides
            .driver_registrar_image
            .unwrap_or_else(|| defaults.driver_registrar_image.clone()),
        liveness_probe: overrides
            .liveness_probe_image
            .unwrap_or_else(|| defaults.liveness_probe_image.clone()),
    }
}

// ============================================================================
// Identity and RBAC
// ============================================================================

#[must_use]
pub fn generate_service_account(cr: &CSIDriverDeployment) -> ServiceAccount {
    ServiceAccount {
        metadata: namespaced_meta(cr, service_account_name(cr)),
        ..Default::default()
    }
}

fn service_account_subject(service_account: &ServiceAccount) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: service_account.name_any(),
        namespace: service_account.namespace(),
        ..Default::default()
    }
}

fn cluster_role_ref(name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: "ClusterRole".to_string(),
        name: name.to_string(),
    }
}

fn policy_rule(api_group: &str, resources: &[&str], verbs: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(resources.iter().map(|r| (*r).to_string()).collect()),
        verbs: verbs.iter().map(|v| (*v).to_string()).collect(),
        ..Default::default()
    }
}

const READ: &[&str] = &["get", "list", "watch"];

/// Role of the driver and its sidecars on every node and in the controller.
///
/// Shared by all `CSIDriverDeployment`s of the operator, so it carries no owner
/// labels and outlives each of them.
#[must_use]
pub fn generate_cluster_role(config: &OperatorConfig) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(config.cluster_role_name.clone()),
            ..Default::default()
        },
        rules: Some(vec![
            policy_rule(
                "",
                &["persistentvolumes"],
                &["get", "list", "watch", "create", "delete", "update", "patch"],
            ),
            policy_rule("", &["persistentvolumeclaims"], &["get", "list", "watch", "update"]),
            policy_rule("", &["persistentvolumeclaims/status"], &["update", "patch"]),
            policy_rule("", &["nodes"], READ),
            policy_rule("", &["secrets"], &["get", "list"]),
            policy_rule("", &["events"], &["get", "list", "watch", "create", "update", "patch"]),
            policy_rule("storage.k8s.io", &["storageclasses", "csinodes"], READ),
            policy_rule(
                "storage.k8s.io",
                &["volumeattachments"],
                &["get", "list", "watch", "update", "patch"],
            ),
        ]),
        ..Default::default()
    }
}

/// Role the attacher and provisioner need to elect a leader in their namespace.
#[must_use]
pub fn generate_leader_election_cluster_role(config: &OperatorConfig) -> ClusterRole {
    let verbs = &["get", "list", "watch", "create", "update", "patch", "delete"];
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(config.leader_election_cluster_role_name.clone()),
            ..Default::default()
        },
        rules: Some(vec![
            policy_rule("", &["configmaps", "endpoints"], verbs),
            policy_rule("coordination.k8s.io", &["leases"], verbs),
        ]),
        ..Default::default()
    }
}

/// Binds `service_account` to the configured driver `ClusterRole`.
#[must_use]
pub fn generate_cluster_role_binding(
    cr: &CSIDriverDeployment,
    config: &OperatorConfig,
    service_account: &ServiceAccount,
) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: cluster_meta(cr, cluster_role_binding_name(cr)),
        subjects: Some(vec![service_account_subject(service_account)]),
        role_ref: cluster_role_ref(&config.cluster_role_name),
    }
}

/// Binds `service_account` to the leader election `ClusterRole` inside the resource namespace.
#[must_use]
pub fn generate_role_binding(
    cr: &CSIDriverDeployment,
    config: &OperatorConfig,
    service_account: &ServiceAccount,
) -> RoleBinding {
    RoleBinding {
        metadata: namespaced_meta(cr, leader_election_role_binding_name(cr)),
        subjects: Some(vec![service_account_subject(service_account)]),
        role_ref: cluster_role_ref(&config.leader_election_cluster_role_name),
    }
}

// ============================================================================
// Workloads
// ============================================================================

fn address_env(socket_path: &str) -> EnvVar {
    EnvVar {
        name: ENV_ADDRESS.to_string(),
        value: Some(socket_path.to_string()),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn host_path_volume(name: &str, path: &str, type_: &str) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            type_: Some(type_.to_string()),
        }),
        ..Default::default()
    }
}

/// Sidecar talking to the driver through the shared socket volume.
fn sidecar(name: &str, image: &str, args: Vec<String>, socket_path: &str) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        args: Some(args),
        env: Some(vec![address_env(socket_path)]),
        volume_mounts: Some(vec![mount(DRIVER_SOCKET_VOLUME, DRIVER_SOCKET_MOUNT_PATH)]),
        ..Default::default()
    }
}

fn base_args() -> Vec<String> {
    vec![
        SIDECAR_LOG_LEVEL_ARG.to_string(),
        SIDECAR_CSI_ADDRESS_ARG.to_string(),
    ]
}

/// Copy a pod template, merging `selector` into its labels and defaulting the
/// service account.
fn prepare_template(
    template: &PodTemplateSpec,
    selector: &BTreeMap<String, String>,
    service_account: &str,
) -> PodTemplateSpec {
    let mut template = template.clone();
    let metadata = template.metadata.get_or_insert_with(ObjectMeta::default);
    metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(selector.clone());

    let spec = template.spec.get_or_insert_with(Default::default);
    if spec.service_account_name.as_deref().unwrap_or_default().is_empty() {
        spec.service_account_name = Some(service_account.to_string());
    }
    template
}

/// Append sidecars, copying the security context of the driver container.
fn push_sidecars(template: &mut PodTemplateSpec, sidecars: Vec<Container>) {
    let Some(spec) = template.spec.as_mut() else {
        return;
    };
    let security_context = spec
        .containers
        .first()
        .and_then(|driver| driver.security_context.clone());
    for mut container in sidecars {
        container.security_context.clone_from(&security_context);
        spec.containers.push(container);
    }
}

fn push_driver_mounts(template: &mut PodTemplateSpec, mounts: Vec<VolumeMount>) {
    if let Some(driver) = template
        .spec
        .as_mut()
        .and_then(|spec| spec.containers.first_mut())
    {
        driver.volume_mounts.get_or_insert_with(Vec::new).extend(mounts);
    }
}

fn push_volumes(template: &mut PodTemplateSpec, volumes: Vec<Volume>) {
    if let Some(spec) = template.spec.as_mut() {
        spec.volumes.get_or_insert_with(Vec::new).extend(volumes);
    }
}

/// Add a liveness probe to the driver container and the sidecar serving it.
///
/// Does nothing unless `probePeriodSeconds` is set.
pub fn add_liveness_probe(
    cr: &CSIDriverDeployment,
    images: &ResolvedImages,
    template: &mut PodTemplateSpec,
    socket_path: &str,
) {
    let Some(period) = cr.spec.probe_period_seconds else {
        return;
    };
    let timeout = cr
        .spec
        .probe_timeout_seconds
        .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECONDS);

    let Some(driver) = template
        .spec
        .as_mut()
        .and_then(|spec| spec.containers.first_mut())
    else {
        return;
    };
    driver.ports.get_or_insert_with(Vec::new).push(ContainerPort {
        name: Some(LIVENESS_PROBE_PORT_NAME.to_string()),
        protocol: Some("TCP".to_string()),
        container_port: LIVENESS_PROBE_PORT,
        ..Default::default()
    });
    driver.liveness_probe = Some(Probe {
        failure_threshold: Some(LIVENESS_PROBE_FAILURE_THRESHOLD),
        initial_delay_seconds: Some(period),
        timeout_seconds: Some(timeout),
        period_seconds: Some(period),
        http_get: Some(HTTPGetAction {
            path: Some(LIVENESS_PROBE_PATH.to_string()),
            port: IntOrString::String(LIVENESS_PROBE_PORT_NAME.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    });

    let mut probe = sidecar(
        LIVENESS_PROBE_CONTAINER_NAME,
        &images.liveness_probe,
        base_args(),
        socket_path,
    );
    probe.image_pull_policy = Some("IfNotPresent".to_string());
    push_sidecars(template, vec![probe]);
}

/// Node plugin `DaemonSet`: the node template plus the registrar sidecar.
#[must_use]
pub fn generate_daemon_set(
    cr: &CSIDriverDeployment,
    config: &OperatorConfig,
    service_account: &ServiceAccount,
) -> DaemonSet {
    let name = daemon_set_name(cr);
    let selector = BTreeMap::from([(DAEMONSET_LABEL.to_string(), name.clone())]);
    let images = resolve_images(cr, config);

    let (socket_dir, socket_file) = driver_socket_parts(&cr.spec.driver_socket);
    let sidecar_socket = join_path(DRIVER_SOCKET_MOUNT_PATH, &socket_file);
    let kubelet_root = config.kubelet_root_dir.as_str();
    let registration_dir = join_path(kubelet_root, "plugins");
    let kubelet_socket_dir = join_path(&registration_dir, &sanitize_driver_name(&cr.spec.driver_name));
    let kubelet_socket = join_path(&kubelet_socket_dir, &socket_file);

    let mut template = prepare_template(
        &cr.spec.driver_per_node_template,
        &selector,
        &service_account.name_any(),
    );

    let mut args = base_args();
    args.push("--kubelet-registration-path=$(DRIVER_REG_SOCK_PATH)".to_string());
    let mut registrar = sidecar(
        REGISTRAR_CONTAINER_NAME,
        &images.driver_registrar,
        args,
        &sidecar_socket,
    );
    registrar.env.get_or_insert_with(Vec::new).extend([
        EnvVar {
            name: ENV_DRIVER_REG_SOCK_PATH.to_string(),
            value: Some(kubelet_socket),
            ..Default::default()
        },
        EnvVar {
            name: ENV_KUBE_NODE_NAME.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "spec.nodeName".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]);
    registrar
        .volume_mounts
        .get_or_insert_with(Vec::new)
        .push(mount(REGISTRATION_VOLUME, REGISTRATION_MOUNT_PATH));
    push_sidecars(&mut template, vec![registrar]);

    add_liveness_probe(cr, &images, &mut template, &sidecar_socket);

    push_volumes(
        &mut template,
        vec![
            host_path_volume(REGISTRATION_VOLUME, &registration_dir, "Directory"),
            host_path_volume(DRIVER_SOCKET_VOLUME, &kubelet_socket_dir, "DirectoryOrCreate"),
            host_path_volume(KUBELET_ROOT_VOLUME, kubelet_root, "Directory"),
        ],
    );
    push_driver_mounts(
        &mut template,
        vec![
            mount(DRIVER_SOCKET_VOLUME, &socket_dir),
            VolumeMount {
                mount_propagation: Some("Bidirectional".to_string()),
                ..mount(KUBELET_ROOT_VOLUME, kubelet_root)
            },
        ],
    );

    let strategy = match cr.spec.node_update_strategy {
        NodeUpdateStrategy::Rolling => "RollingUpdate",
        NodeUpdateStrategy::OnDelete => "OnDelete",
    };

    DaemonSet {
        metadata: namespaced_meta(cr, name),
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template,
            update_strategy: Some(DaemonSetUpdateStrategy {
                type_: Some(strategy.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Controller `Deployment`: the controller template plus provisioner and attacher.
///
/// Returns `None` when the resource has no controller template.
#[must_use]
pub fn generate_deployment(
    cr: &CSIDriverDeployment,
    config: &OperatorConfig,
    service_account: &ServiceAccount,
) -> Option<Deployment> {
    let controller_template = cr.spec.driver_controller_template.as_ref()?;
    let name = deployment_name(cr);
    let selector = BTreeMap::from([(DEPLOYMENT_LABEL.to_string(), name.clone())]);
    let images = resolve_images(cr, config);

    let (socket_dir, socket_file) = driver_socket_parts(&cr.spec.driver_socket);
    let sidecar_socket = join_path(DRIVER_SOCKET_MOUNT_PATH, &socket_file);

    let mut template =
        prepare_template(controller_template, &selector, &service_account.name_any());

    let mut provisioner_args = base_args();
    provisioner_args.push(format!("--provisioner={}", cr.spec.driver_name));
    push_sidecars(
        &mut template,
        vec![
            sidecar(
                PROVISIONER_CONTAINER_NAME,
                &images.provisioner,
                provisioner_args,
                &sidecar_socket,
            ),
            sidecar(
                ATTACHER_CONTAINER_NAME,
                &images.attacher,
                base_args(),
                &sidecar_socket,
            ),
        ],
    );

    add_liveness_probe(cr, &images, &mut template, &sidecar_socket);

    push_volumes(
        &mut template,
        vec![Volume {
            name: DRIVER_SOCKET_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }],
    );
    if let Some(spec) = template.spec.as_mut() {
        if spec.node_selector.is_none() {
            spec.node_selector.clone_from(&config.infrastructure_node_selector);
        }
    }
    push_driver_mounts(&mut template, vec![mount(DRIVER_SOCKET_VOLUME, &socket_dir)]);

    Some(Deployment {
        metadata: namespaced_meta(cr, name),
        spec: Some(DeploymentSpec {
            replicas: Some(config.deployment_replicas),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template,
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

// ============================================================================
// Storage
// ============================================================================

/// `StorageClass` built from one template.
///
/// The template's metadata is kept, owner labels are added and the
/// default-class annotation is always set. The provisioner is always the
/// resource's driver name.
#[must_use]
pub fn generate_storage_class(
    cr: &CSIDriverDeployment,
    template: &StorageClassTemplate,
) -> StorageClass {
    let mut metadata = template.metadata.clone();
    metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(owner_labels(&namespace_of(cr), &cr.name_any()));
    let is_default = template.default.unwrap_or(false);
    metadata.annotations.get_or_insert_with(BTreeMap::new).insert(
        DEFAULT_STORAGE_CLASS_ANNOTATION.to_string(),
        is_default.to_string(),
    );

    StorageClass {
        metadata,
        provisioner: cr.spec.driver_name.clone(),
        parameters: template.parameters.clone(),
        reclaim_policy: template.reclaim_policy.clone(),
        mount_options: template.mount_options.clone(),
        allow_volume_expansion: template.allow_volume_expansion,
        volume_binding_mode: template.volume_binding_mode.clone(),
        allowed_topologies: template.allowed_topologies.clone(),
    }
}

#[must_use]
pub fn generate_storage_classes(cr: &CSIDriverDeployment) -> Vec<StorageClass> {
    cr.spec
        .storage_class_templates
        .iter()
        .map(|template| generate_storage_class(cr, template))
        .collect()
}

/// Cluster-scoped `CSIDriver` registration named after the driver.
#[must_use]
pub fn generate_csi_driver(cr: &CSIDriverDeployment) -> CSIDriver {
    CSIDriver {
        metadata: cluster_meta(cr, cr.spec.driver_name.clone()),
        spec: CSIDriverSpec {
            attach_required: Some(true),
            pod_info_on_mount: Some(true),
            ..Default::default()
        },
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Cloud credentials for the driver, written to `<name>-cloud-credentials` in the
/// resource namespace. `None` unless credentials requests are configured.
#[must_use]
pub fn generate_credentials_request(
    cr: &CSIDriverDeployment,
    config: &OperatorConfig,
) -> Option<CredentialsRequest> {
    let settings = config.credentials_request.as_ref()?;
    let mut request = CredentialsRequest::new(
        &credentials_request_name(cr),
        CredentialsRequestSpec {
            secret_ref: ObjectReference {
                namespace: Some(namespace_of(cr)),
                name: Some(format!("{}{CLOUD_CREDENTIALS_SECRET_SUFFIX}", cr.name_any())),
                ..Default::default()
            },
            provider_spec: settings.provider_spec.clone(),
        },
    );
    request.metadata.namespace = Some(settings.namespace.clone());
    request.metadata.labels = Some(owner_labels(&namespace_of(cr), &cr.name_any()));
    Some(request)
}

/// `ClusterOperator` the rollout status is reported on. Its status is computed
/// after the workloads are synced. `None` unless a name is configured.
#[must_use]
pub fn generate_cluster_operator(config: &OperatorConfig) -> Option<ClusterOperator> {
    let name = config.cluster_operator_name.as_deref()?;
    Some(ClusterOperator::new(name, ClusterOperatorSpec {}))
}

#[cfg(test)]
#[path = "objects_tests.rs"]
mod objects_tests;
