// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::constants::KIND_CSI_DRIVER_DEPLOYMENT;
    use crate::crd::{
        CSIDriverDeployment, CSIDriverDeploymentStatus, ManagementState, NodeUpdateStrategy,
    };
    use kube::{CustomResourceExt, Resource};

    const MANIFEST: &str = r#"
apiVersion: csidriver.storage.openshift.io/v1alpha1
kind: CSIDriverDeployment
metadata:
  name: ovirt
  namespace: ovirt-csi
spec:
  managementState: Managed
  driverName: csi.ovirt.org
  driverSocket: /var/lib/csi/sockets/pluginproxy/csi.sock
  nodeUpdateStrategy: OnDelete
  driverPerNodeTemplate:
    spec:
      containers:
        - name: ovirt-driver
          image: quay.io/ovirt/csi-driver:latest
  storageClassTemplates:
    - metadata:
        name: ovirt-thin
      default: true
      parameters:
        thinProvisioning: "true"
"#;

    #[test]
    fn test_deserialize_manifest() {
        let cr: CSIDriverDeployment = serde_yaml::from_str(MANIFEST).unwrap();

        assert_eq!(cr.spec.driver_name, "csi.ovirt.org");
        assert_eq!(cr.spec.management_state, ManagementState::Managed);
        assert_eq!(cr.spec.node_update_strategy, NodeUpdateStrategy::OnDelete);
        assert!(cr.spec.driver_controller_template.is_none());
        assert!(cr.spec.probe_period_seconds.is_none());
        assert_eq!(cr.spec.storage_class_templates.len(), 1);
        assert_eq!(cr.spec.storage_class_templates[0].default, Some(true));
        assert!(cr.status.is_none());
    }

    #[test]
    fn test_unknown_update_strategy_is_rejected() {
        let manifest = MANIFEST.replace("nodeUpdateStrategy: OnDelete", "nodeUpdateStrategy: Sometimes");
        let result: Result<CSIDriverDeployment, _> = serde_yaml::from_str(&manifest);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = CSIDriverDeploymentStatus {
            observed_generation: Some(3),
            state: Some(ManagementState::Managed),
            ..Default::default()
        };

        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["observedGeneration"], 3);
        assert_eq!(value["state"], "Managed");
        assert!(value["children"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_crd_identity() {
        let crd = CSIDriverDeployment::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("csidriverdeployments.csidriver.storage.openshift.io")
        );
        assert_eq!(CSIDriverDeployment::kind(&()), KIND_CSI_DRIVER_DEPLOYMENT);
        assert_eq!(CSIDriverDeployment::group(&()), "csidriver.storage.openshift.io");
        assert_eq!(CSIDriverDeployment::version(&()), "v1alpha1");
    }
}
