//! Mapping from Steadybit targets to Dynatrace entity selectors.
//!
//! A target attribute only identifies an entity when it has exactly one
//! value. Attacking a host, for example, yields a target listing every pod
//! on it, and those must not be attached to the event.

use std::collections::HashMap;

use crate::model::TargetExecution;

/// Target type ids reported by the Steadybit extensions.
pub mod target_types {
    /// Kubernetes cluster.
    pub const KUBERNETES_CLUSTER: &str = "com.steadybit.extension_kubernetes.kubernetes-cluster";
    /// Kubernetes deployment.
    pub const KUBERNETES_DEPLOYMENT: &str =
        "com.steadybit.extension_kubernetes.kubernetes-deployment";
    /// Kubernetes stateful set.
    pub const KUBERNETES_STATEFULSET: &str =
        "com.steadybit.extension_kubernetes.kubernetes-statefulset";
    /// Kubernetes daemon set.
    pub const KUBERNETES_DAEMONSET: &str =
        "com.steadybit.extension_kubernetes.kubernetes-daemonset";
    /// Kubernetes node.
    pub const KUBERNETES_NODE: &str = "com.steadybit.extension_kubernetes.kubernetes-node";
    /// Kubernetes pod.
    pub const KUBERNETES_POD: &str = "com.steadybit.extension_kubernetes.kubernetes-pod";
    /// JVM application.
    pub const JVM_APPLICATION: &str = "com.steadybit.extension_jvm.application";
    /// Container.
    pub const CONTAINER: &str = "com.steadybit.extension_container.container";
    /// Host.
    pub const HOST: &str = "com.steadybit.extension_host.host";
}

/// Dynatrace entity types.
pub mod entity_types {
    /// `KUBERNETES_CLUSTER`
    pub const KUBERNETES_CLUSTER: &str = "KUBERNETES_CLUSTER";
    /// `KUBERNETES_NODE`
    pub const KUBERNETES_NODE: &str = "KUBERNETES_NODE";
    /// `CLOUD_APPLICATION_NAMESPACE`
    pub const CLOUD_APPLICATION_NAMESPACE: &str = "CLOUD_APPLICATION_NAMESPACE";
    /// `CLOUD_APPLICATION`
    pub const CLOUD_APPLICATION: &str = "CLOUD_APPLICATION";
    /// `CLOUD_APPLICATION_INSTANCE`
    pub const CLOUD_APPLICATION_INSTANCE: &str = "CLOUD_APPLICATION_INSTANCE";
    /// `CONTAINER_GROUP_INSTANCE`
    pub const CONTAINER_GROUP_INSTANCE: &str = "CONTAINER_GROUP_INSTANCE";
    /// `HOST`
    pub const HOST: &str = "HOST";
}

const CLUSTER_NAME: &str = "k8s.cluster-name";
const POD_NAME: &str = "k8s.pod.name";
const CONTAINER_NAME: &str = "k8s.container.name";
const HOSTNAME: &str = "host.hostname";

/// One row of the target type to selector table.
#[derive(Debug, Clone, Copy)]
struct SelectorRule {
    target_type: &'static str,
    attribute: &'static str,
    entity_type: &'static str,
}

const SELECTOR_RULES: [SelectorRule; 7] = [
    SelectorRule {
        target_type: target_types::KUBERNETES_CLUSTER,
        attribute: CLUSTER_NAME,
        entity_type: entity_types::KUBERNETES_CLUSTER,
    },
    SelectorRule {
        target_type: target_types::KUBERNETES_DEPLOYMENT,
        attribute: "k8s.deployment",
        entity_type: entity_types::CLOUD_APPLICATION,
    },
    SelectorRule {
        target_type: target_types::KUBERNETES_STATEFULSET,
        attribute: "k8s.statefulset",
        entity_type: entity_types::CLOUD_APPLICATION,
    },
    SelectorRule {
        target_type: target_types::KUBERNETES_DAEMONSET,
        attribute: "k8s.daemonset",
        entity_type: entity_types::CLOUD_APPLICATION,
    },
    SelectorRule {
        target_type: target_types::KUBERNETES_NODE,
        attribute: "k8s.node.name",
        entity_type: entity_types::KUBERNETES_NODE,
    },
    SelectorRule {
        target_type: target_types::KUBERNETES_POD,
        attribute: POD_NAME,
        entity_type: entity_types::CLOUD_APPLICATION_INSTANCE,
    },
    SelectorRule {
        target_type: target_types::JVM_APPLICATION,
        attribute: POD_NAME,
        entity_type: entity_types::CLOUD_APPLICATION_INSTANCE,
    },
];

/// A target attribute that maps to a Dynatrace entity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityProperty {
    /// Steadybit target attribute.
    pub attribute: &'static str,
    /// Dynatrace entity type the attribute value names.
    pub entity_type: &'static str,
    /// Event property receiving the resolved entity id.
    pub property: &'static str,
}

/// Attributes resolved into event properties for every attack target.
pub const ENTITY_PROPERTIES: [EntityProperty; 4] = [
    EntityProperty {
        attribute: CLUSTER_NAME,
        entity_type: entity_types::KUBERNETES_CLUSTER,
        property: "dt.entity.kubernetes_cluster",
    },
    EntityProperty {
        attribute: "k8s.namespace",
        entity_type: entity_types::CLOUD_APPLICATION_NAMESPACE,
        property: "dt.entity.cloud_application_namespace",
    },
    EntityProperty {
        attribute: "k8s.deployment",
        entity_type: entity_types::CLOUD_APPLICATION,
        property: "dt.entity.cloud_application",
    },
    EntityProperty {
        attribute: POD_NAME,
        entity_type: entity_types::CLOUD_APPLICATION_INSTANCE,
        property: "dt.entity.cloud_application_instance",
    },
];

/// Host attributes probed for the Kubernetes node of a target, in
/// ascending priority. Later matches overwrite earlier ones.
pub const NODE_ATTRIBUTES: [&str; 4] = [
    "container.host",
    HOSTNAME,
    "application.hostname",
    "k8s.node.name",
];

/// Event property receiving the resolved Kubernetes node.
pub const NODE_PROPERTY: &str = "dt.entity.kubernetes_node";

/// Builds a selector matching one entity by type and exact name.
#[must_use]
pub fn entity_selector(entity_type: &str, name: &str) -> String {
    format!("type(\"{entity_type}\"),entityName.equals(\"{name}\")")
}

/// Returns the value of `attribute` if it has exactly one value.
#[must_use]
pub fn single_attribute<'a>(
    attributes: &'a HashMap<String, Vec<String>>,
    attribute: &str,
) -> Option<&'a str> {
    match attributes.get(attribute).map(Vec::as_slice) {
        Some([value]) => Some(value.as_str()),
        _ => None,
    }
}

/// Whether the target runs inside a Kubernetes cluster.
#[must_use]
pub fn in_kubernetes_cluster(target: &TargetExecution) -> bool {
    target.target_attributes.contains_key(CLUSTER_NAME)
}

/// Derives the selector of the entity an attacked target corresponds to.
///
/// Returns `None` when the target type is unknown or the identifying
/// attributes are missing or ambiguous.
#[must_use]
pub fn target_entity_selector(target: &TargetExecution) -> Option<String> {
    let attributes = &target.target_attributes;

    if let Some(rule) = SELECTOR_RULES
        .iter()
        .find(|rule| rule.target_type == target.target_type)
    {
        return single_attribute(attributes, rule.attribute)
            .map(|value| entity_selector(rule.entity_type, value));
    }

    match target.target_type.as_str() {
        target_types::CONTAINER => {
            let container = single_attribute(attributes, CONTAINER_NAME)?;
            let pod = single_attribute(attributes, POD_NAME)?;
            Some(entity_selector(
                entity_types::CONTAINER_GROUP_INSTANCE,
                &format!("{pod} {container}"),
            ))
        }
        target_types::HOST => {
            let hostname = single_attribute(attributes, HOSTNAME)?;
            let entity_type = if single_attribute(attributes, CLUSTER_NAME).is_some() {
                entity_types::KUBERNETES_NODE
            } else {
                entity_types::HOST
            };
            Some(entity_selector(entity_type, hostname))
        }
        _ => None,
    }
}

/// Label of a target: its `steadybit.label` attribute, else its raw name.
#[must_use]
pub fn target_label(target: &TargetExecution) -> &str {
    target
        .target_attributes
        .get("steadybit.label")
        .and_then(|values| values.first())
        .map_or(target.target_name.as_str(), String::as_str)
}
