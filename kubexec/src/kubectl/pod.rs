use std::fmt;

use serde::Deserialize;

use super::common;

/// [Pod](https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/pod-v1/)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub metadata: common::ResourceMetadata,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    /// Sum of the restart counts of all containers.
    pub fn restarts(&self) -> u32 {
        self.status
            .container_statuses
            .iter()
            .map(|status| status.restart_count)
            .sum()
    }

    /// Image of the first container.
    pub fn image(&self) -> Option<&str> {
        self.spec
            .containers
            .first()
            .map(|container| container.image.as_str())
    }
}

/// Partially implements [PodSpec](https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/pod-v1/#PodSpec)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// The node the pod was scheduled onto, absent while the pod is pending.
    #[serde(default)]
    pub node_name: Option<String>,

    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub image: String,
}

/// Partially implements [PodStatus](https://kubernetes.io/docs/reference/generated/kubernetes-api/v1.30/#podstatus-v1-core)
#[derive(Debug, Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    /// The list has one entry per container in the manifest. More info: https://kubernetes.io/docs/concepts/workloads/pods/pod-lifecycle#pod-and-container-status
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,

    /// The phase of a Pod is a simple, high-level summary of where the Pod is in its lifecycle. More info:
    /// https://kubernetes.io/docs/concepts/workloads/pods/pod-lifecycle#pod-phase
    #[serde(default)]
    pub phase: PodPhase,
}

// https://kubernetes.io/docs/reference/generated/kubernetes-api/v1.30/#containerstatus-v1-core
#[derive(Debug, Clone, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    /// The number of times the container has been restarted.
    #[serde(default)]
    pub restart_count: u32,
}

/// Field `phase` of [PodStatus](https://kubernetes.io/docs/reference/generated/kubernetes-api/v1.30/#podstatus-v1-core).
#[derive(Debug, Clone, Copy, Default, Deserialize, Eq, PartialEq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        })
    }
}
