//! Job and ConfigMap documents, built without touching the cluster.
//!
//! The types mirror the subset of the Kubernetes wire schema that kubexec emits. Field names serialize to the camelCase
//! keys the API server expects, so the documents can be handed to `kubectl create -f -` as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const CONTAINER_NAME: &str = "kubexec-container";
pub const APP_LABEL: &str = "kubexec";
/// Label selector matching every object kubexec creates.
pub const APP_SELECTOR: &str = "app=kubexec";

pub const SHARED_TEAM_VOLUME: &str = "shared-team-volume";
pub const SHARED_TEAM_CLAIM: &str = "cephfs-shared-team";
pub const SHARED_TEAM_MOUNT: &str = "/shared/team";
pub const SHARED_PUBLIC_VOLUME: &str = "shared-public-volume";
pub const SHARED_PUBLIC_CLAIM: &str = "cephfs-shared-ro-public";
pub const SHARED_PUBLIC_MOUNT: &str = "/shared/public";

pub const DEFAULT_RESTART_POLICY: &str = "Never";
pub const DEFAULT_BACKOFF_LIMIT: i32 = 0;
pub const DEFAULT_TTL_SECONDS_AFTER_FINISHED: i32 = 60;

pub mod annotation {
    pub const VERSION: &str = "kubexec.io/version";
    pub const LAUNCHED_BY: &str = "kubexec.io/launched-by";
}

/// [PodSecurityContext](https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/pod-v1/#security-context)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group_change_policy: Option<String>,
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self {
            fs_group: Some(1000),
            run_as_user: Some(1000),
            run_as_group: Some(1000),
            fs_group_change_policy: Some("OnRootMismatch".to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// [Job](https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/job-v1/)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifest {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
}

impl JobManifest {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    pub fn container(&self) -> Option<&Container> {
        self.spec.template.spec.containers.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    /// How many times to retry running the pod should it fail.
    pub backoff_limit: i32,
    pub ttl_seconds_after_finished: i32,
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateSpec {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub restart_policy: String,
    pub security_context: SecurityContext,
    pub automount_service_account_token: bool,
    pub containers: Vec<Container>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub working_dir: String,
    pub resources: ResourceRequirements,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRequirements {
    pub limits: ResourceList,
    pub requests: ResourceList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceList {
    pub memory: String,
    pub cpu: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// [Volume](https://kubernetes.io/docs/reference/kubernetes-api/config-and-storage-resources/volume/), restricted to
/// the two sources kubexec mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathSource>,
}

impl Volume {
    pub fn persistent_volume_claim(name: &str, claim_name: &str) -> Self {
        Self {
            name: name.to_owned(),
            persistent_volume_claim: Some(PersistentVolumeClaimSource {
                claim_name: claim_name.to_owned(),
            }),
            host_path: None,
        }
    }

    pub fn host_path(name: &str, path: &str) -> Self {
        Self {
            name: name.to_owned(),
            persistent_volume_claim: None,
            host_path: Some(HostPathSource {
                path: path.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSource {
    pub claim_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostPathSource {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

impl VolumeMount {
    pub fn new(name: &str, mount_path: &str, read_only: bool) -> Self {
        Self {
            name: name.to_owned(),
            mount_path: mount_path.to_owned(),
            read_only,
        }
    }
}

/// [ConfigMap](https://kubernetes.io/docs/reference/kubernetes-api/config-and-storage-resources/config-map-v1/)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapManifest {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, String>,
}

/// Fully resolved inputs for [`job_manifest`]. Optional fields fall back to the documented defaults.
#[derive(Debug, Clone, Default)]
pub struct JobTemplate<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub image: &'a str,
    pub command: &'a [String],
    pub memory: &'a str,
    pub cpu: &'a str,
    pub workdir: &'a str,
    pub volumes: Vec<Volume>,
    pub volume_mounts: Vec<VolumeMount>,
    pub env: Vec<EnvVar>,
    pub annotations: BTreeMap<String, String>,
    pub node_selector: BTreeMap<String, String>,
    pub security_context: Option<SecurityContext>,
    pub restart_policy: Option<&'a str>,
    pub backoff_limit: Option<i32>,
    pub ttl_seconds_after_finished: Option<i32>,
    pub automount_service_account_token: bool,
}

fn labels<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(pairs: I) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

pub fn job_manifest(template: JobTemplate) -> JobManifest {
    let resources = ResourceList {
        memory: template.memory.to_owned(),
        cpu: template.cpu.to_owned(),
    };

    JobManifest {
        api_version: "batch/v1",
        kind: "Job",
        metadata: ObjectMeta {
            name: Some(template.name.to_owned()),
            namespace: Some(template.namespace.to_owned()),
            labels: labels([("app", APP_LABEL), ("created-by", APP_LABEL)]),
            annotations: template.annotations.clone(),
        },
        spec: JobSpec {
            // Re-running a failed command may not be idempotent, retrying is left to the caller.
            backoff_limit: template.backoff_limit.unwrap_or(DEFAULT_BACKOFF_LIMIT),
            ttl_seconds_after_finished: template
                .ttl_seconds_after_finished
                .unwrap_or(DEFAULT_TTL_SECONDS_AFTER_FINISHED),
            template: PodTemplateSpec {
                metadata: ObjectMeta {
                    name: None,
                    namespace: None,
                    labels: labels([("app", APP_LABEL), ("job", template.name)]),
                    annotations: template.annotations,
                },
                spec: PodSpec {
                    restart_policy: template
                        .restart_policy
                        .unwrap_or(DEFAULT_RESTART_POLICY)
                        .to_owned(),
                    security_context: template.security_context.unwrap_or_default(),
                    automount_service_account_token: template.automount_service_account_token,
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_owned(),
                        image: template.image.to_owned(),
                        command: template.command.to_vec(),
                        working_dir: template.workdir.to_owned(),
                        // Requests equal limits so the pod is never throttled below what was asked for.
                        resources: ResourceRequirements {
                            limits: resources.clone(),
                            requests: resources,
                        },
                        volume_mounts: template.volume_mounts,
                        env: template.env,
                    }],
                    node_selector: template.node_selector,
                    volumes: template.volumes,
                },
            },
        },
    }
}

/// Name of the ConfigMap that accompanies a job.
pub fn config_map_name(job_name: &str) -> String {
    format!("{job_name}-script")
}

pub fn config_map_manifest(
    name: &str,
    namespace: &str,
    script_name: &str,
    script_contents: &str,
) -> ConfigMapManifest {
    ConfigMapManifest {
        api_version: "v1",
        kind: "ConfigMap",
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            labels: labels([("app", APP_LABEL), ("created-by", APP_LABEL)]),
            annotations: BTreeMap::new(),
        },
        data: [(script_name.to_owned(), script_contents.to_owned())]
            .into_iter()
            .collect(),
    }
}

pub fn shared_volumes() -> Vec<Volume> {
    vec![
        Volume::persistent_volume_claim(SHARED_TEAM_VOLUME, SHARED_TEAM_CLAIM),
        Volume::persistent_volume_claim(SHARED_PUBLIC_VOLUME, SHARED_PUBLIC_CLAIM),
    ]
}

pub fn shared_volume_mounts() -> Vec<VolumeMount> {
    vec![
        VolumeMount::new(SHARED_TEAM_VOLUME, SHARED_TEAM_MOUNT, false),
        VolumeMount::new(SHARED_PUBLIC_VOLUME, SHARED_PUBLIC_MOUNT, true),
    ]
}
