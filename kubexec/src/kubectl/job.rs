use std::fmt;

use serde::Deserialize;

use super::ResourceMetadata;

/// [Job](https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/job-v1/), only the parts kubexec reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub spec: Option<JobSpec>,
    #[serde(default)]
    pub status: JobStatus,
}

impl Job {
    /// Image of the first container of the pod template.
    pub fn image(&self) -> Option<&str> {
        self.spec
            .as_ref()?
            .template
            .spec
            .containers
            .first()
            .map(|container| container.image.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodTemplateSpec {
    pub spec: PodTemplatePodSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodTemplatePodSpec {
    #[serde(default)]
    pub containers: Vec<TemplateContainer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateContainer {
    pub image: String,
}

/// The pod counters of [JobStatus](https://kubernetes.io/docs/reference/kubernetes-api/workload-resources/job-v1/#JobStatus).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub active: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub succeeded: Option<u64>,
}

impl JobStatus {
    /// Returns the terminal state once the job has one. Success wins if both counters are set.
    pub fn terminal_state(&self) -> Option<JobState> {
        if self.succeeded.unwrap_or_default() > 0 {
            Some(JobState::Succeeded)
        } else if self.failed.unwrap_or_default() > 0 {
            Some(JobState::Failed)
        } else {
            None
        }
    }

    pub fn state(&self) -> JobState {
        self.terminal_state().unwrap_or(JobState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Running => "running",
            JobState::Succeeded => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_finished_job() {
        let job: Job = serde_json::from_str(
            r#"{
                "metadata": {
                    "name": "kubexec-job-1700000000-abc123",
                    "namespace": "team",
                    "creationTimestamp": "2024-05-01T10:00:00Z",
                    "labels": { "app": "kubexec" }
                },
                "spec": { "template": { "spec": { "containers": [ { "image": "ubuntu:latest" } ] } } },
                "status": {
                    "startTime": "2024-05-01T10:00:01Z",
                    "completionTime": "2024-05-01T10:00:09Z",
                    "succeeded": 1,
                    "conditions": [ { "type": "Complete", "status": "True" } ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(job.metadata.name, "kubexec-job-1700000000-abc123");
        assert_eq!(job.image(), Some("ubuntu:latest"));
        assert_eq!(job.status.terminal_state(), Some(JobState::Succeeded));
    }

    #[test]
    fn fresh_job_is_running() {
        let job: Job =
            serde_json::from_str(r#"{ "metadata": { "name": "j" }, "status": {} }"#).unwrap();
        assert_eq!(job.status.terminal_state(), None);
        assert_eq!(job.status.state(), JobState::Running);
        assert_eq!(job.image(), None);
    }

    #[test]
    fn failed_counter_means_failed() {
        let status = JobStatus {
            failed: Some(1),
            ..Default::default()
        };
        assert_eq!(status.state().to_string(), "failed");
    }
}
