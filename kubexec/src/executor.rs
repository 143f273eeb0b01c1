//! Runs a target either inside an existing pod or in a fresh Job, and manages the jobs kubexec created.

mod command;
mod common;
mod job;
mod pod;

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use common::POLLING_INTERVAL;
use itertools::Itertools;
use log::{info, warn};
use time::OffsetDateTime;

use crate::{
    cancel::Cancellation,
    cluster::{Cluster, ExecOutput},
    config::Config,
    kubectl::JobState,
    quantity,
    target::Target,
    template::{annotation, config_map_name, APP_SELECTOR},
    volume::VolumeMountSpec,
    Result,
};

/// Prefix of every generated job name.
pub const JOB_NAME_PREFIX: &str = "kubexec-job";

/// Whether to delete the job once it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Whatever the configuration says.
    #[default]
    Default,
    Always,
    Never,
}

impl CleanupPolicy {
    pub fn resolve(self, configured: bool) -> bool {
        match self {
            CleanupPolicy::Default => configured,
            CleanupPolicy::Always => true,
            CleanupPolicy::Never => false,
        }
    }
}

/// One invocation. Unset fields fall back to the configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// A shell command line, or the path of a local script.
    pub target: String,
    pub docker_image: Option<String>,
    pub namespace: Option<String>,
    /// Run in this pod if it exists.
    pub pod_name: Option<String>,
    pub memory: Option<String>,
    pub cpu: Option<String>,
    pub workdir: Option<String>,
    pub volumes: Vec<VolumeMountSpec>,
    /// Always create a job, even when `pod_name` exists.
    pub create_pod: bool,
    pub cleanup: CleanupPolicy,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub exit_code: i32,
    pub output: String,
}

impl From<ExecOutput> for ExecutionOutput {
    fn from(ExecOutput { exit_code, output }: ExecOutput) -> Self {
        Self { exit_code, output }
    }
}

/// A job as shown by `--list-jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub name: String,
    pub state: JobState,
    pub image: String,
    pub created: Option<OffsetDateTime>,
}

/// Request fields overlaid on the configuration, validated.
#[derive(Debug)]
struct Settings {
    image: String,
    namespace: String,
    memory: String,
    cpu: String,
    workdir: String,
    cleanup: bool,
}

pub struct Executor<'a> {
    config: &'a Config,
    cluster: &'a dyn Cluster,
    cancellation: Cancellation,
    current_dir: PathBuf,
    poll_interval: Duration,
}

impl<'a> Executor<'a> {
    pub fn new(config: &'a Config, cluster: &'a dyn Cluster, cancellation: Cancellation) -> Self {
        Self {
            config,
            cluster,
            cancellation,
            current_dir: std::env::current_dir().unwrap_or_default(),
            poll_interval: POLLING_INTERVAL,
        }
    }

    /// Overrides the directory used to pick the job's entry path.
    #[cfg(test)]
    pub fn with_current_dir(mut self, current_dir: impl Into<PathBuf>) -> Self {
        self.current_dir = current_dir.into();
        self
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs the request to completion. The exit code is the command's own; errors are reserved for failures of kubexec
    /// or the cluster, timeouts and interrupts.
    pub fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutput> {
        let settings = self.settings(request)?;
        let target = Target::resolve(&request.target)?;

        if let (Some(pod), false) = (request.pod_name.as_deref(), request.create_pod) {
            // A dry run never talks to the cluster, so it trusts that the pod exists.
            if request.dry_run || self.cluster.pod_exists(pod, &settings.namespace)? {
                return self.execute_in_pod(pod, &target, &settings.namespace, request.dry_run);
            }
            info!(
                "Pod {pod} not found in namespace {}, creating a new job",
                settings.namespace
            );
        }

        self.execute_in_job(&target, &settings, &request.volumes, request.dry_run)
    }

    fn settings(&self, request: &ExecutionRequest) -> Result<Settings> {
        let pick = |value: &Option<String>, configured: &str| {
            value.clone().unwrap_or_else(|| configured.to_owned())
        };
        let config = self.config;
        Ok(Settings {
            image: pick(&request.docker_image, &config.docker_image),
            namespace: pick(&request.namespace, config.namespace()),
            memory: quantity::memory(request.memory.as_deref().unwrap_or(&config.memory))?,
            cpu: quantity::cpu(request.cpu.as_deref().unwrap_or(&config.cpu))?,
            workdir: pick(&request.workdir, &config.workdir),
            cleanup: request.cleanup.resolve(config.cleanup),
        })
    }

    fn annotations(&self) -> BTreeMap<String, String> {
        let launched_by = match whoami::fallible::hostname() {
            Ok(host) => format!("{}@{host}", whoami::username()),
            Err(_) => whoami::username(),
        };
        [
            (annotation::VERSION, crate::version::VERSION.to_owned()),
            (annotation::LAUNCHED_BY, launched_by),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
    }

    /// The kubexec jobs in `namespace`, newest first.
    pub fn list_jobs(&self, namespace: &str) -> Result<Vec<JobSummary>> {
        Ok(self
            .cluster
            .list_jobs(namespace, APP_SELECTOR)?
            .into_iter()
            .map(|job| JobSummary {
                image: job.image().unwrap_or("unknown").to_owned(),
                state: job.status.state(),
                created: job.metadata.creation_timestamp,
                name: job.metadata.name,
            })
            .sorted_by(|a, b| b.created.cmp(&a.created))
            .collect())
    }

    /// Deletes the kubexec jobs in `namespace` created more than `max_age_hours` ago. Returns how many were deleted.
    pub fn cleanup_old_jobs(&self, namespace: &str, max_age_hours: u32) -> Result<usize> {
        let cutoff = OffsetDateTime::now_utc()
            .checked_sub(time::Duration::hours(i64::from(max_age_hours)));
        match cutoff {
            Some(cutoff) => self.cleanup_jobs_created_before(namespace, cutoff),
            None => Ok(0),
        }
    }

    fn cleanup_jobs_created_before(&self, namespace: &str, cutoff: OffsetDateTime) -> Result<usize> {
        let mut deleted = 0;
        for job in self.cluster.list_jobs(namespace, APP_SELECTOR)? {
            let Some(created) = job.metadata.creation_timestamp else {
                continue;
            };
            if created >= cutoff {
                continue;
            }
            let name = &job.metadata.name;
            info!("Deleting job {name} created {created}");
            self.cluster.delete_job(name, namespace)?;
            if let Err(error) = self
                .cluster
                .delete_config_map(&config_map_name(name), namespace)
            {
                warn!("Failed to delete the script of job {name}: {error}");
            }
            deleted += 1;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use time::macros::datetime;

    use super::*;
    use crate::{
        cluster::fake::{self, Call, FakeCluster},
        kubectl::{Job, JobStatus, ResourceMetadata},
        Error,
    };

    pub(super) fn config() -> Config {
        Config {
            namespace: Some("team".to_owned()),
            ..Config::default()
        }
    }

    pub(super) fn executor<'a>(config: &'a Config, cluster: &'a FakeCluster) -> Executor<'a> {
        Executor::new(config, cluster, Cancellation::new())
            .with_current_dir("/home/user")
            .with_poll_interval(Duration::ZERO)
    }

    pub(super) fn request(target: &str) -> ExecutionRequest {
        ExecutionRequest {
            target: target.to_owned(),
            ..Default::default()
        }
    }

    fn job(name: &str, created: Option<OffsetDateTime>, status: JobStatus) -> Job {
        Job {
            metadata: ResourceMetadata {
                name: name.to_owned(),
                creation_timestamp: created,
            },
            spec: None,
            status,
        }
    }

    #[test]
    fn cleanup_policy_resolution() {
        assert!(CleanupPolicy::Default.resolve(true));
        assert!(!CleanupPolicy::Default.resolve(false));
        assert!(CleanupPolicy::Always.resolve(false));
        assert!(!CleanupPolicy::Never.resolve(true));
    }

    #[test]
    fn invalid_resources_fail_before_cluster_contact() {
        let config = config();
        let cluster = FakeCluster::default();
        let executor = executor(&config, &cluster);

        let error = executor
            .execute(&ExecutionRequest {
                memory: Some("lots".to_owned()),
                pod_name: Some("jupyter".to_owned()),
                ..request("echo hi")
            })
            .unwrap_err();
        assert!(matches!(error, Error::InvalidResourceSpec { .. }), "{error}");

        let error = executor
            .execute(&ExecutionRequest {
                cpu: Some("fast".to_owned()),
                ..request("echo hi")
            })
            .unwrap_err();
        assert!(matches!(error, Error::InvalidResourceSpec { .. }), "{error}");
        assert!(cluster.calls().is_empty());
    }

    #[test]
    fn existing_pod_runs_exec_and_creates_nothing() {
        let config = config();
        let cluster = FakeCluster {
            existing_pods: vec!["jupyter".to_owned()],
            exec_output: Some(ExecOutput {
                exit_code: 3,
                output: "out\nerr\n".to_owned(),
            }),
            ..Default::default()
        };

        let output = executor(&config, &cluster)
            .execute(&ExecutionRequest {
                pod_name: Some("jupyter".to_owned()),
                ..request("ls -la")
            })
            .unwrap();

        assert_eq!(
            output,
            ExecutionOutput {
                exit_code: 3,
                output: "out\nerr\n".to_owned()
            }
        );
        assert_eq!(
            cluster.calls(),
            [
                Call::PodExists("jupyter".to_owned()),
                Call::ExecInPod(
                    "jupyter".to_owned(),
                    vec!["/bin/bash".to_owned(), "-c".to_owned(), "ls -la".to_owned()]
                ),
            ]
        );
    }

    #[test]
    fn missing_pod_falls_back_to_a_job() {
        let config = config();
        let cluster = FakeCluster::with_statuses([fake::succeeded()]);

        let output = executor(&config, &cluster)
            .execute(&ExecutionRequest {
                pod_name: Some("gone".to_owned()),
                ..request("echo hi")
            })
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(cluster.count(|call| matches!(call, Call::CreateJob(_))), 1);
        assert_eq!(cluster.count(|call| matches!(call, Call::ExecInPod(..))), 0);
    }

    #[test]
    fn create_pod_skips_the_existence_check() {
        let config = config();
        let cluster = FakeCluster {
            existing_pods: vec!["jupyter".to_owned()],
            ..FakeCluster::with_statuses([fake::succeeded()])
        };

        executor(&config, &cluster)
            .execute(&ExecutionRequest {
                pod_name: Some("jupyter".to_owned()),
                create_pod: true,
                ..request("echo hi")
            })
            .unwrap();

        assert_eq!(cluster.count(|call| matches!(call, Call::PodExists(_))), 0);
        assert_eq!(cluster.count(|call| matches!(call, Call::CreateJob(_))), 1);
    }

    #[test]
    fn dry_run_in_pod_touches_nothing() {
        let config = config();
        let cluster = FakeCluster::default();

        let output = executor(&config, &cluster)
            .execute(&ExecutionRequest {
                pod_name: Some("jupyter".to_owned()),
                dry_run: true,
                ..request("nvidia-smi")
            })
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(
            output.output,
            "Would execute in pod jupyter: /bin/bash -c nvidia-smi"
        );
        assert!(cluster.calls().is_empty());
    }

    #[test]
    fn script_target_is_shipped_inline() {
        let mut script = tempfile::Builder::new()
            .prefix("train")
            .suffix(".py")
            .tempfile()
            .unwrap();
        writeln!(script, "print('training')").unwrap();

        let config = config();
        let cluster = FakeCluster {
            existing_pods: vec!["jupyter".to_owned()],
            exec_output: Some(ExecOutput {
                exit_code: 0,
                output: "training\n".to_owned(),
            }),
            ..Default::default()
        };

        executor(&config, &cluster)
            .execute(&ExecutionRequest {
                pod_name: Some("jupyter".to_owned()),
                ..request(script.path().to_str().unwrap())
            })
            .unwrap();

        let calls = cluster.calls();
        let Some(Call::ExecInPod(_, command)) = calls.last() else {
            panic!("expected an exec, got {calls:?}");
        };
        assert!(command[2].starts_with("cat << 'KUBEXEC_SCRIPT_EOF_"));
        assert!(command[2].contains("print('training')\nKUBEXEC_SCRIPT_EOF_"));
    }

    #[test]
    fn unreadable_script_is_reported() {
        let config = config();
        let cluster = FakeCluster::default();
        let dir = tempfile::tempdir().unwrap();
        // A directory with a script extension passes detection but cannot be read.
        let path = dir.path().join("broken.sh");
        std::fs::create_dir(&path).unwrap();

        let error = executor(&config, &cluster)
            .execute(&request(path.to_str().unwrap()))
            .unwrap_err();
        assert!(matches!(error, Error::Script { .. }), "{error}");
        assert!(cluster.calls().is_empty());
    }

    #[test]
    fn lists_jobs_newest_first() {
        let config = config();
        let cluster = FakeCluster {
            jobs: vec![
                job(
                    "old",
                    Some(datetime!(2024-05-01 10:00:00 UTC)),
                    fake::succeeded(),
                ),
                job(
                    "new",
                    Some(datetime!(2024-05-02 10:00:00 UTC)),
                    fake::running(),
                ),
                job("unknown", None, fake::failed()),
            ],
            ..Default::default()
        };

        let jobs = executor(&config, &cluster).list_jobs("team").unwrap();
        let summary: Vec<_> = jobs
            .iter()
            .map(|job| (job.name.as_str(), job.state.as_str(), job.image.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("new", "running", "unknown"),
                ("old", "completed", "unknown"),
                ("unknown", "failed", "unknown"),
            ]
        );
        assert_eq!(cluster.calls(), [Call::ListJobs("app=kubexec".to_owned())]);
    }

    #[test]
    fn cleanup_deletes_only_old_jobs() {
        let config = config();
        let cluster = FakeCluster {
            jobs: vec![
                job(
                    "ancient",
                    Some(datetime!(2024-01-01 00:00:00 UTC)),
                    fake::succeeded(),
                ),
                job(
                    "recent",
                    Some(datetime!(2024-05-02 09:00:00 UTC)),
                    fake::running(),
                ),
                job("undated", None, fake::failed()),
            ],
            ..Default::default()
        };

        let deleted = executor(&config, &cluster)
            .cleanup_jobs_created_before("team", datetime!(2024-05-01 00:00:00 UTC))
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(
            cluster.calls(),
            [
                Call::ListJobs("app=kubexec".to_owned()),
                Call::DeleteJob("ancient".to_owned()),
                Call::DeleteConfigMap("ancient-script".to_owned()),
            ]
        );
    }

    #[test]
    fn cleanup_with_huge_age_deletes_nothing() {
        let config = config();
        let cluster = FakeCluster {
            jobs: vec![job(
                "ancient",
                Some(datetime!(2024-01-01 00:00:00 UTC)),
                fake::succeeded(),
            )],
            ..Default::default()
        };
        let deleted = executor(&config, &cluster)
            .cleanup_old_jobs("team", 1_000_000)
            .unwrap();
        assert_eq!(deleted, 0);
    }
}
