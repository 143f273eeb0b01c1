//! The operations kubexec needs from a cluster, independent of how they reach it.

use std::time::Duration;

use crate::{
    cancel::Cancellation,
    kubectl::{Job, JobStatus, Pod},
    template::JobManifest,
    Result,
};

/// Upper bound on a command run with [`Cluster::exec_in_pod`].
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(3600);

/// Outcome of a command run inside a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    /// Stdout followed by stderr.
    pub output: String,
}

pub trait Cluster {
    fn pod_exists(&self, name: &str, namespace: &str) -> Result<bool>;

    fn create_job(&self, job: &JobManifest) -> Result<()>;

    fn read_job(&self, name: &str, namespace: &str) -> Result<JobStatus>;

    fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>>;

    /// Deletes the job together with its pods.
    fn delete_job(&self, name: &str, namespace: &str) -> Result<()>;

    /// Deletes the config map, succeeding if it does not exist.
    fn delete_config_map(&self, name: &str, namespace: &str) -> Result<()>;

    fn list_pods(&self, namespace: &str, selector: Option<&str>) -> Result<Vec<Pod>>;

    fn pod_log(&self, pod: &str, namespace: &str, container: &str) -> Result<String>;

    /// Runs `command` in the pod. Fails with [`crate::Error::PodNotFound`] if the pod is gone, with
    /// [`crate::Error::JobExecution`] once [`EXEC_TIMEOUT`] elapses and with [`crate::Error::Interrupted`] when
    /// cancelled.
    fn exec_in_pod(
        &self,
        pod: &str,
        namespace: &str,
        command: &[String],
        container: Option<&str>,
        cancellation: &Cancellation,
    ) -> Result<ExecOutput>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! A scripted, recording [`Cluster`] for tests.

    use std::{cell::RefCell, collections::VecDeque};

    use super::*;
    use crate::{kubectl::ResourceMetadata, Error};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        PodExists(String),
        CreateJob(String),
        ReadJob(String),
        ListJobs(String),
        DeleteJob(String),
        DeleteConfigMap(String),
        ListPods(Option<String>),
        PodLog(String),
        ExecInPod(String, Vec<String>),
    }

    #[derive(Default)]
    pub struct FakeCluster {
        pub existing_pods: Vec<String>,
        /// Statuses returned by successive `read_job` calls. The last one repeats.
        pub job_statuses: RefCell<VecDeque<JobStatus>>,
        pub jobs: Vec<Job>,
        pub job_pods: Vec<Pod>,
        pub logs: String,
        pub exec_output: Option<ExecOutput>,
        pub fail_create: bool,
        /// Cancels this token when the job is submitted.
        pub cancel_on_create: Option<Cancellation>,
        pub fail_read: bool,
        pub fail_delete: bool,
        pub fail_logs: bool,
        /// Cancels this token when the job is read, simulating Ctrl-C during polling.
        pub cancel_on_read: Option<Cancellation>,
        pub calls: RefCell<Vec<Call>>,
        pub created: RefCell<Vec<JobManifest>>,
    }

    impl FakeCluster {
        pub fn with_statuses<I: IntoIterator<Item = JobStatus>>(statuses: I) -> Self {
            Self {
                job_statuses: RefCell::new(statuses.into_iter().collect()),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.calls.borrow().iter().filter(|call| predicate(call)).count()
        }

        fn record(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }
    }

    pub fn succeeded() -> JobStatus {
        JobStatus {
            succeeded: Some(1),
            ..Default::default()
        }
    }

    pub fn failed() -> JobStatus {
        JobStatus {
            failed: Some(1),
            ..Default::default()
        }
    }

    pub fn running() -> JobStatus {
        JobStatus {
            active: Some(1),
            ..Default::default()
        }
    }

    pub fn pod(name: &str) -> Pod {
        Pod {
            metadata: ResourceMetadata {
                name: name.to_owned(),
                creation_timestamp: None,
            },
            spec: Default::default(),
            status: Default::default(),
        }
    }

    impl Cluster for FakeCluster {
        fn pod_exists(&self, name: &str, _namespace: &str) -> Result<bool> {
            self.record(Call::PodExists(name.to_owned()));
            Ok(self.existing_pods.iter().any(|pod| pod == name))
        }

        fn create_job(&self, job: &JobManifest) -> Result<()> {
            self.record(Call::CreateJob(job.name().to_owned()));
            if let Some(cancellation) = &self.cancel_on_create {
                cancellation.cancel();
            }
            if self.fail_create {
                return Err(Error::cluster("admission webhook denied the request"));
            }
            self.created.borrow_mut().push(job.clone());
            Ok(())
        }

        fn read_job(&self, name: &str, _namespace: &str) -> Result<JobStatus> {
            self.record(Call::ReadJob(name.to_owned()));
            if let Some(cancellation) = &self.cancel_on_read {
                cancellation.cancel();
            }
            if self.fail_read {
                return Err(Error::cluster("signal: interrupt"));
            }
            let mut statuses = self.job_statuses.borrow_mut();
            let status = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            };
            Ok(status.unwrap_or_else(running))
        }

        fn list_jobs(&self, _namespace: &str, selector: &str) -> Result<Vec<Job>> {
            self.record(Call::ListJobs(selector.to_owned()));
            Ok(self.jobs.clone())
        }

        fn delete_job(&self, name: &str, _namespace: &str) -> Result<()> {
            self.record(Call::DeleteJob(name.to_owned()));
            if self.fail_delete {
                return Err(Error::cluster("connection refused"));
            }
            Ok(())
        }

        fn delete_config_map(&self, name: &str, _namespace: &str) -> Result<()> {
            self.record(Call::DeleteConfigMap(name.to_owned()));
            Ok(())
        }

        fn list_pods(&self, _namespace: &str, selector: Option<&str>) -> Result<Vec<Pod>> {
            self.record(Call::ListPods(selector.map(str::to_owned)));
            Ok(self.job_pods.clone())
        }

        fn pod_log(&self, pod: &str, _namespace: &str, _container: &str) -> Result<String> {
            self.record(Call::PodLog(pod.to_owned()));
            if self.fail_logs {
                return Err(Error::cluster("container not found"));
            }
            Ok(self.logs.clone())
        }

        fn exec_in_pod(
            &self,
            pod: &str,
            namespace: &str,
            command: &[String],
            _container: Option<&str>,
            _cancellation: &Cancellation,
        ) -> Result<ExecOutput> {
            self.record(Call::ExecInPod(pod.to_owned(), command.to_vec()));
            self.exec_output.clone().ok_or_else(|| Error::PodNotFound {
                pod: pod.to_owned(),
                namespace: namespace.to_owned(),
            })
        }
    }
}
