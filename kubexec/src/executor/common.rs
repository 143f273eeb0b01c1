use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::{
    cancel::Cancellation,
    cluster::Cluster,
    kubectl::JobState,
    template::CONTAINER_NAME,
    Error, Result,
};

pub const POLLING_INTERVAL: Duration = Duration::from_secs(2);

/// Returned in place of logs when the job never got a pod.
pub const NO_POD_FOR_JOB: &str = "No pod found for job";

/// A point in time to stop waiting at. Timeouts too large to represent never expire.
pub struct Deadline(Option<Instant>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    Timeout,
    Interrupted,
}

impl Deadline {
    /// Create a new deadline that times out after the provided duration.
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    /// Sleeps for `duration`, or until the deadline if that comes first. Fails without sleeping once the deadline has
    /// passed, and early if `cancellation` fires.
    pub fn sleep(&self, duration: Duration, cancellation: &Cancellation) -> Result<(), WaitError> {
        let duration = match self.0 {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(WaitError::Timeout);
                }
                duration.min(deadline - now)
            }
            None => duration,
        };
        if cancellation.sleep(duration) {
            Ok(())
        } else {
            Err(WaitError::Interrupted)
        }
    }
}

/// Parameters of [`wait_for_job`].
pub struct JobWait<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub cancellation: &'a Cancellation,
}

/// Polls the job until it succeeds or fails. Errors once `timeout` has elapsed or when interrupted.
pub fn wait_for_job(cluster: &dyn Cluster, wait: JobWait) -> Result<JobState> {
    let JobWait {
        name,
        namespace,
        timeout,
        poll_interval,
        cancellation,
    } = wait;

    let deadline = Deadline::after(timeout);
    let mut last_state = None;
    loop {
        if cancellation.is_cancelled() {
            return Err(Error::Interrupted);
        }

        let status = cluster
            .read_job(name, namespace)
            .map_err(|error| interrupted_or(error, cancellation))?;
        let state = status.state();
        if last_state != Some(state) {
            debug!(
                "Job {name} is {state} (active: {}, succeeded: {}, failed: {})",
                status.active.unwrap_or_default(),
                status.succeeded.unwrap_or_default(),
                status.failed.unwrap_or_default(),
            );
            last_state = Some(state);
        }
        if let Some(state) = status.terminal_state() {
            return Ok(state);
        }

        deadline
            .sleep(poll_interval, cancellation)
            .map_err(|error| match error {
                WaitError::Timeout => Error::job(format!(
                    "Job {name} timed out after {} seconds",
                    timeout.as_secs()
                )),
                WaitError::Interrupted => Error::Interrupted,
            })?;
    }
}

/// Ctrl-C reaches the kubectl children too, so a cluster call that fails after cancellation failed because of it.
pub fn interrupted_or(error: Error, cancellation: &Cancellation) -> Error {
    if cancellation.is_cancelled() {
        Error::Interrupted
    } else {
        error
    }
}

/// Logs of the first pod of the job. Failures are reported in the returned text instead of as an error, the job
/// outcome matters more than its output.
pub fn job_logs(cluster: &dyn Cluster, name: &str, namespace: &str) -> String {
    let selector = format!("job-name={name}");
    let logs = cluster
        .list_pods(namespace, Some(&selector))
        .and_then(|pods| match pods.first() {
            Some(pod) => cluster.pod_log(&pod.metadata.name, namespace, CONTAINER_NAME),
            None => Ok(NO_POD_FOR_JOB.to_owned()),
        });
    logs.unwrap_or_else(|error| {
        warn!("Failed to get job logs: {error}");
        format!("Failed to retrieve logs: {error}")
    })
}
