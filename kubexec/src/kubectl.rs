use std::{ffi::OsStr, time::Duration};

use log::{debug, error};

use crate::{
    cancel::Cancellation,
    cluster::{Cluster, ExecOutput, EXEC_TIMEOUT},
    process,
    template::JobManifest,
    Error, Result,
};

mod pod;
pub use pod::*;

mod job;
pub use job::*;

mod common;
pub use common::*;

/// How long `kubectl config view` may take while detecting the namespace.
const CONFIG_VIEW_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix kubectl puts on stderr when the requested object does not exist.
const NOT_FOUND: &[u8] = b"Error from server (NotFound)";

/// Drives the `kubectl` binary found on `PATH`, using its usual kubeconfig resolution.
#[derive(Debug, Clone, Default)]
pub struct Kubectl {
    context: Option<String>,
}

impl Kubectl {
    pub fn new(context: Option<String>) -> Self {
        Self { context }
    }

    /// Returns the kubectl command with the context selection already applied.
    fn kubectl(&self) -> process::Command {
        match &self.context {
            Some(context) => process::command!("kubectl", "--context", context),
            None => process::Command::new("kubectl"),
        }
    }

    /// Namespace of the current kubeconfig context, if one is set.
    pub fn current_namespace(&self) -> Result<Option<String>> {
        let output = process::args!(
            self.kubectl(),
            "config",
            "view",
            "--minify",
            "--output",
            "jsonpath={..namespace}",
        )
        .output_bounded(CONFIG_VIEW_TIMEOUT, &Cancellation::new())?
        .require_success()?;

        let namespace = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        Ok(Some(namespace).filter(|namespace| !namespace.is_empty()))
    }

    /// Runs `kubectl get`, returning `None` if the object does not exist.
    fn try_get<T: serde::de::DeserializeOwned>(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<T>> {
        let output = process::args!(
            self.kubectl(),
            "get",
            kind,
            "--namespace",
            namespace,
            name,
            "--output=json"
        )
        .try_output()?;

        if !output.status.success() && output.stderr.starts_with(NOT_FOUND) {
            return Ok(None);
        }
        let output = output.require_success()?;

        Ok(Some(serde_json::from_slice(&output.stdout)?))
    }

    fn list<T: serde::de::DeserializeOwned>(
        &self,
        kind: &str,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut command = process::args!(
            self.kubectl(),
            "get",
            kind,
            "--namespace",
            namespace,
            "--output=json"
        );
        if let Some(selector) = selector {
            command = process::args!(command, "--selector", selector);
        }
        let output = command.output()?;

        Ok(serde_json::from_slice::<GetResource<_>>(&output.stdout)?.items)
    }
}

impl Cluster for Kubectl {
    fn pod_exists(&self, name: &str, namespace: &str) -> Result<bool> {
        Ok(self.try_get::<Pod>("pod", name, namespace)?.is_some())
    }

    fn create_job(&self, job: &JobManifest) -> Result<()> {
        let input = serde_json::to_string_pretty(job)?;
        let output = process::args!(self.kubectl(), "create", "--output=name", "-f", "-")
            .output_with_input(input.as_bytes().to_owned())?;

        if !output.status.success() {
            let path = crate::temp_path::tmp_json_path();
            if std::fs::write(&path, &input).is_ok() {
                error!(
                    "Rejected job manifest written to {}: {}",
                    path.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
        }
        output.require_success()?;

        debug!("Created job {}/{}", job.namespace(), job.name());
        Ok(())
    }

    fn read_job(&self, name: &str, namespace: &str) -> Result<JobStatus> {
        let job: Job = self
            .try_get("job", name, namespace)?
            .ok_or_else(|| {
                Error::cluster(format!("job {name} not found in namespace {namespace}"))
            })?;
        Ok(job.status)
    }

    fn list_jobs(&self, namespace: &str, selector: &str) -> Result<Vec<Job>> {
        self.list("jobs", namespace, Some(selector))
    }

    fn delete_job(&self, name: &str, namespace: &str) -> Result<()> {
        process::args!(
            self.kubectl(),
            "delete",
            "job",
            "--namespace",
            namespace,
            name,
            // Takes the pods down with the job without blocking until they are gone.
            "--cascade=foreground",
            "--wait=false",
            "--ignore-not-found",
        )
        .output()?;
        Ok(())
    }

    fn delete_config_map(&self, name: &str, namespace: &str) -> Result<()> {
        process::args!(
            self.kubectl(),
            "delete",
            "configmap",
            "--namespace",
            namespace,
            name,
            "--ignore-not-found",
        )
        .output()?;
        Ok(())
    }

    fn list_pods(&self, namespace: &str, selector: Option<&str>) -> Result<Vec<Pod>> {
        self.list("pods", namespace, selector)
    }

    fn pod_log(&self, pod: &str, namespace: &str, container: &str) -> Result<String> {
        let output = process::args!(
            self.kubectl(),
            "logs",
            "--namespace",
            namespace,
            pod,
            "--container",
            container,
        )
        .output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn exec_in_pod(
        &self,
        pod: &str,
        namespace: &str,
        command: &[String],
        container: Option<&str>,
        cancellation: &Cancellation,
    ) -> Result<ExecOutput> {
        if !self.pod_exists(pod, namespace)? {
            return Err(Error::PodNotFound {
                pod: pod.to_owned(),
                namespace: namespace.to_owned(),
            });
        }

        let mut exec = process::args!(self.kubectl(), "exec", "--namespace", namespace, pod);
        if let Some(container) = container {
            exec = process::args!(exec, "--container", container);
        }
        exec = process::args!(exec, "--");
        exec = exec.args(command.iter().map(OsStr::new));

        match exec.output_bounded(EXEC_TIMEOUT, cancellation) {
            Ok(output) => Ok(ExecOutput {
                exit_code: output.exit_code(),
                output: output.combined(),
            }),
            Err(error) if matches!(error.kind, process::ErrorKind::Timeout) => {
                Err(Error::JobExecution {
                    message: format!(
                        "Command execution timed out after {} seconds",
                        EXEC_TIMEOUT.as_secs()
                    ),
                    source: Some(Box::new(error.into())),
                })
            }
            Err(error) => Err(error.into()),
        }
    }
}
