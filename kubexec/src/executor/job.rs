//! Running in a fresh Job.

use log::{info, warn};

use super::{
    command::{entry_path, shell_command},
    common::{interrupted_or, job_logs, wait_for_job, JobWait},
    ExecutionOutput, Executor, Settings, JOB_NAME_PREFIX,
};
use crate::{
    cluster::Cluster,
    kubectl::JobState,
    name::make_unique_name,
    target::Target,
    template::{self, config_map_name, JobTemplate, Volume, VolumeMount},
    volume::VolumeMountSpec,
    Error, Result,
};

/// Deletes a submitted job, and the script config map that may accompany it, when dropped. Failures are logged and
/// otherwise ignored so they never replace the outcome of the run.
struct JobCleanup<'a> {
    cluster: &'a dyn Cluster,
    name: &'a str,
    namespace: &'a str,
}

impl Drop for JobCleanup<'_> {
    fn drop(&mut self) {
        let name = self.name;
        info!("Cleaning up job: {name}");
        if let Err(error) = self.cluster.delete_job(name, self.namespace) {
            warn!("Failed to clean up job {name}: {error}");
        }
        if let Err(error) = self
            .cluster
            .delete_config_map(&config_map_name(name), self.namespace)
        {
            warn!("Failed to clean up the script of job {name}: {error}");
        }
    }
}

/// The shared volumes followed by one host path volume per spec. Volume names number all volumes, so the first custom
/// volume is `custom-volume-2`.
fn volumes(specs: &[VolumeMountSpec]) -> (Vec<Volume>, Vec<VolumeMount>) {
    let mut volumes = template::shared_volumes();
    let mut mounts = template::shared_volume_mounts();
    for spec in specs {
        let name = format!("custom-volume-{}", volumes.len());
        volumes.push(Volume::host_path(&name, &spec.host_path));
        mounts.push(VolumeMount::new(&name, &spec.pod_path, spec.read_only));
    }
    (volumes, mounts)
}

impl Executor<'_> {
    pub(super) fn execute_in_job(
        &self,
        target: &Target,
        settings: &Settings,
        volume_specs: &[VolumeMountSpec],
        dry_run: bool,
    ) -> Result<ExecutionOutput> {
        let name = make_unique_name(JOB_NAME_PREFIX);
        let namespace = settings.namespace.as_str();
        let (volumes, volume_mounts) = volumes(volume_specs);
        let command = shell_command(target, Some(&entry_path(&self.current_dir)));

        if dry_run {
            return Ok(ExecutionOutput {
                exit_code: 0,
                output: format!(
                    "Would create job {name} with image {}: {}",
                    settings.image,
                    command.join(" ")
                ),
            });
        }

        let config = self.config;
        let manifest = template::job_manifest(JobTemplate {
            name: &name,
            namespace,
            image: &settings.image,
            command: &command,
            memory: &settings.memory,
            cpu: &settings.cpu,
            workdir: &settings.workdir,
            volumes,
            volume_mounts,
            annotations: self.annotations(),
            node_selector: config.node_selector.clone(),
            security_context: Some(config.security_context.clone()),
            ttl_seconds_after_finished: Some(config.ttl_seconds_after_finished),
            automount_service_account_token: config.automount_service_account_token,
            ..Default::default()
        });

        // Armed before submission: a rejected create may still have left an object behind.
        let _cleanup = settings.cleanup.then(|| JobCleanup {
            cluster: self.cluster,
            name: &name,
            namespace,
        });

        info!("Creating job: {name}");
        self.cluster
            .create_job(&manifest)
            .map_err(|error| match interrupted_or(error, &self.cancellation) {
                Error::Interrupted => Error::Interrupted,
                error => Error::JobExecution {
                    message: format!("Job execution failed: could not create job {name}: {error}"),
                    source: Some(Box::new(error)),
                },
            })?;

        info!("Waiting for job completion: {name}");
        let state = wait_for_job(
            self.cluster,
            JobWait {
                name: &name,
                namespace,
                timeout: std::time::Duration::from_secs(config.timeout),
                poll_interval: self.poll_interval,
                cancellation: &self.cancellation,
            },
        )?;

        let output = job_logs(self.cluster, &name, namespace);
        Ok(ExecutionOutput {
            exit_code: match state {
                JobState::Succeeded => 0,
                JobState::Failed | JobState::Running => 1,
            },
            output,
        })
    }
}
