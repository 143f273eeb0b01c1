use std::path::PathBuf;

use clap::Parser;
use constcat::concat;
use log::debug;

use crate::{
    config::{env, CONFIG_FILE_NAME},
    executor::{CleanupPolicy, ExecutionRequest, Executor},
    kubectl::Kubectl,
    list,
    version::VERSION,
    volume::VolumeMountSpec,
    Error, Result,
};

/// Run a command or script on Kubernetes, inside an existing pod or in a fresh Job.
#[derive(Debug, Parser)]
#[command(name = "kubexec", version = VERSION, about)]
pub struct Cli {
    /// A shell command line, or the path of a local script file to upload and run.
    #[arg(required_unless_present_any = ["list_jobs", "cleanup_old"])]
    target: Option<String>,

    #[arg(short = 'd', long = "docker-image", help = concat!("Container image for new jobs [config: docker_image, env: ", env::DOCKER_IMAGE, "]"))]
    docker_image: Option<String>,

    #[arg(short = 'n', long = "namespace", help = concat!("Kubernetes namespace [env: ", env::NAMESPACE, "]"))]
    namespace: Option<String>,

    /// Run inside this pod when it exists, otherwise fall back to a new job.
    #[arg(short = 'p', long = "pod-name")]
    pod_name: Option<String>,

    #[arg(short = 'm', long = "memory", help = concat!("Memory for new jobs, e.g. 512Mi, 2Gi or a plain number of MiB [env: ", env::MEMORY, "]"))]
    memory: Option<String>,

    #[arg(short = 'c', long = "cpu", help = concat!("CPU for new jobs, e.g. 500m or 2 [env: ", env::CPU, "]"))]
    cpu: Option<String>,

    #[arg(short = 'w', long = "workdir", help = concat!("Working directory of the job container [env: ", env::WORKDIR, "]"))]
    workdir: Option<String>,

    /// Mount a host path into the job container. May be repeated.
    #[arg(short = 'v', long = "volume", value_name = "HOST:POD[:ro]")]
    volumes: Vec<VolumeMountSpec>,

    #[arg(long = "config", value_name = "FILE", help = concat!("Configuration file, instead of the first ", CONFIG_FILE_NAME, " found in /shared/team/kubexec/<user>, ~/.config/kubexec or /tmp/kubexec"))]
    config: Option<PathBuf>,

    /// The kubectl context to use.
    #[arg(long = "context")]
    context: Option<String>,

    /// Always create a new job, even if --pod-name exists.
    #[arg(long = "create-pod")]
    create_pod: bool,

    #[arg(long = "cleanup", conflicts_with = "no_cleanup", help = concat!("Delete the job when it finishes [env: ", env::CLEANUP, "]"))]
    cleanup: bool,

    /// Keep the job after it finishes.
    #[arg(long = "no-cleanup")]
    no_cleanup: bool,

    #[arg(long = "verbose", help = concat!("Debug logging with timestamps [env: ", env::VERBOSE, "]"))]
    pub verbose: bool,

    /// Print what would run without touching the cluster.
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// List the jobs kubexec created in the namespace.
    #[arg(long = "list-jobs")]
    list_jobs: bool,

    /// Delete kubexec jobs older than HOURS.
    #[arg(long = "cleanup-old", value_name = "HOURS")]
    cleanup_old: Option<u32>,
}

impl Cli {
    fn cleanup_policy(&self) -> CleanupPolicy {
        match (self.cleanup, self.no_cleanup) {
            (true, _) => CleanupPolicy::Always,
            (_, true) => CleanupPolicy::Never,
            _ => CleanupPolicy::Default,
        }
    }

    /// Runs the invocation and returns the exit code to report.
    pub fn run(self) -> Result<i32> {
        let kubectl = Kubectl::new(self.context.clone());
        let config = super::load_config(self.config.clone(), &kubectl)?;
        debug!("Configuration: {config:?}");

        let cancellation = super::install_ctrlc_handler()?;
        let executor = Executor::new(&config, &kubectl, cancellation);
        let namespace = self
            .namespace
            .clone()
            .unwrap_or_else(|| config.namespace().to_owned());

        if self.list_jobs {
            let jobs = executor.list_jobs(&namespace)?;
            if jobs.is_empty() {
                println!("No kubexec jobs found");
            } else {
                println!("{}", list::job_table(&jobs));
            }
            return Ok(0);
        }

        if let Some(hours) = self.cleanup_old {
            let deleted = executor.cleanup_old_jobs(&namespace, hours)?;
            println!("Cleaned up {deleted} jobs older than {hours} hours");
            return Ok(0);
        }

        let cleanup = self.cleanup_policy();
        let Cli {
            target,
            docker_image,
            pod_name,
            memory,
            cpu,
            workdir,
            volumes,
            create_pod,
            dry_run,
            ..
        } = self;
        let target =
            target.ok_or_else(|| Error::Configuration("no command or script given".to_owned()))?;

        let output = executor.execute(&ExecutionRequest {
            target,
            docker_image,
            namespace: Some(namespace),
            pod_name,
            memory,
            cpu,
            workdir,
            volumes,
            create_pod,
            cleanup,
            dry_run,
        })?;

        if output.output.ends_with('\n') {
            print!("{}", output.output);
        } else if !output.output.is_empty() {
            println!("{}", output.output);
        }
        Ok(output.exit_code)
    }
}
