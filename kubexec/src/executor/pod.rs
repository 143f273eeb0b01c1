//! Running in a pod that already exists.

use log::info;

use super::{
    command::shell_command,
    common::interrupted_or,
    ExecutionOutput, Executor,
};
use crate::{target::Target, Error, Result};

impl Executor<'_> {
    /// Volumes cannot be added to a running pod, so only the command is sent.
    pub(super) fn execute_in_pod(
        &self,
        pod: &str,
        target: &Target,
        namespace: &str,
        dry_run: bool,
    ) -> Result<ExecutionOutput> {
        let command = shell_command(target, None);

        if dry_run {
            return Ok(ExecutionOutput {
                exit_code: 0,
                output: format!("Would execute in pod {pod}: {}", command.join(" ")),
            });
        }

        info!("Executing in existing pod: {pod}");
        let output = self
            .cluster
            .exec_in_pod(pod, namespace, &command, None, &self.cancellation)
            .map_err(|error| interrupted_or(error, &self.cancellation))?;
        // The remote command died with the local kubectl.
        if self.cancellation.is_cancelled() {
            return Err(Error::Interrupted);
        }
        Ok(output.into())
    }
}
