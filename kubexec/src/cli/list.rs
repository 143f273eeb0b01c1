use clap::Parser;

use crate::{
    cancel::Cancellation,
    kubectl::Kubectl,
    list::{self, PodListOptions},
    version::VERSION,
    Result,
};

/// List the pods of a namespace, or watch them.
#[derive(Debug, Parser)]
#[command(name = "kuberlist", version = VERSION, about)]
pub struct ListCli {
    /// Namespace to list, defaults to the configured one.
    #[arg(short = 'n', long = "namespace")]
    pub namespace: Option<String>,

    /// The kubectl context to use.
    #[arg(long = "context")]
    pub context: Option<String>,

    /// Also show the node and image of each pod.
    #[arg(long = "all")]
    pub all: bool,

    /// Only running pods.
    #[arg(long = "running")]
    pub running: bool,

    /// Only pods created by kubexec.
    #[arg(long = "kubexec")]
    pub kubexec: bool,

    /// Redraw the listing every 5 seconds until interrupted.
    #[arg(long = "watch")]
    pub watch: bool,

    #[arg(long = "verbose")]
    pub verbose: bool,
}

impl ListCli {
    pub fn run(self) -> Result<()> {
        let kubectl = Kubectl::new(self.context);
        let namespace = match self.namespace {
            Some(namespace) => namespace,
            None => super::load_config(None, &kubectl)?.namespace().to_owned(),
        };

        if self.watch {
            let cancellation: Cancellation = super::install_ctrlc_handler()?;
            return list::watch_pods(&kubectl, &namespace, self.kubexec, &cancellation);
        }

        list::list_pods(
            &kubectl,
            &namespace,
            PodListOptions {
                show_all: self.all,
                running_only: self.running,
                kubexec_only: self.kubexec,
            },
        )
    }
}
