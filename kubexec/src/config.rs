//! Layered configuration: built-in defaults, then the YAML file, then `KUBEXEC_*` environment variables. Command line
//! flags are applied last by the executor, per request.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{kubectl::Kubectl, template::SecurityContext, Error, Result};

pub const CONFIG_FILE_NAME: &str = "config.yaml";

const SERVICE_ACCOUNT_NAMESPACE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

const DEFAULT_NAMESPACE: &str = "default";

pub mod env {
    pub const DOCKER_IMAGE: &str = "KUBEXEC_DOCKER_IMAGE";
    pub const NAMESPACE: &str = "KUBEXEC_NAMESPACE";
    pub const MEMORY: &str = "KUBEXEC_MEMORY";
    pub const CPU: &str = "KUBEXEC_CPU";
    pub const WORKDIR: &str = "KUBEXEC_WORKDIR";
    pub const CLEANUP: &str = "KUBEXEC_CLEANUP";
    pub const VERBOSE: &str = "KUBEXEC_VERBOSE";
    pub const TIMEOUT: &str = "KUBEXEC_TIMEOUT";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub docker_image: String,
    /// Detected when neither the file nor the environment sets it.
    pub namespace: Option<String>,
    pub memory: String,
    pub cpu: String,
    pub workdir: String,
    pub cleanup: bool,
    pub verbose: bool,
    /// Seconds to wait for a job to finish.
    pub timeout: u64,
    pub ttl_seconds_after_finished: i32,
    pub security_context: SecurityContext,
    pub node_selector: BTreeMap<String, String>,
    pub automount_service_account_token: bool,

    /// Where this configuration was read from, if anywhere.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docker_image: "ubuntu:latest".to_owned(),
            namespace: None,
            memory: "1Gi".to_owned(),
            cpu: "1".to_owned(),
            workdir: "/tmp".to_owned(),
            cleanup: true,
            verbose: false,
            timeout: 3600,
            ttl_seconds_after_finished: 60,
            security_context: SecurityContext::default(),
            node_selector: [(
                "hub.jupyter.org/node-purpose".to_owned(),
                "user".to_owned(),
            )]
            .into_iter()
            .collect(),
            automount_service_account_token: false,
            path: None,
        }
    }
}

/// Directories searched for [`CONFIG_FILE_NAME`], in order of preference.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![Path::new("/shared/team/kubexec").join(whoami::username())];
    if let Some(home) = home::home_dir() {
        dirs.push(home.join(".config").join("kubexec"));
    }
    dirs.push(PathBuf::from("/tmp/kubexec"));
    dirs
}

/// `true`, `1`, `yes` and `on` in any case are true, everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Finds the namespace of the current environment: the service account when running inside a pod, then the kubeconfig
/// context, then `default`.
pub fn detect_namespace(kubectl: &Kubectl) -> String {
    if let Ok(namespace) = fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE) {
        let namespace = namespace.trim();
        if !namespace.is_empty() {
            return namespace.to_owned();
        }
    }
    match kubectl.current_namespace() {
        Ok(Some(namespace)) => namespace,
        Ok(None) => DEFAULT_NAMESPACE.to_owned(),
        Err(error) => {
            debug!("Could not read the namespace from the kubeconfig: {error}");
            DEFAULT_NAMESPACE.to_owned()
        }
    }
}

/// Inputs to [`Loader::load`]. Environment access and namespace detection are injected so loading can be tested.
pub struct Loader<E, D> {
    /// An explicit file path. When set, the search directories are ignored.
    pub path: Option<PathBuf>,
    pub search_dirs: Vec<PathBuf>,
    pub env: E,
    pub detect_namespace: D,
}

impl<E, D> Loader<E, D>
where
    E: Fn(&str) -> Option<String>,
    D: FnOnce() -> String,
{
    pub fn load(self) -> Result<Config> {
        let Loader {
            path,
            search_dirs,
            env,
            detect_namespace,
        } = self;
        let mut detect_namespace = Some(detect_namespace);
        let mut namespace = move || detect_namespace.take().map(|detect| detect());

        let existing = match &path {
            Some(path) => Some(path.clone()).filter(|path| path.exists()),
            None => search_dirs
                .iter()
                .map(|dir| dir.join(CONFIG_FILE_NAME))
                .find(|path| path.exists()),
        };

        let mut config = match existing {
            Some(path) => read(&path)?,
            None => {
                let config = Config {
                    namespace: namespace(),
                    ..Config::default()
                };
                let candidates = match path {
                    Some(path) => vec![path],
                    None => search_dirs
                        .iter()
                        .map(|dir| dir.join(CONFIG_FILE_NAME))
                        .collect(),
                };
                create_default(config, &candidates)
            }
        };

        // A blank namespace counts as unset.
        config.namespace = config
            .namespace
            .take()
            .filter(|namespace| !namespace.trim().is_empty())
            .or_else(namespace);

        apply_env(&mut config, env)?;
        Ok(config)
    }
}

impl Config {
    /// Loads the configuration the command line tools use, reading the process environment.
    pub fn load(path: Option<PathBuf>, kubectl: &Kubectl) -> Result<Self> {
        Loader {
            path,
            search_dirs: search_dirs(),
            env: |key: &str| std::env::var(key).ok(),
            detect_namespace: || detect_namespace(kubectl),
        }
        .load()
    }

    /// The namespace, falling back to `default` if detection never ran.
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Writes this configuration back to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or_else(|| {
            Error::Configuration("the configuration was not loaded from a file".to_owned())
        })?;
        write(path, self)
    }
}

fn read(path: &Path) -> Result<Config> {
    debug!("Reading configuration from {}", path.display());
    let contents = fs::read_to_string(path).map_err(|error| {
        Error::Configuration(format!(
            "cannot read config file {}: {error}",
            path.display()
        ))
    })?;
    // An empty document means all defaults.
    let mut config = if contents.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|error| {
            Error::Configuration(format!(
                "invalid YAML in config file {}: {error}",
                path.display()
            ))
        })?
    };
    config.path = Some(path.to_owned());
    Ok(config)
}

fn write(path: &Path, config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).map_err(|error| {
        Error::Configuration(format!("cannot serialize configuration: {error}"))
    })?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|error| {
            Error::Configuration(format!("cannot create {}: {error}", dir.display()))
        })?;
    }
    fs::write(path, yaml).map_err(|error| {
        Error::Configuration(format!(
            "cannot write config file {}: {error}",
            path.display()
        ))
    })
}

/// Writes `config` to the first candidate that accepts it. Without any writable location the defaults are used in
/// memory only.
fn create_default(mut config: Config, candidates: &[PathBuf]) -> Config {
    for path in candidates {
        config.path = Some(path.clone());
        match config.save() {
            Ok(()) => {
                info!("Created default configuration at {}", path.display());
                return config;
            }
            Err(error) => debug!("{error}"),
        }
    }
    warn!("Could not create a configuration file, using built-in defaults");
    config.path = None;
    config
}

fn apply_env<E: Fn(&str) -> Option<String>>(config: &mut Config, lookup: E) -> Result<()> {
    if let Some(value) = lookup(env::DOCKER_IMAGE) {
        config.docker_image = value;
    }
    if let Some(value) = lookup(env::NAMESPACE).filter(|value| !value.trim().is_empty()) {
        config.namespace = Some(value);
    }
    if let Some(value) = lookup(env::MEMORY) {
        config.memory = value;
    }
    if let Some(value) = lookup(env::CPU) {
        config.cpu = value;
    }
    if let Some(value) = lookup(env::WORKDIR) {
        config.workdir = value;
    }
    if let Some(value) = lookup(env::CLEANUP) {
        config.cleanup = parse_bool(&value);
    }
    if let Some(value) = lookup(env::VERBOSE) {
        config.verbose = parse_bool(&value);
    }
    if let Some(value) = lookup(env::TIMEOUT) {
        config.timeout = value.trim().parse().map_err(|_| {
            Error::Configuration(format!(
                "{} must be a whole number of seconds, got {value:?}",
                env::TIMEOUT
            ))
        })?;
    }
    Ok(())
}
