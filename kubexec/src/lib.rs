pub(crate) mod cancel;
pub mod cli;
pub(crate) mod cluster;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod kubectl;
pub(crate) mod list;
pub(crate) mod name;
pub(crate) mod process;
pub(crate) mod quantity;
pub(crate) mod shell;
pub(crate) mod target;
pub(crate) mod temp_path;
pub mod template;
pub(crate) mod time_ext;
pub(crate) mod version;
pub(crate) mod volume;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
