//! Local time without consulting the environment after threads have been spawned.
//!
//! `time` refuses to determine the local offset once a process is multi-threaded on most unix platforms. [`init`] has
//! to run at the start of `main`, before the Ctrl-C handler thread exists.

use std::sync::OnceLock;

use time::{OffsetDateTime, UtcOffset};

use crate::{Error, Result};

static LOCAL_OFFSET: OnceLock<Option<UtcOffset>> = OnceLock::new();

/// Determines and caches the local offset.
pub fn init() {
    LOCAL_OFFSET.get_or_init(|| UtcOffset::current_local_offset().ok());
}

pub fn local_offset() -> Result<UtcOffset> {
    LOCAL_OFFSET
        .get()
        .copied()
        .flatten()
        .ok_or_else(|| Error::Configuration("the local UTC offset is unavailable".to_owned()))
}

pub trait OffsetDateTimeExt {
    fn to_local(self) -> Result<OffsetDateTime>;
}

impl OffsetDateTimeExt for OffsetDateTime {
    fn to_local(self) -> Result<OffsetDateTime> {
        Ok(self.to_offset(local_offset()?))
    }
}

/// Renders the time elapsed between `created` and `now` with the two most significant units: `3d4h`, `5h12m`, `7m`.
pub fn format_age(created: OffsetDateTime, now: OffsetDateTime) -> String {
    let minutes = (now - created).whole_minutes().max(0);
    let (days, hours, minutes) = (minutes / (24 * 60), minutes / 60 % 24, minutes % 60);
    if days > 0 {
        format!("{days}d{hours}h")
    } else if hours > 0 {
        format!("{hours}h{minutes}m")
    } else {
        format!("{minutes}m")
    }
}
