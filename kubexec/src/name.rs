//! Generated names for cluster objects and in-pod files.

use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::{seq::SliceRandom, Rng};

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .filter_map(|_| SUFFIX_CHARSET.choose(rng).map(|&byte| byte as char))
        .collect()
}

/// `len` random characters from `[a-z0-9]`.
pub fn random_token(len: usize) -> String {
    random_suffix(&mut rand::thread_rng(), len)
}

/// Returns `<base>-<unix seconds>-<6 random [a-z0-9]>`. Names stay valid RFC 1123 labels as long as `base` is one.
pub fn make_unique_name(base: &str) -> String {
    format!(
        "{base}-{timestamp}-{suffix}",
        timestamp = unix_seconds(),
        suffix = random_suffix(&mut rand::thread_rng(), 6)
    )
}

/// Inserts `-<unix seconds>-<4 random [a-z0-9]>` between the stem and the extension of `file_name`.
pub fn make_unique_filename(file_name: &str) -> String {
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default();
    format!(
        "{stem}-{timestamp}-{suffix}{extension}",
        timestamp = unix_seconds(),
        suffix = random_suffix(&mut rand::thread_rng(), 4)
    )
}
