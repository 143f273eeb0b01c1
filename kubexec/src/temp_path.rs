use std::path::PathBuf;

/// Returns a fresh `/tmp/kubexec-<16 alphanumerics>.json` path. The file is not created.
pub fn tmp_json_path() -> PathBuf {
    use rand::distributions::{Alphanumeric, DistString};

    const PREFIX: &str = "/tmp/kubexec-";
    const EXT: &str = ".json";
    const LEN: usize = 16;

    let mut path = String::with_capacity(PREFIX.len() + LEN + EXT.len());
    path.push_str(PREFIX);
    Alphanumeric.append_string(&mut rand::thread_rng(), &mut path, LEN);
    path.push_str(EXT);
    path.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_distinct_json_files() {
        let a = tmp_json_path();
        let b = tmp_json_path();
        assert_ne!(a, b);
        assert!(a.to_string_lossy().starts_with("/tmp/kubexec-"));
        assert_eq!(a.extension().and_then(|ext| ext.to_str()), Some("json"));
    }
}
