pub const READ_PREFIX: &str = "data";
pub const WRITE_PREFIX: &str = READ_PREFIX;
pub const LIST_PREFIX: &str = "metadata";

/// Inserts the KV v2 API prefix after the mount path
///
/// secret/foo        (mount secret/)        -> secret/data/foo
/// secret/data/foo   (mount secret)         -> secret/data/foo
/// secret/foo/kv/bar (mount secret/foo/kv/) -> secret/foo/kv/data/bar
///
/// A path outside of `mount` is returned as it is.
pub fn fix_path(p: &str, mount: &str, prefix: &str) -> String {
    let mount = mount.trim_end_matches('/');
    let rest = match p.strip_prefix(mount) {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return p.to_string(),
    };

    if rest.split('/').next() == Some(prefix) {
        return p.to_string(); // already v2 style path
    }

    [mount, prefix, rest.trim_end_matches('/')]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
