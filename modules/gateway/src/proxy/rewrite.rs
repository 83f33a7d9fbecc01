/// Rewrite an inbound path to its upstream form.
///
/// A pure prefix substitution: the configured external prefix is replaced
/// with the upstream base path, and no other path segment is altered.
/// Returns `None` when the path does not begin with the prefix on a
/// segment boundary (`/api/serverX` must not match `/api/server`).
#[must_use]
pub fn rewrite_path(route_prefix: &str, upstream_prefix: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(route_prefix)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(format!("{upstream_prefix}{rest}"))
}
