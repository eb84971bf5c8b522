//! Path normalization for configured prefixes and excludes.

/// Normalize a config-supplied path into canonical form: leading `/`,
/// no `./` segments, no duplicate or trailing slashes.
///
/// The root collapses to the empty string, which is the canonical key
/// for "the directory itself" throughout the content subsystem.
pub fn sanitize(path: &str) -> String {
    let mut out = path.replace("./", "");
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    while out.contains("//") {
        out = out.replace("//", "/");
    }
    if out.ends_with('/') {
        out.pop();
    }
    out
}
