/// Identifier used on disk when a sanitized id would otherwise be empty.
pub const UNKNOWN_ID: &str = "unknown";

/// Generate a unique ID with the given prefix, using timestamp + random hex.
pub fn generate_id(prefix: &str) -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let r: u32 = rand::random();
    format!("{prefix}-{ts:x}-{r:x}")
}

/// Sanitize an identifier so it is safe to use as a single path component.
///
/// Any character that is not alphanumeric, hyphen, or underscore becomes an
/// underscore. Empty ids and the special names "." / ".." map to
/// [`UNKNOWN_ID`].
pub fn sanitize_id(id: &str) -> String {
    if id.is_empty() || id == "." || id == ".." {
        return UNKNOWN_ID.to_string();
    }
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
