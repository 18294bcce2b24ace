//! File-name gate applied before anything touches the network.

/// Extensions the split service knows how to parse.
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// Pure predicate plus a user-facing message; display is the caller's job.
pub fn validate_file_name(name: &str) -> Result<(), String> {
    if has_accepted_extension(name) {
        Ok(())
    } else {
        Err(format!(
            "Please upload a valid spreadsheet file (.xlsx, .xls, or .csv): \"{name}\" is not supported."
        ))
    }
}

pub fn has_accepted_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ACCEPTED_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}
