//! Identifier helpers.

use uuid::Uuid;

use crate::defaults::JOB_ID_PREFIX;

/// Generate a time-ordered UUIDv7.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Generate an opaque job id of the form `<prefix>_<uuidv7 simple>`.
///
/// Ids sort by creation time, which `restore` relies on as a tiebreak. The
/// prefix passes through [`sanitize_id_prefix`], so every generated id is
/// [portable](is_portable_id).
pub fn new_job_id(prefix: &str) -> String {
    format!("{}_{}", sanitize_id_prefix(prefix), new_v7().simple())
}

fn is_portable_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Whether `id` can be used verbatim as a file name by storage adapters.
///
/// ASCII letters, digits, `_`, `-` and `.` only, with no leading dot.
pub fn is_portable_id(id: &str) -> bool {
    !id.is_empty() && !id.starts_with('.') && id.chars().all(is_portable_char)
}

/// Rewrite an id prefix so generated ids stay portable.
///
/// Disallowed characters become `-` and leading dots are dropped. A prefix
/// with nothing left falls back to the default.
pub fn sanitize_id_prefix(prefix: &str) -> String {
    let cleaned: String = prefix
        .trim()
        .trim_start_matches('.')
        .chars()
        .map(|c| if is_portable_char(c) { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        JOB_ID_PREFIX.to_string()
    } else {
        cleaned
    }
}
