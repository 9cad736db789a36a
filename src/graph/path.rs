//! Drive path helpers
//!
//! Paths are percent-encoded before they are placed in a request URL. Path
//! separators are kept so that `root:/<path>:` addressing still works.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except unreserved characters and `/`
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode a path, preserving separators
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SEGMENT).to_string()
}

/// Join a folder and a filename into a drive-relative item path.
///
/// Leading and trailing separators of the folder are stripped.
pub fn item_path(folder: &str, filename: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        filename.to_string()
    } else {
        format!("{folder}/{filename}")
    }
}
