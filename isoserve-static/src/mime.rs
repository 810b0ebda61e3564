//! MIME type handling

use std::path::Path;

/// Content type used when nothing else matches
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Extension (with leading dot) to content type.
///
/// The empty key covers files without an extension.
pub const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("", DEFAULT_MIME_TYPE),
    (".manifest", "text/cache-manifest"),
    (".html", "text/html"),
    (".png", "image/png"),
    (".jpg", "image/jpg"),
    (".svg", "image/svg+xml"),
    (".css", "text/css"),
    (".js", "text/javascript"),
    (".wasm", "application/wasm"),
    (".json", "application/json"),
    (".xml", "application/xml"),
];

/// Look up an extension (leading dot included) in the built-in table
pub fn lookup_extension(ext: &str) -> Option<&'static str> {
    EXTENSION_TABLE
        .iter()
        .find(|(key, _)| *key == ext)
        .map(|(_, mime)| *mime)
}

/// Extension of `path` in table form: `".wasm"`, or `""` if there is none.
///
/// Dot-files such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Determine the content type for a file path.
///
/// The table is consulted with the extension as written, then lower-cased.
/// Unknown extensions go to the `mime_guess` registry when `guess_unknown`
/// is set, and finally to the default entry.
pub fn content_type_for(path: &Path, guess_unknown: bool) -> &'static str {
    let ext = extension_of(path);

    if let Some(mime) = lookup_extension(&ext) {
        return mime;
    }
    if let Some(mime) = lookup_extension(&ext.to_lowercase()) {
        return mime;
    }
    if guess_unknown {
        if let Some(mime) = mime_guess::from_path(path).first_raw() {
            return mime;
        }
    }

    DEFAULT_MIME_TYPE
}
