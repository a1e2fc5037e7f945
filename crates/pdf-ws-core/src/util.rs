//! Utility functions shared across the crate.

use std::path::PathBuf;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// First element of a multi-valued index field, or an empty string.
pub fn first_element_of(values: &[String]) -> &str {
    values.first().map_or("", String::as_str)
}

/// Substitute every `{NAME}` placeholder in a URL template.
///
/// Identifiers are inserted verbatim; upstream servers expect `uva-lib:123`
/// rather than its percent-encoded form.
pub fn fill_template(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(placeholder, value)
}
