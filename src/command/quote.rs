//! Shell quoting for configuration-sourced values.

use std::borrow::Cow;

/// Wraps `value` in single quotes so a POSIX shell reads it as one literal word.
///
/// Embedded single quotes use the `'\''` idiom: close the quoted span, emit an
/// escaped quote, reopen the span.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Quotes `value` only when it contains a character outside the shell-safe set.
///
/// Values made solely of `[A-Za-z0-9_@%+=:,./-]` pass through unchanged, so
/// flags like `--tls` and URLs like `file:///srv/repo` keep their readable form.
pub fn quote_if_needed(value: &str) -> Cow<'_, str> {
    if !value.is_empty() && value.chars().all(is_shell_safe) {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(quote(value))
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '_' | '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}
