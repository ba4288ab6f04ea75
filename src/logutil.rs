//! Logging utilities for quoting player-supplied strings in log lines.
//!
//! Name lookups and transaction notes arrive from chat commands before any
//! validation runs, so anything echoed into the log gets escaped here to keep
//! each entry on a single line.

/// Escape a string for single-line logging. Control characters become their
/// `escape_default` form (`\n`, `\t`, `\u{1}`) and backslashes are doubled
/// so escaped and literal sequences stay distinguishable. Long strings are
/// cut at a preview limit with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 160;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW));
    let mut shown = 0;
    for ch in s.chars() {
        if shown == MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.extend(c.escape_default()),
            c => out.push(c),
        }
        shown += 1;
    }
    out
}
