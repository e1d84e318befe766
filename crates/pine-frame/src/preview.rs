/// Bytes shown before a preview is truncated.
const PREVIEW_LIMIT: usize = 64;

/// Space-separated hex rendering of a frame for logs and error messages.
pub fn hex_preview(bytes: &[u8]) -> String {
    let shown = bytes.len().min(PREVIEW_LIMIT);
    let mut out = bytes[..shown]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if bytes.len() > shown {
        out.push_str(&format!(" ...(+{} bytes)", bytes.len() - shown));
    }
    if out.is_empty() {
        out.push_str("<empty>");
    }
    out
}
