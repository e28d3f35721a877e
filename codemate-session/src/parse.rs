//! Splitting model replies into code and explanation.
//!
//! Replies mix prose with fenced Python blocks. Extraction is a two-state
//! line scanner keyed on exact trimmed-line fence markers; it deliberately
//! does no further Markdown interpretation.

/// Opening fence markers recognized as starting a Python block
const OPEN_MARKERS: [&str; 2] = ["```python", "```py"];

/// Bare fence closing a block
const CLOSE_MARKER: &str = "```";

/// Extract every fenced Python block from a reply.
///
/// Marker lines are discarded; lines between an opening and a closing fence
/// are kept verbatim. Completed blocks are joined with a blank line. A block
/// that is opened but never closed contributes nothing.
pub fn extract_code(response: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_block = false;

    for line in response.split('\n') {
        let trimmed = line.trim();
        if OPEN_MARKERS.contains(&trimmed) {
            in_block = true;
            continue;
        }
        if trimmed == CLOSE_MARKER && in_block {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }
        if in_block {
            current.push(line);
        }
    }

    blocks.join("\n\n")
}

/// Strip every fenced Python block from a reply, leaving the explanation.
///
/// Works on the original reply text: the earliest opening marker and
/// everything through the closing fence is spliced out, repeatedly, until no
/// opening marker remains. The newline terminating the closing line is kept,
/// so prose that surrounded a block stays separated by a blank line. A block
/// with no closing fence extends to end-of-text. The result is trimmed and
/// the whole operation is idempotent.
pub fn extract_explanation(response: &str) -> String {
    let mut text = response.to_string();

    while let Some(start) = earliest_open_marker(&text) {
        let open_line_end = match text[start..].find('\n') {
            Some(i) => start + i + 1,
            None => text.len(),
        };
        let span_end = match text[open_line_end..].find(CLOSE_MARKER) {
            Some(i) => open_line_end + i + CLOSE_MARKER.len(),
            None => text.len(),
        };
        text.replace_range(start..span_end, "");
    }

    text.trim().to_string()
}

fn earliest_open_marker(text: &str) -> Option<usize> {
    OPEN_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
}
