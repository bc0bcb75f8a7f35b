//! Byte-offset line helpers, 1-based where lines are involved.

// ============================================================================
// Line Helpers
// ============================================================================

/// Byte offset of the start of the line containing `offset`.
pub fn line_start_offset(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

/// Byte offset one past the end of the line containing `offset`
/// (past the newline, or the end of the text for the last line).
pub fn line_end_offset(content: &str, offset: usize) -> usize {
    let clamped = offset.min(content.len());
    content[clamped..]
        .find('\n')
        .map(|i| clamped + i + 1)
        .unwrap_or(content.len())
}

/// The leading whitespace of the line containing `offset`.
pub fn indentation_at(content: &str, offset: usize) -> &str {
    let start = line_start_offset(content, offset);
    let rest = &content[start..];
    let end = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..end]
}

// ============================================================================
// Tests
// ============================================================================
