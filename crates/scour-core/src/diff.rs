//! Unified diff generation for committed transactions.
//!
//! A committed transaction reports the exact file diff alongside the measured
//! improvement. The diff here is line-based with a single hunk per file:
//! the common prefix and suffix are trimmed and the differing middle is
//! emitted as removals followed by additions.

/// Generate a unified diff for one file.
///
/// Returns an empty string when `old` and `new` are identical.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    // Trim common prefix.
    let mut prefix = 0usize;
    while prefix < old_lines.len()
        && prefix < new_lines.len()
        && old_lines[prefix] == new_lines[prefix]
    {
        prefix += 1;
    }

    // Trim common suffix (never overlapping the prefix).
    let mut suffix = 0usize;
    while suffix < old_lines.len() - prefix
        && suffix < new_lines.len() - prefix
        && old_lines[old_lines.len() - 1 - suffix] == new_lines[new_lines.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let old_mid = &old_lines[prefix..old_lines.len() - suffix];
    let new_mid = &new_lines[prefix..new_lines.len() - suffix];

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", path));
    diff.push_str(&format!("+++ b/{}\n", path));
    diff.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        prefix + 1,
        old_mid.len(),
        prefix + 1,
        new_mid.len()
    ));
    for line in old_mid {
        diff.push('-');
        diff.push_str(line);
        diff.push('\n');
    }
    for line in new_mid {
        diff.push('+');
        diff.push_str(line);
        diff.push('\n');
    }

    diff
}

// ============================================================================
// Tests
// ============================================================================
