//! Line-set diff used to narrate document changes.
//!
//! Lines are compared as sets, not by position: a line moved within the
//! document is not reported. Output is meant for people and for memory
//! extraction prompts, not for patching.

use std::collections::HashSet;

pub const DEFAULT_SECTION_LIMIT: usize = 30;
pub const NO_SIGNIFICANT_CHANGE: &str = "(no significant change)";

pub fn compute_diff(old: &str, new: &str) -> String {
    compute_diff_with_limit(old, new, DEFAULT_SECTION_LIMIT)
}

pub fn compute_diff_with_limit(old: &str, new: &str, section_limit: usize) -> String {
    let old_lines = line_set(old);
    let new_lines = line_set(new);

    let added = unique_lines(new)
        .filter(|line| !old_lines.contains(line))
        .collect::<Vec<_>>();
    let removed = unique_lines(old)
        .filter(|line| !new_lines.contains(line))
        .collect::<Vec<_>>();

    if added.is_empty() && removed.is_empty() {
        return NO_SIGNIFICANT_CHANGE.to_string();
    }

    let mut out = String::new();
    push_section(&mut out, "Added:", '+', &added, section_limit);
    push_section(&mut out, "Removed:", '-', &removed, section_limit);
    out.truncate(out.trim_end().len());
    out
}

fn line_set(text: &str) -> HashSet<&str> {
    significant_lines(text).collect()
}

fn significant_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Significant lines in order of first appearance, without repeats.
fn unique_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut seen = HashSet::new();
    significant_lines(text).filter(move |line| seen.insert(*line))
}

fn push_section(out: &mut String, header: &str, marker: char, lines: &[&str], limit: usize) {
    if lines.is_empty() {
        return;
    }
    out.push_str(header);
    out.push('\n');
    for line in lines.iter().take(limit) {
        out.push(marker);
        out.push(' ');
        out.push_str(line);
        out.push('\n');
    }
    if lines.len() > limit {
        out.push_str(&format!("... and {} more\n", lines.len() - limit));
    }
}
