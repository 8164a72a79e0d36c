//! Tag filtering and bounded selection
//!
//! A [`TagSelector`] drops every tag matched by an exclude pattern, orders the rest newest-first
//! and keeps at most `limit` of them. Patterns that fail to compile never match; they are kept in
//! [`TagSelector::rejected_patterns`] so the caller can warn about them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ordering applied to tags before truncation. Both orderings are descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOrdering {
    /// Byte-wise comparison of the raw tag strings ("v9" sorts above "v10")
    #[default]
    Lexicographic,
    /// Digit runs compared by numeric value ("v10" sorts above "v9")
    Natural,
}

impl TagOrdering {
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            TagOrdering::Lexicographic => a.as_bytes().cmp(b.as_bytes()),
            TagOrdering::Natural => natural_cmp(a, b),
        }
    }
}

/// An exclude pattern that could not be compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedPattern {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TagSelector {
    patterns: Vec<Regex>,
    rejected: Vec<RejectedPattern>,
    ordering: TagOrdering,
}

impl TagSelector {
    pub fn new<S: AsRef<str>>(exclude_patterns: &[S]) -> Self {
        let mut patterns = Vec::with_capacity(exclude_patterns.len());
        let mut rejected = Vec::new();

        for pattern in exclude_patterns {
            let pattern = pattern.as_ref();
            match Regex::new(pattern) {
                Ok(regex) => patterns.push(regex),
                Err(e) => rejected.push(RejectedPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        Self {
            patterns,
            rejected,
            ordering: TagOrdering::default(),
        }
    }

    pub fn with_ordering(mut self, ordering: TagOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn rejected_patterns(&self) -> &[RejectedPattern] {
        &self.rejected
    }

    /// True if any compiled pattern matches somewhere in the tag
    pub fn is_excluded(&self, tag: &str) -> bool {
        self.patterns.iter().any(|regex| regex.is_match(tag))
    }

    /// Tags not matched by any exclude pattern, in their original order
    pub fn filter<S: AsRef<str>>(&self, tags: &[S]) -> Vec<String> {
        tags.iter()
            .map(|tag| tag.as_ref())
            .filter(|tag| !self.is_excluded(tag))
            .map(|tag| tag.to_string())
            .collect()
    }

    /// Order already-filtered tags newest-first and keep at most `limit`. Applies no exclusion.
    pub fn order(&self, mut tags: Vec<String>, limit: usize) -> Vec<String> {
        tags.sort_by(|a, b| self.ordering.compare(b, a));
        tags.truncate(limit);
        tags
    }

    /// Filter, then order and truncate
    pub fn select<S: AsRef<str>>(&self, tags: &[S], limit: usize) -> Vec<String> {
        self.order(self.filter(tags), limit)
    }
}

/// Filter, order byte-wise descending and truncate in one call
pub fn select<S: AsRef<str>, P: AsRef<str>>(
    tags: &[S],
    exclude_patterns: &[P],
    limit: usize,
) -> Vec<String> {
    TagSelector::new(exclude_patterns).select(tags, limit)
}

#[derive(Debug, PartialEq, Eq)]
enum Run<'a> {
    Text(&'a str),
    Number(&'a str),
}

/// Split into alternating non-digit / digit runs, always starting with a (possibly empty) text run
fn split_runs(tag: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut in_digits = false;

    for (i, c) in tag.char_indices() {
        let is_digit = c.is_ascii_digit();
        if is_digit != in_digits {
            let run = &tag[start..i];
            runs.push(if in_digits { Run::Number(run) } else { Run::Text(run) });
            start = i;
            in_digits = is_digit;
        }
    }

    let tail = &tag[start..];
    if in_digits {
        runs.push(Run::Number(tail));
    } else if !tail.is_empty() || runs.is_empty() {
        runs.push(Run::Text(tail));
    }
    runs
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = split_runs(a);
    let right = split_runs(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l, r) {
            (Run::Number(x), Run::Number(y)) => compare_numbers(x, y),
            (Run::Text(x), Run::Text(y)) => x.as_bytes().cmp(y.as_bytes()),
            // Runs alternate from the same starting kind, so mixed pairs cannot line up
            (Run::Number(_), Run::Text(_)) => Ordering::Greater,
            (Run::Text(_), Run::Number(_)) => Ordering::Less,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len()
        .cmp(&right.len())
        .then_with(|| a.as_bytes().cmp(b.as_bytes()))
}
