//! Line transform pipeline: filter, rewrite, render.
//!
//! A pure function from raw log text to rendered Telegram message bodies.
//! No shared state, no retained state between calls:
//!
//! 1. Split on line feeds, dropping empty lines.
//! 2. Keep a line only if at least one filter pattern matches it. An empty
//!    filter list keeps everything.
//! 3. Apply rewrite rules in declared order; each rule operates on the
//!    output of the previous one.
//! 4. Render: a line that parses as a JSON object or array is re-serialized
//!    with sorted keys and two-space indentation inside a ```json fence;
//!    anything else goes unchanged into a plain ``` fence.

use regex::Regex;
use serde_json::Value;

use crate::config::CompiledReplacement;

/// Compiled filter and rewrite rules applied to every log line.
#[derive(Debug, Default)]
pub struct TransformPipeline {
    filters: Vec<Regex>,
    replacements: Vec<CompiledReplacement>,
}

impl TransformPipeline {
    /// Create a pipeline from compiled rules.
    pub fn new(filters: Vec<Regex>, replacements: Vec<CompiledReplacement>) -> Self {
        Self {
            filters,
            replacements,
        }
    }

    /// Transform one raw chunk into rendered message bodies, in line order.
    pub fn apply_chunk(&self, chunk: &str) -> Vec<String> {
        chunk
            .split('\n')
            .filter(|line| !line.is_empty())
            .filter_map(|line| self.apply_line(line))
            .collect()
    }

    /// Transform one complete line. Returns `None` when the line is empty
    /// or no filter matches it.
    pub fn apply_line(&self, line: &str) -> Option<String> {
        if line.is_empty() || !self.keeps(line) {
            return None;
        }

        let mut rewritten = line.to_string();
        for rule in &self.replacements {
            rewritten = rule
                .pattern
                .replace_all(&rewritten, rule.replacement.as_str())
                .into_owned();
        }

        Some(render(&rewritten))
    }

    fn keeps(&self, line: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.is_match(line))
    }
}

/// Wrap a line in a Telegram code fence, pretty-printing structured lines.
///
/// Only JSON objects and arrays count as structured; bare scalars stay in
/// the plain fence. Content is not MarkdownV2-escaped beyond the fence, so
/// a line containing a backtick run can break the formatting downstream.
fn render(line: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(line)
        && (value.is_object() || value.is_array())
        && let Ok(pretty) = serde_json::to_string_pretty(&value)
    {
        return format!("```json\n{pretty}\n```");
    }

    format!("```\n{line}\n```")
}
