//! Round-trip results and the append-only history log

use serde::{Deserialize, Serialize};

/// Outcome of one query round-trip.
///
/// `output` and `error` are populated only when execution was requested;
/// both are `None` for a parse-only query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// All extracted code blocks, joined by a blank line (possibly empty)
    pub code: String,
    /// Captured stdout from execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Textual description of an execution fault
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reply text with code blocks removed, trimmed
    pub explanation: String,
}

/// Append-only log of executed round-trips.
///
/// One entry per executed query, in call order; queries that skipped
/// execution are not recorded. Grows unboundedly for the process lifetime.
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<QueryResult>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: QueryResult) {
        self.entries.push(result);
    }

    pub fn entries(&self) -> &[QueryResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&QueryResult> {
        self.entries.last()
    }

    /// Render the log as a human-readable document: per entry the code, the
    /// output, and the error when one occurred.
    pub fn render(&self) -> String {
        let mut doc = String::new();
        for (i, item) in self.entries.iter().enumerate() {
            doc.push_str(&format!("=== Execution {} ===\n", i + 1));
            doc.push_str("```python\n");
            doc.push_str(&item.code);
            doc.push_str("\n```\n");
            doc.push_str("Output:\n");
            if let Some(output) = &item.output {
                doc.push_str(output);
                if !output.is_empty() && !output.ends_with('\n') {
                    doc.push('\n');
                }
            }
            if let Some(error) = &item.error {
                doc.push_str("Error:\n");
                doc.push_str(error);
                doc.push('\n');
            }
            doc.push('\n');
        }
        doc
    }
}
