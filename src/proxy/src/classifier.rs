//! C3: case-insensitive prefix classification of a trimmed SQL statement.
//!
//! Matchers are compiled once and reused for every statement on every
//! connection; a `Classifier` is cheap to clone (an `Arc` around each
//! regex) and is meant to be shared across dispatcher tasks.
use regex::Regex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Select,
    BeginTransaction,
    EndTransaction,
    Other,
}

#[derive(Clone)]
pub struct Classifier {
    select: Arc<Regex>,
    begin: Arc<Regex>,
    end: Arc<Regex>,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            select: Arc::new(Regex::new(r"(?i)^(select)").unwrap()),
            begin: Arc::new(Regex::new(r"(?i)^(begin|start transaction)").unwrap()),
            end: Arc::new(Regex::new(r"(?i)^(commit|rollback)").unwrap()),
        }
    }

    /// Classifies `sql` after the caller has already trimmed surrounding
    /// whitespace — the matchers only ever anchor to the start.
    pub fn classify(&self, sql: &str) -> Statement {
        if self.select.is_match(sql) {
            Statement::Select
        } else if self.begin.is_match(sql) {
            Statement::BeginTransaction
        } else if self.end.is_match(sql) {
            Statement::EndTransaction
        } else {
            Statement::Other
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_select_case_insensitively() {
        let c = Classifier::new();
        assert_eq!(c.classify("SeLeCt 1"), Statement::Select);
    }

    #[test]
    fn matches_start_transaction_as_begin() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("start transaction"),
            Statement::BeginTransaction
        );
        assert_eq!(c.classify("BEGIN"), Statement::BeginTransaction);
    }

    #[test]
    fn matches_commit_and_rollback_as_end() {
        let c = Classifier::new();
        assert_eq!(c.classify("commit"), Statement::EndTransaction);
        assert_eq!(c.classify("ROLLBACK"), Statement::EndTransaction);
    }

    #[test]
    fn anything_else_is_other() {
        let c = Classifier::new();
        assert_eq!(c.classify("insert into t values (1)"), Statement::Other);
        assert_eq!(c.classify("selection_algorithm()"), Statement::Select);
    }
}
