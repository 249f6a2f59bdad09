use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    MissingRequired,
    TypeMismatch { expected: String, found: String },
    UnknownField,
    /// `name` exists in none of the `searched` collections.
    MissingReference { name: String, searched: Vec<String> },
    InvalidShape { expected: String },
    Rule { message: String },
}

/// One problem, located by its dotted path (`flippers.left_flipper.main_coil`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Issue {
    #[must_use]
    pub fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self { path: path.into(), kind }
    }

    #[must_use]
    pub fn rule(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, IssueKind::Rule { message: message.into() })
    }

    #[must_use]
    pub const fn is_missing_reference(&self) -> bool {
        matches!(self.kind, IssueKind::MissingReference { .. })
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.path)?;
        match &self.kind {
            IssueKind::MissingRequired => f.write_str("required field is missing"),
            IssueKind::TypeMismatch { expected, found } => write!(f, "expected {expected}, found {found}"),
            IssueKind::UnknownField => f.write_str("unknown field"),
            IssueKind::MissingReference { name, searched } => {
                write!(f, "'{name}' not found in {}", searched.join(", "))
            },
            IssueKind::InvalidShape { expected } => write!(f, "expected {expected}"),
            IssueKind::Rule { message } => f.write_str(message),
        }
    }
}

/// Every issue found in one validation run, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    issues: Vec<Issue>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(mut issues: Vec<Issue>) -> Self {
        issues.sort_by(|a, b| a.path.cmp(&b.path));
        Self { issues }
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn missing_references(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_missing_reference())
    }

    /// Whether some issue is reported at exactly `path`.
    #[must_use]
    pub fn has(&self, path: &str) -> bool {
        self.issues.iter().any(|i| i.path == path)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.issues.len();
        write!(f, "{n} issue{}:", if n == 1 { "" } else { "s" })?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_and_rendered() {
        let report = ValidationReport::new(vec![
            Issue::new("switches.s_b.number", IssueKind::MissingRequired),
            Issue::new(
                "flippers.left.main_coil",
                IssueKind::MissingReference { name: "c_left".into(), searched: vec!["coils".into()] },
            ),
        ]);
        assert_eq!(
            report.to_string(),
            "2 issues:\n  - flippers.left.main_coil: 'c_left' not found in coils\n  - switches.s_b.number: required field is missing"
        );
        assert_eq!(report.missing_references().count(), 1);
    }
}
