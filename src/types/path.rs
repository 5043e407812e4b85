use std::fmt;

/// Which nested sequence of a composite token a path step descends into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Predicate of a condition node.
    Expr,
    Then,
    Else,
    /// Body of the switch case with this match value.
    Case(String),
    /// Fallback body of a switch node.
    Default,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Expr => f.write_str("expr"),
            Branch::Then => f.write_str("then"),
            Branch::Else => f.write_str("else"),
            Branch::Case(value) => write!(f, "case({value})"),
            Branch::Default => f.write_str("default"),
        }
    }
}

/// One hop from a sequence into a nested sequence: the index of the composite
/// token and the branch taken through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub index: usize,
    pub branch: Branch,
}

impl Step {
    #[must_use]
    pub fn new(index: usize, branch: Branch) -> Self {
        Self { index, branch }
    }
}

/// Address of a nested sequence, starting from a formula's root sequence.
///
/// The empty path addresses the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SeqPath(Vec<Step>);

impl SeqPath {
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend the path by one step (builder style).
    #[must_use]
    pub fn then(mut self, index: usize, branch: Branch) -> Self {
        self.0.push(Step::new(index, branch));
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn push(&mut self, step: Step) {
        self.0.push(step);
    }

    pub(crate) fn pop(&mut self) -> Option<Step> {
        self.0.pop()
    }
}

impl From<Vec<Step>> for SeqPath {
    fn from(steps: Vec<Step>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for SeqPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}.{}", step.index, step.branch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_display() {
        assert_eq!(SeqPath::root().to_string(), "root");
        assert!(SeqPath::root().is_root());
    }

    #[test]
    fn nested_display() {
        let path = SeqPath::root()
            .then(2, Branch::Then)
            .then(0, Branch::Case("north".into()));
        assert_eq!(path.to_string(), "2.then/0.case(north)");
        assert_eq!(path.depth(), 2);
    }
}
