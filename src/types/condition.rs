use std::fmt;

use serde::{Deserialize, Serialize};

use super::sequence::Sequence;

/// What a condition contributes when its predicate is false.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FalsePolicy {
    /// Produce a zero / empty result.
    #[default]
    Zero,
    /// Omit the node's contribution entirely.
    Ignore,
}

/// Which body of a condition node to replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondBranch {
    Then,
    Else,
}

/// `IF expr THEN then ELSE otherwise`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionNode {
    expr: Sequence,
    then: Sequence,
    otherwise: Sequence,
    false_policy: FalsePolicy,
}

impl ConditionNode {
    /// An empty condition: all three sequences empty, [`FalsePolicy::Zero`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_parts(
        expr: Sequence,
        then: Sequence,
        otherwise: Sequence,
        false_policy: FalsePolicy,
    ) -> Self {
        Self {
            expr,
            then,
            otherwise,
            false_policy,
        }
    }

    #[must_use]
    pub fn expr(&self) -> &Sequence {
        &self.expr
    }

    #[must_use]
    pub fn then_branch(&self) -> &Sequence {
        &self.then
    }

    #[must_use]
    pub fn else_branch(&self) -> &Sequence {
        &self.otherwise
    }

    #[must_use]
    pub fn false_policy(&self) -> FalsePolicy {
        self.false_policy
    }

    #[must_use]
    pub fn with_expr(&self, expr: Sequence) -> Self {
        Self {
            expr,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_then(&self, then: Sequence) -> Self {
        Self {
            then,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_else(&self, otherwise: Sequence) -> Self {
        Self {
            otherwise,
            ..self.clone()
        }
    }

    /// Replace the `then` or `else` body.
    #[must_use]
    pub fn with_branch(&self, which: CondBranch, sequence: Sequence) -> Self {
        match which {
            CondBranch::Then => self.with_then(sequence),
            CondBranch::Else => self.with_else(sequence),
        }
    }

    #[must_use]
    pub fn with_false_policy(&self, false_policy: FalsePolicy) -> Self {
        Self {
            false_policy,
            ..self.clone()
        }
    }
}

/// `[expr ? then : else]`, with a trailing `!ignore` for [`FalsePolicy::Ignore`].
impl fmt::Display for ConditionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        write_part(f, &self.expr)?;
        f.write_str(" ?")?;
        write_part(f, &self.then)?;
        f.write_str(" :")?;
        write_part(f, &self.otherwise)?;
        f.write_str(" ]")?;
        if self.false_policy == FalsePolicy::Ignore {
            f.write_str("!ignore")?;
        }
        Ok(())
    }
}

fn write_part(f: &mut fmt::Formatter<'_>, seq: &Sequence) -> fmt::Result {
    if seq.is_empty() {
        Ok(())
    } else {
        write!(f, " {seq}")
    }
}
