use std::fmt;
use std::sync::Arc;

use super::condition::ConditionNode;
use super::error::EditError;
use super::ids::TokenId;
use super::path::{SeqPath, Step};
use super::switch::SwitchNode;
use super::token::{Token, TokenKind};

/// Ordered list of tokens: the body of a formula or of a branch.
///
/// Backed by a shared immutable slice. Cloning is O(1), and every edit returns
/// a new `Sequence`, leaving the receiver untouched. Edits that change nothing
/// return a clone sharing the same allocation (see [`Sequence::ptr_eq`]).
#[derive(Clone)]
pub struct Sequence(Arc<[Token]>);

impl Sequence {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::from(Vec::new()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.0.get(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Token> {
        self.0.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Token> {
        self.0.last()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Token] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.0.iter()
    }

    /// Whether both sequences share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn position(&self, id: &TokenId) -> Option<usize> {
        self.0.iter().position(|t| t.id() == id)
    }

    // -- Flat edits -----------------------------------------------------------

    #[must_use]
    pub fn append(&self, token: Token) -> Sequence {
        let mut tokens = self.0.to_vec();
        tokens.push(token);
        Self::from(tokens)
    }

    /// Insert at `index`, clamped to `[0, len]`.
    #[must_use]
    pub fn insert_at(&self, index: usize, token: Token) -> Sequence {
        let mut tokens = self.0.to_vec();
        tokens.insert(index.min(tokens.len()), token);
        Self::from(tokens)
    }

    /// Insert several tokens at `index` (clamped), keeping their order.
    #[must_use]
    pub fn insert_many(&self, index: usize, new_tokens: impl IntoIterator<Item = Token>) -> Sequence {
        let mut tokens = self.0.to_vec();
        let at = index.min(tokens.len());
        let tail = tokens.split_off(at);
        let before = tokens.len();
        tokens.extend(new_tokens);
        if tokens.len() == before {
            return self.clone();
        }
        tokens.extend(tail);
        Self::from(tokens)
    }

    /// Remove the token at `index`. Out of range is a no-op.
    #[must_use]
    pub fn remove_at(&self, index: usize) -> Sequence {
        if index >= self.len() {
            return self.clone();
        }
        let mut tokens = self.0.to_vec();
        tokens.remove(index);
        Self::from(tokens)
    }

    /// Remove the token with this id. Unknown ids are a no-op.
    #[must_use]
    pub fn remove_by_id(&self, id: &TokenId) -> Sequence {
        match self.position(id) {
            Some(index) => self.remove_at(index),
            None => self.clone(),
        }
    }

    /// Replace the token at `index`. Out of range is a no-op.
    #[must_use]
    pub fn replace_at(&self, index: usize, token: Token) -> Sequence {
        if index >= self.len() {
            return self.clone();
        }
        let mut tokens = self.0.to_vec();
        tokens[index] = token;
        Self::from(tokens)
    }

    /// Move the token at `from` so it ends up at `to` (clamped).
    /// Out-of-range `from` is a no-op.
    #[must_use]
    pub fn move_within(&self, from: usize, to: usize) -> Sequence {
        if from >= self.len() {
            return self.clone();
        }
        let to = to.min(self.len() - 1);
        if from == to {
            return self.clone();
        }
        let mut tokens = self.0.to_vec();
        let token = tokens.remove(from);
        tokens.insert(to, token);
        Self::from(tokens)
    }

    #[must_use]
    pub fn clear(&self) -> Sequence {
        if self.is_empty() {
            return self.clone();
        }
        Self::new()
    }

    // -- Path-addressed edits -------------------------------------------------

    /// The nested sequence at `path`, or `None` if any step misses.
    #[must_use]
    pub fn at(&self, path: &SeqPath) -> Option<&Sequence> {
        let mut current = self;
        for step in path.steps() {
            current = current.get(step.index)?.branch(&step.branch)?;
        }
        Some(current)
    }

    /// Apply `f` to the sequence at `path` and rebuild only the tokens on the
    /// way back to the root. Siblings off the path keep their allocations.
    /// If `f` returns a sequence sharing the input's allocation, `self` is
    /// returned as is.
    pub fn update_at<F>(&self, path: &SeqPath, f: F) -> Result<Sequence, EditError>
    where
        F: FnOnce(&Sequence) -> Result<Sequence, EditError>,
    {
        self.update_steps(path.steps(), 0, f)
    }

    fn update_steps<F>(&self, steps: &[Step], depth: usize, f: F) -> Result<Sequence, EditError>
    where
        F: FnOnce(&Sequence) -> Result<Sequence, EditError>,
    {
        let Some((step, rest)) = steps.split_first() else {
            return f(self);
        };
        let invalid = || EditError::InvalidPath {
            depth,
            index: step.index,
        };
        let token = self.get(step.index).ok_or_else(invalid)?;
        let child = token.branch(&step.branch).ok_or_else(invalid)?;
        let updated = child.update_steps(rest, depth + 1, f)?;
        if updated.ptr_eq(child) {
            return Ok(self.clone());
        }
        let token = token.with_branch(&step.branch, updated).ok_or_else(invalid)?;
        Ok(self.replace_at(step.index, token))
    }

    /// Replace the token at `index` of the sequence at `path` with `f(token)`.
    pub fn update_token<F>(&self, path: &SeqPath, index: usize, f: F) -> Result<Sequence, EditError>
    where
        F: FnOnce(&Token) -> Result<Token, EditError>,
    {
        self.update_at(path, |seq| {
            let token = seq.get(index).ok_or(EditError::InvalidPath {
                depth: path.depth(),
                index,
            })?;
            Ok(seq.replace_at(index, f(token)?))
        })
    }

    /// Edit the condition node at `index` of the sequence at `path`.
    pub fn update_cond<F>(&self, path: &SeqPath, index: usize, f: F) -> Result<Sequence, EditError>
    where
        F: FnOnce(&ConditionNode) -> Result<ConditionNode, EditError>,
    {
        self.update_token(path, index, |token| match token.kind() {
            TokenKind::Cond(node) => Ok(token.with_kind(TokenKind::Cond(Arc::new(f(node)?)))),
            _ => Err(EditError::WrongNodeKind {
                index,
                expected: "cond",
            }),
        })
    }

    /// Edit the switch node at `index` of the sequence at `path`.
    pub fn update_switch<F>(&self, path: &SeqPath, index: usize, f: F) -> Result<Sequence, EditError>
    where
        F: FnOnce(&SwitchNode) -> Result<SwitchNode, EditError>,
    {
        self.update_token(path, index, |token| match token.kind() {
            TokenKind::Switch(node) => {
                Ok(token.with_kind(TokenKind::Switch(Arc::new(f(node)?))))
            }
            _ => Err(EditError::WrongNodeKind {
                index,
                expected: "switch",
            }),
        })
    }

    // -- Traversal ------------------------------------------------------------

    /// Find a token anywhere in the tree: the path of its sequence and its index there.
    #[must_use]
    pub fn locate(&self, id: &TokenId) -> Option<(SeqPath, usize)> {
        let mut path = SeqPath::root();
        self.locate_in(id, &mut path).map(|index| (path, index))
    }

    fn locate_in(&self, id: &TokenId, path: &mut SeqPath) -> Option<usize> {
        for (index, token) in self.iter().enumerate() {
            if token.id() == id {
                return Some(index);
            }
            for (branch, child) in token.children() {
                path.push(Step::new(index, branch));
                if let Some(found) = child.locate_in(id, path) {
                    return Some(found);
                }
                path.pop();
            }
        }
        None
    }

    /// Visit every token in the tree, depth-first, with the path of the
    /// sequence holding it and its index there.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&SeqPath, usize, &Token),
    {
        let mut path = SeqPath::root();
        self.walk_in(&mut path, &mut visit);
    }

    fn walk_in<F>(&self, path: &mut SeqPath, visit: &mut F)
    where
        F: FnMut(&SeqPath, usize, &Token),
    {
        for (index, token) in self.iter().enumerate() {
            visit(path, index, token);
            for (branch, child) in token.children() {
                path.push(Step::new(index, branch));
                child.walk_in(path, visit);
                path.pop();
            }
        }
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0[..] == other.0[..]
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl From<Vec<Token>> for Sequence {
    fn from(tokens: Vec<Token>) -> Self {
        Self(Arc::from(tokens))
    }
}

impl FromIterator<Token> for Sequence {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Renders the text notation, e.g. `{price} * 1.21`.
impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}
