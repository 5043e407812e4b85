//! Formula expression trees for a form builder.
//!
//! A [`Formula`] is a flat [`Sequence`] of [`Token`]s alternating between
//! values and operators. Condition and switch tokens nest further sequences,
//! so a formula is a tree edited through [`SeqPath`]s. Every edit returns a
//! new tree that shares untouched parts with the old one.

pub mod cache;
pub mod config;
mod deps;
mod diagnose;
mod error;
mod graph;
pub mod parse;
pub mod persist;
mod pick;
mod scope;
mod types;
mod validate;
pub mod wire;
mod workspace;

pub use deps::{DependencyContext, FieldDependencies, field_dependencies};
pub use diagnose::{Diagnostic, diagnose};
pub use error::FormularyError;
pub use graph::{ReferenceGraph, collect_formula_refs};
pub use parse::{ParseError, parse};
pub use pick::{Pick, build_token};
pub use scope::{FormulaDirectory, FormulaScope, FormulaSummary};
pub use types::{
    Branch, CondBranch, ConditionNode, ConstructionError, EditError, FalsePolicy, FieldCatalog,
    FieldId, FieldInfo, FieldKind, FieldOption, FieldRegistry, Formula, FormulaId, LoadError,
    Operator, Part, SeqPath, Sequence, Step, SwitchBinding, SwitchCase, SwitchNode, Token,
    TokenId, TokenKind, Value,
};
pub use validate::{Issue, Validation, is_complete, validate};
pub use workspace::Workspace;
