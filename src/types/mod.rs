mod condition;
mod error;
mod field_registry;
mod formula;
mod ids;
mod path;
mod sequence;
mod switch;
mod token;
mod value;

pub use condition::{CondBranch, ConditionNode, FalsePolicy};
pub use error::{ConstructionError, EditError, LoadError};
pub use field_registry::{FieldCatalog, FieldInfo, FieldKind, FieldOption, FieldRegistry};
pub use formula::Formula;
pub use ids::{FieldId, FormulaId, TokenId};
pub use path::{Branch, SeqPath, Step};
pub use sequence::Sequence;
pub use switch::{SwitchBinding, SwitchCase, SwitchNode};
pub use token::{Operator, Part, Token, TokenKind};
pub use value::Value;
