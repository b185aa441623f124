//! jmatch_core - path query engine with write access
//!
//! This library compiles a jmatch path expression (a JSONPath variant with
//! simplified syntax) into an expression tree, evaluates it against a JSON
//! document and exposes the result as a [`MatchSet`]: a first-class set of
//! locations inside the document that supports reading, setting, deleting,
//! mutating and splice-style region mutation.
//!
//! # Example
//! ```
//! use serde_json::json;
//! use jmatch_core::match_path;
//!
//! let doc = json!({"ghosts": [{"name": "Blinky"}, {"name": "Clyde"}]});
//! let ms = match_path("ghosts[*].name", doc).unwrap();
//! assert_eq!(ms.values().unwrap(), vec![json!("Blinky"), json!("Clyde")]);
//! ```

pub mod ast;
pub mod canonical;
pub mod compare;
pub mod eval;
pub mod match_set;
pub mod parser;
pub mod refs;
pub mod regions;
pub mod scanner;

pub use ast::{ComparisonOp, Expression, Node};
pub use canonical::{CanonicalError, Kind, from_canonical, to_canonical};
pub use eval::EvalError;
pub use match_set::{MatchSet, MatchSetError};
pub use parser::{ParseError, Parser, parse};
pub use refs::{
    ArrayRef, LatentMapRef, LiteralRef, MapRef, MutateError, Ref, RefError, UnionRef, VarRef,
};
pub use regions::{Region, Regions, RegionsError};
pub use scanner::{Scanner, Token, TokenKind};

use serde_json::Value;

/// Error type covering the full parse-and-match pipeline
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Eval(EvalError),
    MatchSet(MatchSetError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "parse error: {e}"),
            Error::Eval(e) => write!(f, "eval error: {e}"),
            Error::MatchSet(e) => write!(f, "match error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}

impl From<MatchSetError> for Error {
    fn from(e: MatchSetError) -> Self {
        Error::MatchSet(e)
    }
}

/// Compile and execute a path expression on a document in one go
///
/// Use [`parse`] plus [`Expression::match_value`] instead when the same
/// expression runs against many documents.
///
/// # Example
/// ```
/// use serde_json::json;
/// use jmatch_core::match_path;
///
/// let mut ms = match_path("a.b", json!({"a": {"b": 1}})).unwrap();
/// let mutated = ms.set(json!(2)).unwrap();
/// assert_eq!(mutated, json!({"a": {"b": 2}}));
/// ```
pub fn match_path(path: &str, data: Value) -> Result<MatchSet, Error> {
    let expr = parse(path)?;
    Ok(expr.match_value(data)?)
}
