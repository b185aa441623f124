//! Evaluator walking expression trees over references
//!
//! Evaluation is purely functional: each node maps an input [`Ref`] to an
//! output [`Ref`] without mutating anything. The resulting ref is what a
//! [`MatchSet`] wraps to offer reads and mutations.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::ast::{ComparisonOp, Expression, Node};
use crate::canonical::{self, CanonicalError};
use crate::compare;
use crate::match_set::MatchSet;
use crate::refs::{
    ArrayRef, LiteralRef, MapRef, Ref, VarGetter, VarRef, VarSetter, latent_map_refs,
    match_all_children,
};
use crate::regions::{Region, Regions};

/// Error produced while evaluating an expression against a document
#[derive(Debug)]
pub struct EvalError {
    pub message: String,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<CanonicalError> for EvalError {
    fn from(e: CanonicalError) -> Self {
        Self {
            message: e.message,
        }
    }
}

impl Expression {
    /// Run the expression on the document and return a [`MatchSet`]
    /// referencing all matches
    ///
    /// The document is owned by the match set; every mutation returns the new
    /// document.
    pub fn match_value(&self, data: Value) -> Result<MatchSet, EvalError> {
        // The root variable: a single cell holding the whole document
        let cell = Rc::new(RefCell::new(data));
        let getter: VarGetter = {
            let cell = cell.clone();
            Rc::new(move || cell.borrow().clone())
        };
        let setter: VarSetter = {
            let cell = cell.clone();
            Rc::new(move |value| {
                *cell.borrow_mut() = value;
            })
        };
        let root = VarRef::new("$", getter, setter, 0);

        let matched = process(&Ref::Var(root.clone()), &self.root)?;
        Ok(MatchSet::new(root, matched))
    }

    /// Run the expression on any serializable value, canonicalizing it first
    pub fn match_data<T: Serialize>(&self, data: &T) -> Result<MatchSet, EvalError> {
        self.match_value(canonical::to_canonical(data)?)
    }
}

/// Evaluate one node against the input ref
pub(crate) fn process(input: &Ref, node: &Node) -> Result<Ref, EvalError> {
    match node {
        Node::Path { nodes, .. } => process_path(input, nodes),
        Node::Union { nodes, .. } => process_union(input, nodes),
        Node::Field { name, .. } => process_field_selection(input, name, false),
        Node::ExistingField { name, .. } => process_field_selection(input, name, true),
        Node::String { value, .. } => Ok(Ref::Literal(LiteralRef::new(Value::from(value.clone())))),
        Node::Int { value, .. } => Ok(Ref::Literal(LiteralRef::new(Value::from(*value)))),
        Node::Float { value, .. } => Ok(Ref::Literal(LiteralRef::new(Value::from(*value)))),
        Node::Index { value, .. } => process_index(input, *value),
        Node::Slice { .. } => process_slice(input, node),
        Node::Wildcard { .. } => process_wildcard(input),
        Node::Recursive { .. } => process_recursive(input),
        Node::Filter { lhs, rhs, op, .. } => process_filter(input, lhs, rhs.as_deref(), *op),
        Node::This { .. } => Ok(input.clone()),
    }
}

/// Evaluate a sequence of nodes left to right, feeding each output forward
fn process_path(input: &Ref, nodes: &[Node]) -> Result<Ref, EvalError> {
    let mut result = input.clone();
    for node in nodes {
        result = process(&result, node)?;
    }
    Ok(result)
}

/// Evaluate each branch against the same input and union the results
fn process_union(input: &Ref, nodes: &[Node]) -> Result<Ref, EvalError> {
    let mut result = Ref::empty();
    for node in nodes {
        let subset = process(input, node)?;
        result = result.union(subset);
    }
    Ok(result)
}

/// Select a field from every map in the input
///
/// When the field does not have to exist already, maps lacking the key (or
/// holding a non-map under it) contribute latent refs, so a later set can
/// materialize the path.
fn process_field_selection(
    input: &Ref,
    name: &str,
    require_field_to_exist: bool,
) -> Result<Ref, EvalError> {
    let mut results = Ref::empty();
    for var in input.vars() {
        if !var.is_map() {
            continue;
        }
        if require_field_to_exist {
            let Value::Object(entries) = var.canonical_value() else {
                continue;
            };
            if !entries.contains_key(name) {
                continue;
            }
        }
        results = results.union(Ref::Map(MapRef::new(var, vec![name.to_string()])));
    }
    if !require_field_to_exist {
        for mut latent in latent_map_refs(input) {
            latent.add_key(name.to_string());
            results = results.union(Ref::Latent(latent));
        }
    }
    Ok(results)
}

fn process_index(input: &Ref, index: i64) -> Result<Ref, EvalError> {
    let mut result = Ref::empty();
    for var in input.vars() {
        if !var.is_array() {
            continue;
        }
        let Value::Array(items) = var.canonical_value() else {
            continue;
        };
        let len = items.len() as i64;
        if len == 0 && (index == 0 || index == -1) {
            // Index 0 (start of array) and -1 (end of array) on an empty
            // array select the zero-length insertion seam, so appending and
            // prepending work even there
            result = result.union(Ref::Array(ArrayRef::new(
                var,
                Regions::single(Region::new(0, 0)),
            )));
            continue;
        }
        let mut index = index;
        if index < 0 {
            index += len;
        }
        // Indices outside the range of the array are ignored
        if index >= 0 && index < len {
            result = result.union(Ref::Array(ArrayRef::new(
                var,
                Regions::single(Region::new(index, index + 1)),
            )));
        }
    }
    Ok(result)
}

fn process_slice(input: &Ref, node: &Node) -> Result<Ref, EvalError> {
    let Node::Slice {
        start,
        end,
        step,
        start_specified,
        end_specified,
        step_specified,
        ..
    } = node
    else {
        return Err(EvalError {
            message: format!("unexpected node in slice position: {node:?}"),
        });
    };
    let mut result = Ref::empty();
    for var in input.vars() {
        if !var.is_array() {
            continue;
        }
        let Value::Array(items) = var.canonical_value() else {
            continue;
        };
        let len = items.len() as i64;

        let mut from = if *start_specified { *start } else { 0 };
        if from < 0 {
            from += len;
        }
        let mut to = if *end_specified { *end } else { len };
        if to < 0 {
            to += len;
        }

        // Clamp to the edges of the array
        from = from.max(0);
        to = to.min(len);

        let mut step = if *step_specified { *step } else { 1 };
        if step == 0 {
            // She didn't mean that, right? Collapse to a single element.
            if to != from {
                to = from + 1;
            }
            step = 1;
        }

        if step == 1 {
            // A continuous range like "4:7" or "5:"
            result = result.union(Ref::Array(ArrayRef::new(
                var,
                Regions::single(Region::new(from, to)),
            )));
        } else {
            // Discontinuous, or written in reverse, so individual indices are
            // needed. A negative step swaps the endpoints but does not
            // reverse the output order.
            if step < 0 {
                std::mem::swap(&mut from, &mut to);
                step = -step;
            }
            let mut indicies = Vec::new();
            let mut i = from;
            while i < to {
                indicies.push(i);
                i += step;
            }
            result = result.union(Ref::Array(ArrayRef::new(
                var,
                Regions::region_for_each_index(&indicies),
            )));
        }
    }
    Ok(result)
}

fn process_wildcard(input: &Ref) -> Result<Ref, EvalError> {
    let mut result = Ref::empty();
    for var in input.vars() {
        result = result.union(match_all_children(&var));
    }
    Ok(result)
}

/// The input values together with all their descendants. Terminates because
/// every recursion step replaces the input with its immediate children and
/// documents are acyclic trees.
fn process_recursive(input: &Ref) -> Result<Ref, EvalError> {
    let mut result = input.clone();
    for var in input.vars() {
        let children = match_all_children(&var);
        let descendants = process_recursive(&children)?;
        result = result.union(descendants);
    }
    Ok(result)
}

fn process_filter(
    input: &Ref,
    lhs: &Node,
    rhs: Option<&Node>,
    op: ComparisonOp,
) -> Result<Ref, EvalError> {
    let mut result = Ref::empty();
    for var in input.vars() {
        if var.is_map() {
            let Ref::Map(all) = match_all_children(&var) else {
                continue;
            };
            let mut matches: Vec<String> = Vec::with_capacity(all.keys().len());
            for key in all.keys() {
                // Evaluate the operands against a ref isolating just this key
                let single = Ref::Map(MapRef::new(all.variable().clone(), vec![key.clone()]));
                if filter_matches(&single, lhs, rhs, op)? {
                    matches.push(key.clone());
                }
            }
            result = result.union(Ref::Map(MapRef::new(all.variable().clone(), matches)));
        } else if var.is_array() {
            let Ref::Array(all) = match_all_children(&var) else {
                continue;
            };
            let mut matches: Vec<i64> = Vec::with_capacity(all.estimate_size());
            for index in all.selection().to_indicies() {
                let single = Ref::Array(ArrayRef::new(
                    all.variable().clone(),
                    Regions::region_for_each_index(&[index]),
                ));
                if filter_matches(&single, lhs, rhs, op)? {
                    matches.push(index);
                }
            }
            result = result.union(Ref::Array(ArrayRef::new(
                all.variable().clone(),
                Regions::region_for_each_index(&matches),
            )));
        }
    }
    Ok(result)
}

fn filter_matches(
    input: &Ref,
    lhs: &Node,
    rhs: Option<&Node>,
    op: ComparisonOp,
) -> Result<bool, EvalError> {
    let lhs = process(input, lhs)?;
    let rhs = match rhs {
        Some(node) => Some(process(input, node)?),
        // Unary operators have no right hand side
        None => None,
    };
    apply_filter(&lhs, rhs.as_ref(), op)
}

/// Apply the filter operator to the dereferenced operands
fn apply_filter(lhs: &Ref, rhs: Option<&Ref>, op: ComparisonOp) -> Result<bool, EvalError> {
    if lhs.is_empty() {
        return Ok(false);
    }
    let lhs_values = lhs.values();
    if lhs_values.is_empty() {
        return Ok(false);
    }
    if op == ComparisonOp::Exists {
        return Ok(true);
    }
    let rhs_values = rhs.map(Ref::values).unwrap_or_default();
    if rhs_values.is_empty() {
        return Ok(false);
    }
    if lhs_values.len() > 1 || rhs_values.len() > 1 {
        // No operators are defined for collections
        return Ok(false);
    }
    let left = &lhs_values[0];
    let right = &rhs_values[0];
    let result = match op {
        ComparisonOp::Lt => compare::less(left, right),
        ComparisonOp::Gt => compare::greater(left, right),
        ComparisonOp::Lte => compare::less_equal(left, right),
        ComparisonOp::Gte => compare::greater_equal(left, right),
        ComparisonOp::Eq => compare::equal(left, right),
        ComparisonOp::Neq => compare::not_equal(left, right),
        ComparisonOp::Exists => unreachable!("exists is handled before value comparison"),
    };
    // A bad comparison is a non-match, not an error
    Ok(result.unwrap_or(false))
}
