//! Expression tree for jmatch path expressions

use serde::ser::{Serialize, Serializer};
use serde_json::{Value, json};

/// A compiled jmatch path expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub(crate) root: Node,
}

impl Expression {
    pub(crate) fn new(root: Node) -> Self {
        Self { root }
    }

    /// The root node of the expression tree
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The expression tree as a JSON value, fit for diagnostics or as a test
    /// oracle
    pub fn to_json(&self) -> Value {
        self.root.to_json()
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

/// Comparison operators usable in filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// Less than `<`
    Lt,
    /// Greater than `>`
    Gt,
    /// Less than or equal `<=`
    Lte,
    /// Greater than or equal `>=`
    Gte,
    /// Equal `==`
    Eq,
    /// Not equal `!=`
    Neq,
    /// Unary existence test, `[expr?]` or `[?(expr)]`
    Exists,
}

impl ComparisonOp {
    /// The operator's symbolic name, used in serialization and error messages
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Eq => "==",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Exists => "exists",
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A node of the expression tree. Every node carries the source position it
/// was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A list of nodes to match in sequence, as in `a.b.c`
    Path { pos: usize, nodes: Vec<Node> },
    /// A union of paths, as in `foo[bar,bat].baz` or `array[1,3,5:9]`
    Union { pos: usize, nodes: Vec<Node> },
    /// Matches one field in a map, postulating it as a potential field to be
    /// created if someone attempts to set a value through it later
    Field { pos: usize, name: String },
    /// Matches an existing field in a map, never postulating potential fields
    ExistingField { pos: usize, name: String },
    /// A literal string, as in `[name == "John Appleseed"]`
    String { pos: usize, value: String },
    /// A literal int, as in `[@ == 7]`
    Int { pos: usize, value: i64 },
    /// A literal array index. `sealed` is set once the surrounding bracket
    /// expression closes; a sealed index stays an index term under comparison
    /// operators instead of degrading to an int literal.
    Index { pos: usize, sealed: bool, value: i64 },
    /// A literal float, as in `[@ == 7.2]`
    Float { pos: usize, value: f64 },
    /// Matches all keys in a map or all members of an array, `*`
    Wildcard { pos: usize },
    /// Matches the current values and all their descendants, `..`
    Recursive { pos: usize },
    /// Identity placeholder for `@` or `$`
    This { pos: usize },
    /// Selects container members by comparing values, as in `[foo == "bar"]`.
    /// `rhs` is absent for the unary exists operator.
    Filter {
        pos: usize,
        lhs: Box<Node>,
        rhs: Option<Box<Node>>,
        op: ComparisonOp,
    },
    /// A slice selector of the form `array[1:6:2]`: from index 1 up to (not
    /// including) index 6 with a step of 2. Each part tracks whether it was
    /// actually written out.
    Slice {
        pos: usize,
        start: i64,
        end: i64,
        step: i64,
        start_specified: bool,
        end_specified: bool,
        step_specified: bool,
    },
}

impl Node {
    /// The source position the node was parsed from
    pub fn position(&self) -> usize {
        match self {
            Node::Path { pos, .. }
            | Node::Union { pos, .. }
            | Node::Field { pos, .. }
            | Node::ExistingField { pos, .. }
            | Node::String { pos, .. }
            | Node::Int { pos, .. }
            | Node::Index { pos, .. }
            | Node::Float { pos, .. }
            | Node::Wildcard { pos }
            | Node::Recursive { pos }
            | Node::This { pos }
            | Node::Filter { pos, .. }
            | Node::Slice { pos, .. } => *pos,
        }
    }

    /// Serialize the node to a JSON value with a stable `"node"` tag per
    /// variant
    pub fn to_json(&self) -> Value {
        match self {
            Node::Path { nodes, .. } => json!({
                "node": "path",
                "nodes": nodes.iter().map(Node::to_json).collect::<Vec<_>>(),
            }),
            Node::Union { nodes, .. } => json!({
                "node": "union",
                "nodes": nodes.iter().map(Node::to_json).collect::<Vec<_>>(),
            }),
            Node::Field { name, .. } => json!({"node": "field", "name": name}),
            Node::ExistingField { name, .. } => {
                json!({"node": "existingField", "name": name})
            }
            Node::String { pos, value } => {
                json!({"node": "string", "pos": pos, "value": value})
            }
            Node::Int { value, .. } => json!({"node": "int", "value": value}),
            Node::Index { value, .. } => json!({"node": "index", "value": value}),
            Node::Float { value, .. } => json!({"node": "float", "value": value}),
            Node::Wildcard { .. } => json!({"node": "wildcard"}),
            Node::Recursive { .. } => json!({"node": "recursive"}),
            Node::This { .. } => json!({"node": "self"}),
            Node::Filter { lhs, rhs, op, .. } => json!({
                "node": "filter",
                "lhs": lhs.to_json(),
                "rhs": rhs.as_ref().map(|n| n.to_json()),
                "operator": op.symbol(),
            }),
            Node::Slice {
                start,
                end,
                step,
                start_specified,
                end_specified,
                step_specified,
                ..
            } => json!({
                "node": "slice",
                "start": start,
                "end": end,
                "step": step,
                "startSpecified": start_specified,
                "endSpecified": end_specified,
                "stepSpecified": step_specified,
            }),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Delegate to the JSON rendition so both paths agree on the shape
        self.to_json().serialize(serializer)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.root.fmt(f)
    }
}

/// Canonical text form of the node. Parsing the printed text yields the same
/// tree back; for expressions already in canonical form the text round-trips
/// unchanged.
impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Path { nodes, .. } => fmt_segments(f, nodes),
            other => fmt_segments(f, std::slice::from_ref(other)),
        }
    }
}

/// True if the name can appear bare in dotted notation
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    if !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$') {
        return false;
    }
    // These scan as keywords, not identifiers
    !matches!(name, "$" | "true" | "false")
}

fn fmt_segments(f: &mut std::fmt::Formatter<'_>, nodes: &[Node]) -> std::fmt::Result {
    let mut needs_dot = false;
    for node in nodes {
        match node {
            Node::Recursive { .. } => {
                f.write_str("..")?;
                needs_dot = false;
                continue;
            }
            Node::Field { name, .. } | Node::ExistingField { name, .. } => {
                if is_plain_identifier(name) {
                    if needs_dot {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                } else {
                    write!(f, "['{}']", escape_single_quoted(name))?;
                }
            }
            Node::This { .. } => {
                if needs_dot {
                    f.write_str(".")?;
                }
                f.write_str("@")?;
            }
            Node::Path { nodes, .. } => fmt_segments(f, nodes)?,
            bracketed => {
                f.write_str("[")?;
                fmt_bracketed(f, bracketed)?;
                f.write_str("]")?;
            }
        }
        needs_dot = true;
    }
    Ok(())
}

/// Render a node as it appears between brackets
fn fmt_bracketed(f: &mut std::fmt::Formatter<'_>, node: &Node) -> std::fmt::Result {
    match node {
        Node::Index { value, .. } => write!(f, "{value}"),
        Node::Slice {
            start,
            end,
            step,
            start_specified,
            end_specified,
            step_specified,
            ..
        } => {
            if *start_specified {
                write!(f, "{start}")?;
            }
            f.write_str(":")?;
            if *end_specified {
                write!(f, "{end}")?;
            }
            if *step_specified {
                write!(f, ":{step}")?;
            }
            Ok(())
        }
        Node::Wildcard { .. } => f.write_str("*"),
        Node::Union { nodes, .. } => {
            for (i, member) in nodes.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                fmt_bracketed(f, member)?;
            }
            Ok(())
        }
        Node::Filter { lhs, rhs, op, .. } => {
            fmt_operand(f, lhs)?;
            if *op == ComparisonOp::Exists {
                return f.write_str("?");
            }
            f.write_str(op.symbol())?;
            if let Some(rhs) = rhs {
                fmt_operand(f, rhs)?;
            }
            Ok(())
        }
        other => fmt_operand(f, other),
    }
}

/// Render a node as a filter operand
fn fmt_operand(f: &mut std::fmt::Formatter<'_>, node: &Node) -> std::fmt::Result {
    match node {
        // A sealed index keeps its brackets so it stays an indexing term
        Node::Index {
            sealed: true,
            value,
            ..
        } => write!(f, "[{value}]"),
        Node::Int { value, .. } => write!(f, "{value}"),
        Node::Float { value, .. } => write!(f, "{value}"),
        Node::String { value, .. } => write!(f, "{}", Value::String(value.clone())),
        other => fmt_segments(f, std::slice::from_ref(other)),
    }
}

fn escape_single_quoted(name: &str) -> String {
    name.replace('\\', "\\\\").replace('\'', "\\'")
}
