//! Parser for jmatch path expressions

use crate::ast::{ComparisonOp, Expression, Node};
use crate::scanner::{Scanner, Token, TokenKind};

/// Describes an error in the parse: the position of the problem along with
/// the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub pos: usize,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse a path expression into its compiled representation
pub fn parse(src: &str) -> Result<Expression, ParseError> {
    Parser::new(src).parse()
}

/// Recursive-descent parser with a single-token pushback buffer
pub struct Parser {
    scanner: Scanner,
    buf: Option<Token>,
    use_buf: bool,
}

impl Parser {
    pub fn new(src: &str) -> Self {
        Self {
            scanner: Scanner::new(src),
            buf: None,
            use_buf: false,
        }
    }

    /// Execute the parser
    pub fn parse(mut self) -> Result<Expression, ParseError> {
        let result = self.parse_path()?;
        let token = self.scan();
        if token.kind != TokenKind::Eof {
            return Err(ParseError {
                pos: token.pos,
                message: "Syntax error, unable to parse entire expression".to_string(),
            });
        }
        // An empty expression selects the value itself
        let root = result.unwrap_or(Node::This { pos: 0 });
        Ok(Expression::new(root))
    }

    /// The next token from the scanner, or the pushback buffer if a token has
    /// been unscanned
    fn scan_mindful_of_whitespace(&mut self) -> Token {
        if self.use_buf {
            self.use_buf = false;
            if let Some(token) = &self.buf {
                return token.clone();
            }
        }
        let token = self.scanner.scan();
        self.buf = Some(token.clone());
        token
    }

    /// The next non-whitespace token
    fn scan(&mut self) -> Token {
        let token = self.scan_mindful_of_whitespace();
        if token.kind == TokenKind::Whitespace {
            return self.scan_mindful_of_whitespace();
        }
        token
    }

    /// Push the previously read token back onto the buffer
    fn unscan(&mut self) {
        self.use_buf = true;
    }

    /// Position of the next token without consuming it
    fn peek_pos(&mut self) -> usize {
        let pos = self.scan().pos;
        self.unscan();
        pos
    }

    /// Parse a bracketed expression: a union of paths, a slice, or a filter
    fn parse_expression(&mut self) -> Result<Node, ParseError> {
        let pos = self.peek_pos();
        let mut nodes: Vec<Node> = Vec::new();

        loop {
            if let Some(path) = self.parse_path()? {
                nodes.push(path);
            }

            let token = self.scan();
            match token.kind {
                TokenKind::Comma => {
                    // Comma separates union members, nothing to do
                }
                TokenKind::Colon => {
                    // A colon means we are building a slice
                    self.unscan();
                    if let Some(first) = nodes.pop() {
                        // A colon following an integer means we were already
                        // building the slice expression, we just didn't know
                        // because of our very limited lookahead. No problem,
                        // we substitute the last node for a slice expression.
                        nodes.push(self.parse_slice_expression(Some(first))?);
                    } else {
                        // A slice starting with a colon implies selecting from
                        // the start of the array
                        nodes.push(self.parse_slice_expression(None)?);
                    }
                }
                TokenKind::Equals
                | TokenKind::Gt
                | TokenKind::Gte
                | TokenKind::Lt
                | TokenKind::Lte
                | TokenKind::Neq => {
                    let op = comparison_op(token.kind);
                    let Some(lhs) = nodes.pop() else {
                        return Err(ParseError {
                            pos: token.pos,
                            message: format!(
                                "Operator {} require a left hand side operand",
                                op.symbol()
                            ),
                        });
                    };
                    nodes.push(self.parse_filter(lhs, op)?);
                }
                TokenKind::Illegal => {
                    return Err(ParseError {
                        pos: token.pos,
                        message: format!("Syntax error. (Illegal token {:?})", token.text),
                    });
                }
                _ => {
                    self.unscan();
                    break;
                }
            }
        }

        Ok(seal(unwrap_if_single_node_list(Node::Union { pos, nodes })))
    }

    fn parse_slice_expression(&mut self, first: Option<Node>) -> Result<Node, ParseError> {
        let pos = self.peek_pos();
        let mut params: Vec<Option<i64>> = match first {
            None => vec![None],
            Some(Node::Index { value, .. }) => vec![Some(value)],
            Some(_) => {
                return Err(ParseError {
                    pos,
                    message: "A slice operator ':' require integer indicies".to_string(),
                });
            }
        };
        loop {
            let token = self.scan();
            if token.kind != TokenKind::Colon {
                self.unscan();
                break;
            }
            match self.parse_atom() {
                Some(Node::Index { value, .. }) => params.push(Some(value)),
                Some(_) => {
                    return Err(ParseError {
                        pos,
                        message: "A slice operator ':' require integer indicies".to_string(),
                    });
                }
                None => {
                    self.unscan();
                    break;
                }
            }
        }

        let mut result = Node::Slice {
            pos,
            start: 0,
            end: 0,
            step: 0,
            start_specified: false,
            end_specified: false,
            step_specified: false,
        };
        if let Node::Slice {
            start,
            end,
            step,
            start_specified,
            end_specified,
            step_specified,
            ..
        } = &mut result
        {
            if let Some(Some(value)) = params.first() {
                *start = *value;
                *start_specified = true;
            }
            if let Some(Some(value)) = params.get(1) {
                *end = *value;
                *end_specified = true;
            }
            if let Some(Some(value)) = params.get(2) {
                *step = *value;
                *step_specified = true;
            }
        }
        Ok(result)
    }

    /// Parse a sequence of atoms joined by `.`, `..` or `[…]`. Returns `None`
    /// when no atoms were found.
    fn parse_path(&mut self) -> Result<Option<Node>, ParseError> {
        let pos = self.peek_pos();
        let mut nodes: Vec<Node> = Vec::new();
        let mut no_naked_integers = false;
        loop {
            let token = self.scan();
            match token.kind {
                TokenKind::BracketLeft => {
                    nodes.push(self.parse_bracket_innards()?);
                }
                TokenKind::Dot => {
                    // After this point, no naked integers allowed
                    no_naked_integers = true;
                }
                TokenKind::DotDot => {
                    nodes.push(Node::Recursive { pos: token.pos });
                    // If the first token following a recursive is a field, it
                    // is parsed as an existing-field node to guard against
                    // malkovich-malkovich scenarios: updating all `_weak`
                    // values in a document must not end up adding that key to
                    // EVERY object in it. An existing-field node only matches
                    // fields that are already there.
                    let next = self.scan();
                    if next.kind == TokenKind::Identifier {
                        nodes.push(Node::ExistingField {
                            pos: next.pos,
                            name: next.text,
                        });
                    } else {
                        self.unscan();
                    }
                }
                TokenKind::Illegal => {
                    return Err(ParseError {
                        pos: token.pos,
                        message: format!("Syntax error. (Illegal token {:?})", token.text),
                    });
                }
                TokenKind::Integer if no_naked_integers => {
                    return Err(ParseError {
                        pos: token.pos,
                        message: format!(
                            "Wrap numbers in brackets when used in dotted path expressions \
                             ([{}] or [{:?}] depending on what you mean)",
                            token.text, token.text
                        ),
                    });
                }
                _ => {
                    self.unscan();
                    // Parse the next atom in the path
                    match self.parse_atom() {
                        Some(atom) => nodes.push(atom),
                        None => break,
                    }
                }
            }
        }
        if nodes.is_empty() {
            self.unscan();
            return Ok(None);
        }
        Ok(Some(unwrap_if_single_node_list(Node::Path { pos, nodes })))
    }

    /// Parse the contents of a `[…]` selector, including the legacy filter
    /// marker `[?(…)]` and the trailing exists operator `[…?]`
    fn parse_bracket_innards(&mut self) -> Result<Node, ParseError> {
        // Check for the filter-node marker [?(...)], kept for backwards
        // compatibility
        let mut has_filter_marker = false;
        let token = self.scan();
        if token.kind == TokenKind::QuestionMark {
            let token = self.scan();
            if token.kind == TokenKind::ParenLeft {
                has_filter_marker = true;
            } else {
                return Err(ParseError {
                    pos: token.pos,
                    message: "Expected '(' after '[?'".to_string(),
                });
            }
        } else {
            self.unscan();
        }

        let mut expr = self.parse_expression()?;

        if has_filter_marker {
            // Expect the terminating ')' of the '[?(' form
            let token = self.scan();
            if token.kind != TokenKind::ParenRight {
                return Err(ParseError {
                    pos: token.pos,
                    message: "Expected ')]'".to_string(),
                });
            }
            if !matches!(expr, Node::Filter { .. }) {
                // Not a filter already, so this is an implicit exists
                // operator as in [?(has.this.property)]
                expr = exists_filter(expr);
            }
        } else {
            // Check for the trailing exists operator [expr?]
            let token = self.scan();
            if token.kind == TokenKind::QuestionMark {
                expr = exists_filter(expr);
            } else {
                self.unscan();
            }
        }

        let token = self.scan();
        if token.kind != TokenKind::BracketRight {
            return Err(ParseError {
                pos: token.pos,
                message: "']' must appear".to_string(),
            });
        }
        Ok(expr)
    }

    /// Parse one atom of a path expression. Returns `None` (with the token
    /// pushed back) when the next token does not start an atom.
    fn parse_atom(&mut self) -> Option<Node> {
        let token = self.scan();
        match token.kind {
            TokenKind::Identifier => Some(Node::Field {
                pos: token.pos,
                name: token.text,
            }),
            TokenKind::SingleQuotedString => Some(Node::Field {
                pos: token.pos,
                name: strip_quotes(&token.text),
            }),
            TokenKind::DoubleQuotedString => Some(Node::String {
                pos: token.pos,
                value: strip_quotes(&token.text),
            }),
            TokenKind::Integer => Some(Node::Index {
                pos: token.pos,
                sealed: false,
                value: token.text.parse().unwrap_or(0),
            }),
            TokenKind::Float => Some(Node::Float {
                pos: token.pos,
                value: token.text.parse().unwrap_or(0.0),
            }),
            TokenKind::Asterisk => Some(Node::Wildcard { pos: token.pos }),
            TokenKind::At | TokenKind::Dollar => Some(Node::This { pos: token.pos }),
            _ => {
                self.unscan();
                None
            }
        }
    }

    fn parse_filter(&mut self, lhs: Node, op: ComparisonOp) -> Result<Node, ParseError> {
        let lhs = convert_to_comparison_term(lhs);
        let Some(rhs) = self.parse_path()? else {
            let pos = self.peek_pos();
            return Err(ParseError {
                pos,
                message: "Expected an operand for the operator".to_string(),
            });
        };
        let rhs = convert_to_comparison_term(rhs);
        Ok(Node::Filter {
            pos: 0,
            lhs: Box::new(lhs),
            rhs: Some(Box::new(rhs)),
            op,
        })
    }
}

fn comparison_op(kind: TokenKind) -> ComparisonOp {
    match kind {
        TokenKind::Equals => ComparisonOp::Eq,
        TokenKind::Neq => ComparisonOp::Neq,
        TokenKind::Lt => ComparisonOp::Lt,
        TokenKind::Lte => ComparisonOp::Lte,
        TokenKind::Gt => ComparisonOp::Gt,
        TokenKind::Gte => ComparisonOp::Gte,
        _ => unreachable!("token {kind:?} is not a comparison operator"),
    }
}

fn exists_filter(lhs: Node) -> Node {
    Node::Filter {
        pos: 0,
        lhs: Box::new(lhs),
        rhs: None,
        op: ComparisonOp::Exists,
    }
}

/// The literal text of a quoted string token without the surrounding quotes
fn strip_quotes(text: &str) -> String {
    text[1..text.len() - 1].to_string()
}

/// Unwrap path and union nodes holding exactly one child
fn unwrap_if_single_node_list(node: Node) -> Node {
    match node {
        Node::Path { pos, mut nodes } => {
            if nodes.len() == 1 {
                return nodes.remove(0);
            }
            Node::Path { pos, nodes }
        }
        Node::Union { pos, mut nodes } => {
            if nodes.len() == 1 {
                return nodes.remove(0);
            }
            Node::Union { pos, nodes }
        }
        other => other,
    }
}

/// Seal index nodes as they leave a bracketed expression so they are not
/// transformed into literals when given to operators: `4 > 2` means the
/// literal int 4 is greater than 2, while `[4] > 2` means the content at
/// array index 4 is greater than 2.
fn seal(node: Node) -> Node {
    match node {
        Node::Index { pos, value, .. } => Node::Index {
            pos,
            sealed: true,
            value,
        },
        other => other,
    }
}

/// Downgrade unsealed index nodes to int literals for use as comparison
/// operands. Sealed indices stay indexing terms.
fn convert_to_comparison_term(node: Node) -> Node {
    match node {
        Node::Index {
            pos,
            sealed: false,
            value,
        } => Node::Int { pos, value },
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_json(src: &str) -> serde_json::Value {
        parse(src).unwrap().to_json()
    }

    #[test]
    fn test_parse_simple_path() {
        assert_eq!(
            parse_json("a.b.c"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "field", "name": "b"},
                    {"node": "field", "name": "c"},
                ],
            })
        );
    }

    #[test]
    fn test_parse_single_field_unwraps() {
        assert_eq!(parse_json("a"), json!({"node": "field", "name": "a"}));
    }

    #[test]
    fn test_parse_empty_is_self() {
        assert_eq!(parse_json(""), json!({"node": "self"}));
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(
            parse_json("a[0]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "index", "value": 0},
                ],
            })
        );
        assert_eq!(
            parse_json("a[-1]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "index", "value": -1},
                ],
            })
        );
    }

    #[test]
    fn test_parse_quoted_field() {
        assert_eq!(
            parse_json("a['strange key']"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "field", "name": "strange key"},
                ],
            })
        );
    }

    #[test]
    fn test_parse_slice() {
        assert_eq!(
            parse_json("a[1:5]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "slice", "start": 1, "end": 5, "step": 0,
                     "startSpecified": true, "endSpecified": true, "stepSpecified": false},
                ],
            })
        );
    }

    #[test]
    fn test_parse_slice_with_step() {
        assert_eq!(
            parse_json("a[1:9:2]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "slice", "start": 1, "end": 9, "step": 2,
                     "startSpecified": true, "endSpecified": true, "stepSpecified": true},
                ],
            })
        );
    }

    #[test]
    fn test_parse_open_ended_slices() {
        assert_eq!(
            parse_json("a[3:]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "slice", "start": 3, "end": 0, "step": 0,
                     "startSpecified": true, "endSpecified": false, "stepSpecified": false},
                ],
            })
        );
        assert_eq!(
            parse_json("a[:3]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "slice", "start": 0, "end": 3, "step": 0,
                     "startSpecified": false, "endSpecified": true, "stepSpecified": false},
                ],
            })
        );
    }

    #[test]
    fn test_parse_wildcard_and_recursive() {
        assert_eq!(
            parse_json("a[*]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "wildcard"},
                ],
            })
        );
        assert_eq!(
            parse_json("a..name"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "recursive"},
                    {"node": "existingField", "name": "name"},
                ],
            })
        );
    }

    #[test]
    fn test_recursive_field_is_existing_field() {
        assert_eq!(
            parse_json("..name"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "recursive"},
                    {"node": "existingField", "name": "name"},
                ],
            })
        );
    }

    #[test]
    fn test_parse_union() {
        assert_eq!(
            parse_json("[x,y]"),
            json!({
                "node": "union",
                "nodes": [
                    {"node": "field", "name": "x"},
                    {"node": "field", "name": "y"},
                ],
            })
        );
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_json("a[b>2]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "filter",
                     "lhs": {"node": "field", "name": "b"},
                     "rhs": {"node": "int", "value": 2},
                     "operator": ">"},
                ],
            })
        );
    }

    #[test]
    fn test_parse_legacy_filter_marker() {
        // [?(…)] and […] parse to the same tree
        assert_eq!(parse_json("a[?(b>2)]"), parse_json("a[b>2]"));
    }

    #[test]
    fn test_parse_exists() {
        assert_eq!(
            parse_json("a[b?]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "filter",
                     "lhs": {"node": "field", "name": "b"},
                     "rhs": null,
                     "operator": "exists"},
                ],
            })
        );
        // The legacy marker around a non-filter is an implicit exists
        assert_eq!(parse_json("a[?(b)]"), parse_json("a[b?]"));
    }

    #[test]
    fn test_sealed_index_stays_index_in_comparison() {
        assert_eq!(
            parse_json("a[[4] > 2]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "filter",
                     "lhs": {"node": "index", "value": 4},
                     "rhs": {"node": "int", "value": 2},
                     "operator": ">"},
                ],
            })
        );
    }

    #[test]
    fn test_unsealed_integer_becomes_literal_in_comparison() {
        assert_eq!(
            parse_json("a[4 > 2]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "filter",
                     "lhs": {"node": "int", "value": 4},
                     "rhs": {"node": "int", "value": 2},
                     "operator": ">"},
                ],
            })
        );
    }

    #[test]
    fn test_parse_self_nodes() {
        assert_eq!(
            parse_json("$.a"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "self"},
                    {"node": "field", "name": "a"},
                ],
            })
        );
        assert_eq!(
            parse_json("a[@ == 7]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "filter",
                     "lhs": {"node": "self"},
                     "rhs": {"node": "int", "value": 7},
                     "operator": "=="},
                ],
            })
        );
    }

    #[test]
    fn test_parse_float_literal() {
        assert_eq!(
            parse_json("a[@ > 25.1]"),
            json!({
                "node": "path",
                "nodes": [
                    {"node": "field", "name": "a"},
                    {"node": "filter",
                     "lhs": {"node": "self"},
                     "rhs": {"node": "float", "value": 25.1},
                     "operator": ">"},
                ],
            })
        );
    }

    #[test]
    fn test_naked_integer_error() {
        let err = parse("milestones.0").unwrap_err();
        assert_eq!(
            err.message,
            "Wrap numbers in brackets when used in dotted path expressions \
             ([0] or [\"0\"] depending on what you mean)"
        );

        assert!(parse("milestones[0]").is_ok());
    }

    #[test]
    fn test_illegal_token_error() {
        let err = parse("milestones.0.date._type").unwrap_err();
        assert_eq!(err.message, "Syntax error. (Illegal token \"0.\")");
        assert_eq!(err.pos, 11);
    }

    #[test]
    fn test_missing_lhs_error() {
        let err = parse("a[> 2]").unwrap_err();
        assert_eq!(err.message, "Operator > require a left hand side operand");
    }

    #[test]
    fn test_missing_rhs_error() {
        let err = parse("a[b >]").unwrap_err();
        assert_eq!(err.message, "Expected an operand for the operator");
    }

    #[test]
    fn test_unbalanced_bracket_error() {
        let err = parse("a[0").unwrap_err();
        assert_eq!(err.message, "']' must appear");
    }

    #[test]
    fn test_filter_marker_errors() {
        let err = parse("a[?b]").unwrap_err();
        assert_eq!(err.message, "Expected '(' after '[?'");

        let err = parse("a[?(b]").unwrap_err();
        assert_eq!(err.message, "Expected ')]'");
    }

    #[test]
    fn test_slice_requires_integers() {
        let err = parse("a[b:2]").unwrap_err();
        assert_eq!(err.message, "A slice operator ':' require integer indicies");
    }

    #[test]
    fn test_trailing_garbage_error() {
        let err = parse("a]").unwrap_err();
        assert_eq!(err.message, "Syntax error, unable to parse entire expression");
    }

    #[test]
    fn test_whitespace_is_skipped() {
        assert_eq!(parse_json("a[ b > 2 ]"), parse_json("a[b>2]"));
    }

    #[test]
    fn test_canonical_print_round_trip() {
        let canonical = [
            "a.b.c",
            "a[0]",
            "a[-1]",
            "a[1:5]",
            "a[1:9:2]",
            "a[3:]",
            "a[:3]",
            "a[*]",
            "a..name",
            "a[b>2]",
            "a[b?]",
            "[x,y]",
            "a['strange key']",
            "a[[4]>2]",
            "ghosts[name==\"Clyde\"].color",
        ];
        for src in canonical {
            let expr = parse(src).unwrap();
            assert_eq!(expr.to_string(), src, "printing {src:?}");
            assert_eq!(
                parse(&expr.to_string()).unwrap(),
                expr,
                "reparsing the print of {src:?}"
            );
        }
    }

    #[test]
    fn test_printing_normalizes_equivalent_forms() {
        assert_eq!(parse("a[?(b>2)]").unwrap().to_string(), "a[b>2]");
        assert_eq!(parse("some.*").unwrap().to_string(), "some[*]");
        assert_eq!(parse("a[ b > 2 ]").unwrap().to_string(), "a[b>2]");
        let expr = parse("$.a").unwrap();
        assert_eq!(expr.to_string(), "@.a");
        assert_eq!(parse(&expr.to_string()).unwrap(), expr);
    }
}
