//! Recursive-descent parser producing the expression tree.

use super::lexer::{tokenize, Spanned, Token};
use super::XPathError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        let axis = match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            _ => return None,
        };
        Some(axis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeTest {
    /// Lower-cased element or attribute name.
    Name(String),
    Any,
    Text,
    Node,
    Comment,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Step {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Last,
    Position,
    Count,
    String,
    Concat,
    Contains,
    StartsWith,
    EndsWith,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Not,
    True,
    False,
    Boolean,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
    Name,
    LocalName,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "last" => Function::Last,
            "position" => Function::Position,
            "count" => Function::Count,
            "string" => Function::String,
            "concat" => Function::Concat,
            "contains" => Function::Contains,
            "starts-with" => Function::StartsWith,
            "ends-with" => Function::EndsWith,
            "substring-before" => Function::SubstringBefore,
            "substring-after" => Function::SubstringAfter,
            "substring" => Function::Substring,
            "string-length" => Function::StringLength,
            "normalize-space" => Function::NormalizeSpace,
            "translate" => Function::Translate,
            "not" => Function::Not,
            "true" => Function::True,
            "false" => Function::False,
            "boolean" => Function::Boolean,
            "number" => Function::Number,
            "sum" => Function::Sum,
            "floor" => Function::Floor,
            "ceiling" => Function::Ceiling,
            "round" => Function::Round,
            "name" => Function::Name,
            "local-name" => Function::LocalName,
            _ => return None,
        };
        Some(f)
    }

    /// Accepted argument counts, inclusive; `None` as max means unbounded.
    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::Last | Function::Position | Function::True | Function::False => {
                (0, Some(0))
            }
            Function::Count
            | Function::Not
            | Function::Boolean
            | Function::Sum
            | Function::Floor
            | Function::Ceiling
            | Function::Round => (1, Some(1)),
            Function::String
            | Function::StringLength
            | Function::NormalizeSpace
            | Function::Number
            | Function::Name
            | Function::LocalName => (0, Some(1)),
            Function::Contains
            | Function::StartsWith
            | Function::EndsWith
            | Function::SubstringBefore
            | Function::SubstringAfter => (2, Some(2)),
            Function::Substring => (2, Some(3)),
            Function::Translate => (3, Some(3)),
            Function::Concat => (2, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    /// Primary expression with predicates, optionally followed by a path.
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
}

/// Deepest nesting of parentheses, predicates, arguments and unary minus.
pub(crate) const MAX_DEPTH: usize = 64;

/// Longest accepted expression, in tokens. Binary operator chains build
/// left-deep trees, so this bounds the depth the evaluator recurses to.
pub(crate) const MAX_TOKENS: usize = 512;

pub(crate) fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(XPathError::Empty);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(XPathError::TooLong {
            tokens: tokens.len(),
            limit: MAX_TOKENS,
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or_expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(XPathError::UnexpectedToken {
            found: extra.token.describe(),
            expected: "end of expression".to_string(),
            position: extra.position,
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Run `f` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, XPathError>,
    ) -> Result<T, XPathError> {
        if self.depth >= MAX_DEPTH {
            let position = match self.tokens.get(self.pos) {
                Some(s) => s.position,
                None => self.tokens.last().map(|s| s.position).unwrap_or(0),
            };
            return Err(XPathError::TooDeep {
                position,
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn peek_name(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Name(n)) => Some(n.as_str()),
            _ => None,
        }
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> XPathError {
        match self.tokens.get(self.pos) {
            Some(s) => XPathError::UnexpectedToken {
                found: s.token.describe(),
                expected: expected.to_string(),
                position: s.position,
            },
            None => XPathError::UnexpectedEnd {
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), XPathError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.describe()))
        }
    }

    // ── operators ──────────────────────────────────────────────────────────

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        self.nested(Self::or_chain)
    }

    fn or_chain(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.and_expr()?;
        while self.peek_name() == Some("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.equality_expr()?;
        while self.peek_name() == Some("and") {
            self.pos += 1;
            let right = self.equality_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CmpOp::Eq,
                Some(Token::NotEq) => CmpOp::NotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.relational_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CmpOp::Lt,
                Some(Token::Le) => CmpOp::Le,
                Some(Token::Gt) => CmpOp::Gt,
                Some(Token::Ge) => CmpOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.additive_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative_expr()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Name(n)) if n == "div" => ArithOp::Div,
                Some(Token::Name(n)) if n == "mod" => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary_expr()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            let inner = self.nested(Self::unary_expr)?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // ── paths ──────────────────────────────────────────────────────────────

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_)) | Some(Token::Number(_)) | Some(Token::LParen) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !is_node_type(name)
            }
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_))
                | Some(Token::Star)
                | Some(Token::At)
                | Some(Token::Dot)
                | Some(Token::DotDot)
        )
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        if self.starts_filter_expr() {
            let primary = self.primary_expr()?;
            let predicates = self.predicates()?;
            let mut steps = Vec::new();
            if self.continues_path() {
                self.path_tail(&mut steps)?;
            }
            if predicates.is_empty() && steps.is_empty() {
                return Ok(primary);
            }
            return Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            });
        }

        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let mut steps = Vec::new();
                if self.starts_step() {
                    steps.push(self.step()?);
                    self.path_tail(&mut steps)?;
                }
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::descendant_or_self(), self.step()?];
                self.path_tail(&mut steps)?;
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            _ => {
                let mut steps = vec![self.step()?];
                self.path_tail(&mut steps)?;
                Ok(Expr::Path {
                    absolute: false,
                    steps,
                })
            }
        }
    }

    fn continues_path(&self) -> bool {
        matches!(self.peek(), Some(Token::Slash) | Some(Token::DoubleSlash))
    }

    /// Consume `('/' | '//') step` repetitions.
    fn path_tail(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if self.peek_at(1) == Some(&Token::DoubleColon) {
            let position = self.tokens[self.pos].position;
            let name = self.peek_name().map(str::to_string);
            let axis = name
                .as_deref()
                .and_then(Axis::from_name)
                .ok_or_else(|| XPathError::UnknownAxis {
                    name: name.clone().unwrap_or_default(),
                    position,
                })?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                Ok(NodeTest::Any)
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if is_node_type(&name) && self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    // processing-instruction('target') takes an optional literal
                    if matches!(self.peek(), Some(Token::Literal(_))) {
                        self.pos += 1;
                    }
                    self.expect(Token::RParen)?;
                    return Ok(match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::Node,
                        _ => NodeTest::Comment,
                    });
                }
                Ok(NodeTest::Name(name.to_ascii_lowercase()))
            }
            _ => Err(self.unexpected("node test")),
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        let position = self.tokens.get(self.pos).map(|s| s.position).unwrap_or(0);
        match self.bump() {
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => {
                let lowered = name.to_ascii_lowercase();
                let function = Function::from_name(&lowered)
                    .ok_or(XPathError::UnknownFunction { name, position })?;
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.or_expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen)?;
                        break;
                    }
                }
                let (min, max) = function.arity();
                if args.len() < min || max.is_some_and(|m| args.len() > m) {
                    return Err(XPathError::Arity {
                        name: lowered,
                        got: args.len(),
                        position,
                    });
                }
                Ok(Expr::Call(function, args))
            }
            other => {
                if other.is_some() {
                    self.pos -= 1;
                }
                Err(self.unexpected("expression"))
            }
        }
    }
}

fn is_node_type(name: &str) -> bool {
    matches!(name, "text" | "node" | "comment" | "processing-instruction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_slash_expands_to_descendant_or_self() {
        let expr = parse("//button").expect("parse");
        match expr {
            Expr::Path { absolute, steps } => {
                assert!(absolute);
                assert_eq!(steps.len(), 2);
                assert_eq!(steps[0].axis, Axis::DescendantOrSelf);
                assert_eq!(steps[1].test, NodeTest::Name("button".to_string()));
            }
            other => panic!("expected path, got {:?}", other),
        }
    }

    #[test]
    fn star_after_operand_is_multiplication() {
        let expr = parse("2 * 3").expect("parse");
        assert!(matches!(expr, Expr::Arith(ArithOp::Mul, _, _)));

        let expr = parse("//*").expect("parse");
        match expr {
            Expr::Path { steps, .. } => assert_eq!(steps[1].test, NodeTest::Any),
            other => panic!("expected path, got {:?}", other),
        }
    }

    #[test]
    fn operator_names_double_as_element_names() {
        let expr = parse("//div[div and mod]").expect("parse");
        match expr {
            Expr::Path { steps, .. } => {
                assert_eq!(steps[1].test, NodeTest::Name("div".to_string()));
                assert!(matches!(steps[1].predicates[0], Expr::And(_, _)));
            }
            other => panic!("expected path, got {:?}", other),
        }
    }

    #[test]
    fn function_call_starts_filter_expression() {
        let expr = parse("(//a)[1]/@href").expect("parse");
        match expr {
            Expr::Filter {
                predicates, steps, ..
            } => {
                assert_eq!(predicates.len(), 1);
                assert_eq!(steps[0].axis, Axis::Attribute);
            }
            other => panic!("expected filter, got {:?}", other),
        }
        assert!(matches!(
            parse("count(//a)").expect("parse"),
            Expr::Call(Function::Count, _)
        ));
    }

    #[test]
    fn reports_errors_with_position() {
        assert!(matches!(parse(""), Err(XPathError::Empty)));
        assert!(matches!(
            parse("//a[@id='x'"),
            Err(XPathError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse("//a]"),
            Err(XPathError::UnexpectedToken { position: 3, .. })
        ));
        assert!(matches!(
            parse("//a[frobnicate()]"),
            Err(XPathError::UnknownFunction { position: 4, .. })
        ));
        assert!(matches!(
            parse("//a[contains(@id)]"),
            Err(XPathError::Arity { got: 1, .. })
        ));
        assert!(matches!(
            parse("//sideways::a"),
            Err(XPathError::UnknownAxis { position: 2, .. })
        ));
    }

    fn wrapped(depth: usize) -> String {
        format!("{}//a{}", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn nesting_is_bounded() {
        assert!(parse(&wrapped(MAX_DEPTH - 1)).is_ok());
        assert!(matches!(
            parse(&wrapped(MAX_DEPTH)),
            Err(XPathError::TooDeep { limit: MAX_DEPTH, .. })
        ));
        assert!(matches!(
            parse(&wrapped(200)),
            Err(XPathError::TooDeep { position: 64, .. })
        ));

        let predicates = format!("{}1{}", "//a[".repeat(100), "]".repeat(100));
        assert!(matches!(parse(&predicates), Err(XPathError::TooDeep { .. })));

        let args = format!("{}1{}", "not(".repeat(100), ")".repeat(100));
        assert!(matches!(parse(&args), Err(XPathError::TooDeep { .. })));

        let negations = format!("{}1", "-".repeat(100));
        assert!(matches!(parse(&negations), Err(XPathError::TooDeep { .. })));
    }

    #[test]
    fn oversized_expressions_are_rejected() {
        match parse(&wrapped(4000)) {
            Err(XPathError::TooLong { tokens, limit }) => assert!(tokens > limit),
            other => panic!("expected TooLong, got {:?}", other),
        }

        let chain = vec!["//a"; 1000].join(" | ");
        assert!(matches!(
            parse(&chain),
            Err(XPathError::TooLong { limit: MAX_TOKENS, .. })
        ));

        let long_but_flat = vec!["@id='x'"; 60].join(" or ");
        assert!(parse(&format!("//a[{}]", long_but_flat)).is_ok());
    }
}
