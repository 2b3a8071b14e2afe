//! Expression evaluation over a [`Dom`].

use std::cmp::Ordering;

use super::parser::{ArithOp, Axis, CmpOp, Expr, Function, NodeTest, Step};
use super::XPathError;
use crate::dom::{Dom, NodeId, NodeKind};

/// A node reachable by an expression: a tree node or an element attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Node(NodeId),
    /// Element id and attribute index.
    Attribute(NodeId, usize),
}

impl Item {
    fn order_key(&self) -> (NodeId, usize) {
        match *self {
            Item::Node(id) => (id, 0),
            Item::Attribute(id, index) => (id, index + 1),
        }
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Node-set in document order without duplicates.
    Nodes(Vec<Item>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nodes(_) => "node-set",
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Context {
    item: Item,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'d> {
    dom: &'d Dom,
}

impl<'d> Evaluator<'d> {
    pub(crate) fn new(dom: &'d Dom) -> Self {
        Self { dom }
    }

    pub(crate) fn evaluate_root(&self, expr: &Expr) -> Result<Value, XPathError> {
        let ctx = Context {
            item: Item::Node(Dom::ROOT),
            position: 1,
            size: 1,
        };
        self.eval(expr, &ctx)
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value, XPathError> {
        match expr {
            Expr::Or(l, r) => {
                let value = self.boolean(&self.eval(l, ctx)?) || self.boolean(&self.eval(r, ctx)?);
                Ok(Value::Bool(value))
            }
            Expr::And(l, r) => {
                let value = self.boolean(&self.eval(l, ctx)?) && self.boolean(&self.eval(r, ctx)?);
                Ok(Value::Bool(value))
            }
            Expr::Compare(op, l, r) => {
                let left = self.eval(l, ctx)?;
                let right = self.eval(r, ctx)?;
                Ok(Value::Bool(self.compare(*op, left, right)))
            }
            Expr::Arith(op, l, r) => {
                let a = self.number(&self.eval(l, ctx)?);
                let b = self.number(&self.eval(r, ctx)?);
                let value = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => a % b,
                };
                Ok(Value::Num(value))
            }
            Expr::Negate(inner) => Ok(Value::Num(-self.number(&self.eval(inner, ctx)?))),
            Expr::Union(l, r) => {
                let mut items = self.node_set(self.eval(l, ctx)?)?;
                items.extend(self.node_set(self.eval(r, ctx)?)?);
                Ok(Value::Nodes(sort_unique(items)))
            }
            Expr::Literal(s) => Ok(Value::Str(s.clone())),
            Expr::Number(n) => Ok(Value::Num(*n)),
            Expr::Call(function, args) => self.call(*function, args, ctx),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    Item::Node(Dom::ROOT)
                } else {
                    ctx.item
                };
                Ok(Value::Nodes(self.walk(vec![start], steps)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let value = self.eval(primary, ctx)?;
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(value);
                }
                let mut items = self.node_set(value)?;
                for predicate in predicates {
                    items = self.filter(items, predicate)?;
                }
                Ok(Value::Nodes(self.walk(items, steps)?))
            }
        }
    }

    // ── location paths ─────────────────────────────────────────────────────

    fn walk(&self, start: Vec<Item>, steps: &[Step]) -> Result<Vec<Item>, XPathError> {
        let mut current = start;
        for step in steps {
            let mut next = Vec::new();
            for &item in &current {
                let candidates: Vec<Item> = self
                    .axis(item, step.axis)
                    .into_iter()
                    .filter(|&c| self.test(c, step.axis, &step.test))
                    .collect();
                let mut selected = candidates;
                for predicate in &step.predicates {
                    selected = self.filter(selected, predicate)?;
                }
                next.extend(selected);
            }
            current = sort_unique(next);
        }
        Ok(current)
    }

    /// Keep items for which `predicate` holds; a numeric predicate selects by
    /// position within `items`.
    fn filter(&self, items: Vec<Item>, predicate: &Expr) -> Result<Vec<Item>, XPathError> {
        let size = items.len();
        let mut kept = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            let ctx = Context {
                item,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Num(n) => n == (index + 1) as f64,
                other => self.boolean(&other),
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    /// Nodes on `axis` from `item`, in axis order (reverse axes nearest first).
    fn axis(&self, item: Item, axis: Axis) -> Vec<Item> {
        let dom = self.dom;
        let id = match item {
            Item::Node(id) => id,
            Item::Attribute(owner, _) => {
                return match axis {
                    Axis::SelfAxis => vec![item],
                    Axis::Parent => vec![Item::Node(owner)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(item);
                        }
                        out.push(Item::Node(owner));
                        out.extend(self.ancestors(owner));
                        out
                    }
                    Axis::Following => ((owner + 1)..dom.len()).map(Item::Node).collect(),
                    Axis::Preceding => self.preceding(owner),
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => dom.children(id).iter().copied().map(Item::Node).collect(),
            Axis::Descendant => ((id + 1)..=dom.subtree_end(id)).map(Item::Node).collect(),
            Axis::DescendantOrSelf => (id..=dom.subtree_end(id)).map(Item::Node).collect(),
            Axis::SelfAxis => vec![item],
            Axis::Parent => dom.parent(id).map(Item::Node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(id),
            Axis::AncestorOrSelf => {
                let mut out = vec![item];
                out.extend(self.ancestors(id));
                out
            }
            Axis::FollowingSibling => self
                .siblings(id)
                .iter()
                .copied()
                .filter(|&s| s > id)
                .map(Item::Node)
                .collect(),
            Axis::PrecedingSibling => self
                .siblings(id)
                .iter()
                .rev()
                .copied()
                .filter(|&s| s < id)
                .map(Item::Node)
                .collect(),
            Axis::Following => ((dom.subtree_end(id) + 1)..dom.len())
                .map(Item::Node)
                .collect(),
            Axis::Preceding => self.preceding(id),
            Axis::Attribute => (0..dom.attributes(id).len())
                .map(|index| Item::Attribute(id, index))
                .collect(),
        }
    }

    fn ancestors(&self, id: NodeId) -> Vec<Item> {
        let mut out = Vec::new();
        let mut current = self.dom.parent(id);
        while let Some(parent) = current {
            out.push(Item::Node(parent));
            current = self.dom.parent(parent);
        }
        out
    }

    fn siblings(&self, id: NodeId) -> &[NodeId] {
        match self.dom.parent(id) {
            Some(parent) => self.dom.children(parent),
            None => &[],
        }
    }

    /// Nodes before `id` that are not its ancestors, nearest first.
    fn preceding(&self, id: NodeId) -> Vec<Item> {
        (0..id)
            .rev()
            .filter(|&other| self.dom.subtree_end(other) < id)
            .map(Item::Node)
            .collect()
    }

    fn test(&self, item: Item, axis: Axis, test: &NodeTest) -> bool {
        match item {
            Item::Attribute(owner, index) => {
                let (name, _) = &self.dom.attributes(owner)[index];
                match test {
                    NodeTest::Node => true,
                    NodeTest::Any => axis == Axis::Attribute,
                    NodeTest::Name(wanted) => {
                        axis == Axis::Attribute && name.eq_ignore_ascii_case(wanted)
                    }
                    NodeTest::Text | NodeTest::Comment => false,
                }
            }
            Item::Node(id) => {
                let kind = &self.dom.node(id).kind;
                match test {
                    NodeTest::Node => true,
                    NodeTest::Text => matches!(kind, NodeKind::Text(_)),
                    NodeTest::Comment => false,
                    NodeTest::Any => {
                        axis != Axis::Attribute && matches!(kind, NodeKind::Element { .. })
                    }
                    NodeTest::Name(wanted) => {
                        axis != Axis::Attribute
                            && self
                                .dom
                                .element_name(id)
                                .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
                    }
                }
            }
        }
    }

    // ── conversions ────────────────────────────────────────────────────────

    fn node_set(&self, value: Value) -> Result<Vec<Item>, XPathError> {
        match value {
            Value::Nodes(items) => Ok(items),
            other => Err(XPathError::NotANodeSet(other.type_name())),
        }
    }

    fn string_value(&self, item: Item) -> String {
        match item {
            Item::Node(id) => self.dom.text_content(id),
            Item::Attribute(owner, index) => self.dom.attributes(owner)[index].1.clone(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(items) => items
                .first()
                .map(|&item| self.string_value(item))
                .unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => number_to_string(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            other => string_to_number(&self.string(other)),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    // ── comparisons ────────────────────────────────────────────────────────

    fn compare(&self, op: CmpOp, left: Value, right: Value) -> bool {
        match (left, right) {
            (Value::Nodes(items), Value::Bool(b)) => {
                compare_atoms(op, &Atom::Bool(!items.is_empty()), &Atom::Bool(b))
            }
            (Value::Bool(b), Value::Nodes(items)) => {
                compare_atoms(op, &Atom::Bool(b), &Atom::Bool(!items.is_empty()))
            }
            (left, right) => {
                let lefts = self.atoms(left);
                let rights = self.atoms(right);
                lefts
                    .iter()
                    .any(|a| rights.iter().any(|b| compare_atoms(op, a, b)))
            }
        }
    }

    fn atoms(&self, value: Value) -> Vec<Atom> {
        match value {
            Value::Nodes(items) => items
                .into_iter()
                .map(|item| Atom::Str(self.string_value(item)))
                .collect(),
            Value::Str(s) => vec![Atom::Str(s)],
            Value::Num(n) => vec![Atom::Num(n)],
            Value::Bool(b) => vec![Atom::Bool(b)],
        }
    }

    // ── functions ──────────────────────────────────────────────────────────

    fn call(&self, function: Function, args: &[Expr], ctx: &Context) -> Result<Value, XPathError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, ctx)?);
        }
        let context_set = || Value::Nodes(vec![ctx.item]);
        let str_arg = |i: usize| self.string(&values[i]);
        let str_or_context = |values: &[Value]| match values.first() {
            Some(v) => self.string(v),
            None => self.string(&context_set()),
        };

        let value = match function {
            Function::Last => Value::Num(ctx.size as f64),
            Function::Position => Value::Num(ctx.position as f64),
            Function::Count => Value::Num(self.node_set(values[0].clone())?.len() as f64),
            Function::String => Value::Str(str_or_context(&values)),
            Function::Concat => Value::Str(values.iter().map(|v| self.string(v)).collect()),
            Function::Contains => Value::Bool(str_arg(0).contains(&str_arg(1))),
            Function::StartsWith => Value::Bool(str_arg(0).starts_with(&str_arg(1))),
            Function::EndsWith => Value::Bool(str_arg(0).ends_with(&str_arg(1))),
            Function::SubstringBefore => {
                let s = str_arg(0);
                let needle = str_arg(1);
                Value::Str(
                    s.find(&needle)
                        .map(|i| s[..i].to_string())
                        .unwrap_or_default(),
                )
            }
            Function::SubstringAfter => {
                let s = str_arg(0);
                let needle = str_arg(1);
                Value::Str(
                    s.find(&needle)
                        .map(|i| s[i + needle.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            Function::Substring => {
                let s = str_arg(0);
                let start = xpath_round(self.number(&values[1]));
                let end = values.get(2).map(|v| start + xpath_round(self.number(v)));
                let out: String = s
                    .chars()
                    .enumerate()
                    .filter(|(i, _)| {
                        let position = (*i + 1) as f64;
                        position >= start && end.map_or(true, |e| position < e)
                    })
                    .map(|(_, c)| c)
                    .collect();
                Value::Str(out)
            }
            Function::StringLength => {
                Value::Num(str_or_context(&values).chars().count() as f64)
            }
            Function::NormalizeSpace => Value::Str(
                str_or_context(&values)
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Function::Translate => {
                let from: Vec<char> = str_arg(1).chars().collect();
                let to: Vec<char> = str_arg(2).chars().collect();
                let out: String = str_arg(0)
                    .chars()
                    .filter_map(|c| match from.iter().position(|&f| f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                Value::Str(out)
            }
            Function::Not => Value::Bool(!self.boolean(&values[0])),
            Function::True => Value::Bool(true),
            Function::False => Value::Bool(false),
            Function::Boolean => Value::Bool(self.boolean(&values[0])),
            Function::Number => Value::Num(match values.first() {
                Some(v) => self.number(v),
                None => self.number(&context_set()),
            }),
            Function::Sum => {
                let items = self.node_set(values[0].clone())?;
                Value::Num(
                    items
                        .into_iter()
                        .map(|item| string_to_number(&self.string_value(item)))
                        .sum(),
                )
            }
            Function::Floor => Value::Num(self.number(&values[0]).floor()),
            Function::Ceiling => Value::Num(self.number(&values[0]).ceil()),
            Function::Round => Value::Num(xpath_round(self.number(&values[0]))),
            Function::Name | Function::LocalName => {
                let items = match values.first() {
                    Some(v) => self.node_set(v.clone())?,
                    None => vec![ctx.item],
                };
                Value::Str(
                    items
                        .first()
                        .map(|&item| self.item_name(item))
                        .unwrap_or_default(),
                )
            }
        };
        Ok(value)
    }

    fn item_name(&self, item: Item) -> String {
        match item {
            Item::Node(id) => self.dom.element_name(id).unwrap_or_default().to_string(),
            Item::Attribute(owner, index) => self.dom.attributes(owner)[index].0.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Atom {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Atom {
    fn to_number(&self) -> f64 {
        match self {
            Atom::Str(s) => string_to_number(s),
            Atom::Num(n) => *n,
            Atom::Bool(true) => 1.0,
            Atom::Bool(false) => 0.0,
        }
    }

    fn to_bool(&self) -> bool {
        match self {
            Atom::Str(s) => !s.is_empty(),
            Atom::Num(n) => *n != 0.0 && !n.is_nan(),
            Atom::Bool(b) => *b,
        }
    }
}

fn compare_atoms(op: CmpOp, a: &Atom, b: &Atom) -> bool {
    match op {
        CmpOp::Eq | CmpOp::NotEq => {
            let equal = match (a, b) {
                (Atom::Bool(_), _) | (_, Atom::Bool(_)) => a.to_bool() == b.to_bool(),
                (Atom::Num(_), _) | (_, Atom::Num(_)) => a.to_number() == b.to_number(),
                (Atom::Str(x), Atom::Str(y)) => x == y,
            };
            if op == CmpOp::Eq {
                equal
            } else {
                !equal
            }
        }
        _ => {
            let ordering = a.to_number().partial_cmp(&b.to_number());
            match (op, ordering) {
                (CmpOp::Lt, Some(Ordering::Less)) => true,
                (CmpOp::Le, Some(Ordering::Less | Ordering::Equal)) => true,
                (CmpOp::Gt, Some(Ordering::Greater)) => true,
                (CmpOp::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
                _ => false,
            }
        }
    }
}

fn sort_unique(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by_key(Item::order_key);
    items.dedup();
    items
}

/// XPath `round`: halves round towards positive infinity.
fn xpath_round(n: f64) -> f64 {
    if n.is_finite() {
        (n + 0.5).floor()
    } else {
        n
    }
}

/// Strict XPath number syntax: optional minus, digits with at most one dot.
fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
