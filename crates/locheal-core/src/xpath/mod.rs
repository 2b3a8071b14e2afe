//! XPath 1.0 evaluation for locator validation.
//!
//! Covers the location-path subset that test suites use for element
//! locators: every axis except `namespace`, name/`*`/`text()`/`node()` node
//! tests, nested positional predicates, unions, boolean and comparison
//! operators, arithmetic and the common string/number/boolean functions.
//! Element and attribute names compare ASCII case-insensitively, following
//! HTML semantics.
//!
//! ```ignore
//! let dom = Dom::parse(r#"<button id="new">Go</button>"#);
//! let xpath = XPath::parse("//button[@id='new']")?;
//! assert!(xpath.matches_element(&dom)?);
//! ```

mod eval;
mod lexer;
mod parser;

pub use eval::{Item, Value};

use crate::dom::{Dom, NodeId};

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XPathError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unterminated string literal starting at offset {position}")]
    UnterminatedString { position: usize },

    #[error("unexpected {found} at offset {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        position: usize,
    },

    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("unknown axis '{name}' at offset {position}")]
    UnknownAxis { name: String, position: usize },

    #[error("unknown function '{name}()' at offset {position}")]
    UnknownFunction { name: String, position: usize },

    #[error("wrong number of arguments ({got}) for '{name}()' at offset {position}")]
    Arity {
        name: String,
        got: usize,
        position: usize,
    },

    #[error("expression nested deeper than {limit} levels at offset {position}")]
    TooDeep { position: usize, limit: usize },

    #[error("expression has {tokens} tokens, more than the limit of {limit}")]
    TooLong { tokens: usize, limit: usize },

    #[error("expected a node-set, got a {0}")]
    NotANodeSet(&'static str),
}

/// A parsed, reusable XPath expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: parser::Expr,
}

impl XPath {
    pub fn parse(source: &str) -> Result<Self, XPathError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against the document node of `dom`.
    pub fn evaluate(&self, dom: &Dom) -> Result<Value, XPathError> {
        eval::Evaluator::new(dom).evaluate_root(&self.expr)
    }

    /// Element nodes selected by the expression, in document order.
    ///
    /// Fails with [`XPathError::NotANodeSet`] when the expression evaluates to
    /// a string, number or boolean.
    pub fn select_elements(&self, dom: &Dom) -> Result<Vec<NodeId>, XPathError> {
        match self.evaluate(dom)? {
            Value::Nodes(items) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Item::Node(id) if dom.is_element(id) => Some(id),
                    _ => None,
                })
                .collect()),
            other => Err(XPathError::NotANodeSet(other.type_name())),
        }
    }

    /// True when at least one element is selected.
    pub fn matches_element(&self, dom: &Dom) -> Result<bool, XPathError> {
        Ok(!self.select_elements(dom)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<form id="login">
  <label for="user">User name</label><input id="user" name="username" type="text">
  <label for="pass">Password</label><input id="pass" name="password" type="password">
  <button id="submit" class="btn btn-primary" data-qa="Login">  Sign   in </button>
</form>
<table id="grid">
  <tr><td>a</td><td>1</td></tr>
  <tr><td>b</td><td>2</td></tr>
  <tr><td>c</td><td>3</td></tr>
</table>
<ul><li>one</li><li>two</li><li>three</li></ul>
</body></html>"#;

    fn select(expr: &str) -> Vec<String> {
        let dom = Dom::parse(PAGE);
        let xpath = XPath::parse(expr).expect("parse");
        xpath
            .select_elements(&dom)
            .expect("node-set")
            .into_iter()
            .map(|id| dom.text_content(id).trim().to_string())
            .collect()
    }

    fn matches(expr: &str) -> bool {
        let dom = Dom::parse(PAGE);
        XPath::parse(expr)
            .expect("parse")
            .matches_element(&dom)
            .expect("evaluate")
    }

    #[test]
    fn attribute_predicates() {
        assert!(matches("//button[@id='submit']"));
        assert!(!matches("//button[@id='old']"));
        assert!(matches("//input[@name='password' and @type='password']"));
        assert!(matches("//*[@data-qa='Login']"));
        assert!(matches("//button[contains(@class, 'btn-primary')]"));
        assert!(matches("//input[starts-with(@id, 'us')]"));
        assert!(matches("//input[ends-with(@name, 'word')]"));
    }

    #[test]
    fn names_are_case_insensitive() {
        assert!(matches("//BUTTON[@ID='submit']"));
        assert!(matches("//Form/Button"));
    }

    #[test]
    fn text_functions() {
        assert!(matches("//button[normalize-space(.)='Sign in']"));
        assert!(matches("//button[normalize-space(text())='Sign in']"));
        assert!(matches("//label[text()='Password']"));
        assert!(matches(
            "//button[translate(normalize-space(), 'SIGN', 'sign')='sign in']"
        ));
        assert!(!matches("//label[text()='password']"));
    }

    #[test]
    fn positional_predicates() {
        assert_eq!(select("//ul/li[2]"), vec!["two"]);
        assert_eq!(select("//ul/li[last()]"), vec!["three"]);
        assert_eq!(select("//ul/li[position() > 1]"), vec!["two", "three"]);
        assert_eq!(select("(//td)[1]"), vec!["a"]);
        // per-parent position versus whole-set position
        assert_eq!(select("//tr/td[1]"), vec!["a", "b", "c"]);
        assert_eq!(select("//tr[td='b']/td[2]"), vec!["2"]);
    }

    #[test]
    fn axes() {
        assert_eq!(
            select("//label[.='Password']/following-sibling::input[1]/@name/.."),
            vec![""]
        );
        assert_eq!(
            select("//td[.='2']/preceding-sibling::td"),
            vec!["b"]
        );
        assert_eq!(select("//td[.='c']/ancestor::table/@id/.."), select("//table"));
        assert_eq!(select("//li[.='two']/following::li"), vec!["three"]);
        assert_eq!(select("//li[.='two']/preceding::li"), vec!["one"]);
        assert_eq!(select("//input[@id='user']/parent::form/@id/.."), select("//form"));
        assert!(matches("//td[.='a']/ancestor-or-self::tr"));
        assert!(matches("//form/descendant::input[@type='text']"));
        assert!(matches("/html/body/form"));
        assert!(matches("//body/self::body"));
    }

    #[test]
    fn unions_and_counts() {
        assert_eq!(select("//li[1] | //li[3]"), vec!["one", "three"]);
        // the parser wraps rows in an implied tbody
        assert!(matches("//table[count(.//tr) = 3]"));
        assert!(!matches("//table[count(tr) = 3]"));
        assert!(matches("//tr[td[2] >= 3]"));
        assert!(matches("//table[sum(.//td[2]) = 6]"));
        assert!(matches("//td[number(.) mod 2 = 0]"));
    }

    #[test]
    fn non_node_results_are_rejected() {
        let dom = Dom::parse(PAGE);
        let xpath = XPath::parse("count(//li)").expect("parse");
        assert_eq!(xpath.evaluate(&dom).expect("evaluate"), Value::Num(3.0));
        assert_eq!(
            xpath.matches_element(&dom),
            Err(XPathError::NotANodeSet("number"))
        );
    }

    #[test]
    fn attribute_only_selection_does_not_match() {
        let dom = Dom::parse(PAGE);
        let xpath = XPath::parse("//button/@id").expect("parse");
        assert!(!xpath.matches_element(&dom).expect("evaluate"));
        match xpath.evaluate(&dom).expect("evaluate") {
            Value::Nodes(items) => assert_eq!(items.len(), 1),
            other => panic!("expected node-set, got {:?}", other),
        }
    }

    #[test]
    fn parse_errors_are_typed() {
        assert!(matches!(
            XPath::parse("//button[@id='x'"),
            Err(XPathError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            XPath::parse("button[[1]]"),
            Err(XPathError::UnexpectedToken { position: 7, .. })
        ));
    }

    #[test]
    fn deeply_nested_expressions_are_refused() {
        let nest = |d: usize| format!("{}//button{}", "(".repeat(d), ")".repeat(d));
        assert!(matches(&nest(50)));
        for d in [200, 500, 1500, 4000] {
            assert!(matches!(
                XPath::parse(&nest(d)),
                Err(XPathError::TooDeep { .. } | XPathError::TooLong { .. })
            ));
        }
        assert!(matches!(
            XPath::parse(&format!("//li[{}1{}]", "(".repeat(100), ")".repeat(100))),
            Err(XPathError::TooDeep { .. })
        ));
    }
}
