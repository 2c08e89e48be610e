//! Abstract syntax and parser of the supported XPath 1.0 subset.

use crate::error::RuleCompileError;
use oxdom::{NodeRef, XML_NAMESPACE};
use peg::parser;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Self>, Box<Self>),
    And(Box<Self>, Box<Self>),
    Compare(CompareOperator, Box<Self>, Box<Self>),
    Arithmetic(ArithmeticOperator, Box<Self>, Box<Self>),
    Negate(Box<Self>),
    Union(Box<Self>, Box<Self>),
    Path(LocationPath),
    /// A primary expression followed by predicates and/or location steps, like `$x[1]/a`.
    Filter {
        primary: Box<Self>,
        predicates: Vec<Self>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Variable(String),
    Call(Function, Vec<Self>),
}

impl Expr {
    /// Turns a rule context into an expression selecting every node it matches.
    ///
    /// Relative paths match at any depth so they are rooted with `//`.
    pub(crate) fn into_match_pattern(self) -> Self {
        match self {
            Self::Union(left, right) => Self::Union(
                Box::new(left.into_match_pattern()),
                Box::new(right.into_match_pattern()),
            ),
            Self::Path(LocationPath {
                absolute: false,
                steps,
            }) => Self::Path(LocationPath {
                absolute: true,
                steps: descendant_steps(steps),
            }),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Attribute,
    FollowingSibling,
    PrecedingSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeTest {
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `*`
    Any,
    /// `prefix:*`
    Namespace(String),
    Name { namespace: String, local: String },
}

impl NodeTest {
    pub(crate) fn matches(&self, node: NodeRef<'_>, axis: Axis) -> bool {
        let principal = if axis == Axis::Attribute {
            node.is_attribute()
        } else {
            node.is_element()
        };
        match self {
            Self::Node => true,
            Self::Text => node.is_text(),
            Self::Any => principal,
            Self::Namespace(namespace) => {
                principal && node.name().is_some_and(|n| n.namespace() == namespace)
            }
            Self::Name { namespace, local } => {
                principal && node.name().is_some_and(|n| n.is(namespace, local))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Not,
    True,
    False,
    Boolean,
    Count,
    String,
    StringLength,
    NormalizeSpace,
    Concat,
    Contains,
    StartsWith,
    EndsWith,
    SubstringBefore,
    SubstringAfter,
    Substring,
    Translate,
    Number,
    Sum,
    Name,
    LocalName,
    NamespaceUri,
    Position,
    Last,
    Exists,
    Empty,
    Matches,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "not" => Self::Not,
            "true" => Self::True,
            "false" => Self::False,
            "boolean" => Self::Boolean,
            "count" => Self::Count,
            "string" => Self::String,
            "string-length" => Self::StringLength,
            "normalize-space" => Self::NormalizeSpace,
            "concat" => Self::Concat,
            "contains" => Self::Contains,
            "starts-with" => Self::StartsWith,
            "ends-with" => Self::EndsWith,
            "substring-before" => Self::SubstringBefore,
            "substring-after" => Self::SubstringAfter,
            "substring" => Self::Substring,
            "translate" => Self::Translate,
            "number" => Self::Number,
            "sum" => Self::Sum,
            "name" => Self::Name,
            "local-name" => Self::LocalName,
            "namespace-uri" => Self::NamespaceUri,
            "position" => Self::Position,
            "last" => Self::Last,
            "exists" => Self::Exists,
            "empty" => Self::Empty,
            "matches" => Self::Matches,
            _ => return None,
        })
    }

    /// Minimal and maximal number of arguments.
    fn arity(self) -> (usize, usize) {
        match self {
            Self::True | Self::False | Self::Position | Self::Last => (0, 0),
            Self::Not | Self::Boolean | Self::Count | Self::Sum | Self::Exists | Self::Empty => {
                (1, 1)
            }
            Self::String
            | Self::StringLength
            | Self::NormalizeSpace
            | Self::Number
            | Self::Name
            | Self::LocalName
            | Self::NamespaceUri => (0, 1),
            Self::Concat => (2, usize::MAX),
            Self::Contains
            | Self::StartsWith
            | Self::EndsWith
            | Self::SubstringBefore
            | Self::SubstringAfter => (2, 2),
            Self::Substring | Self::Matches => (2, 3),
            Self::Translate => (3, 3),
        }
    }
}

/// Static context of the expressions of a schema.
pub(crate) struct ParserState {
    namespaces: FxHashMap<String, String>,
    variables: FxHashSet<String>,
    expression: String,
    error: Option<RuleCompileError>,
}

impl ParserState {
    pub(crate) fn new(namespaces: FxHashMap<String, String>) -> Self {
        Self {
            namespaces,
            variables: FxHashSet::default(),
            expression: String::new(),
            error: None,
        }
    }

    pub(crate) fn declare_variable(&mut self, name: impl Into<String>) {
        self.variables.insert(name.into());
    }

    pub(crate) fn variables(&self) -> &FxHashSet<String> {
        &self.variables
    }

    /// Replaces the variables in scope, returning the previous ones.
    pub(crate) fn set_variables(&mut self, variables: FxHashSet<String>) -> FxHashSet<String> {
        std::mem::replace(&mut self.variables, variables)
    }

    pub(crate) fn parse(&mut self, expression: &str) -> Result<Expr, RuleCompileError> {
        self.expression = expression.into();
        self.error = None;
        parser::Expression(expression, self).map_err(|e| {
            self.error.take().unwrap_or_else(|| RuleCompileError::XPath {
                expression: expression.into(),
                message: e.to_string(),
            })
        })
    }

    fn fail(&mut self, error: RuleCompileError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn namespace(&mut self, prefix: &str) -> Result<String, &'static str> {
        if prefix == "xml" {
            return Ok(XML_NAMESPACE.into());
        }
        if let Some(namespace) = self.namespaces.get(prefix) {
            return Ok(namespace.clone());
        }
        self.fail(RuleCompileError::UndeclaredPrefix {
            prefix: prefix.into(),
            expression: self.expression.clone(),
        });
        Err("declared namespace prefix")
    }

    fn name_test(&mut self, (prefix, local): (Option<&str>, &str)) -> Result<NodeTest, &'static str> {
        Ok(NodeTest::Name {
            namespace: match prefix {
                Some(prefix) => self.namespace(prefix)?,
                None => String::new(),
            },
            local: local.into(),
        })
    }

    fn axis(&mut self, name: &str) -> Result<Axis, &'static str> {
        Ok(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfNode,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "attribute" => Axis::Attribute,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return Err(self.unsupported(format!("{name} axis"))),
        })
    }

    fn unsupported(&mut self, construct: String) -> &'static str {
        self.fail(RuleCompileError::unsupported(
            construct,
            self.expression.clone(),
        ));
        "supported construct"
    }

    fn variable(&mut self, (prefix, local): (Option<&str>, &str)) -> Result<Expr, &'static str> {
        let name = match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.into(),
        };
        if self.variables.contains(&name) {
            return Ok(Expr::Variable(name));
        }
        self.fail(RuleCompileError::UndefinedVariable {
            name,
            expression: self.expression.clone(),
        });
        Err("defined variable")
    }

    fn function(
        &mut self,
        (prefix, local): (Option<&str>, &str),
        args: Vec<Expr>,
    ) -> Result<Expr, &'static str> {
        let name = match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.into(),
        };
        let Some(function) = prefix.map_or_else(|| Function::from_name(local), |_| None) else {
            self.fail(RuleCompileError::UnknownFunction {
                name,
                expression: self.expression.clone(),
            });
            return Err("known function");
        };
        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            self.fail(RuleCompileError::XPath {
                expression: self.expression.clone(),
                message: format!("{name}() does not take {} arguments", args.len()),
            });
            return Err("valid number of arguments");
        }
        Ok(Expr::Call(function, args))
    }
}

fn descendant_steps(steps: Vec<Step>) -> Vec<Step> {
    let mut all = Vec::with_capacity(steps.len() + 1);
    all.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
    all.extend(steps);
    all
}

fn fold_binary<O>(
    first: Expr,
    rest: Vec<(O, Expr)>,
    build: impl Fn(O, Box<Expr>, Box<Expr>) -> Expr,
) -> Expr {
    rest.into_iter()
        .fold(first, |left, (op, right)| build(op, Box::new(left), Box::new(right)))
}

parser! {
    //See https://www.w3.org/TR/1999/REC-xpath-19991116/#section-Expressions
    grammar parser(state: &mut ParserState) for str {
        pub rule Expression() -> Expr = _ e:Expr() _ { e }

        rule Expr() -> Expr = OrExpr()

        rule OrExpr() -> Expr = a:AndExpr() b:(_ "or" !NameChar() _ b:AndExpr() { ((), b) })* {
            fold_binary(a, b, |(), l, r| Expr::Or(l, r))
        }

        rule AndExpr() -> Expr = a:EqualityExpr() b:(_ "and" !NameChar() _ b:EqualityExpr() { ((), b) })* {
            fold_binary(a, b, |(), l, r| Expr::And(l, r))
        }

        rule EqualityExpr() -> Expr = a:RelationalExpr() b:(_ o:EqualityOperator() _ b:RelationalExpr() { (o, b) })* {
            fold_binary(a, b, Expr::Compare)
        }

        rule EqualityOperator() -> CompareOperator =
            "!=" { CompareOperator::NotEqual } /
            "=" { CompareOperator::Equal }

        rule RelationalExpr() -> Expr = a:AdditiveExpr() b:(_ o:RelationalOperator() _ b:AdditiveExpr() { (o, b) })* {
            fold_binary(a, b, Expr::Compare)
        }

        rule RelationalOperator() -> CompareOperator =
            "<=" { CompareOperator::LessOrEqual } /
            ">=" { CompareOperator::GreaterOrEqual } /
            "<" { CompareOperator::Less } /
            ">" { CompareOperator::Greater }

        rule AdditiveExpr() -> Expr = a:MultiplicativeExpr() b:(_ o:AdditiveOperator() _ b:MultiplicativeExpr() { (o, b) })* {
            fold_binary(a, b, Expr::Arithmetic)
        }

        rule AdditiveOperator() -> ArithmeticOperator =
            "+" { ArithmeticOperator::Add } /
            "-" { ArithmeticOperator::Subtract }

        rule MultiplicativeExpr() -> Expr = a:UnaryExpr() b:(_ o:MultiplicativeOperator() _ b:UnaryExpr() { (o, b) })* {
            fold_binary(a, b, Expr::Arithmetic)
        }

        rule MultiplicativeOperator() -> ArithmeticOperator =
            "*" { ArithmeticOperator::Multiply } /
            "div" !NameChar() { ArithmeticOperator::Divide } /
            "mod" !NameChar() { ArithmeticOperator::Modulo }

        rule UnaryExpr() -> Expr =
            "-" _ e:UnaryExpr() { Expr::Negate(Box::new(e)) } /
            UnionExpr()

        rule UnionExpr() -> Expr = a:PathExpr() b:(_ "|" _ b:PathExpr() { ((), b) })* {
            fold_binary(a, b, |(), l, r| Expr::Union(l, r))
        }

        rule PathExpr() -> Expr =
            p:PrimaryExpr() predicates:(_ p:Predicate() { p })* steps:(_ s:PathTail() { s })? {
                let steps = steps.unwrap_or_default();
                if predicates.is_empty() && steps.is_empty() {
                    p
                } else {
                    Expr::Filter { primary: Box::new(p), predicates, steps }
                }
            } /
            p:LocationPath() { Expr::Path(p) }

        rule PathTail() -> Vec<Step> =
            "//" _ s:RelativeLocationPath() { descendant_steps(s) } /
            "/" _ s:RelativeLocationPath() { s }

        rule LocationPath() -> LocationPath =
            "//" _ s:RelativeLocationPath() { LocationPath { absolute: true, steps: descendant_steps(s) } } /
            "/" _ s:RelativeLocationPath()? { LocationPath { absolute: true, steps: s.unwrap_or_default() } } /
            s:RelativeLocationPath() { LocationPath { absolute: false, steps: s } }

        rule RelativeLocationPath() -> Vec<Step> = first:Step() rest:(_ d:StepSeparator() _ s:Step() { (d, s) })* {
            let mut steps = vec![first];
            for (descendants, step) in rest {
                if descendants {
                    steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                }
                steps.push(step);
            }
            steps
        }

        rule StepSeparator() -> bool = "//" { true } / "/" { false }

        rule Step() -> Step =
            ".." { Step::new(Axis::Parent, NodeTest::Node) } /
            "." { Step::new(Axis::SelfNode, NodeTest::Node) } /
            a:AxisSpecifier() _ t:NodeTest() p:(_ p:Predicate() { p })* {
                Step { axis: a, test: t, predicates: p }
            }

        rule AxisSpecifier() -> Axis =
            n:NCName() _ "::" {? state.axis(n) } /
            "@" { Axis::Attribute } /
            { Axis::Child }

        rule NodeTest() -> NodeTest =
            "node" _ "(" _ ")" { NodeTest::Node } /
            "text" _ "(" _ ")" { NodeTest::Text } /
            n:$("comment" / "processing-instruction") _ "(" {? Err(state.unsupported(format!("{n}() node test"))) } /
            "*" { NodeTest::Any } /
            p:NCName() ":*" {? state.namespace(p).map(NodeTest::Namespace) } /
            q:QName() {? state.name_test(q) }

        rule Predicate() -> Expr = "[" _ e:Expr() _ "]" { e }

        rule PrimaryExpr() -> Expr =
            "$" q:QName() {? state.variable(q) } /
            "(" _ e:Expr() _ ")" { e } /
            l:Literal() { Expr::Literal(l) } /
            n:Number() { Expr::Number(n) } /
            FunctionCall()

        rule FunctionCall() -> Expr = !NodeType() q:QName() _ "(" _ args:(Expr() ** (_ "," _)) _ ")" {?
            state.function(q, args)
        }

        rule NodeType() = ("node" / "text" / "comment" / "processing-instruction") _ "("

        rule Literal() -> String =
            "\"" s:$([^ '"']*) "\"" { s.into() } /
            "'" s:$([^ '\'']*) "'" { s.into() }

        rule Number() -> f64 = n:$(['0'..='9']+ ("." ['0'..='9']*)? / "." ['0'..='9']+) {?
            n.parse().or(Err("number"))
        }

        rule QName() -> (Option<&'input str>, &'input str) =
            p:NCName() ":" l:NCName() { (Some(p), l) } /
            l:NCName() { (None, l) }

        rule NCName() -> &'input str = $(NameStartChar() NameChar()*)

        rule NameStartChar() = ['A'..='Z' | '_' | 'a'..='z' | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}']

        rule NameChar() = NameStartChar() / ['-' | '.' | '0'..='9' | '\u{B7}' | '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}']

        rule _() = quiet! { [' ' | '\t' | '\r' | '\n']* }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ParserState {
        let mut namespaces = FxHashMap::default();
        namespaces.insert("tei".into(), "http://www.tei-c.org/ns/1.0".into());
        ParserState::new(namespaces)
    }

    fn tei(local: &str) -> NodeTest {
        NodeTest::Name {
            namespace: "http://www.tei-c.org/ns/1.0".into(),
            local: local.into(),
        }
    }

    #[test]
    fn abbreviated_steps() -> Result<(), RuleCompileError> {
        let expr = state().parse("tei:div//tei:p/@n")?;
        assert_eq!(
            expr,
            Expr::Path(LocationPath {
                absolute: false,
                steps: vec![
                    Step::new(Axis::Child, tei("div")),
                    Step::new(Axis::DescendantOrSelf, NodeTest::Node),
                    Step::new(Axis::Child, tei("p")),
                    Step::new(
                        Axis::Attribute,
                        NodeTest::Name {
                            namespace: String::new(),
                            local: "n".into()
                        }
                    ),
                ]
            })
        );
        Ok(())
    }

    #[test]
    fn operators_and_names() -> Result<(), RuleCompileError> {
        let mut state = state();
        // `div` is an element name here and an operator there
        let expr = state.parse("count(tei:div) div 2 = 1 and not(@type)")?;
        let Expr::And(left, right) = expr else {
            return Err(RuleCompileError::invalid("", "not a conjunction"));
        };
        assert!(matches!(*left, Expr::Compare(CompareOperator::Equal, _, _)));
        assert!(matches!(*right, Expr::Call(Function::Not, _)));
        assert!(matches!(
            state.parse("- 1 * 2")?,
            Expr::Arithmetic(ArithmeticOperator::Multiply, _, _)
        ));
        Ok(())
    }

    #[test]
    fn axes_and_predicates() -> Result<(), RuleCompileError> {
        let expr = state().parse("ancestor-or-self::tei:div[@n][1]/following-sibling::*")?;
        let Expr::Path(path) = expr else {
            return Err(RuleCompileError::invalid("", "not a path"));
        };
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].axis, Axis::AncestorOrSelf);
        assert_eq!(path.steps[0].predicates.len(), 2);
        assert_eq!(path.steps[1].test, NodeTest::Any);
        Ok(())
    }

    #[test]
    fn filter_expressions() -> Result<(), RuleCompileError> {
        let mut state = state();
        state.declare_variable("items");
        assert!(matches!(
            state.parse("$items[2]/text()")?,
            Expr::Filter { .. }
        ));
        assert_eq!(state.parse("('a')")?, Expr::Literal("a".into()));
        assert_eq!(state.parse(".5")?, Expr::Number(0.5));
        Ok(())
    }

    #[test]
    fn errors() {
        let mut state = state();
        assert!(matches!(
            state.parse("foo(1)"),
            Err(RuleCompileError::UnknownFunction { .. })
        ));
        assert!(matches!(
            state.parse("x:p"),
            Err(RuleCompileError::UndeclaredPrefix { .. })
        ));
        assert!(matches!(
            state.parse("$missing"),
            Err(RuleCompileError::UndefinedVariable { .. })
        ));
        assert!(matches!(
            state.parse("following::tei:p"),
            Err(RuleCompileError::Unsupported { .. })
        ));
        assert!(matches!(
            state.parse("contains('a')"),
            Err(RuleCompileError::XPath { .. })
        ));
        assert!(matches!(
            state.parse("tei:p["),
            Err(RuleCompileError::XPath { .. })
        ));
    }

    #[test]
    fn match_patterns_are_rooted() -> Result<(), RuleCompileError> {
        let Expr::Union(left, right) = state().parse("tei:p | /tei:div")?.into_match_pattern()
        else {
            return Err(RuleCompileError::invalid("", "not a union"));
        };
        let Expr::Path(left) = *left else {
            return Err(RuleCompileError::invalid("", "not a path"));
        };
        assert!(left.absolute);
        assert_eq!(left.steps[0].axis, Axis::DescendantOrSelf);
        let Expr::Path(right) = *right else {
            return Err(RuleCompileError::invalid("", "not a path"));
        };
        assert_eq!(right.steps.len(), 1);
        Ok(())
    }
}
