//! Quantity expression language.
//!
//! Formulas combine metric aliases with `+ - * /`, parentheses, and the
//! functions `MAX`, `MIN`, `CEIL`, `FLOOR`, and `ROUND`. Aliases are resolved
//! while parsing, so a misspelled alias fails when the catalog loads instead
//! of silently zeroing a quantity.

use std::fmt;

use super::metrics::{format_decimal, MetricAlias, ZoneMetrics};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },
    #[error("invalid number '{literal}' at position {position}")]
    InvalidNumber { literal: String, position: usize },
    #[error("unknown metric alias '{name}' at position {position}")]
    UnknownAlias { name: String, position: usize },
    #[error("unknown function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("{function} expects {expected} argument(s), found {found}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        position: usize,
    },
    #[error("unexpected end of formula, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("formula nests deeper than {limit} levels at position {position}")]
    TooDeep { limit: usize, position: usize },
    #[error("formula has {found} tokens; at most {limit} are allowed")]
    TooLong { limit: usize, found: usize },
}

/// Deepest allowed chain of groups, calls and unary minus.
pub const MAX_NESTING: usize = 32;
/// Bounds the length of left-leaning operator chains.
pub const MAX_TOKENS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Max,
    Min,
    Ceil,
    Floor,
    Round,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MAX" => Some(Self::Max),
            "MIN" => Some(Self::Min),
            "CEIL" => Some(Self::Ceil),
            "FLOOR" => Some(Self::Floor),
            "ROUND" => Some(Self::Round),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Max => "MAX",
            Self::Min => "MIN",
            Self::Ceil => "CEIL",
            Self::Floor => "FLOOR",
            Self::Round => "ROUND",
        }
    }

    fn check_arity(self, found: usize) -> Result<(), FormulaError> {
        let (ok, expected) = match self {
            Self::Max | Self::Min => (found >= 1, "at least 1"),
            Self::Ceil | Self::Floor | Self::Round => (found == 1, "exactly 1"),
        };
        if ok {
            Ok(())
        } else {
            Err(FormulaError::Arity {
                function: self.name(),
                expected,
                found,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Metric(MetricAlias),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    /// Parentheses written by the catalog author, kept for faithful rendering.
    Group(Box<Expr>),
}

impl Expr {
    fn collect_aliases(&self, out: &mut Vec<MetricAlias>) {
        match self {
            Expr::Number(_) => {}
            Expr::Metric(alias) => {
                if !out.contains(alias) {
                    out.push(*alias);
                }
            }
            Expr::Neg(inner) | Expr::Group(inner) => inner.collect_aliases(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_aliases(out);
                rhs.collect_aliases(out);
            }
            Expr::Call { args, .. } => args.iter().for_each(|arg| arg.collect_aliases(out)),
        }
    }

    /// Walks the tree, returning the value and the arithmetic with numbers substituted.
    fn eval(&self, metrics: &ZoneMetrics) -> (f64, String) {
        match self {
            Expr::Number(value) => (*value, format_decimal(*value, 4)),
            Expr::Metric(alias) => {
                let value = metrics.value(*alias);
                (value, format_decimal(value, 2))
            }
            Expr::Neg(inner) => {
                let (value, rendered) = inner.eval(metrics);
                (-value, format!("-{rendered}"))
            }
            Expr::Group(inner) => {
                let (value, rendered) = inner.eval(metrics);
                (value, format!("({rendered})"))
            }
            Expr::Binary { op, lhs, rhs } => {
                let (left, left_text) = lhs.eval(metrics);
                let (right, right_text) = rhs.eval(metrics);
                match op {
                    BinaryOp::Add => (left + right, format!("{left_text} + {right_text}")),
                    BinaryOp::Sub => (left - right, format!("{left_text} - {right_text}")),
                    BinaryOp::Mul => (left * right, format!("{left_text} × {right_text}")),
                    BinaryOp::Div => {
                        let value = if right == 0.0 { 0.0 } else { left / right };
                        (value, format!("{left_text}/{right_text}"))
                    }
                }
            }
            Expr::Call { function, args } => {
                let evaluated: Vec<(f64, String)> =
                    args.iter().map(|arg| arg.eval(metrics)).collect();
                let first = evaluated.first().map(|(value, _)| *value).unwrap_or(0.0);
                let value = match function {
                    Function::Max => evaluated
                        .iter()
                        .map(|(value, _)| *value)
                        .fold(f64::NEG_INFINITY, f64::max),
                    Function::Min => evaluated
                        .iter()
                        .map(|(value, _)| *value)
                        .fold(f64::INFINITY, f64::min),
                    Function::Ceil => first.ceil(),
                    Function::Floor => first.floor(),
                    Function::Round => first.round(),
                };
                let rendered_args: Vec<&str> =
                    evaluated.iter().map(|(_, text)| text.as_str()).collect();
                (
                    value,
                    format!("{}({})", function.name(), rendered_args.join(", ")),
                )
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => f.write_str(&format_decimal(*value, 4)),
            Expr::Metric(alias) => f.write_str(alias.as_str()),
            Expr::Neg(inner) => write!(f, "-{inner}"),
            Expr::Group(inner) => write!(f, "({inner})"),
            Expr::Binary { op, lhs, rhs } => {
                let symbol = match op {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Div => "/",
                };
                write!(f, "{lhs}{symbol}{rhs}")
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Result of evaluating a formula against concrete metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaEvaluation {
    pub value: f64,
    /// The expression with every alias replaced by its value.
    pub substituted: String,
}

/// A parsed, alias-checked quantity formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(FormulaError::Empty);
        }
        if tokens.len() > MAX_TOKENS {
            return Err(FormulaError::TooLong {
                limit: MAX_TOKENS,
                found: tokens.len(),
            });
        }

        let mut parser = Parser {
            tokens,
            cursor: 0,
            depth: 0,
        };
        let expr = parser.expression()?;
        if let Some(token) = parser.peek() {
            return Err(FormulaError::UnexpectedToken {
                found: token.kind.describe(),
                expected: "operator or end of formula",
                position: token.position,
            });
        }

        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    /// The text as written in the catalog.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Aliases referenced by the formula, in first-use order.
    pub fn aliases(&self) -> Vec<MetricAlias> {
        let mut aliases = Vec::new();
        self.expr.collect_aliases(&mut aliases);
        aliases
    }

    pub fn evaluate(&self, metrics: &ZoneMetrics) -> FormulaEvaluation {
        let (value, substituted) = self.expr.eval(metrics);
        FormulaEvaluation {
            value: if value.is_finite() { value } else { 0.0 },
            substituted,
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Number(value) => format!("number {}", format_decimal(*value, 4)),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];
        let position = index;
        let kind = match current {
            c if c.is_whitespace() => {
                index += 1;
                continue;
            }
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' | '×' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            c if c.is_ascii_digit() || c == '.' => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.')
                {
                    index += 1;
                }
                let literal: String = chars[start..index].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber {
                        literal: literal.clone(),
                        position: start,
                    })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    position: start,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = index;
                while index < chars.len()
                    && (chars[index].is_ascii_alphanumeric() || chars[index] == '_')
                {
                    index += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(chars[start..index].iter().collect()),
                    position: start,
                });
                continue;
            }
            other => {
                return Err(FormulaError::UnexpectedChar {
                    found: other,
                    position,
                })
            }
        };
        tokens.push(Token { kind, position });
        index += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, wanted: TokenKind, expected: &'static str) -> Result<(), FormulaError> {
        match self.advance() {
            Some(token) if token.kind == wanted => Ok(()),
            Some(token) => Err(FormulaError::UnexpectedToken {
                found: token.kind.describe(),
                expected,
                position: token.position,
            }),
            None => Err(FormulaError::UnexpectedEnd { expected }),
        }
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek().and_then(|token| match token.kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        }) {
            self.cursor += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek().and_then(|token| match token.kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            _ => None,
        }) {
            self.cursor += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::TooDeep {
                limit: MAX_NESTING,
                position: self.peek().map_or(0, |token| token.position),
            });
        }
        self.depth += 1;
        let expr = if matches!(self.peek().map(|token| &token.kind), Some(TokenKind::Minus)) {
            self.cursor += 1;
            self.unary().map(|inner| Expr::Neg(Box::new(inner)))
        } else {
            self.primary()
        };
        self.depth -= 1;
        expr
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self.advance().ok_or(FormulaError::UnexpectedEnd {
            expected: "number, alias, function, or '('",
        })?;

        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Group(Box::new(inner)))
            }
            TokenKind::Ident(name) => {
                if matches!(self.peek().map(|next| &next.kind), Some(TokenKind::LParen)) {
                    let function =
                        Function::lookup(&name).ok_or_else(|| FormulaError::UnknownFunction {
                            name: name.clone(),
                            position: token.position,
                        })?;
                    self.cursor += 1;
                    let args = self.arguments()?;
                    function.check_arity(args.len())?;
                    Ok(Expr::Call { function, args })
                } else {
                    name.parse::<MetricAlias>()
                        .map(Expr::Metric)
                        .map_err(|_| FormulaError::UnknownAlias {
                            name,
                            position: token.position,
                        })
                }
            }
            other => Err(FormulaError::UnexpectedToken {
                found: other.describe(),
                expected: "number, alias, function, or '('",
                position: token.position,
            }),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, FormulaError> {
        let mut args = Vec::new();
        if matches!(self.peek().map(|token| &token.kind), Some(TokenKind::RParen)) {
            self.cursor += 1;
            return Ok(args);
        }

        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Comma,
                    ..
                }) => continue,
                Some(Token {
                    kind: TokenKind::RParen,
                    ..
                }) => return Ok(args),
                Some(token) => {
                    return Err(FormulaError::UnexpectedToken {
                        found: token.kind.describe(),
                        expected: "',' or ')'",
                        position: token.position,
                    })
                }
                None => return Err(FormulaError::UnexpectedEnd { expected: "',' or ')'" }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::domain::{Opening, Zone, ZoneType};

    fn kitchen_metrics() -> ZoneMetrics {
        let mut zone = Zone::new("kitchen", ZoneType::Room);
        zone.length_ft = Some(12.0);
        zone.width_ft = Some(14.0);
        zone.height_ft = Some(9.0);
        zone.openings = vec![Opening::new(3.0, 7.0, 1), Opening::new(4.0, 5.5, 1)];
        zone.metrics()
    }

    #[test]
    fn dehumidifier_days_render_with_concrete_numbers() {
        let formula =
            Formula::parse("MAX(3, CEIL(FLOOR_SF/500)) * MAX(1, CEIL(FLOOR_SF/1000))")
                .expect("formula parses");
        let evaluation = formula.evaluate(&kitchen_metrics());

        assert_eq!(evaluation.value, 3.0);
        assert_eq!(
            evaluation.substituted,
            "MAX(3, CEIL(168/500)) × MAX(1, CEIL(168/1000))"
        );
        assert_eq!(formula.aliases(), vec![MetricAlias::FloorSf]);
    }

    #[test]
    fn runaway_nesting_is_rejected() {
        let nested = format!("{}FLOOR_SF{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            Formula::parse(&nested),
            Err(FormulaError::TooLong { .. })
        ));

        let deep = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert!(matches!(
            Formula::parse(&deep),
            Err(FormulaError::TooDeep { limit: MAX_NESTING, .. })
        ));

        let negated = format!("{}FLOOR_SF", "-".repeat(MAX_NESTING + 1));
        assert!(matches!(
            Formula::parse(&negated),
            Err(FormulaError::TooDeep { .. })
        ));

        let shallow = format!("{}1{}", "(".repeat(8), ")".repeat(8));
        let parsed = Formula::parse(&shallow).expect("parses");
        assert_eq!(parsed.evaluate(&kitchen_metrics()).value, 1.0);
    }

    #[test]
    fn precedence_and_groups_are_respected() {
        let metrics = kitchen_metrics();
        let flat = Formula::parse("FLOOR_SF + WALL_SF_NET * 2").expect("parses");
        assert_eq!(flat.evaluate(&metrics).value, 168.0 + 850.0);

        let grouped = Formula::parse("(FLOOR_SF + WALL_SF_NET) * 2").expect("parses");
        let evaluation = grouped.evaluate(&metrics);
        assert_eq!(evaluation.value, 1186.0);
        assert_eq!(evaluation.substituted, "(168 + 425) × 2");
    }

    #[test]
    fn unary_minus_and_min_floor_round() {
        let metrics = kitchen_metrics();
        let formula = Formula::parse("MIN(-PERIMETER_LF + 60, FLOOR(9.7), ROUND(2.5))")
            .expect("parses");
        assert_eq!(formula.evaluate(&metrics).value, 3.0);
    }

    #[test]
    fn division_by_zero_evaluates_to_zero() {
        let formula = Formula::parse("FLOOR_SF / 0").expect("parses");
        assert_eq!(formula.evaluate(&kitchen_metrics()).value, 0.0);
    }

    #[test]
    fn unknown_alias_fails_to_parse() {
        let err = Formula::parse("FLOR_SF * 1.1").expect_err("typo rejected");
        assert_eq!(
            err,
            FormulaError::UnknownAlias {
                name: "FLOR_SF".to_string(),
                position: 0
            }
        );
    }

    #[test]
    fn malformed_formulas_report_positions() {
        assert_eq!(Formula::parse("   "), Err(FormulaError::Empty));
        assert!(matches!(
            Formula::parse("FLOOR_SF $ 2"),
            Err(FormulaError::UnexpectedChar { found: '$', position: 9 })
        ));
        assert!(matches!(
            Formula::parse("CEIL(FLOOR_SF"),
            Err(FormulaError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            Formula::parse("SQRT(FLOOR_SF)"),
            Err(FormulaError::UnknownFunction { .. })
        ));
        assert!(matches!(
            Formula::parse("CEIL(1, 2)"),
            Err(FormulaError::Arity { function: "CEIL", .. })
        ));
        assert!(matches!(
            Formula::parse("FLOOR_SF FLOOR_SF"),
            Err(FormulaError::UnexpectedToken { position: 9, .. })
        ));
        assert!(matches!(
            Formula::parse("1..2"),
            Err(FormulaError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn display_normalizes_expression() {
        let formula = Formula::parse("ceil(roof_sq*1.1)").expect("parses");
        assert_eq!(formula.expr().to_string(), "CEIL(ROOF_SQ * 1.1)");
        assert_eq!(formula.source(), "ceil(roof_sq*1.1)");
    }
}
