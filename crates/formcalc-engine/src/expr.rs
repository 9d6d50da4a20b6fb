//! Restricted arithmetic formulas over named numeric variables.
//!
//! Formulas are lexed and parsed into an [`Expr`] tree and evaluated by walking it; there is
//! no string substitution and nothing in the grammar can name a function, so a formula can
//! only ever compute a number.
//!
//! Grammar (higher rows bind tighter):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := number | variable | '(' expr ')'
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{FormulaError, FormulaResult};
use crate::variables::{extract_variables, is_reserved, is_word_char};

/// Parenthesis/sign nesting accepted before a formula is rejected.
const MAX_NESTING: usize = 128;
/// Longest formula accepted; keeps the evaluated tree shallow enough to walk recursively.
pub const MAX_FORMULA_CHARS: usize = 4_096;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    /// A bare reserved identifier (`PI`, `E`, `Math`); only valid when explicitly bound.
    Reserved(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Floating-point remainder, sign of the dividend.
    Remainder,
}

impl BinaryOp {
    fn apply(self, left: f64, right: f64) -> FormulaResult<f64> {
        let result = match self {
            BinaryOp::Add => left + right,
            BinaryOp::Subtract => left - right,
            BinaryOp::Multiply => left * right,
            BinaryOp::Divide => {
                if right == 0.0 {
                    return Err(FormulaError::invalid("division by zero"));
                }
                left / right
            }
            BinaryOp::Remainder => {
                if right == 0.0 {
                    return Err(FormulaError::invalid("remainder by zero"));
                }
                left % right
            }
        };
        if result.is_finite() {
            Ok(result)
        } else {
            Err(FormulaError::invalid("result is not a finite number"))
        }
    }
}

/// Source of variable values during evaluation.
pub trait VariableSource {
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl VariableSource for HashMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl VariableSource for BTreeMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl VariableSource for [(&str, f64)] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| *value)
    }
}

impl<const N: usize> VariableSource for [(&str, f64); N] {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.as_slice().lookup(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Variable(String),
    Reserved(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn consume_while<F>(&mut self, mut predicate: F) -> &'a str
    where
        F: FnMut(char) -> bool,
    {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.input[start..self.pos]
    }

    fn next_token(&mut self) -> FormulaResult<Token> {
        self.consume_while(char::is_whitespace);
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            '+' | '-' | '*' | '/' | '%' | '(' | ')' => {
                self.bump();
                Ok(match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                })
            }
            '$' => {
                self.bump();
                if self.peek() != Some('{') {
                    return Err(FormulaError::invalid(format!(
                        "expected '{{' after '$' in {:?}",
                        self.input
                    )));
                }
                self.braced_name().map(Token::Variable)
            }
            '{' => self.braced_name().map(Token::Variable),
            c if c.is_ascii_digit() || c == '.' => {
                let literal = self.consume_while(|c| c.is_ascii_digit() || c == '.');
                if self.peek().is_some_and(is_word_char) {
                    return Err(FormulaError::invalid(format!(
                        "invalid number {:?}",
                        &self.input[self.pos - literal.len()..]
                    )));
                }
                literal
                    .parse::<f64>()
                    .map(Token::Number)
                    .map_err(|_| FormulaError::invalid(format!("invalid number {literal:?}")))
            }
            c if c.is_ascii_alphabetic() => {
                let ident = self.consume_while(is_word_char);
                if is_reserved(ident) {
                    Ok(Token::Reserved(ident.to_string()))
                } else {
                    Ok(Token::Variable(ident.to_string()))
                }
            }
            other => Err(FormulaError::invalid(format!(
                "unexpected character {other:?} in {:?}",
                self.input
            ))),
        }
    }

    /// `{name}` with the lexer positioned on `{`.
    fn braced_name(&mut self) -> FormulaResult<String> {
        self.bump();
        let body = self.consume_while(|c| c != '}');
        if self.bump() != Some('}') {
            return Err(FormulaError::invalid("unterminated variable reference"));
        }
        let name = body.trim();
        if name.is_empty() {
            return Err(FormulaError::invalid("empty variable reference"));
        }
        Ok(name.to_string())
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self {
            lexer,
            lookahead,
            depth: 0,
        })
    }

    fn bump(&mut self) -> FormulaResult<Token> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.lookahead, next))
    }

    fn parse(&mut self) -> FormulaResult<Expr> {
        if self.lookahead == Token::Eof {
            return Err(FormulaError::invalid("formula is empty"));
        }
        let expr = self.parse_expr(0)?;
        if self.lookahead != Token::Eof {
            return Err(FormulaError::invalid(format!(
                "unexpected token {:?}",
                self.lookahead
            )));
        }
        Ok(expr)
    }

    fn parse_expr(&mut self, min_prec: u8) -> FormulaResult<Expr> {
        let mut left = self.parse_prefix()?;
        while let Some((op, prec)) = self.infix_binding_power() {
            if prec < min_prec {
                break;
            }
            self.bump()?;
            let right = self.parse_expr(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> FormulaResult<Expr> {
        match self.bump()? {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Variable(name) => Ok(Expr::Variable(name)),
            Token::Reserved(name) => Ok(Expr::Reserved(name)),
            Token::Plus => self.nested(|parser| parser.parse_prefix()),
            Token::Minus => {
                let operand = self.nested(|parser| parser.parse_prefix())?;
                Ok(Expr::Negate(Box::new(operand)))
            }
            Token::LParen => {
                let inner = self.nested(|parser| parser.parse_expr(0))?;
                if self.bump()? != Token::RParen {
                    return Err(FormulaError::invalid("mismatched parentheses"));
                }
                Ok(inner)
            }
            Token::RParen => Err(FormulaError::invalid("mismatched parentheses")),
            Token::Eof => Err(FormulaError::invalid("unexpected end of formula")),
            other => Err(FormulaError::invalid(format!(
                "expected a number or variable, found {other:?}"
            ))),
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> FormulaResult<T>) -> FormulaResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError::invalid("formula is nested too deeply"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn infix_binding_power(&self) -> Option<(BinaryOp, u8)> {
        match self.lookahead {
            Token::Plus => Some((BinaryOp::Add, 1)),
            Token::Minus => Some((BinaryOp::Subtract, 1)),
            Token::Star => Some((BinaryOp::Multiply, 2)),
            Token::Slash => Some((BinaryOp::Divide, 2)),
            Token::Percent => Some((BinaryOp::Remainder, 2)),
            _ => None,
        }
    }
}

/// A parsed formula, reusable across evaluations.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
    variables: BTreeSet<String>,
}

impl Formula {
    pub fn parse(source: &str) -> FormulaResult<Self> {
        if source.chars().count() > MAX_FORMULA_CHARS {
            return Err(FormulaError::invalid(format!(
                "formula is longer than {MAX_FORMULA_CHARS} characters"
            )));
        }
        let expr = Parser::new(source)?.parse()?;
        let mut variables = BTreeSet::new();
        collect_variables(&expr, &mut variables);
        Ok(Self {
            source: source.to_string(),
            expr,
            variables,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Variables the formula depends on (reserved identifiers excluded).
    #[must_use]
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    /// Evaluates the formula. Every variable must be bound before any arithmetic happens.
    pub fn evaluate<V: VariableSource + ?Sized>(&self, values: &V) -> FormulaResult<f64> {
        let missing: Vec<String> = self
            .variables
            .iter()
            .filter(|name| values.lookup(name).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(FormulaError::UnboundVariable { names: missing });
        }

        let result = eval_expr(&self.expr, values)?;
        if result.is_finite() {
            Ok(result)
        } else {
            Err(FormulaError::invalid("result is not a finite number"))
        }
    }
}

fn collect_variables(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Variable(name) => {
            out.insert(name.clone());
        }
        Expr::Number(_) | Expr::Reserved(_) => {}
        Expr::Negate(inner) => collect_variables(inner, out),
        Expr::Binary { left, right, .. } => {
            collect_variables(left, out);
            collect_variables(right, out);
        }
    }
}

fn eval_expr<V: VariableSource + ?Sized>(expr: &Expr, values: &V) -> FormulaResult<f64> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Variable(name) => values.lookup(name).ok_or_else(|| FormulaError::UnboundVariable {
            names: vec![name.clone()],
        }),
        Expr::Reserved(name) => values
            .lookup(name)
            .ok_or_else(|| FormulaError::invalid(format!("{name} is not a number"))),
        Expr::Negate(inner) => Ok(-eval_expr(inner, values)?),
        Expr::Binary { op, left, right } => {
            let left = eval_expr(left, values)?;
            let right = eval_expr(right, values)?;
            op.apply(left, right)
        }
    }
}

/// Evaluates `formula` against `values`.
///
/// Unbound variables are reported before the formula is parsed, so a formula that is both
/// malformed and missing inputs fails with [`FormulaError::UnboundVariable`].
pub fn evaluate<V: VariableSource + ?Sized>(formula: &str, values: &V) -> FormulaResult<f64> {
    let missing: Vec<String> = extract_variables(formula)
        .into_iter()
        .filter(|name| values.lookup(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(FormulaError::UnboundVariable { names: missing });
    }
    Formula::parse(formula)?.evaluate(values)
}

/// Checks a formula authored for a derived element.
///
/// The formula must parse and must not use reserved identifiers, which no element can bind.
pub fn validate_formula(formula: &str) -> FormulaResult<()> {
    if formula.trim().is_empty() {
        return Err(FormulaError::invalid("formula is empty"));
    }
    let parsed = Formula::parse(formula)?;
    if let Some(name) = first_reserved(parsed.expr()) {
        return Err(FormulaError::invalid(format!("{name} is not a number")));
    }
    Ok(())
}

fn first_reserved(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Reserved(name) => Some(name),
        Expr::Number(_) | Expr::Variable(_) => None,
        Expr::Negate(inner) => first_reserved(inner),
        Expr::Binary { left, right, .. } => first_reserved(left).or_else(|| first_reserved(right)),
    }
}
