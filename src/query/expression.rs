/// Condition expression AST and parsing
/// Conditions are parsed directly into an expression tree (nested and/or/not
/// over atomic comparisons) so no positional connective bookkeeping or
/// assembled expression strings survive past this module.
use crate::error::{EngineError, EngineResult};
use crate::query::alias::Aggregate;
use crate::storage::value::Value;

/// Possibly grouping-variable-qualified column reference
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub gv: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((gv, name)) if !gv.is_empty() && !name.is_empty() => Self {
                gv: Some(gv.to_string()),
                name: name.to_string(),
            },
            _ => Self {
                gv: None,
                name: text.to_string(),
            },
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        Self { gv: None, name: name.into() }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.gv {
            Some(gv) => write!(f, "{}.{}", gv, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Column reference; resolved trees only carry unqualified names
    Column(ColumnRef),
    /// Literal value
    Literal(Value),
    /// Aggregate call; rewritten to a canonical alias column before execution
    Aggregate { func: Aggregate, arg: ColumnRef },
    /// Binary operation (left op right)
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Unary operation (op expr)
    UnaryOp { op: UnaryOperator, expr: Box<Expression> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

impl Expression {
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(expr: Expression) -> Self {
        Expression::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(expr),
        }
    }

    /// Unqualified column names referenced anywhere in the tree
    pub fn collect_column_names(&self, out: &mut Vec<String>) {
        match self {
            Expression::Column(cr) => {
                if cr.gv.is_none() && !out.contains(&cr.name) {
                    out.push(cr.name.clone());
                }
            }
            Expression::Literal(_) | Expression::Aggregate { .. } => {}
            Expression::BinaryOp { left, right, .. } => {
                left.collect_column_names(out);
                right.collect_column_names(out);
            }
            Expression::UnaryOp { expr, .. } => expr.collect_column_names(out),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    And,
    Or,
    Not,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn comparison(&self) -> Option<BinaryOperator> {
        match self {
            Token::Eq => Some(BinaryOperator::Eq),
            Token::NotEq => Some(BinaryOperator::NotEq),
            Token::Lt => Some(BinaryOperator::Lt),
            Token::LtEq => Some(BinaryOperator::LtEq),
            Token::Gt => Some(BinaryOperator::Gt),
            Token::GtEq => Some(BinaryOperator::GtEq),
            _ => None,
        }
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn tokenize(input: &str) -> EngineResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch == '\'' || ch == '"' {
            let quote = ch;
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    Some(&c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        text.push(c);
                        i += 1;
                    }
                    None => {
                        return Err(EngineError::invalid_predicate(
                            input,
                            "unterminated string literal",
                        ))
                    }
                }
            }
            tokens.push(Token::Str(text));
            continue;
        }

        if ch.is_ascii_digit() {
            let mut text = String::new();
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                text.push(chars[i]);
                i += 1;
            }
            tokens.push(Token::Number(text));
            continue;
        }

        if is_ident_start(ch) {
            let mut text = String::new();
            while i < chars.len() && is_ident_char(chars[i]) {
                text.push(chars[i]);
                i += 1;
            }
            // Qualified reference: ident '.' ident becomes one token
            if chars.get(i) == Some(&'.') && chars.get(i + 1).copied().is_some_and(is_ident_start) {
                text.push('.');
                i += 1;
                while i < chars.len() && is_ident_char(chars[i]) {
                    text.push(chars[i]);
                    i += 1;
                }
            }
            tokens.push(match text.to_ascii_lowercase().as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                _ => Token::Ident(text),
            });
            continue;
        }

        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let (token, advance) = match two.as_str() {
            "<=" => (Token::LtEq, 2),
            ">=" => (Token::GtEq, 2),
            "<>" => (Token::NotEq, 2),
            "!=" => (Token::NotEq, 2),
            _ => match ch {
                '=' => (Token::Eq, 1),
                '<' => (Token::Lt, 1),
                '>' => (Token::Gt, 1),
                '+' => (Token::Plus, 1),
                '-' => (Token::Minus, 1),
                '*' => (Token::Star, 1),
                '/' => (Token::Slash, 1),
                '(' => (Token::LParen, 1),
                ')' => (Token::RParen, 1),
                other => {
                    return Err(EngineError::invalid_predicate(
                        input,
                        format!("unexpected character '{}'", other),
                    ))
                }
            },
        };
        tokens.push(token);
        i += advance;
    }

    Ok(tokens)
}

/// Recursive-descent condition parser.
/// Precedence, loosest first: or, and/not, comparison, +/-, * and /, unary.
pub struct ExpressionParser {
    tokens: Vec<Token>,
    pos: usize,
    source: String,
}

impl ExpressionParser {
    pub fn parse(input: &str) -> EngineResult<Expression> {
        let mut parser = Self {
            tokens: tokenize(input)?,
            pos: 0,
            source: input.trim().to_string(),
        };
        if parser.tokens.is_empty() {
            return Err(parser.error("empty condition"));
        }
        let expr = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.error("unexpected trailing tokens"));
        }
        Ok(expr)
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::invalid_predicate(&self.source, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token) -> EngineResult<()> {
        match self.advance() {
            Some(t) if t == token => Ok(()),
            _ => Err(self.error(format!("expected {:?}", token))),
        }
    }

    fn parse_or(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_not()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    let right = self.parse_not()?;
                    left = Expression::binary(left, BinaryOperator::And, right);
                }
                // A bare "not" connective conjoins a negated comparison
                Some(Token::Not) => {
                    let right = self.parse_not()?;
                    left = Expression::binary(left, BinaryOperator::And, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> EngineResult<Expression> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expression::not(inner));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> EngineResult<Expression> {
        let left = self.parse_additive()?;
        let op = match self.peek().and_then(Token::comparison) {
            Some(op) => op,
            None => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        if self.peek().and_then(Token::comparison).is_some() {
            return Err(self.error("condition does not split into left, operator, right"));
        }
        Ok(Expression::binary(left, op, right))
    }

    fn parse_additive(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOperator::Add,
                Some(Token::Minus) => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> EngineResult<Expression> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOperator::Multiply,
                Some(Token::Slash) => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> EngineResult<Expression> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Negate,
                expr: Box::new(inner),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> EngineResult<Expression> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Number(text)) => {
                let value = if text.contains('.') {
                    text.parse::<f64>()
                        .map(Value::Float64)
                        .map_err(|_| self.error(format!("invalid number '{}'", text)))?
                } else {
                    text.parse::<i64>()
                        .map(Value::Int64)
                        .map_err(|_| self.error(format!("invalid number '{}'", text)))?
                };
                Ok(Expression::Literal(value))
            }
            Some(Token::Str(text)) => Ok(Expression::Literal(Value::String(text))),
            Some(Token::Ident(text)) => {
                let aggregate = Aggregate::from_name(&text);
                if let (Some(func), Some(Token::LParen)) = (aggregate, self.peek()) {
                    self.advance();
                    let arg = match self.advance() {
                        Some(Token::Ident(arg)) => ColumnRef::parse(&arg),
                        _ => {
                            return Err(self.error(format!(
                                "argument of {}() must be a column reference",
                                func.name()
                            )))
                        }
                    };
                    self.expect(Token::RParen)?;
                    return Ok(Expression::Aggregate { func, arg });
                }
                if text.eq_ignore_ascii_case("true") {
                    return Ok(Expression::Literal(Value::Bool(true)));
                }
                if text.eq_ignore_ascii_case("false") {
                    return Ok(Expression::Literal(Value::Bool(false)));
                }
                Ok(Expression::Column(ColumnRef::parse(&text)))
            }
            _ => Err(self.error("expected a value, column, or aggregate call")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_condition() {
        let expr = ExpressionParser::parse("R.Date > \"96/05/31\" and R.Date < \"96/09/01\"").unwrap();
        match expr {
            Expression::BinaryOp { op: BinaryOperator::And, left, right } => {
                assert!(matches!(*left, Expression::BinaryOp { op: BinaryOperator::Gt, .. }));
                assert!(matches!(*right, Expression::BinaryOp { op: BinaryOperator::Lt, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_parse_arithmetic_over_aggregates() {
        let expr = ExpressionParser::parse("sum(R.Length)*3 > sum(Length)").unwrap();
        match expr {
            Expression::BinaryOp { op: BinaryOperator::Gt, left, .. } => match *left {
                Expression::BinaryOp { op: BinaryOperator::Multiply, left, .. } => {
                    assert!(matches!(
                        *left,
                        Expression::Aggregate { func: Aggregate::Sum, .. }
                    ));
                }
                other => panic!("unexpected left side: {other:?}"),
            },
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_bare_not_connective_conjoins() {
        let expr = ExpressionParser::parse("a = 1 not b = 2").unwrap();
        match expr {
            Expression::BinaryOp { op: BinaryOperator::And, right, .. } => {
                assert!(matches!(*right, Expression::UnaryOp { op: UnaryOperator::Not, .. }));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn test_chained_comparison_is_invalid() {
        assert!(matches!(
            ExpressionParser::parse("a = 1 = 2"),
            Err(EngineError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_unterminated_string_is_invalid() {
        assert!(matches!(
            ExpressionParser::parse("state = 'NY"),
            Err(EngineError::InvalidPredicate { .. })
        ));
    }

    #[test]
    fn test_qualified_reference_parsing() {
        let expr = ExpressionParser::parse("x.quant > 15").unwrap();
        match expr {
            Expression::BinaryOp { left, .. } => match *left {
                Expression::Column(cr) => {
                    assert_eq!(cr.gv.as_deref(), Some("x"));
                    assert_eq!(cr.name, "quant");
                }
                other => panic!("unexpected left side: {other:?}"),
            },
            other => panic!("unexpected tree: {other:?}"),
        }
    }
}
