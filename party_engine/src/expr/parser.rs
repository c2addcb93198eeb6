//! Recursive-descent parser producing an expression tree.

use super::{
    error::{ExprError, Result},
    lexer::{Token, tokenize},
};
use serde_json::Value;

/// Maximum nesting depth accepted by the parser. Every operator in a chain
/// and every member, index or call suffix counts as one level.
pub const MAX_DEPTH: usize = 64;

/// Longest expression source accepted, in characters.
pub const MAX_SOURCE_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Parses an expression source string.
pub fn parse(source: &str) -> Result<Expr> {
    let length = source.chars().count();
    if length > MAX_SOURCE_LEN {
        return Err(ExprError::TooLong(length));
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExprError::UnexpectedToken {
            found: token.to_string(),
            expected: "end of expression".to_string(),
        }),
    }
}

/// Names that never resolve, whatever the context holds.
pub(super) fn is_reserved(name: &str) -> bool {
    name == "constructor" || name == "prototype" || name.starts_with("__")
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
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

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                expected: expected.to_string(),
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn conditional(&mut self) -> Result<Expr> {
        self.enter()?;
        let test = self.logical_or()?;
        let expr = if self.eat(&Token::Question) {
            let consequent = self.conditional()?;
            self.expect(Token::Colon)?;
            let alternate = self.conditional()?;
            Expr::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate))
        } else {
            test
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.logical_and()?;
        while self.eat(&Token::Or) {
            self.enter()?;
            let rhs = self.logical_and()?;
            lhs = Expr::Logical(LogicalOp::Or, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.equality()?;
        while self.eat(&Token::And) {
            self.enter()?;
            let rhs = self.equality()?;
            lhs = Expr::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr> {
        let base = self.depth;
        // `(f)(x)` is not a call of `f`.
        let callable = matches!(self.peek(), Some(Token::Ident(_)));
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    self.enter()?;
                    let name = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        // Keywords are valid member names (`x.null` reads key "null").
                        Some(Token::True) => "true".to_string(),
                        Some(Token::False) => "false".to_string(),
                        Some(Token::Null) => "null".to_string(),
                        Some(token) => {
                            return Err(ExprError::UnexpectedToken {
                                found: token.to_string(),
                                expected: "member name".to_string(),
                            });
                        }
                        None => return Err(ExprError::UnexpectedEnd),
                    };
                    if is_reserved(&name) {
                        return Err(ExprError::ReservedName(name));
                    }
                    expr = Expr::Member(Box::new(expr), name);
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    self.enter()?;
                    let index = self.conditional()?;
                    self.expect(Token::RBracket)?;
                    if let Expr::Literal(Value::String(key)) = &index
                        && is_reserved(key)
                    {
                        return Err(ExprError::ReservedName(key.clone()));
                    }
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    self.pos += 1;
                    self.enter()?;
                    let name = match expr {
                        Expr::Ident(name) if callable => name,
                        _ => return Err(ExprError::NotCallable),
                    };
                    let args = self.arguments()?;
                    expr = Expr::Call(name, args);
                }
                _ => break,
            }
        }
        self.depth = base;
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.conditional()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(super::eval::number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(name)) => {
                if is_reserved(&name) {
                    return Err(ExprError::ReservedName(name));
                }
                Ok(Expr::Ident(name))
            }
            Some(Token::LParen) => {
                let expr = self.conditional()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(ExprError::UnexpectedToken {
                found: token.to_string(),
                expected: "a value".to_string(),
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Literal(json!(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Literal(json!(2))),
                    Box::new(Expr::Literal(json!(3))),
                )),
            )
        );
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        let Expr::Conditional(_, _, alternate) = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*alternate, Expr::Conditional(..)));
    }

    #[test]
    fn test_member_and_index() {
        let expr = parse("players[0].name").unwrap();
        assert_eq!(
            expr,
            Expr::Member(
                Box::new(Expr::Index(ident("players"), Box::new(Expr::Literal(json!(0))))),
                "name".to_string(),
            )
        );
    }

    #[test]
    fn test_call_only_on_identifiers() {
        assert!(matches!(parse("max(1, 2)"), Ok(Expr::Call(name, args)) if name == "max" && args.len() == 2));
        assert_eq!(parse("a.b(1)"), Err(ExprError::NotCallable));
        assert_eq!(parse("(a)(1)"), Err(ExprError::NotCallable));
    }

    #[test]
    fn test_reserved_names_rejected() {
        assert!(matches!(parse("constructor"), Err(ExprError::ReservedName(_))));
        assert!(matches!(parse("a.constructor"), Err(ExprError::ReservedName(_))));
        assert!(matches!(parse("a.__proto__"), Err(ExprError::ReservedName(_))));
        assert!(matches!(parse("a['prototype']"), Err(ExprError::ReservedName(_))));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(parse("1 2"), Err(ExprError::UnexpectedToken { .. })));
        assert_eq!(parse("1 +"), Err(ExprError::UnexpectedEnd));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(parse(&deep), Err(ExprError::TooDeep(MAX_DEPTH)));
    }

    #[test]
    fn test_chains_count_towards_depth() {
        let sum = format!("{}1", "1 + ".repeat(100));
        assert_eq!(parse(&sum), Err(ExprError::TooDeep(MAX_DEPTH)));

        let path = format!("gameState{}", ".a".repeat(100));
        assert_eq!(parse(&path), Err(ExprError::TooDeep(MAX_DEPTH)));

        let mixed = format!("x{}", "[0] && y".repeat(80));
        assert_eq!(parse(&mixed), Err(ExprError::TooDeep(MAX_DEPTH)));

        // Sibling chains do not add up.
        let short = format!("({}1) * ({}1)", "1 + ".repeat(40), "1 + ".repeat(40));
        assert!(parse(&short).is_ok());
        assert!(parse(&format!("gameState{}", ".a".repeat(50))).is_ok());
    }

    #[test]
    fn test_length_limit() {
        let long = format!("{}1", "1+".repeat(10_000));
        assert_eq!(parse(&long), Err(ExprError::TooLong(20_001)));
    }
}
