//! Recursive-descent parser producing the expression tree.
//!
//! Precedence, lowest first: assignment, conditional (`?:`), `||`, `&&`,
//! equality, relational, additive, multiplicative, unary, member access.

use serde_json::Value;

use super::lexer::{Spanned, Token};
use super::ScriptError;

/// Maximum nesting of sub-expressions accepted by the parser.
pub(crate) const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    LooseEq,
    LooseNe,
    StrictEq,
    StrictNe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    Set,
    Add,
    Sub,
}

/// Parse a whole script: statements separated by `;`.
pub(crate) fn parse_program(tokens: Vec<Spanned>, source_len: usize) -> Result<Vec<Expr>, ScriptError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        source_len,
    };
    let mut statements = Vec::new();

    loop {
        while parser.eat_punct(";") {}
        if parser.at_end() {
            break;
        }
        statements.push(parser.statement()?);
        if !parser.at_end() && !parser.eat_punct(";") {
            return Err(parser.error("expected ';' between statements"));
        }
    }

    Ok(statements)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    source_len: usize,
}

impl Parser {
    fn statement(&mut self) -> Result<Expr, ScriptError> {
        // `var x = ...` / `let` / `const` bind a name exactly like a plain assignment.
        if let Some(Token::Ident(kw)) = self.peek() {
            if matches!(kw.as_str(), "var" | "let" | "const") {
                self.pos += 1;
                let name = match self.next() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err(self.error("expected identifier after declaration keyword")),
                };
                if !self.eat_punct("=") {
                    return Ok(Expr::Assign(
                        AssignOp::Set,
                        Box::new(Expr::Ident(name)),
                        Box::new(Expr::Literal(Value::Null)),
                    ));
                }
                let value = self.assignment()?;
                return Ok(Expr::Assign(AssignOp::Set, Box::new(Expr::Ident(name)), Box::new(value)));
            }
        }
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ScriptError> {
        self.enter()?;
        let target = self.conditional()?;
        let op = if self.eat_punct("=") {
            Some(AssignOp::Set)
        } else if self.eat_punct("+=") {
            Some(AssignOp::Add)
        } else if self.eat_punct("-=") {
            Some(AssignOp::Sub)
        } else {
            None
        };

        let result = match op {
            Some(op) => {
                if !matches!(target, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
                    return Err(ScriptError::InvalidAssignment);
                }
                let value = self.assignment()?;
                Expr::Assign(op, Box::new(target), Box::new(value))
            }
            None => target,
        };
        self.leave();
        Ok(result)
    }

    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let test = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.assignment()?;
        self.expect_punct(":")?;
        let alternate = self.assignment()?;
        Ok(Expr::Conditional(Box::new(test), Box::new(consequent), Box::new(alternate)))
    }

    fn logical_or(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.logical_and()?;
        let mut wrapped = 0;
        while self.eat_punct("||") {
            self.nest(&mut wrapped)?;
            let right = self.logical_and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        self.unwind(wrapped);
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.equality()?;
        let mut wrapped = 0;
        while self.eat_punct("&&") {
            self.nest(&mut wrapped)?;
            let right = self.equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        self.unwind(wrapped);
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.relational()?;
        let mut wrapped = 0;
        loop {
            let op = match self.peek_punct() {
                Some("==") => BinaryOp::LooseEq,
                Some("!=") => BinaryOp::LooseNe,
                Some("===") => BinaryOp::StrictEq,
                Some("!==") => BinaryOp::StrictNe,
                _ => {
                    self.unwind(wrapped);
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.nest(&mut wrapped)?;
            let right = self.relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn relational(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.additive()?;
        let mut wrapped = 0;
        loop {
            let op = match self.peek_punct() {
                Some("<") => BinaryOp::Lt,
                Some("<=") => BinaryOp::Le,
                Some(">") => BinaryOp::Gt,
                Some(">=") => BinaryOp::Ge,
                _ => {
                    self.unwind(wrapped);
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.nest(&mut wrapped)?;
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.multiplicative()?;
        let mut wrapped = 0;
        loop {
            let op = match self.peek_punct() {
                Some("+") => BinaryOp::Add,
                Some("-") => BinaryOp::Sub,
                _ => {
                    self.unwind(wrapped);
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.nest(&mut wrapped)?;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        let mut wrapped = 0;
        loop {
            let op = match self.peek_punct() {
                Some("*") => BinaryOp::Mul,
                Some("/") => BinaryOp::Div,
                Some("%") => BinaryOp::Rem,
                _ => {
                    self.unwind(wrapped);
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.nest(&mut wrapped)?;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek_punct() {
            Some("!") => UnaryOp::Not,
            Some("-") => UnaryOp::Neg,
            Some("+") => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.pos += 1;
        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        let mut wrapped = 0;
        loop {
            if self.peek_punct() == Some(".") || self.peek_punct() == Some("[") {
                self.nest(&mut wrapped)?;
            }
            if self.eat_punct(".") {
                match self.next() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    _ => return Err(self.error("expected property name after '.'")),
                }
            } else if self.eat_punct("[") {
                let index = self.assignment()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.peek_punct() == Some("(") {
                return Err(self.error("function calls are not supported"));
            } else {
                self.unwind(wrapped);
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let token = self
            .next()
            .ok_or_else(|| self.error("unexpected end of expression"))?;

        match token {
            Token::Number(n) => Ok(Expr::Literal(super::value::number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" | "undefined" => Expr::Literal(Value::Null),
                _ => Expr::Ident(name),
            }),
            Token::Punct("(") => {
                self.enter()?;
                let inner = self.assignment()?;
                self.expect_punct(")")?;
                self.leave();
                Ok(inner)
            }
            Token::Punct("[") => {
                self.enter()?;
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                self.leave();
                Ok(Expr::Array(items))
            }
            Token::Punct("{") => {
                self.enter()?;
                let mut fields = Vec::new();
                while !self.eat_punct("}") {
                    let key = match self.next() {
                        Some(Token::Ident(k)) | Some(Token::Str(k)) => k,
                        Some(Token::Number(n)) => super::value::to_display(&super::value::number(n)),
                        _ => return Err(self.error("expected object key")),
                    };
                    self.expect_punct(":")?;
                    fields.push((key, self.assignment()?));
                    if !self.eat_punct(",") {
                        self.expect_punct("}")?;
                        break;
                    }
                }
                self.leave();
                Ok(Expr::Object(fields))
            }
            Token::Punct(p) => {
                self.pos -= 1;
                Err(self.error(&format!("unexpected '{p}'")))
            }
        }
    }

    // ── token helpers ───────────────────────────────────────────────

    fn enter(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ScriptError::DepthExceeded(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Count one more level of a left-nested chain (`a + b + c`, `a.b.c`).
    fn nest(&mut self, wrapped: &mut usize) -> Result<(), ScriptError> {
        self.enter()?;
        *wrapped += 1;
        Ok(())
    }

    fn unwind(&mut self, wrapped: usize) {
        self.depth -= wrapped;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_punct(&self) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Punct(p)) => Some(p),
            _ => None,
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek_punct() == Some(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ScriptError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{p}'")))
        }
    }

    fn error(&self, message: &str) -> ScriptError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|s| s.offset)
            .unwrap_or(self.source_len);
        ScriptError::Parse {
            offset,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lexer::tokenize;

    fn parse(src: &str) -> Result<Vec<Expr>, ScriptError> {
        parse_program(tokenize(src)?, src.len())
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let program = parse("1 + 2 * 3").unwrap();
        match &program[0] {
            Expr::Binary(BinaryOp::Add, _, rhs) => {
                assert!(matches!(**rhs, Expr::Binary(BinaryOp::Mul, _, _)));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn member_chain_and_index() {
        let program = parse("payload.hits.hits[0]").unwrap();
        assert!(matches!(program[0], Expr::Index(_, _)));
    }

    #[test]
    fn statements_split_on_semicolons() {
        let program = parse("var total = payload.hits.total; payload.doubled = total * 2;").unwrap();
        assert_eq!(program.len(), 2);
        assert!(matches!(program[0], Expr::Assign(AssignOp::Set, _, _)));
    }

    #[test]
    fn rejects_literal_assignment_target() {
        assert!(matches!(parse("1 = 2"), Err(ScriptError::InvalidAssignment)));
    }

    #[test]
    fn rejects_function_calls() {
        assert!(matches!(parse("alert(1)"), Err(ScriptError::Parse { .. })));
    }

    #[test]
    fn missing_separator_is_a_parse_error() {
        assert!(matches!(parse("a b"), Err(ScriptError::Parse { .. })));
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let src = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(parse(&src), Err(ScriptError::DepthExceeded(_))));
        let src = format!("{}true", "!".repeat(200));
        assert!(matches!(parse(&src), Err(ScriptError::DepthExceeded(_))));
    }

    #[test]
    fn long_chains_are_bounded() {
        let sum = vec!["1"; 100_000].join(" + ");
        assert!(matches!(parse(&sum), Err(ScriptError::DepthExceeded(_))));
        let members = format!("payload{}", ".a".repeat(100_000));
        assert!(matches!(parse(&members), Err(ScriptError::DepthExceeded(_))));
        let ands = vec!["true"; 100_000].join(" && ");
        assert!(matches!(parse(&ands), Err(ScriptError::DepthExceeded(_))));
    }

    #[test]
    fn sibling_chains_do_not_accumulate_depth() {
        let clause = format!("payload.a{}", " + 1".repeat(40));
        let src = vec![clause.as_str(); 10].join(" && ");
        assert!(parse(&format!("({src}) || ({src})")).is_ok());
    }
}
