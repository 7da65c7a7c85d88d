//! RS-012: Tokenizer, AST, and recursive-descent parser for `calc` scripts.

use super::EvalError;

/// Control-flow and literal keywords of the `calc` language.
pub const KEYWORDS: &[&str] = &["for", "in", "if", "else", "while", "true", "false"];

// ── Tokens ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Symbol(&'static str),
    Newline,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    line: usize,
}

// Longest symbols first so `..` wins over `.` style prefixes.
const SYMBOLS: &[&str] = &[
    "..", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "+", "-", "*", "/", "%",
    "(", ")", "[", "]", "{", "}", ",", ";", "=", "<", ">", "!",
];

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut depth = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            if depth == 0 {
                tokens.push(Token { kind: TokenKind::Newline, line });
            }
            line += 1;
            i += 1;
        } else if c.is_whitespace() {
            i += 1;
        } else if c == '#' || (c == '/' && chars.get(i + 1) == Some(&'/')) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if matches!(chars.get(i), Some('e') | Some('E')) {
                let mut j = i + 1;
                if matches!(chars.get(j), Some('+') | Some('-')) {
                    j += 1;
                }
                if chars.get(j).is_some_and(|d| d.is_ascii_digit()) {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<f64>().map_err(|_| EvalError::Syntax {
                line,
                message: format!("invalid number '{}'", text),
            })?;
            tokens.push(Token { kind: TokenKind::Number(value), line });
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token { kind: TokenKind::Ident(text), line });
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let symbol = SYMBOLS
                .iter()
                .find(|s| rest.starts_with(*s))
                .ok_or_else(|| EvalError::Syntax {
                    line,
                    message: format!("unexpected character '{}'", c),
                })?;
            match *symbol {
                "(" | "[" => depth += 1,
                ")" | "]" => depth = depth.saturating_sub(1),
                _ => {}
            }
            i += symbol.len();
            tokens.push(Token { kind: TokenKind::Symbol(*symbol), line });
        }
    }
    Ok(tokens)
}

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    List(Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

/// Assignment operator; compound forms carry the arithmetic they apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Apply(BinOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign {
        name: String,
        index: Option<Expr>,
        op: AssignOp,
        value: Expr,
        line: usize,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
}

impl Stmt {
    pub fn line(&self) -> usize {
        match self {
            Self::Assign { line, .. }
            | Self::If { line, .. }
            | Self::While { line, .. }
            | Self::For { line, .. } => *line,
        }
    }
}

// ── Parser ─────────────────────────────────────────────────────

/// Parse a whole script into statements.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>, EvalError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.statements(None)?;
    Ok(program)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn at_symbol(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Symbol(s)) if *s == sym)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(TokenKind::Ident(s)) if s == kw)
    }

    fn eat_symbol(&mut self, sym: &str) -> bool {
        if self.at_symbol(sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<(), EvalError> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", sym, self.describe())))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), EvalError> {
        if self.at_keyword(kw) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", kw, self.describe())))
        }
    }

    fn ident(&mut self) -> Result<String, EvalError> {
        match self.peek() {
            Some(TokenKind::Ident(name)) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected identifier, found {}", self.describe()))),
        }
    }

    fn describe(&self) -> String {
        match self.peek() {
            None => "end of script".to_string(),
            Some(TokenKind::Newline) => "end of line".to_string(),
            Some(TokenKind::Number(n)) => format!("number {}", n),
            Some(TokenKind::Ident(s)) => format!("'{}'", s),
            Some(TokenKind::Symbol(s)) => format!("'{}'", s),
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(TokenKind::Newline)) || self.at_symbol(";") {
            self.pos += 1;
        }
    }

    /// Statements until `close` (a `}`) or end of input when `close` is None.
    fn statements(&mut self, close: Option<&str>) -> Result<Vec<Stmt>, EvalError> {
        let mut out = Vec::new();
        loop {
            self.skip_separators();
            match (self.peek(), close) {
                (None, None) => return Ok(out),
                (None, Some(c)) => return Err(self.error(format!("missing '{}'", c))),
                (Some(TokenKind::Symbol(s)), Some(c)) if *s == c => {
                    self.pos += 1;
                    return Ok(out);
                }
                _ => {}
            }
            out.push(self.statement()?);
            let terminated = matches!(self.peek(), None | Some(TokenKind::Newline))
                || self.at_symbol(";")
                || close.is_some_and(|c| self.at_symbol(c));
            if !terminated {
                return Err(self.error(format!("unexpected {} after statement", self.describe())));
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, EvalError> {
        self.expect_symbol("{")?;
        self.statements(Some("}"))
    }

    fn statement(&mut self) -> Result<Stmt, EvalError> {
        let line = self.line();
        if self.at_keyword("if") {
            return self.if_statement();
        }
        if self.at_keyword("while") {
            self.pos += 1;
            let cond = self.expr()?;
            let body = self.block()?;
            return Ok(Stmt::While { cond, body, line });
        }
        if self.at_keyword("for") {
            self.pos += 1;
            let var = self.ident()?;
            self.expect_keyword("in")?;
            let start = self.expr()?;
            self.expect_symbol("..")?;
            let end = self.expr()?;
            let body = self.block()?;
            return Ok(Stmt::For {
                var,
                start,
                end,
                body,
                line,
            });
        }

        let name = self.ident()?;
        let index = if self.eat_symbol("[") {
            let idx = self.expr()?;
            self.expect_symbol("]")?;
            Some(idx)
        } else {
            None
        };
        let op = match self.peek() {
            Some(TokenKind::Symbol("=")) => AssignOp::Set,
            Some(TokenKind::Symbol("+=")) => AssignOp::Apply(BinOp::Add),
            Some(TokenKind::Symbol("-=")) => AssignOp::Apply(BinOp::Sub),
            Some(TokenKind::Symbol("*=")) => AssignOp::Apply(BinOp::Mul),
            Some(TokenKind::Symbol("/=")) => AssignOp::Apply(BinOp::Div),
            _ => {
                return Err(self.error(format!(
                    "expected assignment to '{}', found {}",
                    name,
                    self.describe()
                )))
            }
        };
        self.pos += 1;
        let value = self.expr()?;
        Ok(Stmt::Assign {
            name,
            index,
            op,
            value,
            line,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, EvalError> {
        let line = self.line();
        self.expect_keyword("if")?;
        let cond = self.expr()?;
        let then = self.block()?;

        // `else` may sit on the line after the closing brace.
        let save = self.pos;
        while matches!(self.peek(), Some(TokenKind::Newline)) {
            self.pos += 1;
        }
        let otherwise = if self.at_keyword("else") {
            self.pos += 1;
            if self.at_keyword("if") {
                vec![self.if_statement()?]
            } else {
                self.block()?
            }
        } else {
            self.pos = save;
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            line,
        })
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.and_expr()?;
        while self.eat_symbol("||") {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.comparison()?;
        while self.eat_symbol("&&") {
            let rhs = self.comparison()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Symbol("==")) => BinOp::Eq,
                Some(TokenKind::Symbol("!=")) => BinOp::Ne,
                Some(TokenKind::Symbol("<")) => BinOp::Lt,
                Some(TokenKind::Symbol("<=")) => BinOp::Le,
                Some(TokenKind::Symbol(">")) => BinOp::Gt,
                Some(TokenKind::Symbol(">=")) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Symbol("+")) => BinOp::Add,
                Some(TokenKind::Symbol("-")) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Symbol("*")) => BinOp::Mul,
                Some(TokenKind::Symbol("/")) => BinOp::Div,
                Some(TokenKind::Symbol("%")) => BinOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat_symbol("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat_symbol("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, EvalError> {
        let mut base = self.primary()?;
        while self.eat_symbol("[") {
            let index = self.expr()?;
            self.expect_symbol("]")?;
            base = Expr::Index(Box::new(base), Box::new(index));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        match self.peek().cloned() {
            Some(TokenKind::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(TokenKind::Ident(name)) if name == "true" || name == "false" => {
                self.pos += 1;
                Ok(Expr::Number(if name == "true" { 1.0 } else { 0.0 }))
            }
            Some(TokenKind::Ident(_)) => {
                let name = self.ident()?;
                if self.eat_symbol("(") {
                    let args = self.arguments(")")?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(TokenKind::Symbol("(")) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect_symbol(")")?;
                Ok(inner)
            }
            Some(TokenKind::Symbol("[")) => {
                self.pos += 1;
                Ok(Expr::List(self.arguments("]")?))
            }
            _ => Err(self.error(format!("expected expression, found {}", self.describe()))),
        }
    }

    /// Comma-separated expressions up to and including `close`.
    fn arguments(&mut self, close: &str) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.eat_symbol(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat_symbol(close) {
                return Ok(args);
            }
            self.expect_symbol(",")?;
        }
    }
}
