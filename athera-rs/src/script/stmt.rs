//! Athera statement AST and indentation-aware parser.
//!
//! The parser walks the flat token stream produced by
//! [`tokenize`](super::lexer::tokenize).  Block structure comes from `Indent`
//! tokens only: the first `Indent` after a block opener fixes the block's base
//! indentation, and the block runs until a shallower (or non-indented) line.
//!
//! Parsing is total.  Tokens that cannot start a statement are dropped.

use log::trace;

use super::lexer::{split_csv, tokenize, Token, TokenKind};

/// A parsed Athera statement.
///
/// Expression fields hold the raw source text; they are evaluated by
/// [`evaluate`](super::expr::evaluate) when the statement runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// `task name [with p1, p2]:` followed by an indented body.
    Task {
        name: String,
        params: Vec<String>,
        body: Vec<Node>,
    },
    /// `greet <expr>`
    Greet { message: String },
    /// `backup <src> to <dest>`
    Backup { source: String, dest: String },
    /// `check <cond> -> <action>`
    Check { condition: String, action: String },
    /// `repeat N times:`
    RepeatN { count: usize, body: Vec<Node> },
    /// `repeat each var in <expr>:`
    RepeatEach {
        var: String,
        list_expr: String,
        body: Vec<Node>,
    },
    /// `set var = <expr>`
    Set { var: String, value: String },
    /// `run task [args]`
    Run { target: String },
    /// `use module`
    Use { module: String },
    /// `protect:` body, optionally followed by `handle:` body.
    Protect {
        protect: Vec<Node>,
        handle: Vec<Node>,
    },
    /// `handle <errorType> -> <action>`
    HandleInline { error_type: String, action: String },
    /// `run parallel a, b, c`
    RunParallel { tasks: Vec<String> },
    /// `return <expr>`
    Return { expr: String },
}

/// Tokenize and parse a source text.
pub fn parse_source(src: &str) -> Vec<Node> {
    parse(&tokenize(src))
}

/// Parse a token stream into top-level statements.
pub fn parse(tokens: &[Token]) -> Vec<Node> {
    trace!("parsing {} tokens", tokens.len());
    let mut parser = Parser { tokens, pos: 0, open_protects: Vec::new() };
    let mut nodes = Vec::new();
    while !parser.at_end() {
        match parser.peek().kind {
            TokenKind::Newline | TokenKind::Indent => {
                parser.advance();
            }
            _ => {
                if let Some(node) = parser.parse_statement() {
                    nodes.push(node);
                }
            }
        }
    }
    nodes
}

// ── Parser ────────────────────────────────────────────────────────────────────

static EOF: Token = Token {
    kind: TokenKind::Eof,
    value: String::new(),
    line: 0,
};

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Indentation of each `protect:` whose body is still being parsed,
    /// innermost last.
    open_protects: Vec<usize>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &'a Token {
        self.peek_ahead(0)
    }

    fn peek_ahead(&self, offset: usize) -> &'a Token {
        self.tokens.get(self.pos + offset).unwrap_or(&EOF)
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    /// Consume the next token if it has the given kind.
    fn consume(&mut self, kind: TokenKind) {
        if self.peek().kind == kind {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    /// Indentation of the upcoming line if it is a `handle:` line.
    fn handle_indent(&self) -> Option<usize> {
        match self.peek().kind {
            TokenKind::Handle => Some(0),
            TokenKind::Indent if self.peek_ahead(1).kind == TokenKind::Handle => {
                Some(self.peek().value.parse().unwrap_or(0))
            }
            _ => None,
        }
    }

    /// `true` in front of a `handle:` line that an open `protect:` can claim.
    fn at_claimable_handle(&self) -> bool {
        self.handle_indent()
            .is_some_and(|h| self.open_protects.iter().any(|&owner| h >= owner))
    }

    /// Indentation of the line holding the token just consumed.
    fn current_indent(&self) -> usize {
        match self.pos.checked_sub(2).and_then(|i| self.tokens.get(i)) {
            Some(tok) if tok.kind == TokenKind::Indent => tok.value.parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Parse one statement starting at a content token.  Unrecognised tokens
    /// are consumed and yield `None`.
    fn parse_statement(&mut self) -> Option<Node> {
        let tok = self.advance();
        let node = match tok.kind {
            TokenKind::Task => {
                let (name, params) = match tok.value.split_once('|') {
                    Some((name, params)) => (name.to_owned(), split_csv(params)),
                    None => (tok.value.clone(), Vec::new()),
                };
                let body = self.parse_opened_block();
                Node::Task { name, params, body }
            }
            TokenKind::Greet => Node::Greet { message: tok.value.clone() },
            TokenKind::Backup => {
                let (source, dest) = split_pair(&tok.value);
                Node::Backup { source, dest }
            }
            TokenKind::Check => {
                let (condition, action) = split_pair(&tok.value);
                Node::Check { condition, action }
            }
            TokenKind::RepeatN => {
                let count = tok.value.parse().unwrap_or(0);
                let body = self.parse_opened_block();
                Node::RepeatN { count, body }
            }
            TokenKind::RepeatEach => {
                let (var, list_expr) = split_pair(&tok.value);
                let body = self.parse_opened_block();
                Node::RepeatEach { var, list_expr, body }
            }
            TokenKind::Set => {
                let (var, value) = split_pair(&tok.value);
                Node::Set { var, value }
            }
            TokenKind::Run => Node::Run { target: tok.value.clone() },
            TokenKind::RunParallel => Node::RunParallel { tasks: split_csv(&tok.value) },
            TokenKind::Use => Node::Use { module: tok.value.clone() },
            TokenKind::Protect => self.parse_protect(),
            TokenKind::HandleInline => {
                let (error_type, action) = split_pair(&tok.value);
                Node::HandleInline { error_type, action }
            }
            TokenKind::Return => Node::Return { expr: tok.value.clone() },
            TokenKind::Handle
            | TokenKind::Unknown
            | TokenKind::Indent
            | TokenKind::Newline
            | TokenKind::Eof => {
                trace!("line {}: dropping {:?} token", tok.line, tok.kind);
                return None;
            }
        };
        self.consume(TokenKind::Newline);
        Some(node)
    }

    /// Parse the body that follows a block-opening line.
    fn parse_opened_block(&mut self) -> Vec<Node> {
        self.consume(TokenKind::Newline);
        self.parse_block()
    }

    /// Parse statements until a shallower line, or until a `handle:` line
    /// that belongs to an enclosing `protect:`.
    fn parse_block(&mut self) -> Vec<Node> {
        let mut body = Vec::new();
        let mut base: Option<usize> = None;

        while !self.at_end() {
            if self.at_claimable_handle() {
                break;
            }
            let tok = self.peek();
            match tok.kind {
                TokenKind::Newline => {
                    self.advance();
                    continue;
                }
                TokenKind::Indent => {
                    let indent: usize = tok.value.parse().unwrap_or(0);
                    match base {
                        None => base = Some(indent),
                        Some(b) if indent < b => break,
                        Some(_) => {}
                    }
                    self.advance();
                }
                // A non-indented line always closes the block.
                _ => break,
            }

            if self.peek().kind == TokenKind::Indent {
                continue;
            }
            if let Some(node) = self.parse_statement() {
                body.push(node);
            }
        }
        body
    }

    /// The protect body ends at the first `handle:` indented at least as
    /// deep as the `protect:` line that no inner protect has claimed.  That
    /// `handle:` opens the handle body.
    fn parse_protect(&mut self) -> Node {
        let owner = self.current_indent();
        self.consume(TokenKind::Newline);
        self.open_protects.push(owner);
        let protect = self.parse_block();
        self.open_protects.pop();

        let mut handle = Vec::new();
        if self.handle_indent().is_some_and(|h| h >= owner) {
            self.consume(TokenKind::Indent);
            self.consume(TokenKind::Handle);
            self.consume(TokenKind::Newline);
            handle = self.parse_block();
        }
        Node::Protect { protect, handle }
    }
}

/// Split a `left|right` payload; a missing right side becomes empty.
fn split_pair(payload: &str) -> (String, String) {
    match payload.split_once('|') {
        Some((l, r)) => (l.to_owned(), r.to_owned()),
        None => (payload.to_owned(), String::new()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
