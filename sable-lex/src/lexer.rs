#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::collections::VecDeque;
use std::ops::Range;

use logos::Logos;
use miette::Diagnostic;
use sable_ast::{Span, span_between};
use thiserror::Error;
use tracing::debug;

use crate::token::{Position, Token, TokenKind};

#[derive(Clone, Debug, Error, Diagnostic)]
#[error("lex error: {message}")]
#[diagnostic(code(sable::lex))]
#[allow(unused_assignments)]
pub struct LexError {
    pub message: String,
    #[label]
    pub span: Span,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \f\r]+")]
#[logos(skip r"//[^\n]*")]
enum RawToken {
    #[token("typ")]
    KwTyp,
    #[token("def")]
    KwDef,
    #[token("let")]
    KwLet,
    #[token("has")]
    KwHas,
    #[token("trait")]
    KwTrait,
    #[token("pub")]
    KwPub,
    #[token("import")]
    KwImport,
    #[token("doc")]
    KwDoc,
    #[token("test")]
    KwTest,
    #[token("assert")]
    KwAssert,
    #[token("where")]
    KwWhere,

    #[token("->")]
    Arrow,
    #[token("=>")]
    FatArrow,
    #[token("<-")]
    LeftArrow,

    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,

    #[token("=")]
    Eq,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
    #[token("_", priority = 3)]
    Underscore,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r"0b[01_]+", |lex| parse_int_prefixed(lex.slice(), 2, 2))]
    #[regex(r"0o[0-7_]+", |lex| parse_int_prefixed(lex.slice(), 8, 2))]
    #[regex(r"0x[0-9a-fA-F_]+", |lex| parse_int_prefixed(lex.slice(), 16, 2))]
    #[regex(r"[0-9][0-9_]*", |lex| parse_int_decimal(lex.slice()))]
    Int(Option<u64>),

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*", |lex| parse_float(lex.slice()))]
    Float(Option<f64>),

    // Digits running into letters (`12abc`, `0x`, `1e5`, `1.5e3`). Valid
    // literals of the same length win on priority.
    #[regex(r"[0-9][0-9A-Za-z_]*", priority = 0)]
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9A-Za-z_]*", priority = 0)]
    MalformedNumber,

    // Supported escapes: \n, \t, \r, \", \\, and \u{HEX} (1-6 hex digits)
    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    Str(Option<String>),

    #[regex(r#""([^"\\\n]|\\.)*"#)]
    UnterminatedStr,

    #[regex(r"[a-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[A-Z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    UpperIdent(String),
}

fn parse_int_decimal(s: &str) -> Option<u64> {
    let digits = strip_underscores(s)?;
    digits.parse::<u64>().ok()
}

fn parse_int_prefixed(s: &str, radix: u32, prefix_len: usize) -> Option<u64> {
    let rest = s.get(prefix_len..)?;
    let digits = strip_underscores(rest)?;
    u64::from_str_radix(&digits, radix).ok()
}

fn parse_float(s: &str) -> Option<f64> {
    let (whole, frac) = s.split_once('.')?;
    let whole = strip_underscores(whole)?;
    let frac = strip_underscores(frac)?;
    format!("{whole}.{frac}").parse::<f64>().ok()
}

fn strip_underscores(s: &str) -> Option<String> {
    if s.is_empty() {
        return None;
    }
    if s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return None;
    }
    Some(s.replace('_', ""))
}

fn parse_string(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let s = lex.slice();
    let inner = &s[1..s.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let esc = chars.next()?;
        match esc {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'u' => {
                if chars.next() != Some('{') {
                    return None;
                }
                let mut hex = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        break;
                    }
                    hex.push(ch);
                    chars.next();
                    if hex.len() > 6 {
                        return None;
                    }
                }
                if chars.next() != Some('}') || hex.is_empty() {
                    return None;
                }
                let cp = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(cp)?);
            }
            _ => return None,
        }
    }

    Some(out)
}

fn convert(raw: RawToken) -> Result<TokenKind, &'static str> {
    let kind = match raw {
        RawToken::KwTyp => TokenKind::KwTyp,
        RawToken::KwDef => TokenKind::KwDef,
        RawToken::KwLet => TokenKind::KwLet,
        RawToken::KwHas => TokenKind::KwHas,
        RawToken::KwTrait => TokenKind::KwTrait,
        RawToken::KwPub => TokenKind::KwPub,
        RawToken::KwImport => TokenKind::KwImport,
        RawToken::KwDoc => TokenKind::KwDoc,
        RawToken::KwTest => TokenKind::KwTest,
        RawToken::KwAssert => TokenKind::KwAssert,
        RawToken::KwWhere => TokenKind::KwWhere,

        RawToken::Arrow => TokenKind::Arrow,
        RawToken::FatArrow => TokenKind::FatArrow,
        RawToken::LeftArrow => TokenKind::LeftArrow,
        RawToken::EqEq => TokenKind::EqEq,
        RawToken::Neq => TokenKind::Neq,
        RawToken::Le => TokenKind::Le,
        RawToken::Ge => TokenKind::Ge,
        RawToken::Lt => TokenKind::Lt,
        RawToken::Gt => TokenKind::Gt,

        RawToken::Plus => TokenKind::Plus,
        RawToken::Minus => TokenKind::Minus,
        RawToken::Star => TokenKind::Star,
        RawToken::Slash => TokenKind::Slash,
        RawToken::Percent => TokenKind::Percent,

        RawToken::DotDot => TokenKind::DotDot,
        RawToken::Dot => TokenKind::Dot,
        RawToken::Eq => TokenKind::Eq,
        RawToken::Colon => TokenKind::Colon,
        RawToken::Semi => TokenKind::Semi,
        RawToken::Comma => TokenKind::Comma,
        RawToken::Pipe => TokenKind::Pipe,
        RawToken::Underscore => TokenKind::Underscore,

        RawToken::LParen => TokenKind::LParen,
        RawToken::RParen => TokenKind::RParen,
        RawToken::LBrace => TokenKind::LBrace,
        RawToken::RBrace => TokenKind::RBrace,
        RawToken::LBracket => TokenKind::LBracket,
        RawToken::RBracket => TokenKind::RBracket,

        RawToken::Ident(s) => TokenKind::Ident(s),
        RawToken::UpperIdent(s) => TokenKind::UpperIdent(s),
        RawToken::Int(Some(n)) => TokenKind::Int(n),
        RawToken::Int(None) => return Err("invalid integer literal"),
        RawToken::Float(Some(x)) => TokenKind::Float(x),
        RawToken::Float(None) => return Err("invalid float literal"),
        RawToken::MalformedNumber => return Err("invalid numeric literal"),
        RawToken::Str(Some(s)) => TokenKind::Str(s),
        RawToken::Str(None) => return Err("invalid string literal"),
        RawToken::UnterminatedStr => return Err("unterminated string literal"),
    };
    Ok(kind)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bracket {
    Paren,
    Brace,
    Square,
}

#[derive(Clone, Copy, Debug)]
struct OpenBracket {
    kind: Bracket,
    /// A `(` ending its line opens an indented block with its own layout.
    layout: bool,
    /// Indent stack height when the bracket was opened.
    depth: usize,
}

/// Layout-aware lexer.
///
/// Tokens are produced lazily one source line at a time. Indentation yields
/// `Indent`/`Dedent` and line ends yield `Newline`, except inside brackets,
/// where lines are joined. A `(` that ends its line opens a block whose lines
/// are laid out again until the matching `)`.
#[derive(Clone, Debug)]
pub struct Lexer<'a> {
    src: &'a str,
    offset: usize,
    line: usize,
    indent_stack: Vec<usize>,
    brackets: Vec<OpenBracket>,
    queue: VecDeque<Token>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            line: 1,
            indent_stack: vec![0],
            brackets: Vec::new(),
            queue: VecDeque::new(),
            finished: false,
        }
    }

    /// Restart lexing at the beginning of the line containing `offset`, with
    /// fresh layout state.
    pub fn resume_at(src: &'a str, offset: usize) -> Self {
        let offset = offset.min(src.len());
        let start = src
            .get(..offset)
            .and_then(|s| s.rfind('\n'))
            .map_or(0, |i| i + 1);
        let line = src[..start].matches('\n').count() + 1;
        Self {
            offset: start,
            line,
            ..Self::new(src)
        }
    }

    /// Lex the whole input, stopping at the first error.
    pub fn lex(&self) -> Result<Vec<Token>, LexError> {
        self.clone().collect()
    }

    /// Lex the whole input; a line containing an error is dropped and lexing
    /// continues on the next line.
    pub fn lex_with_recovery(&self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for item in self.clone() {
            match item {
                Ok(tok) => tokens.push(tok),
                Err(err) => errors.push(err),
            }
        }
        debug!(
            target: "sable::lex",
            tokens = tokens.len(),
            errors = errors.len(),
            "lexed source"
        );
        (tokens, errors)
    }

    fn advance_line(&mut self) -> Result<(), LexError> {
        if self.offset >= self.src.len() {
            self.finish();
            return Ok(());
        }

        let rest = &self.src[self.offset..];
        let line = match rest.find('\n') {
            Some(i) => &rest[..=i],
            None => rest,
        };
        let line_start = self.offset;
        let line_no = self.line;
        self.offset += line.len();
        self.line += 1;

        let content = line.strip_suffix('\n').unwrap_or(line);
        let content = content.strip_suffix('\r').unwrap_or(content);
        let line_end = line_start + content.len();

        if content.trim().is_empty() {
            return Ok(());
        }

        // Reject tabs anywhere (simpler/safer indentation rules).
        if content.contains('\t') {
            return Err(LexError {
                message: "tabs are not allowed; use spaces".to_string(),
                span: span_between(line_start, line_end),
            });
        }

        let leading = content.bytes().take_while(|b| *b == b' ').count();
        let code = &content[leading..];
        let code_start = line_start + leading;

        let mut raw_tokens: Vec<(TokenKind, Range<usize>)> = Vec::new();
        let mut lex = RawToken::lexer(code);
        while let Some(raw) = lex.next() {
            let range = lex.span();
            let abs = code_start + range.start..code_start + range.end;
            let kind = match raw {
                Ok(raw) => convert(raw),
                Err(()) => Err("unexpected character"),
            };
            match kind {
                Ok(kind) => raw_tokens.push((kind, abs)),
                Err(message) => {
                    return Err(LexError {
                        message: message.to_string(),
                        span: span_between(abs.start, abs.end),
                    });
                }
            }
        }

        // Comment-only line.
        if raw_tokens.is_empty() {
            return Ok(());
        }

        let layout = self.brackets.last().is_none_or(|b| b.layout);
        if layout {
            self.indent(leading, line_start, line_end, line_no)?;
        }

        let last = raw_tokens.len() - 1;
        for (i, (kind, range)) in raw_tokens.into_iter().enumerate() {
            let column = content[..range.start - line_start].chars().count() + 1;
            let pos = Position {
                line: line_no,
                column,
            };
            match kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => {
                    let bracket = match kind {
                        TokenKind::LParen => Bracket::Paren,
                        TokenKind::LBrace => Bracket::Brace,
                        _ => Bracket::Square,
                    };
                    self.brackets.push(OpenBracket {
                        kind: bracket,
                        layout: bracket == Bracket::Paren && i == last,
                        depth: self.indent_stack.len(),
                    });
                }
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => {
                    let bracket = match kind {
                        TokenKind::RParen => Bracket::Paren,
                        TokenKind::RBrace => Bracket::Brace,
                        _ => Bracket::Square,
                    };
                    if let Some(open) = self.brackets.last().copied() {
                        if open.layout {
                            while self.indent_stack.len() > open.depth {
                                self.indent_stack.pop();
                                self.push(TokenKind::Dedent, range.start, range.start, pos);
                            }
                        }
                        if open.kind == bracket {
                            self.brackets.pop();
                        }
                    }
                }
                _ => {}
            }
            self.push(kind, range.start, range.end, pos);
        }

        if self.brackets.last().is_none_or(|b| b.layout) {
            let end = if line.ends_with('\n') {
                line_start + line.len()
            } else {
                line_end
            };
            let column = content.chars().count() + 1;
            self.push(
                TokenKind::Newline,
                line_end,
                end,
                Position {
                    line: line_no,
                    column,
                },
            );
        }

        Ok(())
    }

    fn indent(
        &mut self,
        leading: usize,
        line_start: usize,
        line_end: usize,
        line_no: usize,
    ) -> Result<(), LexError> {
        let pos = Position {
            line: line_no,
            column: 1,
        };
        let at = line_start + leading;
        let current = *self.indent_stack.last().unwrap_or(&0);
        if leading > current {
            self.indent_stack.push(leading);
            self.push(TokenKind::Indent, line_start, at, pos);
            return Ok(());
        }
        if leading == current {
            return Ok(());
        }

        // Never dedent out of an open layout block; its `)` closes it.
        let floor = self.brackets.last().map_or(1, |b| b.depth.max(1));
        let floor_level = self.indent_stack.get(floor - 1).copied().unwrap_or(0);
        if leading < floor_level {
            while self.indent_stack.len() > floor {
                self.indent_stack.pop();
                self.push(TokenKind::Dedent, at, at, pos);
            }
            return Ok(());
        }

        let keep = self
            .indent_stack
            .iter()
            .rposition(|&level| level == leading)
            .ok_or_else(|| LexError {
                message: "inconsistent indentation".to_string(),
                span: span_between(line_start, line_end),
            })?;
        while self.indent_stack.len() > keep + 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, at, at, pos);
        }
        Ok(())
    }

    fn finish(&mut self) {
        let end = self.src.len();
        let pos = Position {
            line: self.line,
            column: 1,
        };
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, end, end, pos);
        }
        self.push(TokenKind::Eof, end, end, pos);
        self.finished = true;
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize, pos: Position) {
        self.queue.push_back(Token {
            kind,
            span: span_between(start, end),
            pos,
        });
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tok) = self.queue.pop_front() {
                return Some(Ok(tok));
            }
            if self.finished {
                return None;
            }
            if let Err(err) = self.advance_line() {
                return Some(Err(err));
            }
        }
    }
}
