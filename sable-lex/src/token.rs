#![forbid(unsafe_code)]

use std::fmt;

use sable_ast::Span;

/// 1-based line and column of a token's first character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub pos: Position,
}

impl Token {
    /// Source text that lexes back to this token. Layout tokens other than
    /// `Newline` have no text of their own.
    pub fn to_source(&self) -> String {
        self.kind.to_source()
    }

    pub fn is_layout(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwTyp,
    KwDef,
    KwLet,
    KwHas,
    KwTrait,
    KwPub,
    KwImport,
    KwDoc,
    KwTest,
    KwAssert,
    KwWhere,

    // Operators / punctuation
    Arrow,
    FatArrow,
    LeftArrow,
    EqEq,
    Neq,
    Le,
    Ge,
    Lt,
    Gt,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Eq,
    Colon,
    Semi,
    Comma,
    Dot,
    DotDot,
    Pipe,
    Underscore,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Newline,
    Indent,
    Dedent,
    Eof,

    // Literals / identifiers
    Ident(String),
    UpperIdent(String),
    Int(u64),
    Float(f64),
    Str(String),
}

impl TokenKind {
    pub fn to_source(&self) -> String {
        match self {
            TokenKind::Ident(s) | TokenKind::UpperIdent(s) => s.clone(),
            TokenKind::Int(n) => n.to_string(),
            TokenKind::Float(x) => float_source(*x),
            TokenKind::Str(s) => quote(s),
            TokenKind::Newline => "\n".to_string(),
            TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof => String::new(),
            other => other.punct().unwrap_or_default().to_string(),
        }
    }

    fn punct(&self) -> Option<&'static str> {
        let s = match self {
            TokenKind::KwTyp => "typ",
            TokenKind::KwDef => "def",
            TokenKind::KwLet => "let",
            TokenKind::KwHas => "has",
            TokenKind::KwTrait => "trait",
            TokenKind::KwPub => "pub",
            TokenKind::KwImport => "import",
            TokenKind::KwDoc => "doc",
            TokenKind::KwTest => "test",
            TokenKind::KwAssert => "assert",
            TokenKind::KwWhere => "where",
            TokenKind::Arrow => "->",
            TokenKind::FatArrow => "=>",
            TokenKind::LeftArrow => "<-",
            TokenKind::EqEq => "==",
            TokenKind::Neq => "!=",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eq => "=",
            TokenKind::Colon => ":",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::Pipe => "|",
            TokenKind::Underscore => "_",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier `{s}`"),
            TokenKind::UpperIdent(s) => write!(f, "name `{s}`"),
            TokenKind::Int(n) => write!(f, "integer `{n}`"),
            TokenKind::Float(x) => write!(f, "float `{}`", float_source(*x)),
            TokenKind::Str(_) => f.write_str("string literal"),
            TokenKind::Newline => f.write_str("end of line"),
            TokenKind::Indent => f.write_str("indentation"),
            TokenKind::Dedent => f.write_str("end of indented block"),
            TokenKind::Eof => f.write_str("end of input"),
            other => write!(f, "`{}`", other.punct().unwrap_or("?")),
        }
    }
}

fn float_source(x: f64) -> String {
    let s = format!("{x:?}");
    if s.contains('.') && !s.contains('e') {
        s
    } else {
        format!("{x:.1}")
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
