#![forbid(unsafe_code)]

mod lexer;
mod token;

pub use lexer::{LexError, Lexer};
pub use token::{Position, Token, TokenKind};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lex_int_literals_with_bases_and_underscores() {
        let src = "a = 1_000\nb = 0b1010_0110\nc = 0o755\nd = 0xDEAD_BEEF\n";
        let tokens = Lexer::new(src).lex().unwrap();
        let ints: Vec<u64> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Int(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(ints, vec![1000, 0b1010_0110, 0o755, 0xDEAD_BEEF]);
    }

    #[test]
    fn lex_rejects_bad_int_underscore_placement() {
        let err = Lexer::new("x = 0x_DEAD\n").lex().unwrap_err();
        assert!(err.message.contains("invalid integer literal"));
    }

    #[test]
    fn lex_rejects_digits_running_into_letters() {
        for src in ["x = 0x\n", "x = 12abc\n", "x = 1e5\n", "x = 0b2\n", "x = 1.5e3\n", "x = 0x1G\n"] {
            let err = Lexer::new(src).lex().unwrap_err();
            assert!(err.message.contains("invalid numeric literal"), "{src:?}: {err}");
            assert_eq!(usize::from(err.span.offset()), 4, "{src:?}");
        }
    }

    #[test]
    fn malformed_numbers_cover_the_whole_literal() {
        let err = Lexer::new("n = 12abc + 1\n").lex().unwrap_err();
        assert_eq!(err.span.len(), 5);
    }

    #[test]
    fn lex_floats_and_ranges() {
        assert_eq!(
            kinds("1.5 1..2"),
            vec![
                TokenKind::Float(1.5),
                TokenKind::Int(1),
                TokenKind::DotDot,
                TokenKind::Int(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_string_escapes_are_strict() {
        let tokens = Lexer::new("s = \"a\\n\\t\\r\\\\\\\"\"\n").lex().unwrap();
        let s = tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::Str(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(s, "a\n\t\r\\\"");
    }

    #[test]
    fn lex_string_unicode_escape() {
        let tokens = Lexer::new("s = \"\\u{41}\\u{1f}\\u{7E}\"\n").lex().unwrap();
        let s = tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::Str(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(s, "A\u{001F}~");
    }

    #[test]
    fn lex_rejects_unknown_string_escape() {
        let err = Lexer::new("s = \"\\q\"\n").lex().unwrap_err();
        assert!(err.message.contains("invalid string literal"));
    }

    #[test]
    fn lex_rejects_unterminated_string() {
        let err = Lexer::new("s = \"abc\n").lex().unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn keywords_and_names() {
        assert_eq!(
            kinds("typ pub Vec T = _ x_1"),
            vec![
                TokenKind::KwTyp,
                TokenKind::KwPub,
                TokenKind::UpperIdent("Vec".into()),
                TokenKind::UpperIdent("T".into()),
                TokenKind::Eq,
                TokenKind::Underscore,
                TokenKind::Ident("x_1".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_dropped_and_comment_lines_have_no_layout() {
        let src = "a = 1 // one\n    // indented comment\nb = 2\n";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Ident("b".into()),
                TokenKind::Eq,
                TokenKind::Int(2),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indentation_produces_layout_tokens() {
        let src = "has Order =\n    greater => Self\nx = 1\n";
        let ks = kinds(src);
        assert_eq!(
            ks,
            vec![
                TokenKind::KwHas,
                TokenKind::UpperIdent("Order".into()),
                TokenKind::Eq,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Ident("greater".into()),
                TokenKind::FatArrow,
                TokenKind::UpperIdent("Self".into()),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lines_inside_braces_are_joined() {
        let src = "p = {x 1,\n       y 2}\n";
        let ks = kinds(src);
        assert_eq!(ks.iter().filter(|k| **k == TokenKind::Newline).count(), 1);
        assert!(!ks.contains(&TokenKind::Indent));
    }

    #[test]
    fn paren_at_line_end_opens_layout_block() {
        let src = "f = x -> (\n    let y = x\n    y)\n";
        let ks = kinds(src);
        let tail: Vec<_> = ks.iter().skip_while(|k| **k != TokenKind::LParen).cloned().collect();
        assert_eq!(
            tail,
            vec![
                TokenKind::LParen,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::KwLet,
                TokenKind::Ident("y".into()),
                TokenKind::Eq,
                TokenKind::Ident("x".into()),
                TokenKind::Newline,
                TokenKind::Ident("y".into()),
                TokenKind::Dedent,
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn closing_paren_on_its_own_line() {
        let src = "f = (\n    a\n)\ng = 1\n";
        let ks = kinds(src);
        let dedent = ks.iter().position(|k| *k == TokenKind::Dedent).unwrap();
        assert_eq!(ks[dedent + 1], TokenKind::RParen);
        assert_eq!(ks[dedent + 2], TokenKind::Newline);
    }

    #[test]
    fn inconsistent_indentation_is_rejected() {
        let err = Lexer::new("a =\n    b\n  c\n").lex().unwrap_err();
        assert!(err.message.contains("inconsistent indentation"));
    }

    #[test]
    fn tabs_are_rejected() {
        let err = Lexer::new("a =\n\tb\n").lex().unwrap_err();
        assert!(err.message.contains("tabs"));
    }

    #[test]
    fn recovery_drops_only_the_bad_line() {
        let (tokens, errors) = Lexer::new("a = \"oops\nb = 2\n").lex_with_recovery();
        assert_eq!(errors.len(), 1);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Ident("b".into())));
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Ident("a".into())));
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = Lexer::new("a = 1\n  \nbb = 22\n").lex().unwrap();
        let bb = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("bb".into()))
            .unwrap();
        assert_eq!(bb.pos, Position { line: 3, column: 1 });
        let n = tokens.iter().find(|t| t.kind == TokenKind::Int(22)).unwrap();
        assert_eq!(n.pos.column, 6);
        assert_eq!(usize::from(n.span.offset()), 14);
    }

    #[test]
    fn resume_at_restarts_from_line_start() {
        let src = "a = 1\nb = 2\n";
        let tokens: Vec<_> = Lexer::resume_at(src, 8)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("b".into()));
        assert_eq!(tokens[0].pos.line, 2);
    }

    #[test]
    fn lexing_is_lazy() {
        let mut lexer = Lexer::new("a\n\"unterminated\n");
        assert!(matches!(lexer.next(), Some(Ok(t)) if t.kind == TokenKind::Ident("a".into())));
        assert!(matches!(lexer.next(), Some(Ok(t)) if t.kind == TokenKind::Newline));
        assert!(matches!(lexer.next(), Some(Err(_))));
    }

    fn token_text() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9_]{0,6}",
            "[A-Z][a-z0-9]{0,6}",
            any::<u32>().prop_map(|n| n.to_string()),
            "[a-z ]{0,8}".prop_map(|s| format!("\"{s}\"")),
            prop::sample::select(vec![
                "->", "=>", "<-", "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%",
                "=", ":", ";", ",", ".", "..", "|", "_", "{", "}", "[", "]", "(", ")",
            ])
            .prop_map(str::to_string),
        ]
    }

    proptest! {
        #[test]
        fn tokens_round_trip_through_source(words in prop::collection::vec(token_text(), 1..24)) {
            let src = words.join(" ");
            let tokens = Lexer::new(&src).lex().unwrap();
            let back: Vec<String> = tokens
                .iter()
                .filter(|t| !t.is_layout())
                .map(Token::to_source)
                .collect();
            prop_assert_eq!(back.join(" "), src);
        }
    }
}
