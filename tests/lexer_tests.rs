// tests/lexer_tests.rs

use rust_decimal::Decimal;
use ssc_gen::ast::Token;
use ssc_gen::lexer::{LexError, Lexer, Position};
use std::str::FromStr;

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|(token, _)| token)
        .collect()
}

// ============================================================================
// Single Character Tokens
// ============================================================================

#[test]
fn test_single_char_tokens() {
    let test_cases = vec![
        (".", Token::Dot),
        (",", Token::Comma),
        (":", Token::Colon),
        ("=", Token::Equals),
        ("|", Token::Pipe),
        ("-", Token::Minus),
        ("(", Token::LParen),
        (")", Token::RParen),
        ("[", Token::LBracket),
        ("]", Token::RBracket),
        ("{", Token::LBrace),
        ("}", Token::RBrace),
    ];

    for (input, expected) in test_cases {
        let mut lexer = Lexer::new(input);
        let token = lexer.next_token().unwrap();
        assert_eq!(token, expected, "Failed for input: {}", input);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }
}

#[test]
fn test_unexpected_char() {
    let mut lexer = Lexer::new("title = D() ;");
    for _ in 0..5 {
        lexer.next_token().unwrap();
    }
    assert_eq!(
        lexer.next_token().unwrap_err(),
        LexError::UnexpectedChar {
            ch: ';',
            position: Position { line: 1, column: 13 }
        }
    );
}

// ============================================================================
// Identifiers and Keywords
// ============================================================================

#[test]
fn test_identifiers() {
    assert_eq!(
        tokens("__SPLIT_DOC__ title_2 D"),
        vec![
            Token::Identifier("__SPLIT_DOC__".to_string()),
            Token::Identifier("title_2".to_string()),
            Token::Identifier("D".to_string()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_keywords_are_whole_words() {
    assert_eq!(
        tokens("schema schemas json jsonify"),
        vec![
            Token::Schema,
            Token::Identifier("schemas".to_string()),
            Token::Json,
            Token::Identifier("jsonify".to_string()),
            Token::Eof,
        ]
    );
}

// ============================================================================
// Numbers
// ============================================================================

#[test]
fn test_integers_and_floats() {
    assert_eq!(
        tokens("0 42 1_000 3.14"),
        vec![
            Token::Integer(0),
            Token::Integer(42),
            Token::Integer(1000),
            Token::Float(Decimal::from_str("3.14").unwrap()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_float_keeps_written_scale() {
    let mut lexer = Lexer::new("1.50");
    match lexer.next_token().unwrap() {
        Token::Float(d) => assert_eq!(d.to_string(), "1.50"),
        other => panic!("expected float, got {:?}", other),
    }
}

#[test]
fn test_negative_number_is_two_tokens() {
    assert_eq!(tokens("-1"), vec![Token::Minus, Token::Integer(1), Token::Eof]);
}

#[test]
fn test_dot_after_integer_is_method_call() {
    assert_eq!(
        tokens("1.x"),
        vec![
            Token::Integer(1),
            Token::Dot,
            Token::Identifier("x".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_integer_overflow() {
    let err = Lexer::new("99999999999999999999").next_token().unwrap_err();
    assert!(matches!(err, LexError::InvalidNumber { .. }));
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_quotes() {
    assert_eq!(
        tokens(r#""a" 'b' "it's" 'say "hi"'"#),
        vec![
            Token::String("a".to_string()),
            Token::String("b".to_string()),
            Token::String("it's".to_string()),
            Token::String("say \"hi\"".to_string()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_string_escapes() {
    let mut lexer = Lexer::new(r#""a\nb\t\"c\"\\""#);
    assert_eq!(
        lexer.next_token().unwrap(),
        Token::String("a\nb\t\"c\"\\".to_string())
    );
}

#[test]
fn test_invalid_escape() {
    let err = Lexer::new(r#""\d+""#).next_token().unwrap_err();
    assert_eq!(
        err,
        LexError::InvalidEscape {
            ch: 'd',
            position: Position { line: 1, column: 2 }
        }
    );
}

#[test]
fn test_raw_strings() {
    assert_eq!(
        tokens(r#"r"(\d+)\s" r'\w'"#),
        vec![
            Token::String(r"(\d+)\s".to_string()),
            Token::String(r"\w".to_string()),
            Token::Eof,
        ]
    );
}

#[test]
fn test_r_identifier_is_not_raw_string() {
    assert_eq!(
        tokens("re rtrim"),
        vec![
            Token::Identifier("re".to_string()),
            Token::Identifier("rtrim".to_string()),
            Token::Eof
        ]
    );
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("\n  \"abc").next_token().unwrap_err();
    assert_eq!(
        err,
        LexError::UnterminatedString {
            position: Position { line: 2, column: 3 }
        }
    );
}

// ============================================================================
// Comments and Positions
// ============================================================================

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        tokens("# header\nx = 1 # trailing\n# last"),
        vec![
            Token::Identifier("x".to_string()),
            Token::Equals,
            Token::Integer(1),
            Token::Eof
        ]
    );
}

#[test]
fn test_hash_inside_string_is_not_comment() {
    assert_eq!(
        tokens(r#""a#b""#),
        vec![Token::String("a#b".to_string()), Token::Eof]
    );
}

#[test]
fn test_token_positions() {
    let positioned = Lexer::new("schema A: item {\n  x = D()\n}").tokenize().unwrap();
    let positions: Vec<(usize, usize)> = positioned
        .iter()
        .map(|(_, p)| (p.line, p.column))
        .collect();
    assert_eq!(
        positions,
        vec![
            (1, 1),  // schema
            (1, 8),  // A
            (1, 9),  // :
            (1, 11), // item
            (1, 16), // {
            (2, 3),  // x
            (2, 5),  // =
            (2, 7),  // D
            (2, 8),  // (
            (2, 9),  // )
            (3, 1),  // }
            (3, 2),  // eof
        ]
    );
}
