//! Reference lexer and parser.
//!
//! A structural check of VTL-style scripts, enough to drive the editor
//! markers and the run gate: statements of the form
//! `name := expression;` (or `name <- expression;`), balanced `()[]{}`,
//! terminated strings and comments, and no stray characters. It does not type
//! or resolve anything; a full grammar plugs in through [`Grammar::new`].
//!
//! Messages follow the usual parser-generator wording
//! (`token recognition error at: '$'`, `missing ';' …`, `extraneous input …`).
//!
//! [`Grammar::new`]: super::Grammar::new

use once_cell::sync::Lazy;
use std::collections::HashSet;

use super::{Lexed, Lexer, Parser};
use crate::models::Diagnostic;

/// Reserved words; they cannot be assigned to.
static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "if", "then", "else", "and", "or", "xor", "not", "in", "not_in", "between", "is", "isnull",
        "define", "operator", "end", "returns", "datapoint", "ruleset", "hierarchical", "calc",
        "filter", "keep", "drop", "rename", "aggr", "group", "by", "except", "all", "having",
        "over", "partition", "order", "asc", "desc", "join", "inner_join", "left_join", "full_join",
        "cross_join", "union", "intersect", "setdiff", "symdiff", "exists_in", "check",
        "check_datapoint", "check_hierarchy", "identifier", "measure", "attribute", "component",
        "as", "to", "using", "with", "null", "true", "false", "eval", "sub", "pivot", "unpivot",
    ]
    .into_iter()
    .collect()
});

/// Kinds of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Name, plain or `'quoted'`.
    Identifier,
    /// Reserved word.
    Keyword,
    Number,
    /// `"string"` literal.
    Str,
    /// `:=` or `<-`
    Assign,
    Operator,
    /// `(`, `[` or `{`
    Open,
    /// `)`, `]` or `}`
    Close,
    /// `,` or `:`
    Separator,
    Semicolon,
}

/// A token with its 1-based start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Column just past the token.
    pub fn end_col(&self) -> usize {
        self.col + self.len()
    }

    fn error(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(self.line, self.col, self.len(), message)
    }
}

// =============================================================================
// Lexer
// =============================================================================

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Cursor {
    fn new(source: &str) -> Self {
        Self { chars: source.chars().collect(), pos: 0, line: 1, col: 1 }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek_char().filter(|c| keep(*c)) {
            text.push(c);
            self.advance();
        }
        text
    }
}

const TWO_CHAR_OPERATORS: [&str; 6] = ["<>", "<=", ">=", "||", "->", "=="];

/// Lexer of the reference grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceLexer;

impl Lexer for ReferenceLexer {
    fn tokenize(&self, source: &str) -> Lexed {
        let mut cursor = Cursor::new(source);
        let mut out = Lexed::default();

        while let Some(c) = cursor.peek_char() {
            let (line, col) = (cursor.line, cursor.col);
            let token = |kind: TokenKind, text: String| Token { kind, text, line, col };

            if c.is_whitespace() {
                cursor.advance();
            } else if c == '/' && cursor.peek_at(1) == Some('/') {
                cursor.take_while(|c| c != '\n');
            } else if c == '/' && cursor.peek_at(1) == Some('*') {
                cursor.advance();
                cursor.advance();
                let mut closed = false;
                while let Some(c) = cursor.advance() {
                    if c == '*' && cursor.peek_char() == Some('/') {
                        cursor.advance();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    out.errors.push(Diagnostic::error(line, col, 2, "unterminated comment"));
                }
            } else if c.is_alphabetic() || c == '_' {
                let text = cursor.take_while(|c| c.is_alphanumeric() || c == '_');
                let kind = if KEYWORDS.contains(text.as_str()) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Identifier
                };
                out.tokens.push(token(kind, text));
            } else if c.is_ascii_digit() {
                out.tokens.push(token(TokenKind::Number, read_number(&mut cursor)));
            } else if c == '"' || c == '\'' {
                match read_quoted(&mut cursor, c) {
                    Ok(text) if c == '"' => out.tokens.push(token(TokenKind::Str, text)),
                    Ok(text) => out.tokens.push(token(TokenKind::Identifier, text)),
                    Err(len) => {
                        let what = if c == '"' { "string literal" } else { "quoted name" };
                        let message = format!("unterminated {} starting at {}:{}", what, line, col);
                        out.errors.push(Diagnostic::error(line, col, len, message));
                    }
                }
            } else if let Some((kind, text)) = read_symbol(&mut cursor) {
                out.tokens.push(token(kind, text));
            } else {
                cursor.advance();
                let message = format!("token recognition error at: '{}'", c);
                out.errors.push(Diagnostic::error(line, col, 1, message));
            }
        }

        out
    }
}

fn read_number(cursor: &mut Cursor) -> String {
    let mut text = cursor.take_while(|c| c.is_ascii_digit());
    if cursor.peek_char() == Some('.') && cursor.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
        cursor.advance();
        text.push('.');
        text.push_str(&cursor.take_while(|c| c.is_ascii_digit()));
    }
    if matches!(cursor.peek_char(), Some('e' | 'E')) {
        let signed = matches!(cursor.peek_at(1), Some('+' | '-'));
        let digit_at = if signed { 2 } else { 1 };
        if cursor.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
            for _ in 0..digit_at {
                text.extend(cursor.advance());
            }
            text.push_str(&cursor.take_while(|c| c.is_ascii_digit()));
        }
    }
    text
}

/// Quoted text, quotes included. `Err` carries the consumed length when the
/// line or input ends first.
fn read_quoted(cursor: &mut Cursor, quote: char) -> Result<String, usize> {
    let mut text = String::new();
    text.extend(cursor.advance());
    while let Some(c) = cursor.peek_char() {
        if c == '\n' {
            break;
        }
        cursor.advance();
        text.push(c);
        if c == quote {
            return Ok(text);
        }
    }
    Err(text.chars().count())
}

fn read_symbol(cursor: &mut Cursor) -> Option<(TokenKind, String)> {
    let c = cursor.peek_char()?;
    let pair: String = [Some(c), cursor.peek_at(1)].into_iter().flatten().collect();

    let (kind, width) = if pair == ":=" || pair == "<-" {
        (TokenKind::Assign, 2)
    } else if TWO_CHAR_OPERATORS.contains(&pair.as_str()) {
        (TokenKind::Operator, 2)
    } else {
        match c {
            '+' | '-' | '*' | '/' | '=' | '<' | '>' | '#' => (TokenKind::Operator, 1),
            '(' | '[' | '{' => (TokenKind::Open, 1),
            ')' | ']' | '}' => (TokenKind::Close, 1),
            ',' | ':' => (TokenKind::Separator, 1),
            ';' => (TokenKind::Semicolon, 1),
            _ => return None,
        }
    };

    let mut text = String::new();
    for _ in 0..width {
        text.extend(cursor.advance());
    }
    Some((kind, text))
}

// =============================================================================
// Parser
// =============================================================================

/// Parser of the reference grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceParser;

impl Parser for ReferenceParser {
    fn parse(&self, tokens: &[Token]) -> Vec<Diagnostic> {
        let mut errors = Vec::new();
        let mut start = 0;
        for (i, token) in tokens.iter().enumerate() {
            if token.kind == TokenKind::Semicolon {
                check_statement(&tokens[start..i], true, &mut errors);
                start = i + 1;
            }
        }
        if start < tokens.len() {
            check_statement(&tokens[start..], false, &mut errors);
        }
        errors
    }
}

fn check_statement(tokens: &[Token], terminated: bool, errors: &mut Vec<Diagnostic>) {
    let Some(first) = tokens.first() else {
        return;
    };

    // `define ... end define;` blocks are only checked for balance
    let is_definition = first.kind == TokenKind::Keyword && first.text == "define";
    if !is_definition {
        if first.kind != TokenKind::Identifier {
            let message = format!("mismatched input '{}' expecting an identifier", first.text);
            errors.push(first.error(message));
        } else {
            match tokens.get(1) {
                Some(assign) if assign.kind == TokenKind::Assign => {
                    if tokens.len() == 2 {
                        let message = format!("missing expression after '{}'", assign.text);
                        errors.push(assign.error(message));
                    }
                }
                Some(other) => {
                    errors.push(other.error(format!("missing ':=' at '{}'", other.text)));
                }
                None => errors.push(Diagnostic::error(
                    first.line,
                    first.end_col(),
                    1,
                    format!("missing ':=' after '{}'", first.text),
                )),
            }
        }
    }

    check_balance(tokens, errors);

    if !terminated {
        if let Some(last) = tokens.last() {
            let message = "missing ';' at end of statement";
            errors.push(Diagnostic::error(last.line, last.end_col(), 1, message));
        }
    }
}

fn closing_for(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

fn check_balance(tokens: &[Token], errors: &mut Vec<Diagnostic>) {
    let mut open: Vec<&Token> = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::Open => open.push(token),
            TokenKind::Close => match open.last() {
                Some(top) if closing_for(&top.text) == token.text => {
                    open.pop();
                }
                _ => errors.push(token.error(format!("extraneous input '{}'", token.text))),
            },
            _ => {}
        }
    }
    for token in open {
        let close = closing_for(&token.text);
        errors.push(token.error(format!("missing '{}' to close '{}'", close, token.text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        ReferenceLexer.tokenize(source).tokens.iter().map(|t| t.kind).collect()
    }

    fn check(source: &str) -> Vec<Diagnostic> {
        let lexed = ReferenceLexer.tokenize(source);
        let mut errors = lexed.errors;
        errors.extend(ReferenceParser.parse(&lexed.tokens));
        errors
    }

    #[test]
    fn test_tokenize_statement() {
        use TokenKind::*;
        assert_eq!(
            kinds("ds_r := ds_1[calc m := 2.5e3 * 'my ds'#x] <> \"a\";"),
            vec![
                Identifier, Assign, Identifier, Open, Keyword, Identifier, Assign, Number, Operator,
                Identifier, Operator, Identifier, Close, Operator, Str, Semicolon
            ]
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let lexed = ReferenceLexer.tokenize("a := 1;\n  bb <- 22;");
        let bb = &lexed.tokens[4];
        assert_eq!((bb.line, bb.col, bb.end_col()), (2, 3, 5));
        let number = &lexed.tokens[6];
        assert_eq!((number.text.as_str(), number.col), ("22", 9));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert!(check("// header\na := b; /* inline */ c := d;").is_empty());
        let errors = check("a := b; /* never closed");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated comment");
        assert_eq!((errors[0].start_line, errors[0].start_col), (1, 9));
    }

    #[test]
    fn test_unexpected_character() {
        let errors = check("a := b $ c;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "token recognition error at: '$'");
        assert_eq!((errors[0].start_col, errors[0].end_col), (8, 9));
    }

    #[test]
    fn test_unterminated_string() {
        let errors = check("a := \"abc;\nb := c;");
        assert!(errors[0].message.starts_with("unterminated string literal"));
        assert_eq!(errors[0].start_line, 1);
    }

    #[test]
    fn test_missing_semicolon() {
        let errors = check("a := b;\nc := d");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "missing ';' at end of statement");
        assert_eq!((errors[0].start_line, errors[0].start_col), (2, 7));
    }

    #[test]
    fn test_statement_shape() {
        assert_eq!(check("+ b;")[0].message, "mismatched input '+' expecting an identifier");
        assert_eq!(
            check("true := 1;")[0].message,
            "mismatched input 'true' expecting an identifier"
        );
        assert_eq!(check("a b;")[0].message, "missing ':=' at 'b'");
        assert_eq!(check("a;")[0].message, "missing ':=' after 'a'");
        assert_eq!(check("a := ;")[0].message, "missing expression after ':='");
        assert!(check(";;").is_empty());
    }

    #[test]
    fn test_balance() {
        assert!(check("a := f((b), [c], {d});").is_empty());
        let errors = check("a := (b];");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "extraneous input ']'");
        assert_eq!(errors[1].message, "missing ')' to close '('");
    }

    #[test]
    fn test_definition_block() {
        let script = "define operator plus1 (x integer) returns integer is x + 1 \
                      end define operator;\nr := plus1(2);";
        assert!(check(script).is_empty());
    }
}
