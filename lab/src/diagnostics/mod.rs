//! Diagnostics engine.
//!
//! Turns script text into positioned [`Diagnostic`]s using a pluggable
//! [`Lexer`] / [`Parser`] pair bundled in a [`Grammar`].
//!
//! - [`grammar`] - reference lexer and parser
//! - [`debounce`] - quiet-period scheduling of validation runs
//! - [`suggest`] - variable suggestions for the editor
//!
//! ## Example
//!
//! ```rust
//! use vtl_lab::diagnostics::{signature, Grammar};
//!
//! let grammar = Grammar::reference();
//! assert!(grammar.validate("ds_r := ds_1 + ds_2;").is_empty());
//!
//! let errors = grammar.validate("ds_r := (ds_1 + ds_2;");
//! assert_eq!(errors.len(), 1);
//! assert!(!signature(&errors).is_empty());
//! ```

pub mod debounce;
pub mod grammar;
pub mod suggest;

use std::fmt;
use std::sync::Arc;

use crate::models::Diagnostic;

pub use debounce::Debouncer;
pub use grammar::{ReferenceLexer, ReferenceParser, Token, TokenKind};
pub use suggest::{fetch_suggestions, Suggestion, SuggestionSet};

/// Output of a lexer: the tokens it recognised and the errors it hit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<Diagnostic>,
}

/// Splits script text into tokens.
pub trait Lexer: Send + Sync {
    fn tokenize(&self, source: &str) -> Lexed;
}

/// Checks a token stream.
pub trait Parser: Send + Sync {
    fn parse(&self, tokens: &[Token]) -> Vec<Diagnostic>;
}

/// A lexer and parser for one language version.
#[derive(Clone)]
pub struct Grammar {
    id: String,
    lexer: Arc<dyn Lexer>,
    parser: Arc<dyn Parser>,
}

impl Grammar {
    pub fn new(id: impl Into<String>, lexer: Arc<dyn Lexer>, parser: Arc<dyn Parser>) -> Self {
        Self { id: id.into(), lexer, parser }
    }

    /// The structural grammar shipped with the crate.
    pub fn reference() -> Self {
        Self::new("vtl-2.0", Arc::new(ReferenceLexer), Arc::new(ReferenceParser))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validate `source`: lexer errors first, then parser errors.
    pub fn validate(&self, source: &str) -> Vec<Diagnostic> {
        validate(self, source)
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Validate script text. Pure: the same text and grammar give the same list.
pub fn validate(grammar: &Grammar, source: &str) -> Vec<Diagnostic> {
    if source.trim().is_empty() {
        return Vec::new();
    }
    let Lexed { tokens, mut errors } = grammar.lexer.tokenize(source);
    errors.extend(grammar.parser.parse(&tokens));
    errors
}

/// Publication signature of a diagnostic list: messages folded as `", " + message`.
///
/// Two lists with the same signature are not re-published.
pub fn signature(diagnostics: &[Diagnostic]) -> String {
    diagnostics.iter().fold(String::new(), |acc, d| acc + ", " + &d.message)
}
