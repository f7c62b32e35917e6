//! descent: a PEG matching engine.
//!
//! Grammars are declared out of composable combinators ([`Expr`]), resolved
//! once into a rule graph that supports forward, mutual and self references
//! ([`Grammar::resolve`]), and matched by a recursive-descent engine that
//! produces tri-state results: full match, diagnosable partial match, or
//! miss ([`parse`], [`MatchNode`]). When nothing fully matches, the failure
//! that reached farthest into the input is selected and reported as a
//! source-anchored [`miette`] diagnostic.
//!
//! ```
//! use descent::prelude::*;
//!
//! let grammar = Grammar::resolve(vec![
//!     (
//!         "Greeting",
//!         Expr::sequence(vec![
//!             ("word", Expr::choice(vec![Expr::lit("hi"), Expr::lit("bye")])),
//!             ("mark", Expr::lit("!")),
//!         ]),
//!     ),
//! ])?;
//!
//! let tree = parse(&grammar, Cursor::from_string("hi!"))?;
//! assert_eq!(tree.rule_symbol(), Some("Greeting"));
//! assert_eq!(tree.combined_span().unwrap().text(), "hi!");
//! # Ok::<(), descent::ParseError>(())
//! ```

pub mod errors;
pub mod grammar;
pub mod matcher;
pub mod params;
pub mod reader;

pub use errors::{GrammarError, ParseError};
pub use grammar::{Expr, Grammar, Pattern, Rule, RuleId};
pub use matcher::{descend, descend_rule, parse, MatchNode, MatchValue, Origin, Status};
pub use params::{Key, Params};
pub use reader::{Cursor, Source, Span};

/// The types most grammars and parse calls touch.
pub mod prelude {
    pub use crate::errors::{GrammarError, ParseError};
    pub use crate::grammar::{Expr, Grammar};
    pub use crate::matcher::{parse, MatchNode, MatchValue, Status};
    pub use crate::params::{Key, Params};
    pub use crate::reader::{Cursor, Source, Span};
}
