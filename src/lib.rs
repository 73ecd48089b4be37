//! A readable pattern language for finding and replacing text.
//!
//! Vore programs are lists of statements. Patterns are spelled out in words
//! instead of regular-expression symbols, and matching backtracks the way a
//! regex engine does.
//!
//! # Example
//!
//! ```rust
//! use vore::compile;
//!
//! let program = compile("find all ('error' or 'success') = @word").unwrap();
//! let matches = program.run_str("I hope this is a success").unwrap();
//!
//! assert_eq!(matches.len(), 1);
//! assert_eq!(matches[0].file_offset, 17);
//! assert_eq!(matches[0].captures["word"], "success");
//! ```
//!
//! Replacements are expressions evaluated per match:
//!
//! ```rust
//! use vore::{Session, compile};
//!
//! let program = compile("replace all (at least 1 digit) = @n with number(@n) + 1").unwrap();
//! let mut session = Session::default();
//! session.add_text("ages", "7 and 41");
//! session.execute(&program).unwrap();
//!
//! assert_eq!(session.text("ages").as_deref(), Some("8 and 42"));
//! ```

mod buffer;
pub mod code;
pub mod compiler;
mod error;
mod eval;
mod exec_context;
pub mod expr;
mod interpreter;
mod lexer;
pub mod output;
pub mod pattern;
mod session;


pub use buffer::InputBuffer;
pub use code::{Program, Statement};
pub use compiler::compile;
pub use error::{ParseError, SourcePos, VoreError};
pub use eval::{Function, Value};
pub use interpreter::Report;
pub use pattern::{Amount, MatchConfig, MatchResult};
pub use session::{Input, Session};
