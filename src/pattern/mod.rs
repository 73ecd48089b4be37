//! Vore pattern engine.
//!
//! Patterns are written as words rather than symbols and read left to right:
//!
//! | Pattern                      | Meaning                                      |
//! |------------------------------|----------------------------------------------|
//! | `'text'`                     | The exact bytes `text`                        |
//! | `not 'text'`                 | 1..len bytes, none of which occur in `text`  |
//! | `'lo' to 'hi'`               | A byte string between `lo` and `hi`           |
//! | `in 'a' to 'z', '_', digit`  | The first item that matches                  |
//! | `not in ...`                 | One byte that cannot start any item          |
//! | `digit` `letter` `upper` `lower` `whitespace` `any` | One byte of the class |
//! | `sol` `eol` `sof` `eof`      | Line/file start/end (zero width)              |
//! | `at least N X`               | N or more `X`                                |
//! | `at most N X`                | Up to N `X`                                  |
//! | `between N and M X`          | N to M `X`                                   |
//! | `exactly N X`, `N X`         | Exactly N `X`                                |
//! | `maybe X`                    | Zero or one `X`                              |
//! | `... fewest`                 | Prefer the fewest repetitions                |
//! | `X or Y`                     | `X`, else `Y`                                |
//! | `X = @name`                  | Capture the text `X` matched                 |
//! | `@name`                      | Text previously captured as `name`           |
//! | `X = $name`                  | Define subroutine `name` and match it here   |
//! | `$name`                      | Call subroutine `name`                       |
//! | `( ... )`                    | Grouping                                     |

pub mod ast;
pub mod char_class;
pub mod matcher;
pub mod parser;
pub mod scanner;

pub use ast::{NodeId, PatternArena};
pub use matcher::{MatchConfig, MatchEnv, Matcher};
pub use parser::parse_pattern;
pub use scanner::{Amount, MatchResult, scan};
