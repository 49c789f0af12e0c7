//! Macro stepping.
//!
//! Turns stored macro text into the ordered stream of commands the host
//! executes, including craft loop rewriting.

pub mod active;
pub mod craft_loop;
pub mod parser;
pub mod types;

pub use active::ActiveMacro;
pub use craft_loop::{modify_for_craft_loop, CraftLoop, UNBOUNDED_COUNT};
pub use parser::{LineParser, MacroParser};
pub use types::{split_lines, Command, Language, MacroNode};
