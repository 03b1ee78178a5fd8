// ─── Input Parsing ───
// Classifies free-form input as a filename or an object id and pulls named
// fields out of object ids.

mod input;
mod pattern;

pub use input::{parse_data_input, raw_parse, InputParser, ParsedInput, ParserInputs, RawMatch};
pub use pattern::{PatternOptions, DEFAULT_DELIMITER, PATH_LEADERS};
