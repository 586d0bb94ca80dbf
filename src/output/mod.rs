pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};
