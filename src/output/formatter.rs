//! Console messages for the command-line driver.
//!
//! Structured diagnostics go through `tracing`; this formatter only prints
//! what a user of the CLI asked to see: progress, the merge plan and the
//! final result.

use serde::Serialize;
use std::io::{self, IsTerminal};

use crate::error::Result;
use crate::merge::{MergePlan, ResolvedPage};
use crate::session::SourceFile;
use crate::utils::format_file_size;

/// Level of output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

/// Output formatter with configurable verbosity.
pub struct OutputFormatter {
    /// Only warnings and errors.
    quiet: bool,
    verbose: bool,
    colored: bool,
}

impl OutputFormatter {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            colored: io::stdout().is_terminal() && std::env::var("TERM").is_ok(),
        }
    }

    pub fn quiet() -> Self {
        Self::new(true, false)
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Suppressed in quiet mode.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Info, message);
        }
    }

    /// Suppressed in quiet mode.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Success, message);
        }
    }

    /// Always displayed.
    pub fn warning(&self, message: &str) {
        self.print_message(MessageLevel::Warning, message);
    }

    /// Always displayed, on stderr.
    pub fn error(&self, message: &str) {
        self.print_message(MessageLevel::Error, message);
    }

    /// Only displayed in verbose mode.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            self.print_message(MessageLevel::Debug, message);
        }
    }

    /// One line per accepted source file; sizes only in verbose mode.
    pub fn source_file(&self, index: usize, file: &SourceFile) {
        if self.quiet {
            return;
        }
        if self.verbose {
            println!(
                "  {index}. {} ({})",
                file.display_name,
                format_file_size(file.byte_size)
            );
        } else {
            println!("  {index}. {}", file.display_name);
        }
    }

    /// Print the pages a merge would produce.
    pub fn plan(&self, plan: &MergePlan) {
        if self.quiet {
            return;
        }
        println!(
            "\nMerge plan ({} pages, {} job):",
            plan.pages.len(),
            plan.class
        );
        for (position, page) in plan.pages.iter().enumerate() {
            println!("  {}. {}", position + 1, describe_page(page));
        }
        if plan.skipped > 0 {
            self.warning(&format!("{} item(s) would be skipped", plan.skipped));
        }
    }

    /// Print `value` as pretty JSON, whatever the verbosity.
    pub fn json<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).map_err(io::Error::from)?;
        println!("{text}");
        Ok(())
    }

    fn print_message(&self, level: MessageLevel, message: &str) {
        let (prefix, color_code) = match level {
            MessageLevel::Info => ("", ""),
            MessageLevel::Success => ("✓ ", "\x1b[32m"),
            MessageLevel::Warning => ("⚠ ", "\x1b[33m"),
            MessageLevel::Error => ("✗ ", "\x1b[31m"),
            MessageLevel::Debug => ("→ ", "\x1b[36m"),
        };
        let line = if self.colored && !color_code.is_empty() {
            format!("{color_code}{prefix}{message}\x1b[0m")
        } else {
            format!("{prefix}{message}")
        };

        if level == MessageLevel::Error {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

/// `name p.N` with the rotation when one applies.
pub fn describe_page(page: &ResolvedPage) -> String {
    let mut text = format!("{} p.{}", page.file.display_name, page.page_index + 1);
    if !page.rotation.is_identity() {
        text.push_str(&format!(" @{}°", page.rotation.as_degrees()));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BlobId, FileId};
    use crate::rotation::Rotation;

    fn page(index: usize, rotation: Rotation) -> ResolvedPage {
        ResolvedPage {
            file: SourceFile {
                id: FileId::from("f"),
                display_name: "scan.pdf".into(),
                blob_id: BlobId::from("b"),
                byte_size: 10,
            },
            page_index: index,
            rotation,
        }
    }

    #[test]
    fn test_quiet_formatter() {
        let formatter = OutputFormatter::quiet();
        assert!(formatter.is_quiet());
        assert!(!formatter.is_verbose());
        // Suppressed, but must not panic.
        formatter.info("hidden");
        formatter.plan(&MergePlan {
            class: crate::merge::ConcurrencyClass::Bounded,
            pages: vec![page(0, Rotation::None)],
            skipped: 1,
        });
    }

    #[test]
    fn test_describe_page() {
        assert_eq!(describe_page(&page(0, Rotation::None)), "scan.pdf p.1");
        assert_eq!(
            describe_page(&page(2, Rotation::Clockwise90)),
            "scan.pdf p.3 @90°"
        );
    }
}
