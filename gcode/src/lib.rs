#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Gcode line parsing for the woodgrain post-processor.
//!
//! Only the subset of the dialect the effect relies on is understood: `G0`/`G1`
//! moves with numeric words, `M104`/`M109` hotend directives, and the slicer's
//! `;TYPE:` and `;LAYER:` comment markers. Everything else is carried through
//! untouched. Words that look numeric but fail to parse never abort a run;
//! they are reported as [`ParseWarning`] values and treated as absent.

mod document;
mod line;

pub use document::{InputDocument, InputError, LineTerminator};
pub use line::{Command, Field, GcodeLine, MalformedField, Marker, MoveKind, Word};

use std::fmt;

use tracing::{debug, warn};

/// A recoverable numeric parse failure tied to an input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseWarning {
    line: usize,
    field: Field,
    text: String,
}

impl ParseWarning {
    /// Zero-based index of the line that produced the warning.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Field that failed to parse.
    #[must_use]
    pub const fn field(&self) -> Field {
        self.field
    }

    /// Raw text that was rejected.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: ignored malformed {} value '{}'",
            self.line + 1,
            self.field,
            self.text
        )
    }
}

/// Every input line parsed exactly once.
#[derive(Clone, Debug, Default)]
pub struct Program {
    lines: Vec<GcodeLine>,
    warnings: Vec<ParseWarning>,
}

impl Program {
    /// Parses the provided lines, collecting recoverable warnings.
    #[must_use]
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut parsed = Vec::with_capacity(lines.len());
        let mut warnings = Vec::new();

        for (index, text) in lines.iter().enumerate() {
            let line = GcodeLine::parse(text.as_ref());
            for malformed in line.malformed() {
                let warning = ParseWarning {
                    line: index,
                    field: malformed.field(),
                    text: malformed.text().to_owned(),
                };
                debug!(%warning, "recovered from malformed gcode word");
                warnings.push(warning);
            }
            parsed.push(line);
        }

        if !warnings.is_empty() {
            warn!(
                count = warnings.len(),
                "malformed numeric words were treated as absent"
            );
        }

        Self {
            lines: parsed,
            warnings,
        }
    }

    /// Parsed lines in input order.
    #[must_use]
    pub fn lines(&self) -> &[GcodeLine] {
        &self.lines
    }

    /// Number of parsed lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns whether the program holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Recoverable warnings in line order.
    #[must_use]
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    /// Returns whether an earlier woodgrain run already rewrote this program.
    #[must_use]
    pub fn is_woodified(&self) -> bool {
        self.lines.iter().any(|line| {
            matches!(
                line.marker(),
                Some(Marker::WoodGraph | Marker::WoodifiedHeader)
            )
        })
    }
}
