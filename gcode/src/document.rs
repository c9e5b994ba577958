use thiserror::Error;

/// Line terminator detected in the host input and reused for the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LineTerminator {
    /// `\n`.
    #[default]
    Lf,
    /// `\r\n`.
    CrLf,
}

impl LineTerminator {
    /// Terminator text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    /// Detects the terminator from its first occurrence in the text.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        let newline = text.find('\n')?;
        if text[..newline].ends_with('\r') {
            Some(Self::CrLf)
        } else {
            Some(Self::Lf)
        }
    }

    /// Removes the carriage return a `\n`-split line carries under this terminator.
    ///
    /// Returns `None` when the line was ended by the other terminator.
    fn strip_carriage_return(self, line: &str) -> Option<&str> {
        match self {
            Self::Lf => (!line.ends_with('\r')).then_some(line),
            Self::CrLf => line.strip_suffix('\r'),
        }
    }
}

/// Fatal input problems; no output is produced when one occurs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InputError {
    /// The host supplied no text at all.
    #[error("input is empty")]
    Empty,
    /// No line terminator occurs anywhere in the input.
    #[error("input contains no line terminator")]
    MissingTerminator,
    /// The last line is not followed by a terminator.
    #[error("final line is not terminated: '{0}'")]
    UnterminatedFinalLine(String),
    /// A line ends with a different terminator than the first line.
    #[error("line {line} is terminated differently from the first line")]
    MixedTerminators {
        /// One-based number of the offending line.
        line: usize,
    },
}

/// Host input split into lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDocument {
    lines: Vec<String>,
    terminator: LineTerminator,
}

impl InputDocument {
    /// Joins the host chunks and splits them on the detected terminator.
    ///
    /// Hosts may deliver gcode in arbitrary chunks (one per layer, one per
    /// file); chunk boundaries carry no meaning.
    pub fn from_chunks<S: AsRef<str>>(chunks: &[S]) -> Result<Self, InputError> {
        let text: String = chunks.iter().map(AsRef::as_ref).collect();
        Self::from_text(&text)
    }

    /// Splits a complete text on the detected terminator.
    ///
    /// Every line must end with the terminator of the first line.
    pub fn from_text(text: &str) -> Result<Self, InputError> {
        if text.is_empty() {
            return Err(InputError::Empty);
        }

        let terminator = LineTerminator::detect(text).ok_or(InputError::MissingTerminator)?;
        let body = text
            .strip_suffix('\n')
            .ok_or_else(|| InputError::UnterminatedFinalLine(last_line(text).to_owned()))?;

        let lines = body
            .split('\n')
            .enumerate()
            .map(|(index, line)| {
                terminator
                    .strip_carriage_return(line)
                    .map(str::to_owned)
                    .ok_or(InputError::MixedTerminators { line: index + 1 })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { lines, terminator })
    }

    /// Lines without their terminators.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Detected terminator.
    #[must_use]
    pub const fn terminator(&self) -> LineTerminator {
        self.terminator
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns whether the document holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Consumes the document, returning its lines and terminator.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, LineTerminator) {
        (self.lines, self.terminator)
    }
}

fn last_line(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or(text)
}
