use std::{fmt, ops::Range};

use woodgrain_core::{
    FEATURE_MARKER_PREFIX, LAYER_MARKER_PREFIX, WALL_FEATURE_PREFIX, WOODGRAPH_PREFIX,
    WOODIFIED_HEADER,
};

/// Kind of linear motion requested by a move command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveKind {
    /// `G0`, a travel move.
    Rapid,
    /// `G1`, a printing move.
    Linear,
}

/// Leading command of a gcode line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// `G0` or `G1`.
    Move(MoveKind),
    /// `M104` (no wait) or `M109` (wait).
    SetHotendTemperature {
        /// Whether the firmware blocks until the temperature is reached.
        wait: bool,
    },
    /// Any other command, kept verbatim in the output.
    Other {
        /// Upper-case command letter.
        letter: char,
        /// Numeric command code.
        code: u32,
    },
}

/// Numeric word such as `X12.5`, located inside its source line.
#[derive(Clone, Debug, PartialEq)]
pub struct Word {
    letter: char,
    value: f64,
    span: Range<usize>,
}

impl Word {
    /// Upper-case letter of the word.
    #[must_use]
    pub const fn letter(&self) -> char {
        self.letter
    }

    /// Parsed numeric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Byte range of the word, letter included, in the source line.
    #[must_use]
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }
}

/// Comment markers understood by the rewriter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    /// `;TYPE:<name>` feature marker.
    Feature(String),
    /// `;LAYER:<n>` layer marker.
    Layer(i64),
    /// A line of the trailer graph written by an earlier run.
    WoodGraph,
    /// The header written by an earlier run.
    WoodifiedHeader,
}

/// Field a parse warning refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// A lettered numeric word.
    Word(char),
    /// The index of a `;LAYER:` marker.
    LayerIndex,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(letter) => write!(f, "{letter}"),
            Self::LayerIndex => write!(f, "layer index"),
        }
    }
}

/// Text that superficially matched a field but failed numeric parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedField {
    field: Field,
    text: String,
}

impl MalformedField {
    /// Field that failed to parse.
    #[must_use]
    pub const fn field(&self) -> Field {
        self.field
    }

    /// Rejected text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Structured view of a single gcode line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GcodeLine {
    command: Option<Command>,
    words: Vec<Word>,
    marker: Option<Marker>,
    malformed: Vec<MalformedField>,
}

impl GcodeLine {
    /// Parses one line; the line terminator must already be removed.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let content = text.trim_end_matches('\r');
        let leading = content.trim_start();
        if leading.starts_with(';') {
            return Self::parse_comment(leading);
        }

        let code_end = content.find(';').unwrap_or(content.len());
        let mut line = Self::default();
        let mut words = scan_words(&content[..code_end], &mut line.malformed);

        if let Some(position) = words.iter().position(|word| word.letter != 'N') {
            let command = command_from_word(&words[position]);
            let _ = words.drain(..=position);
            line.command = Some(command);
            if is_message(command) {
                words.clear();
                line.malformed.clear();
            }
        }

        line.words = words;
        line
    }

    fn parse_comment(comment: &str) -> Self {
        let mut line = Self::default();
        if let Some(name) = comment.strip_prefix(FEATURE_MARKER_PREFIX) {
            line.marker = Some(Marker::Feature(name.trim().to_owned()));
        } else if let Some(index) = comment.strip_prefix(LAYER_MARKER_PREFIX) {
            match index.trim().parse::<i64>() {
                Ok(index) => line.marker = Some(Marker::Layer(index)),
                Err(_) => line.malformed.push(MalformedField {
                    field: Field::LayerIndex,
                    text: index.trim().to_owned(),
                }),
            }
        } else if comment.starts_with(WOODGRAPH_PREFIX) {
            line.marker = Some(Marker::WoodGraph);
        } else if comment.starts_with(WOODIFIED_HEADER) {
            line.marker = Some(Marker::WoodifiedHeader);
        }
        line
    }

    /// Leading command, if the line carries one.
    #[must_use]
    pub const fn command(&self) -> Option<Command> {
        self.command
    }

    /// Parameter words following the command.
    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Comment marker, if the line is one.
    #[must_use]
    pub const fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    /// Fields that failed numeric parsing.
    #[must_use]
    pub fn malformed(&self) -> &[MalformedField] {
        &self.malformed
    }

    /// Value of the first parameter word with the given upper-case letter.
    #[must_use]
    pub fn value(&self, letter: char) -> Option<f64> {
        self.word(letter).map(Word::value)
    }

    /// Returns whether a parameter word with the given letter is present.
    #[must_use]
    pub fn has(&self, letter: char) -> bool {
        self.word(letter).is_some()
    }

    /// Returns whether the line is a `G0` or `G1` move.
    #[must_use]
    pub fn is_move(&self) -> bool {
        matches!(self.command, Some(Command::Move(_)))
    }

    /// Returns whether the line is a `G1` move.
    #[must_use]
    pub fn is_linear_move(&self) -> bool {
        self.command == Some(Command::Move(MoveKind::Linear))
    }

    /// Explicit Z height of a move line.
    #[must_use]
    pub fn z(&self) -> Option<f64> {
        if self.is_move() {
            self.value('Z')
        } else {
            None
        }
    }

    /// Returns whether the line is a hotend temperature directive with an `S` word.
    #[must_use]
    pub fn is_temperature_directive(&self) -> bool {
        matches!(self.command, Some(Command::SetHotendTemperature { .. })) && self.has('S')
    }

    /// Name of the feature introduced by a `;TYPE:` marker.
    #[must_use]
    pub fn feature(&self) -> Option<&str> {
        match &self.marker {
            Some(Marker::Feature(name)) => Some(name),
            _ => None,
        }
    }

    /// Returns whether the line opens a wall segment.
    #[must_use]
    pub fn is_wall_feature(&self) -> bool {
        self.feature()
            .is_some_and(|name| name.starts_with(WALL_FEATURE_PREFIX))
    }

    /// Rewrites the source line with the word for `letter` replaced.
    ///
    /// `source` must be the text this line was parsed from. Returns `None`
    /// when the word is absent.
    #[must_use]
    pub fn replace_word(&self, source: &str, letter: char, value: &str) -> Option<String> {
        let span = self.word(letter)?.span();
        let mut rewritten = String::with_capacity(source.len() + value.len());
        rewritten.push_str(&source[..span.start]);
        rewritten.push(letter);
        rewritten.push_str(value);
        rewritten.push_str(&source[span.end..]);
        Some(rewritten)
    }

    fn word(&self, letter: char) -> Option<&Word> {
        self.words.iter().find(|word| word.letter == letter)
    }
}

fn scan_words(code: &str, malformed: &mut Vec<MalformedField>) -> Vec<Word> {
    let bytes = code.as_bytes();
    let mut words = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        if !byte.is_ascii_alphabetic() {
            index += 1;
            continue;
        }

        let letter = char::from(byte.to_ascii_uppercase());
        let start = index;
        let mut end = index + 1;
        while end < bytes.len() && is_numeric_byte(bytes[end]) {
            end += 1;
        }
        index = end;

        let text = &code[start + 1..end];
        if text.is_empty() {
            continue;
        }

        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => words.push(Word {
                letter,
                value,
                span: start..end,
            }),
            _ => malformed.push(MalformedField {
                field: Field::Word(letter),
                text: text.to_owned(),
            }),
        }
    }

    words
}

fn is_numeric_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'+')
}

fn command_from_word(word: &Word) -> Command {
    let value = word.value;
    let code = if value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    };

    match (word.letter, code) {
        ('G', Some(0)) => Command::Move(MoveKind::Rapid),
        ('G', Some(1)) => Command::Move(MoveKind::Linear),
        ('M', Some(104)) => Command::SetHotendTemperature { wait: false },
        ('M', Some(109)) => Command::SetHotendTemperature { wait: true },
        (letter, code) => Command::Other {
            letter,
            code: code.unwrap_or(u32::MAX),
        },
    }
}

fn is_message(command: Command) -> bool {
    matches!(
        command,
        Command::Other {
            letter: 'M',
            code: 117 | 118
        }
    )
}
