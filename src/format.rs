//! Record formatting for handlers.
//!
//! Templates use `{field}` / `{field:spec}` placeholders. Supported fields are
//! `asctime`, `msecs`, `levelname`, `levelno`, `name`, `message`, `process`
//! and `thread`. A spec is an optional `<` or `>` alignment, an optional `0`
//! fill and a width, e.g. `{levelname:<8}` or `{msecs:03}`. `{{` and `}}`
//! produce literal braces.

use crate::error::{self, Result, TimerError};
use crate::level::LogLevel;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fmt::Write as _;

pub const DEFAULT_FMT: &str = "{asctime}.{msecs:03} | {levelname:<8} | {name} - {message}";
pub const DEFAULT_DATEFMT: &str = "%Y-%m-%d %H:%M:%S";

/// One timing record on its way to a handler.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub time: DateTime<Local>,
    pub level: LogLevel,
    pub name: &'a str,
    pub message: &'a str,
    pub process: u32,
    pub thread: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Asctime,
    Msecs,
    Levelname,
    Levelno,
    Name,
    Message,
    Process,
    Thread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Auto,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Spec {
    align: Align,
    zero: bool,
    width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(Field, Spec),
}

/// A parsed line template plus its strftime date format.
#[derive(Debug, Clone)]
pub struct Formatter {
    template: String,
    datefmt: String,
    pieces: Vec<Piece>,
}

impl Formatter {
    pub fn new(template: &str, datefmt: &str) -> Result<Self> {
        let pieces = parse_template(template)?;
        if StrftimeItems::new(datefmt).any(|item| matches!(item, Item::Error)) {
            return Err(TimerError::InvalidFormat {
                template: datefmt.to_string(),
                reason: "unsupported strftime specifier".to_string(),
            });
        }
        Ok(Self {
            template: template.to_string(),
            datefmt: datefmt.to_string(),
            pieces,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn datefmt(&self) -> &str {
        &self.datefmt
    }

    /// Renders `record` as a single line, without the trailing newline.
    pub fn format(&self, record: &Record<'_>) -> String {
        let mut out = String::with_capacity(128 + record.message.len());
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field(field, spec) => self.push_field(&mut out, *field, *spec, record),
            }
        }
        out
    }

    fn push_field(&self, out: &mut String, field: Field, spec: Spec, record: &Record<'_>) {
        let (value, numeric) = match field {
            Field::Asctime => {
                let mut stamp = String::new();
                if let Err(err) = write!(stamp, "{}", record.time.format(&self.datefmt)) {
                    error::report(&format!("cannot render date format {:?}", self.datefmt), &err);
                }
                (stamp, false)
            }
            Field::Msecs => (
                record.time.timestamp_subsec_millis().min(999).to_string(),
                true,
            ),
            Field::Levelname => (record.level.as_str().to_string(), false),
            Field::Levelno => (record.level.as_u8().to_string(), true),
            Field::Name => (record.name.to_string(), false),
            Field::Message => (record.message.to_string(), false),
            Field::Process => (record.process.to_string(), true),
            Field::Thread => (record.thread.to_string(), false),
        };
        pad_into(out, &value, spec, numeric);
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self {
            template: DEFAULT_FMT.to_string(),
            datefmt: DEFAULT_DATEFMT.to_string(),
            pieces: parse_template(DEFAULT_FMT).unwrap_or_default(),
        }
    }
}

fn pad_into(out: &mut String, value: &str, spec: Spec, numeric: bool) {
    let len = value.chars().count();
    if len >= spec.width {
        out.push_str(value);
        return;
    }
    let fill = spec.width - len;
    let left_align = match spec.align {
        Align::Left => true,
        Align::Right => false,
        Align::Auto => !numeric && !spec.zero,
    };
    let fill_char = if spec.zero { '0' } else { ' ' };
    if left_align {
        out.push_str(value);
        out.extend(std::iter::repeat_n(fill_char, fill));
    } else {
        out.extend(std::iter::repeat_n(fill_char, fill));
        out.push_str(value);
    }
}

fn invalid(template: &str, reason: impl Into<String>) -> TimerError {
    TimerError::InvalidFormat {
        template: template.to_string(),
        reason: reason.into(),
    }
}

fn parse_template(template: &str) -> Result<Vec<Piece>> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return Err(invalid(template, "unclosed `{` placeholder"));
                }
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(parse_placeholder(template, &inner)?);
            }
            '}' => return Err(invalid(template, "unmatched `}`")),
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(pieces)
}

fn parse_placeholder(template: &str, inner: &str) -> Result<Piece> {
    let (name, spec) = inner.split_once(':').unwrap_or((inner, ""));
    let field = match name.trim() {
        "asctime" => Field::Asctime,
        "msecs" => Field::Msecs,
        "levelname" => Field::Levelname,
        "levelno" => Field::Levelno,
        "name" => Field::Name,
        "message" => Field::Message,
        "process" => Field::Process,
        "thread" => Field::Thread,
        other => return Err(invalid(template, format!("unknown field `{other}`"))),
    };

    let mut rest = spec;
    let align = if let Some(r) = rest.strip_prefix('<') {
        rest = r;
        Align::Left
    } else if let Some(r) = rest.strip_prefix('>') {
        rest = r;
        Align::Right
    } else {
        Align::Auto
    };
    let zero = if let Some(r) = rest.strip_prefix('0') {
        rest = r;
        true
    } else {
        false
    };
    let width = if rest.is_empty() {
        0
    } else {
        rest.parse::<usize>()
            .map_err(|_| invalid(template, format!("bad spec `{spec}` for `{name}`")))?
    };

    Ok(Piece::Field(field, Spec { align, zero, width }))
}
