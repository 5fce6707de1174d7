use crate::errors::{AppError, Result, ValidationError};
use crate::models::UserRating;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Where interactive answers come from.
pub trait InputSource: Send {
    /// Shows `prompt` and reads one line; `None` once the source is exhausted.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Like `read_line` but without echo where the source supports it.
    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>> {
        self.read_line(prompt)
    }

    fn notify(&mut self, message: &str);
}

#[derive(Debug, Default)]
pub struct ConsoleInput;

impl InputSource for ConsoleInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>> {
        match rpassword::prompt_password(prompt) {
            Ok(secret) => Ok(Some(secret)),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn notify(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Pre-recorded answers, consumed in order. Keeps what was asked and shown
/// so callers can inspect the exchange afterwards.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: VecDeque<String>,
    pub prompts: Vec<String>,
    pub notices: Vec<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::new(contents.lines()))
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front())
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnswerKind {
    Int { min: i64, max: i64 },
    /// `step` is shown to the user only; answers off the step are accepted.
    Float { min: f64, max: f64, step: f64 },
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Answer {
    Int(i64),
    Float(f64),
    Bool(bool),
}

pub fn validate(raw: &str, kind: AnswerKind) -> std::result::Result<Answer, ValidationError> {
    let raw = raw.trim();
    match kind {
        AnswerKind::Int { min, max } => {
            let value: i64 = raw.parse().map_err(|_| ValidationError::Parse("int"))?;
            if (min..=max).contains(&value) {
                Ok(Answer::Int(value))
            } else {
                Err(ValidationError::OutOfRange {
                    min: min.to_string(),
                    max: max.to_string(),
                })
            }
        }
        AnswerKind::Float { min, max, .. } => {
            let value: f64 = raw.parse().map_err(|_| ValidationError::Parse("float"))?;
            if value.is_finite() && min <= value && value <= max {
                Ok(Answer::Float(value))
            } else {
                Err(ValidationError::OutOfRange {
                    min: min.to_string(),
                    max: max.to_string(),
                })
            }
        }
        AnswerKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "y" => Ok(Answer::Bool(true)),
            "n" => Ok(Answer::Bool(false)),
            _ => Err(ValidationError::YesNo),
        },
    }
}

/// Asks until `validate` accepts the answer. Only running out of input ends
/// the loop early.
pub fn ask(input: &mut dyn InputSource, question: &str, kind: AnswerKind) -> Result<Answer> {
    let prompt = format!("{question} ");
    loop {
        let Some(raw) = input.read_line(&prompt)? else {
            return Err(AppError::InputClosed);
        };
        match validate(&raw, kind) {
            Ok(answer) => return Ok(answer),
            Err(err) => input.notify(&format!("Invalid input: {err}")),
        }
    }
}

pub fn ask_int(input: &mut dyn InputSource, question: &str, min: i64, max: i64) -> Result<i64> {
    match ask(input, question, AnswerKind::Int { min, max })? {
        Answer::Int(value) => Ok(value),
        other => Err(AppError::unexpected(format!("expected an int, got {other:?}"))),
    }
}

pub fn ask_float(input: &mut dyn InputSource, question: &str, min: f64, max: f64, step: f64) -> Result<f64> {
    match ask(input, question, AnswerKind::Float { min, max, step })? {
        Answer::Float(value) => Ok(value),
        other => Err(AppError::unexpected(format!("expected a float, got {other:?}"))),
    }
}

pub fn ask_bool(input: &mut dyn InputSource, question: &str) -> Result<bool> {
    match ask(input, question, AnswerKind::Bool)? {
        Answer::Bool(value) => Ok(value),
        other => Err(AppError::unexpected(format!("expected y or n, got {other:?}"))),
    }
}

pub fn collect_ratings(input: &mut dyn InputSource) -> Result<UserRating> {
    Ok(UserRating {
        wakefulness: ask_int(input, "How awake did you feel today? (1-10)", 1, 10)?,
        cups_of_coffee: ask_int(input, "How many cups of coffee did you have today? (0-10)", 0, 10)?,
        modafanil: ask_float(
            input,
            "How much modafanil did you have today? (0-2 in steps of 0.25)",
            0.0,
            2.0,
            0.25,
        )?,
        exercise_yesterday: ask_bool(input, "Did you exercise yesterday? (y/n)")?,
        exercise_today: ask_bool(input, "Did you exercise today? (y/n)")?,
        focus: ask_int(input, "How well were you able to focus today? (1-10)", 1, 10)?,
        day_score: ask_int(
            input,
            "On a scale from 1-10, was today a bad day (1) or a good day (10)?",
            1,
            10,
        )?,
        enjoyability: ask_int(input, "How enjoyable were the tasks you worked on today? (1-10)", 1, 10)?,
    })
}
