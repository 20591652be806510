use chrono::{Duration, Local, NaiveDate};
use std::io::{BufRead, Write};

use crate::domain::range::INPUT_DATE_FORMAT;
use crate::error::{Error, Result};

/// Default search window length, ending today.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// `(start, end)` of the default window as `YYYY-MM-DD`.
pub fn default_window(today: NaiveDate) -> (String, String) {
    let start = today - Duration::days(DEFAULT_WINDOW_DAYS);
    (
        start.format(INPUT_DATE_FORMAT).to_string(),
        today.format(INPUT_DATE_FORMAT).to_string(),
    )
}

pub fn default_window_now() -> (String, String) {
    default_window(Local::now().date_naive())
}

/// Ask one question; an empty answer (or end of input) returns `default`.
pub fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: &str,
) -> Result<String> {
    let io_err = |e| Error::io("<stdin>", e);
    write!(output, "{question}").map_err(io_err)?;
    output.flush().map_err(io_err)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(io_err)?;
    let answer = line.trim();
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}
