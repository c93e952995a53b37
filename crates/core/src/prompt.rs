use anyhow::{Context, Result};
use std::io::{BufRead, Write};

/// Asks `message` and reads one line. Blank input takes `default_yes`;
/// otherwise only `y` or `yes` (any case) count as consent.
pub fn confirm_action<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
    default_yes: bool,
) -> Result<bool> {
    if !message.is_empty() {
        write!(output, "{message}").context("failed to write prompt")?;
        output.flush().context("failed to flush prompt")?;
    }

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read confirmation")?;
    if read == 0 {
        return Ok(false);
    }

    let answer = line.trim().to_lowercase();
    if answer.is_empty() {
        return Ok(default_yes);
    }
    Ok(answer == "y" || answer == "yes")
}
