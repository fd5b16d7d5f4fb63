//! Interactive questions asked during a command.
//!
//! Commands take `&mut dyn Prompter` so tests can script the answers.

use std::io::{self, BufRead, Write};

use crate::{Error, Result};

pub trait Prompter {
    /// Ask the user to pick one of `options`; returns its index.
    fn choose(&mut self, prompt: &str, options: &[String]) -> Result<usize>;

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool>;
}

/// Line-based prompter over any reader/writer pair.
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stderr> {
    /// Read answers from stdin, write questions to stderr.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Err(Error::InvalidInput("no answer given".to_string()));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn choose(&mut self, prompt: &str, options: &[String]) -> Result<usize> {
        if options.is_empty() {
            return Err(Error::InvalidInput("nothing to choose from".to_string()));
        }
        writeln!(self.output, "{}", prompt)?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, option)?;
        }
        loop {
            write!(self.output, "Select [1-{}]: ", options.len())?;
            self.output.flush()?;
            let answer = self.read_line()?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
                _ => writeln!(self.output, "Invalid selection: {}", answer)?,
            }
        }
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            write!(self.output, "{} {} ", prompt, hint)?;
            self.output.flush()?;
            let answer = self.read_line()?.to_lowercase();
            match answer.as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n")?,
            }
        }
    }
}
