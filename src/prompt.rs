//! Terminal fallbacks for values the command line left out.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

/// Asks on stderr/stdin, but only when stdin is a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Prompter {
    interactive: bool,
    assume_yes: bool,
}

impl Prompter {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            interactive: io::stdin().is_terminal(),
            assume_yes,
        }
    }

    /// Gate before work starts: `--yes` accepts, a non-terminal declines.
    pub fn confirm(&self, question: &str) -> io::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        self.ask_yes_no(question)
    }

    /// Optional feature question; `--yes` and a non-terminal both decline.
    pub fn ask_yes_no(&self, question: &str) -> io::Result<bool> {
        if !self.interactive || self.assume_yes {
            return Ok(false);
        }
        let answer = self.read_line(&format!("{question} [y/N] "))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    /// A path, or `None` when left blank or not interactive.
    pub fn ask_path(&self, question: &str) -> io::Result<Option<PathBuf>> {
        if !self.interactive {
            return Ok(None);
        }
        let answer = self.read_line(&format!("{question}: "))?;
        Ok((!answer.is_empty()).then(|| PathBuf::from(answer)))
    }

    /// Free text with a default used for blank answers.
    pub fn ask_text(&self, question: &str, default: &str) -> io::Result<String> {
        if !self.interactive {
            return Ok(default.to_string());
        }
        let answer = self.read_line(&format!("{question} [{default}]: "))?;
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    fn read_line(&self, prompt: &str) -> io::Result<String> {
        let mut stderr = io::stderr();
        stderr.write_all(prompt.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}
