use anyhow::{anyhow, bail, Context};

pub const HELP: &str = "\
commands:
  page N          go to page N
  size N          show N duties per page (back to page 1)
  next | prev     step one page
  back | forward  walk the navigation history
  refresh         reload the current page
  new NAME        create a duty
  edit ROW NAME   rename the duty on ROW
  rm ROW          delete the duty on ROW
  help            show this text
  quit            leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Page(u32),
    Size(u32),
    Next,
    Prev,
    Back,
    Forward,
    Refresh,
    New(String),
    Edit { row: usize, name: String },
    Remove(usize),
    Help,
    Quit,
}

impl ShellCommand {
    /// Parses one input line. Blank lines yield `None`.
    ///
    /// Names keep everything after the command word (or row), so they may contain spaces.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = split_word(line);

        let command = match word.to_ascii_lowercase().as_str() {
            "page" | "p" => ShellCommand::Page(positive(rest, "page")?),
            "size" => ShellCommand::Size(positive(rest, "size")?),
            "next" | "n" => ShellCommand::Next,
            "prev" => ShellCommand::Prev,
            "back" => ShellCommand::Back,
            "forward" => ShellCommand::Forward,
            "refresh" | "r" => ShellCommand::Refresh,
            "new" => ShellCommand::New(rest.to_string()),
            "edit" => {
                let (row, name) = split_word(rest);
                ShellCommand::Edit {
                    row: row_number(row)?,
                    name: name.to_string(),
                }
            }
            "rm" | "delete" => ShellCommand::Remove(row_number(rest)?),
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Quit,
            other => bail!("unknown command '{other}', try 'help'"),
        };
        Ok(Some(command))
    }
}

fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn positive(raw: &str, what: &str) -> anyhow::Result<u32> {
    raw.parse::<u32>()
        .ok()
        .filter(|value| *value > 0)
        .ok_or_else(|| anyhow!("{what} must be a positive number, got '{raw}'"))
}

fn row_number(raw: &str) -> anyhow::Result<usize> {
    let row: usize = raw
        .parse()
        .with_context(|| format!("expected a row number, got '{raw}'"))?;
    if row == 0 {
        bail!("rows are numbered from 1");
    }
    Ok(row)
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
