use std::{
    fs,
    io::{self, BufRead, Write},
};

/// Everything the interpreter needs from the outside world
pub trait Host {
    fn print(&mut self, text: &str);
    /// Shows `prompt` and reads one line without its terminator,
    /// or `None` once the input is exhausted
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    fn clear(&mut self);
    fn load(&mut self, path: &str) -> io::Result<String>;
}

/// Terminal and file system backed host
#[derive(Debug, Default)]
pub struct StdHost;

impl Host for StdHost {
    fn print(&mut self, text: &str) {
        println!("{text}");
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::default();
        // Zero bytes means end of input (usually Ctrl-D)
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn clear(&mut self) {
        let mut stdout = io::stdout();
        // Best effort
        let _ = write!(stdout, "\x1b[2J\x1b[1;1H").and_then(|_| stdout.flush());
    }

    fn load(&mut self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}
