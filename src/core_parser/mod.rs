//! Splits the control-channel byte stream into discrete FTP commands.

use std::mem;
use std::sync::{Arc, Mutex};

/// Text encoding of the command channel. Mutable at runtime (OPTS UTF8), so
/// everything that decodes or encodes command text reads it through a shared
/// handle rather than a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

pub type SharedEncoding = Arc<Mutex<TextEncoding>>;

pub fn shared_encoding(initial: TextEncoding) -> SharedEncoding {
    Arc::new(Mutex::new(initial))
}

/// One parsed command. `argument` is the empty string when nothing followed
/// the command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub argument: String,
}

impl Command {
    pub fn new(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: argument.into(),
        }
    }
}

/// Stateful line splitter for the command channel.
///
/// Terminators may be `CRLF`, bare `CR`, or bare `LF`, and may be split
/// across reads; a `CR` followed by `LF` in a later call still counts as one
/// terminator. The encoding is looked up fresh for every line because a
/// handler may change it mid-session.
pub struct CommandParser {
    encoding: SharedEncoding,
    carry: Vec<u8>,
    skip_lf: bool,
}

impl CommandParser {
    pub fn new(encoding: SharedEncoding) -> Self {
        Self {
            encoding,
            carry: Vec::new(),
            skip_lf: false,
        }
    }

    /// Consumes a chunk of raw bytes and yields every command completed by
    /// it. Unterminated input is buffered for the next call; this never
    /// blocks and never fails.
    pub fn collect(&mut self, data: &[u8]) -> Vec<Command> {
        let mut commands = Vec::new();
        for &byte in data {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\r' => {
                    self.finish_line(&mut commands);
                    self.skip_lf = true;
                }
                b'\n' => self.finish_line(&mut commands),
                _ => self.carry.push(byte),
            }
        }
        commands
    }

    fn finish_line(&mut self, commands: &mut Vec<Command>) {
        let raw = mem::take(&mut self.carry);
        let encoding = *self.encoding.lock().unwrap();
        let line = encoding.decode(&raw);
        if line.is_empty() {
            return;
        }
        let mut parts = line.splitn(2, ' ');
        let name = parts.next().unwrap_or_default().to_string();
        let argument = parts.next().map(str::trim_start).unwrap_or_default().to_string();
        commands.push(Command { name, argument });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::new(shared_encoding(TextEncoding::Utf8))
    }

    fn names(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn splits_name_and_argument() {
        let mut p = parser();
        let commands = p.collect(b"STOR  file with spaces.txt\r\n");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "STOR");
        assert_eq!(commands[0].argument, "file with spaces.txt");
    }

    #[test]
    fn argument_is_empty_without_space() {
        let mut p = parser();
        let commands = p.collect(b"NOOP\r\n");
        assert_eq!(commands, vec![Command::new("NOOP", "")]);
    }

    #[test]
    fn handles_all_terminator_variants() {
        let mut p = parser();
        let commands = p.collect(b"A 1\r\nB 2\nC 3\rD 4\r\n");
        assert_eq!(names(&commands), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn crlf_split_across_calls_emits_no_empty_command() {
        let mut p = parser();
        let mut commands = p.collect(b"PWD\r");
        commands.extend(p.collect(b"\nQUIT\r\n"));
        assert_eq!(names(&commands), vec!["PWD", "QUIT"]);
    }

    #[test]
    fn partial_line_buffers_across_calls() {
        let mut p = parser();
        assert!(p.collect(b"RE").is_empty());
        assert!(p.collect(b"TR fi").is_empty());
        let commands = p.collect(b"le.bin\r\n");
        assert_eq!(commands, vec![Command::new("RETR", "file.bin")]);
    }

    #[test]
    fn arbitrary_splits_match_single_call() {
        let input = b"USER anonymous\r\nPASS x\nPWD\rTYPE I\r\nQUIT\r\n";
        let expected = parser().collect(input);
        for split in 1..input.len() {
            let mut p = parser();
            let mut commands = p.collect(&input[..split]);
            commands.extend(p.collect(&input[split..]));
            assert_eq!(commands, expected, "split at {}", split);
        }
    }

    #[test]
    fn encoding_change_applies_to_next_line() {
        let encoding = shared_encoding(TextEncoding::Utf8);
        let mut p = CommandParser::new(encoding.clone());
        let first = p.collect(b"NOOP\r\n");
        assert_eq!(first[0].name, "NOOP");
        *encoding.lock().unwrap() = TextEncoding::Latin1;
        let second = p.collect(b"SITE \xe9\r\n");
        assert_eq!(second[0].argument, "\u{e9}");
    }

    #[test]
    fn blank_lines_are_dropped() {
        let mut p = parser();
        let commands = p.collect(b"\r\n\r\nNOOP\r\n\n");
        assert_eq!(names(&commands), vec!["NOOP"]);
    }
}
