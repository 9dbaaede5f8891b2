//! The shell itself: per-byte input state machine, line rendering and
//! command dispatch.

use core::fmt;

use heapless::{String, Vec};

use crate::command::{find_match, group_of, matches_partial, tokenize, Command, CommandSet};
use crate::escape::{self, Decoded, Decoder, Key};
use crate::history::History;
use crate::io::OutputSink;

const ETX: u8 = 0x03;
const BACKSPACE: u8 = 0x08;
const TAB: u8 = 0x09;
const DEL: u8 = 0x7f;

/// Interactive shell instance.
///
/// `LINE` bounds the edit and format buffers, `HISTORY` the history ring
/// and `ARGS` the argument slots handed to a command action; exceeding any
/// of them truncates. Feed console bytes one at a time into
/// [`Shell::handle_char`]; rendering and dispatch are driven from there.
///
/// ```
/// use serial_shell::{Action, Command, Shell};
///
/// fn info(_args: &[&str]) {}
///
/// let action: &dyn Action = &info;
/// let commands = [Command {
///     name: "info",
///     description: "System info",
///     action: Some(action),
///     required_args: 0,
/// }];
/// let mut shell: Shell = Shell::new(&commands);
/// shell.set_prompt("$ ");
/// for byte in b"info\r" {
///     shell.handle_char(*byte);
/// }
/// ```
pub struct Shell<'a, const LINE: usize = 128, const HISTORY: usize = 10, const ARGS: usize = 8> {
    commands: &'a dyn CommandSet,
    sink: Option<&'a mut dyn OutputSink>,
    prompt: &'a str,
    line: String<LINE>,
    cursor: usize,
    history: History<LINE, HISTORY>,
    decoder: Decoder,
}

impl<'a, const LINE: usize, const HISTORY: usize, const ARGS: usize>
    Shell<'a, LINE, HISTORY, ARGS>
{
    pub fn new(commands: &'a dyn CommandSet) -> Self {
        Self {
            commands,
            sink: None,
            prompt: "",
            line: String::new(),
            cursor: 0,
            history: History::new(),
            decoder: Decoder::new(),
        }
    }

    /// Sets the sink all output is written through. Without one the shell
    /// stays silent but keeps accepting input.
    pub fn set_output(&mut self, sink: &'a mut dyn OutputSink) {
        self.sink = Some(sink);
    }

    /// Sets the prompt prefix used by every redraw.
    pub fn set_prompt(&mut self, prompt: &'a str) {
        self.prompt = prompt;
    }

    /// Feeds one raw console byte through the shell. Synchronous and
    /// infallible: any output is written to the sink before this returns,
    /// and malformed input is absorbed.
    pub fn handle_char(&mut self, byte: u8) {
        match self.decoder.feed(byte) {
            Decoded::Pending | Decoded::Discarded => {}
            Decoded::Key(key) => self.apply_key(key),
            Decoded::Literal(byte) => self.handle_literal(byte),
        }
    }

    fn handle_literal(&mut self, byte: u8) {
        match byte {
            b'\r' | b'\n' => self.submit(),
            ETX => self.cancel_line(),
            BACKSPACE | DEL => self.backspace(),
            TAB => {
                if !self.line.is_empty() {
                    self.complete();
                }
            }
            0x20..=0x7e => self.insert(byte),
            _ => {}
        }
    }

    fn submit(&mut self) {
        self.print("\r\n");
        if self.line.is_empty() {
            self.print_prompt();
            return;
        }
        let line = self.line.clone();
        self.run_command(&line);
        self.history.push(&line);
        self.line.clear();
        self.cursor = 0;
    }

    fn cancel_line(&mut self) {
        self.line.clear();
        self.cursor = 0;
        self.history.reset();
        self.redraw_line();
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        if self.cursor == self.line.len() {
            self.line.pop();
            self.cursor -= 1;
            self.print(escape::CLEAR_CHARACTER);
        } else {
            self.remove_at(self.cursor - 1);
            self.cursor -= 1;
            self.print(escape::CURSOR_BACKWARD);
            self.redraw_suffix();
        }
    }

    fn insert(&mut self, byte: u8) {
        if self.line.len() >= LINE {
            return; // full line: the byte is dropped, not echoed
        }
        let ch = byte as char;
        self.emit_char(ch);
        if self.cursor == self.line.len() {
            let _ = self.line.push(ch);
            self.cursor += 1;
        } else {
            self.insert_at(self.cursor, ch);
            self.cursor += 1;
            // repaint the shifted tail, then step back to just after the
            // inserted character
            let line = self.line.clone();
            let suffix = &line[self.cursor..];
            self.print(suffix);
            for _ in 0..suffix.len() {
                self.print(escape::CURSOR_BACKWARD);
            }
        }
    }

    fn apply_key(&mut self, key: Key) {
        match key {
            Key::Up => self.history_previous(),
            Key::Down => self.history_next(),
            Key::Right => {
                if self.cursor < self.line.len() {
                    self.cursor += 1;
                    self.print(escape::CURSOR_FORWARD);
                }
            }
            Key::Left => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.print(escape::CURSOR_BACKWARD);
                }
            }
            Key::Home => {
                while self.cursor > 0 {
                    self.cursor -= 1;
                    self.print(escape::CURSOR_BACKWARD);
                }
            }
            Key::End => {
                while self.cursor < self.line.len() {
                    self.cursor += 1;
                    self.print(escape::CURSOR_FORWARD);
                }
            }
            Key::Delete => {
                if self.cursor < self.line.len() {
                    self.remove_at(self.cursor);
                    self.redraw_suffix();
                }
            }
            Key::CtrlLeft => self.word_left(),
            Key::CtrlRight => self.word_right(),
        }
    }

    fn history_previous(&mut self) {
        let recalled = self.history.previous().cloned();
        if let Some(entry) = recalled {
            self.load_line(&entry);
        }
    }

    fn history_next(&mut self) {
        let step = self.history.next().map(|entry| entry.cloned());
        match step {
            None => {}
            Some(Some(entry)) => self.load_line(&entry),
            Some(None) => {
                self.line.clear();
                self.cursor = 0;
                self.redraw_line();
            }
        }
    }

    fn load_line(&mut self, entry: &str) {
        self.line.clear();
        let _ = self.line.push_str(entry);
        self.cursor = self.line.len();
        self.redraw_line();
    }

    /// One cursor-back escape per position: the run of spaces left of the
    /// cursor, then the word before them.
    fn word_left(&mut self) {
        while self.cursor > 0 && self.line.as_bytes()[self.cursor - 1] == b' ' {
            self.cursor -= 1;
            self.print(escape::CURSOR_BACKWARD);
        }
        while self.cursor > 0 && self.line.as_bytes()[self.cursor - 1] != b' ' {
            self.cursor -= 1;
            self.print(escape::CURSOR_BACKWARD);
        }
    }

    fn word_right(&mut self) {
        while self.cursor < self.line.len() && self.line.as_bytes()[self.cursor] == b' ' {
            self.cursor += 1;
            self.print(escape::CURSOR_FORWARD);
        }
        while self.cursor < self.line.len() && self.line.as_bytes()[self.cursor] != b' ' {
            self.cursor += 1;
            self.print(escape::CURSOR_FORWARD);
        }
    }

    fn insert_at(&mut self, index: usize, ch: char) {
        let mut rebuilt: String<LINE> = String::new();
        for (i, existing) in self.line.chars().enumerate() {
            if i == index {
                let _ = rebuilt.push(ch);
            }
            let _ = rebuilt.push(existing);
        }
        self.line = rebuilt;
    }

    fn remove_at(&mut self, index: usize) {
        let mut rebuilt: String<LINE> = String::new();
        for (i, existing) in self.line.chars().enumerate() {
            if i != index {
                let _ = rebuilt.push(existing);
            }
        }
        self.line = rebuilt;
    }

    /// Repaints everything from the cursor to the end of the line after a
    /// removal, blanks the stale trailing cell and returns the terminal
    /// cursor to the edit point.
    fn redraw_suffix(&mut self) {
        let line = self.line.clone();
        let suffix = &line[self.cursor..];
        self.print(suffix);
        self.print(" ");
        for _ in 0..suffix.len() + 1 {
            self.print(escape::CURSOR_BACKWARD);
        }
    }

    /// Clear-line escape, prompt, current buffer.
    fn redraw_line(&mut self) {
        let line = self.line.clone();
        self.print(escape::CLEAR_LINE);
        self.print_prompt();
        self.print(&line);
    }

    /// Writes raw text to the output sink, if one is set.
    pub fn print(&mut self, text: &str) {
        if let Some(sink) = self.sink.as_mut() {
            sink.write_str(text);
        }
    }

    /// Formats into a fixed scratch buffer and writes the result; output
    /// past the buffer capacity is truncated.
    pub fn print_fmt(&mut self, args: fmt::Arguments<'_>) {
        use fmt::Write;

        let mut scratch: String<LINE> = String::new();
        let _ = scratch.write_fmt(args);
        self.print(&scratch);
    }

    /// Emits the prompt. Embedders call this once at startup; afterwards
    /// the shell re-emits it on its own.
    pub fn print_prompt(&mut self) {
        let prompt = self.prompt;
        self.print(prompt);
    }

    /// Clears the terminal and repaints the prompt and current line.
    pub fn clear_screen(&mut self) {
        let line = self.line.clone();
        self.print(escape::CLEAR_SCREEN);
        self.print_prompt();
        self.print(&line);
    }

    fn emit_char(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.print(ch.encode_utf8(&mut buf));
    }

    /// Matches `line` against the command table, enforces the argument
    /// contract and invokes the action; otherwise renders the help
    /// listing. Re-emits the prompt either way.
    pub fn run_command(&mut self, line: &str) {
        let commands = self.commands;
        if let Some(command) = find_match(commands.commands(), line) {
            let args: Vec<&str, ARGS> = tokenize(&line[command.name.len()..]);
            if args.len() >= command.required_args {
                #[cfg(feature = "defmt")]
                defmt::debug!("dispatch {=str} ({=usize} args)", command.name, args.len());
                if let Some(action) = command.action {
                    action.invoke(&args);
                }
                self.print_prompt();
                return;
            }
        }
        #[cfg(feature = "defmt")]
        defmt::trace!("no dispatch for {=str}", line);
        self.print_matches(line);
        self.print_prompt();
    }

    /// Help listing for `input`: the matching subset with aligned
    /// descriptions, or the whole table collapsed by group when nothing
    /// matches.
    fn print_matches(&mut self, input: &str) {
        let commands = self.commands;
        let list = commands.commands();
        let mut matches = 0;
        let mut width = 0;
        for command in list {
            if matches_partial(command.name, input) {
                matches += 1;
                width = width.max(command.name.len());
            }
        }
        if matches == 0 {
            self.print_grouped(list);
            return;
        }
        for i in 0..list.len() {
            if matches_partial(list[i].name, input) {
                self.print_row(list[i].name, list[i].description, width);
            }
        }
    }

    /// Full-table listing with grouped subcommands collapsed to their
    /// leading token and a synthesized description.
    fn print_grouped(&mut self, list: &[Command<'_>]) {
        let mut width = 0;
        for command in list {
            width = width.max(group_of(command.name).len());
        }
        for i in 0..list.len() {
            let group = group_of(list[i].name);
            // the first table entry of a group speaks for it
            if list[..i].iter().any(|prior| group_of(prior.name) == group) {
                continue;
            }
            if group.len() == list[i].name.len() {
                self.print_row(group, list[i].description, width);
            } else {
                self.print(group);
                self.pad(group.len(), width);
                self.print(group);
                self.print(" commands\r\n");
            }
        }
    }

    fn print_row(&mut self, name: &str, description: &str, width: usize) {
        self.print(name);
        self.pad(name.len(), width);
        self.print(description);
        self.print("\r\n");
    }

    /// Alignment column is the longest listed name plus two spaces.
    fn pad(&mut self, used: usize, width: usize) {
        for _ in used..width + 2 {
            self.print(" ");
        }
    }

    /// Tab handling: complete a single unambiguous match in place,
    /// otherwise list the candidates and drill down to a shared group
    /// token when there is one. The cursor ends up at the end of the
    /// (possibly rewritten) line.
    fn complete(&mut self) {
        let commands = self.commands;
        let list = commands.commands();
        let input = self.line.clone();

        let mut matches = 0;
        let mut width = 0;
        let mut last_match: Option<&Command<'_>> = None;
        for command in list {
            if matches_partial(command.name, &input) {
                matches += 1;
                width = width.max(command.name.len());
                last_match = Some(command);
            }
        }

        if matches == 0 {
            self.print(escape::CLEAR_LINE);
            self.print_grouped(list);
            self.cursor = self.line.len();
            self.redraw_line();
            return;
        }

        if matches == 1 {
            if let Some(command) = last_match {
                // only ever grow the line: no shrinking, no second
                // trailing space
                if command.name.len() + 1 > input.len() {
                    self.line.clear();
                    let _ = self.line.push_str(command.name);
                    let _ = self.line.push(' ');
                    self.cursor = self.line.len();
                    self.redraw_line();
                    return;
                }
            }
        }

        self.print(escape::CLEAR_LINE);
        for i in 0..list.len() {
            if matches_partial(list[i].name, &input) {
                self.print_row(list[i].name, list[i].description, width);
            }
        }

        let mut shared: Option<&str> = None;
        let mut all_shared = true;
        for command in list {
            if matches_partial(command.name, &input) {
                let group = group_of(command.name);
                match shared {
                    None => shared = Some(group),
                    Some(seen) if seen == group => {}
                    Some(_) => all_shared = false,
                }
            }
        }
        if all_shared {
            if let Some(group) = shared {
                if group.len() + 1 > self.line.len() {
                    self.line.clear();
                    let _ = self.line.push_str(group);
                    let _ = self.line.push(' ');
                }
            }
        }
        self.cursor = self.line.len();
        self.redraw_line();
    }
}
