//! Raw-mode console input with Tab completion.
//!
//! The input thread owns the line buffer and sends whole lines to the tick
//! thread. Completion reads a snapshot of names the tick thread refreshes
//! after every command.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal::{self, ClearType};
use crossterm::{cursor, execute};
use parking_lot::RwLock;

use crate::commands::{Candidates, suggest};

/// What the input thread sends to the tick thread.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Interrupt,
}

#[allow(clippy::print_stdout)]
pub fn input_thread(tx: Sender<Input>, candidates: Arc<RwLock<Candidates>>) {
    let mut input_buffer = String::new();

    loop {
        if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(key_event)) = event::read() else {
            continue;
        };

        if key_event.modifiers.contains(KeyModifiers::CONTROL)
            && key_event.code == KeyCode::Char('c')
        {
            let _ = tx.send(Input::Interrupt);
            break;
        }

        match key_event.code {
            KeyCode::Enter => {
                let line = std::mem::take(&mut input_buffer);
                let is_quit = matches!(line.trim(), "q" | "quit" | "exit");
                if tx.send(Input::Line(line)).is_err() || is_quit {
                    break;
                }
            }
            KeyCode::Tab => {
                let matches = suggest(&input_buffer, &candidates.read());
                match complete(&input_buffer, &matches) {
                    Some(completed) => input_buffer = completed,
                    None if matches.len() > 1 => {
                        print!("\r\n{}\r\n", matches.join("  "));
                    }
                    None => {}
                }
                clear_line();
                print_prompt();
                print!("{input_buffer}");
                io::stdout().flush().ok();
            }
            KeyCode::Char(c) => {
                input_buffer.push(c);
                print!("{c}");
                io::stdout().flush().ok();
            }
            KeyCode::Backspace => {
                if input_buffer.pop().is_some() {
                    print!("\x08 \x08");
                    io::stdout().flush().ok();
                }
            }
            KeyCode::Esc => {
                input_buffer.clear();
                clear_line();
                print_prompt();
            }
            _ => {}
        }
    }
}

/// Extend the last token of `buffer` with the completions in `matches`.
///
/// A single match is completed fully and followed by a space. Several
/// matches complete to their longest common prefix, if that adds anything.
pub fn complete(buffer: &str, matches: &[String]) -> Option<String> {
    let start = buffer
        .rfind(char::is_whitespace)
        .map_or(0, |i| i + 1);
    let partial = buffer.get(start..)?;

    let replacement = match matches {
        [] => return None,
        [only] => format!("{only} "),
        [first, rest @ ..] => {
            let mut common = first.len();
            for other in rest {
                common = common.min(
                    first
                        .chars()
                        .zip(other.chars())
                        .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
                        .map(|(a, _)| a.len_utf8())
                        .sum(),
                );
            }
            let prefix = first.get(..common)?;
            if prefix.len() <= partial.len() {
                return None;
            }
            prefix.to_owned()
        }
    };

    Some(format!("{}{replacement}", buffer.get(..start)?))
}

#[allow(clippy::print_stdout)]
pub fn print_prompt() {
    print!("\r> ");
    io::stdout().flush().ok();
}

pub fn clear_line() {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine)
    )
    .ok();
}
