use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use log::debug;
use std::io;
use std::time::Duration;

/// Watches the host for a request to stop. This is the window close button of
/// the terminal world; it knows nothing about CHIP-8 keys.
pub trait Input {
    /// drain whatever events are waiting and say whether any of them asked
    /// us to quit
    fn quit_requested(&mut self) -> Result<bool, io::Error>;
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => true,
        // raw mode swallows SIGINT, so ctrl-c arrives as a key
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// reads key events from the terminal, without blocking
#[derive(Default)]
pub struct TermInput;

impl TermInput {
    pub fn new() -> Self {
        TermInput
    }
}

impl Input for TermInput {
    fn quit_requested(&mut self) -> Result<bool, io::Error> {
        let mut quit = false;
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(key) if is_quit(&key) => quit = true,
                Event::Key(key) => debug!("ignoring key {:?}", key.code),
                _ => {}
            }
        }
        Ok(quit)
    }
}

/// dummy Input implementation for testing; asks to quit on the nth poll
pub struct DummyInput {
    polls_left: usize,
}

impl DummyInput {
    pub fn new(polls: usize) -> Self {
        DummyInput { polls_left: polls }
    }
}

impl Input for DummyInput {
    fn quit_requested(&mut self) -> Result<bool, io::Error> {
        if self.polls_left == 0 {
            return Ok(true);
        }
        self.polls_left -= 1;
        Ok(self.polls_left == 0)
    }
}
