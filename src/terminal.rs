//! Terminal output and input handling.
//!
//! The renderer only needs three things from a terminal: its size in
//! character cells, a way to place one glyph at a cell, and a flush. The
//! [`Terminal`] trait captures that contract; [`CrosstermTerminal`] is the
//! stock implementation driving the real terminal through crossterm.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, size, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};

/// Character-cell output device consumed by frame presentation.
pub trait Terminal {
    /// Current size in cells (columns, rows).
    fn size(&self) -> (u32, u32);

    /// Place one glyph at cell `(x, y)`, `(0, 0)` top-left. May buffer
    /// until [`Terminal::flush`].
    fn put(&mut self, x: u32, y: u32, glyph: char) -> io::Result<()>;

    /// Wipe the screen.
    fn clear(&mut self) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// The real terminal: alternate screen, raw mode, hidden cursor. All of it
/// is restored when the value is dropped.
pub struct CrosstermTerminal {
    out: io::Stdout,
    width: u32,
    height: u32,
}

impl CrosstermTerminal {
    pub fn new() -> io::Result<Self> {
        let mut out = io::stdout();
        enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All))?;
        let (width, height) = size()?;
        Ok(Self {
            out,
            width: u32::from(width),
            height: u32::from(height),
        })
    }
}

impl Terminal for CrosstermTerminal {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn put(&mut self, x: u32, y: u32, glyph: char) -> io::Result<()> {
        queue!(self.out, MoveTo(x as u16, y as u16), Print(glyph))
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for CrosstermTerminal {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Input relevant to the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    None,
    Quit,
    Resize(u32, u32),
}

/// Poll for the next input event, waiting at most `timeout`.
pub fn poll_event(timeout: Duration) -> io::Result<TerminalEvent> {
    if event::poll(timeout)? {
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Ok(TerminalEvent::Quit),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(TerminalEvent::Quit)
                }
                _ => {}
            },
            Event::Resize(width, height) => {
                return Ok(TerminalEvent::Resize(u32::from(width), u32::from(height)))
            }
            _ => {}
        }
    }
    Ok(TerminalEvent::None)
}

/// Caps the main loop at a target frame rate.
pub struct FrameLimiter {
    frame_target: Duration,
    previous: Instant,
}

impl FrameLimiter {
    pub fn new(target_fps: u32) -> Self {
        Self {
            frame_target: Duration::from_secs(1) / target_fps,
            previous: Instant::now(),
        }
    }

    /// Sleeps out the remainder of the frame budget and returns the time
    /// elapsed since the previous call, in seconds.
    pub fn wait_and_get_delta(&mut self) -> f32 {
        let elapsed = self.previous.elapsed();
        if elapsed < self.frame_target {
            thread::sleep(self.frame_target - elapsed);
        }
        let now = Instant::now();
        let delta = now - self.previous;
        self.previous = now;
        delta.as_secs_f32()
    }
}

/// In-memory terminal capturing emitted glyphs, for pipeline tests.
#[cfg(test)]
pub(crate) struct RecordingTerminal {
    width: u32,
    height: u32,
    pub glyphs: std::collections::HashMap<(u32, u32), char>,
    pub flushes: usize,
    pub clears: usize,
}

#[cfg(test)]
impl RecordingTerminal {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            glyphs: std::collections::HashMap::new(),
            flushes: 0,
            clears: 0,
        }
    }
}

#[cfg(test)]
impl Terminal for RecordingTerminal {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn put(&mut self, x: u32, y: u32, glyph: char) -> io::Result<()> {
        self.glyphs.insert((x, y), glyph);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        self.glyphs.clear();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
