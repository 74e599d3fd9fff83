//! Terminal rendering surface backed by ratatui.

pub mod input;
pub mod render;

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::event;
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use tracing::{debug, warn};

use crate::app::Surface;
use crate::navigator::{Msg, Size, View};

/// Owns the terminal for the session; restores it on drop.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl TerminalSurface {
    pub fn enter() -> Result<Self> {
        enter_screen()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout())).context("create terminal")?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    pub fn size() -> Result<Size> {
        let (width, height) = ratatui::crossterm::terminal::size().context("query terminal size")?;
        Ok(Size { width, height })
    }

    fn leave(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode().context("disable raw mode")?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .context("leave alternate screen")?;
        self.terminal.show_cursor().context("show cursor")?;
        Ok(())
    }
}

fn enter_screen() -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    execute!(io::stdout(), EnterAlternateScreen).context("enter alternate screen")?;
    Ok(())
}

impl Surface for TerminalSurface {
    fn draw(&mut self, view: View<'_>, busy: bool) -> Result<()> {
        self.terminal
            .draw(|frame| render::draw(frame, view, busy))
            .context("draw frame")?;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<Msg>> {
        if !event::poll(timeout).context("poll terminal events")? {
            return Ok(None);
        }
        let event = event::read().context("read terminal event")?;
        Ok(input::map_event(event))
    }

    fn suspend(&mut self) -> Result<()> {
        debug!("handing terminal to child process");
        self.leave()
    }

    fn resume(&mut self) -> Result<()> {
        enter_screen()?;
        self.active = true;
        self.terminal.clear().context("clear terminal")?;
        debug!("terminal resumed");
        Ok(())
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(err) = self.leave() {
            warn!(err = %format!("{err:#}"), "failed to restore terminal");
        }
    }
}
