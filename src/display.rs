use crate::config::Rgb;
use crate::frame::Resolution;
use crate::surface::Surface;
use crossterm::cursor;
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use log::warn;
use std::collections::BTreeMap;
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders, Paragraph, Wrap};
use tui::Terminal;

/// Display is where the renderer puts finished surfaces. It should abstract
/// the implementation details, so a variety of kinds of screen would work.
pub trait Display {
    /// draw the whole surface at the origin
    fn blit(&mut self, surface: &Surface) -> Result<(), io::Error>;

    /// tell the user something about the state of things
    fn show_status(&mut self, message: &str) -> Result<(), io::Error>;
}

const DEFAULT_TITLE: &str = "CHIP-8";

/// rows kept under the canvas for status messages
const STATUS_ROWS: u16 = 4;

// group pixels by the colour they end up as, so each colour is one draw call
type PointsByColour = BTreeMap<Rgb, Vec<(f64, f64)>>;

fn points_from_surface(surface: &Surface, backdrop: Rgb) -> PointsByColour {
    let resolution = surface.resolution();
    let mut points = PointsByColour::new();
    for (index, colour) in surface.composite(backdrop).enumerate() {
        points
            .entry(colour)
            .or_default()
            .push(resolution.point(index));
    }
    points
}

// the part of `area` that fits on `screen`, if any; tui panics when asked to
// draw outside its buffer
fn clip(area: Rect, screen: Rect) -> Option<Rect> {
    if area.intersects(screen) {
        Some(area.intersection(screen))
    } else {
        None
    }
}

/// A canvas in the terminal, rendered using TUI and crossterm.
///
/// Takes over the screen (raw mode, alternate screen) until dropped.
pub struct TermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
    backdrop: Rgb,
    status: Option<String>,
    last: PointsByColour,
}

impl TermDisplay {
    pub fn new(resolution: Resolution, backdrop: Rgb) -> Result<TermDisplay, io::Error> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;
        Ok(TermDisplay {
            terminal,
            resolution,
            backdrop,
            status: None,
            last: PointsByColour::new(),
        })
    }

    fn render(&mut self) -> Result<(), io::Error> {
        let resolution = self.resolution;
        let backdrop = self.backdrop;
        let status = self.status.as_deref();
        let points = &self.last;

        // for now this assumes a 1:1 ratio between terminal cells and pixels
        self.terminal.draw(|f| {
            let screen = f.size();
            let width = 2 + resolution.width as u16;
            let height = 2 + resolution.height as u16;
            let canvas_area = clip(Rect::new(0, 0, width, height), screen);
            let status_area = clip(Rect::new(0, height, width, STATUS_ROWS), screen);

            let (r, g, b) = (backdrop.0, backdrop.1, backdrop.2);
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(DEFAULT_TITLE)
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Rgb(r, g, b))),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    for (colour, coords) in points {
                        ctx.draw(&Points {
                            coords: coords.as_slice(),
                            color: Color::Rgb(colour.0, colour.1, colour.2),
                        });
                    }
                });
            if let Some(area) = canvas_area {
                f.render_widget(canvas, area);
            }
            if let (Some(message), Some(area)) = (status, status_area) {
                let paragraph = Paragraph::new(message).wrap(Wrap { trim: true });
                f.render_widget(paragraph, area);
            }
        })?;
        Ok(())
    }
}

impl Display for TermDisplay {
    fn blit(&mut self, surface: &Surface) -> Result<(), io::Error> {
        // make sure we're given a surface the size of the canvas
        assert_eq!(
            surface.resolution(),
            self.resolution,
            "TermDisplay must have correct-sized surface to draw"
        );
        self.last = points_from_surface(surface, self.backdrop);
        self.render()
    }

    fn show_status(&mut self, message: &str) -> Result<(), io::Error> {
        self.status = Some(message.to_string());
        self.render()
    }
}

impl Drop for TermDisplay {
    fn drop(&mut self) {
        let restored = terminal::disable_raw_mode()
            .and_then(|_| execute!(io::stdout(), LeaveAlternateScreen, cursor::Show));
        if let Err(e) = restored {
            warn!("couldn't restore the terminal: {}", e);
        }
    }
}

/// useful for testing; remembers what it was asked to show
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub blits: usize,
    pub last: Option<Vec<u8>>,
    pub statuses: Vec<String>,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn blit(&mut self, surface: &Surface) -> Result<(), io::Error> {
        self.blits += 1;
        self.last = Some(surface.data().to_vec());
        Ok(())
    }

    fn show_status(&mut self, message: &str) -> Result<(), io::Error> {
        self.statuses.push(message.to_string());
        Ok(())
    }
}
