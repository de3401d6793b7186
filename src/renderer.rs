//! The per-tick render pass and the loop that drives it.
use crate::config::{AcquirePolicy, DisplayConfig, FRAME_RATE_HZ};
use crate::display::Display;
use crate::frame::{FrameError, FrameView, Resolution, FRAME_LEN};
use crate::input::Input;
use crate::loader::{Loader, ModuleExports, PendingLoad};
use crate::surface::Surface;
use log::{debug, error, info, trace, warn};
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("next_frame trapped: {0}")]
    Trap(#[source] wasmi::Error),
    #[error("display failed: {0}")]
    Io(#[from] io::Error),
}

/// what a tick got up to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// nothing to draw yet (or ever, if the load failed)
    Idle,
    /// the surface was updated and handed to the display
    Drawn { changed: usize },
}

enum LoadState {
    Pending(PendingLoad),
    Ready {
        exports: ModuleExports,
        view: Option<FrameView>,
    },
    Failed,
}

/// Everything the render loop needs, in one place: where the module is up
/// to, the surface and the display it gets drawn on.
pub struct Renderer<D: Display> {
    loader: Loader,
    state: LoadState,
    surface: Surface,
    display: D,
    acquire: AcquirePolicy,
}

impl<D: Display> Renderer<D> {
    /// start loading `config.url` in the background and set up an opaque
    /// surface; ticks are no-ops until the load lands
    pub fn new(loader: Loader, config: &DisplayConfig, display: D) -> Self {
        let pending = loader.spawn(&config.url);
        Renderer::with_state(loader, LoadState::Pending(pending), config, display)
    }

    /// render an already-loaded module
    pub fn from_exports(loader: Loader, exports: ModuleExports, config: &DisplayConfig, display: D) -> Self {
        let state = LoadState::Ready {
            exports,
            view: None,
        };
        Renderer::with_state(loader, state, config, display)
    }

    fn with_state(loader: Loader, state: LoadState, config: &DisplayConfig, display: D) -> Self {
        Renderer {
            loader,
            state,
            surface: Surface::new(
                Resolution::CHIP8,
                config.baseline,
                config.baseline_alpha,
                config.alpha_policy,
            ),
            display,
            acquire: config.acquire_policy,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, LoadState::Pending(_))
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.state, LoadState::Failed)
    }

    /// see whether the load has finished, and deal with the outcome
    fn poll_load(&mut self) {
        let finished = match &self.state {
            LoadState::Pending(pending) => pending.try_finish(&self.loader),
            _ => None,
        };
        match finished {
            None => {}
            Some(Ok(exports)) => {
                self.state = LoadState::Ready {
                    exports,
                    view: None,
                };
            }
            Some(Err(e)) => self.fail(&e.to_string()),
        }
    }

    /// give up on the module for good: log it, tell the user once, go idle
    fn fail(&mut self, message: &str) {
        error!("{}", message);
        if let Err(io_err) = self.display.show_status(message) {
            warn!("couldn't show failure: {}", io_err);
        }
        self.state = LoadState::Failed;
    }

    /// One animation tick: read the frame buffer and repaint.
    pub fn render_tick(&mut self) -> Result<Tick, RenderError> {
        self.poll_load();

        let (exports, view) = match &mut self.state {
            LoadState::Ready { exports, view } => (exports, view),
            _ => return Ok(Tick::Idle),
        };

        // under Once, a first acquisition that goes wrong is final
        let terminal = view.is_none() && self.acquire == AcquirePolicy::Once;
        let reacquire = match view.as_ref() {
            None => true,
            Some(v) if v.is_stale(exports.memory()) => {
                debug!("linear memory changed size; asking for the frame buffer again");
                true
            }
            Some(_) => self.acquire == AcquirePolicy::EveryTick,
        };
        if reacquire {
            // forget the old view first, so a failure here is retried next tick
            *view = None;
            match acquire(exports) {
                Ok(acquired) => {
                    if self.acquire == AcquirePolicy::Once {
                        info!("frame buffer at {:#x}", acquired.offset());
                    }
                    *view = Some(acquired);
                }
                Err(e) if terminal => {
                    self.fail(&format!("couldn't find the frame buffer: {}", e));
                    return Ok(Tick::Idle);
                }
                Err(e) => return Err(e),
            }
        }

        let frame = match view.as_ref() {
            Some(v) => v.read(exports.memory())?,
            None => return Ok(Tick::Idle),
        };
        let changed = self.surface.apply(frame);
        trace!("{} pixels changed", changed);
        self.display.blit(&self.surface)?;
        Ok(Tick::Drawn { changed })
    }

    /// Tick at [`FRAME_RATE_HZ`] until `input` asks to stop. A tick that
    /// fails is logged and the loop carries on.
    pub fn run(&mut self, input: &mut impl Input) -> Result<(), io::Error> {
        let period = Duration::from_secs_f64(1.0 / FRAME_RATE_HZ);
        let mut next = Instant::now();
        loop {
            // book the next tick before doing this one's work
            next += period;
            if input.quit_requested()? {
                return Ok(());
            }
            if let Err(e) = self.render_tick() {
                warn!("tick failed: {}", e);
            }
            let now = Instant::now();
            if next > now {
                spin_sleep::sleep(next - now);
            } else {
                // running behind; don't try to catch up with a burst of ticks
                next = now;
            }
        }
    }
}

/// ask the module for its frame buffer and check it fits in memory
fn acquire(exports: &mut ModuleExports) -> Result<FrameView, RenderError> {
    let offset = exports.next_frame().map_err(RenderError::Trap)?;
    Ok(FrameView::new(offset, FRAME_LEN, exports.memory())?)
}
