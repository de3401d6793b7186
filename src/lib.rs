//! Paint the frame buffer of a compiled CHIP-8 module.
//!
//! ## Design
//!
//! * the interpreter is somebody else's problem: it lives in a WebAssembly
//!   module that exports `next_frame() -> i32` and its `memory`
//! * the frame is 64x32 bytes, row-major, 1 means lit
//! * abstract display so can plug alternatives; starting with TUI in-console
//! * one context object owns everything; no globals
//!
//! Model
//!
//! main
//!  |-- config (command line)
//!  |-- display, input
//!  |-- renderer(loader, display, config)
//!  |    |-- loader.spawn(url)        // fetch on a worker thread
//!  |    `-- surface(config)          // RGBA, opaque to start
//!  `-- renderer.run(input)
//!       |-- pending load finished?   // compile + instantiate here
//!       |    |-- ok  => ask next_frame() where the frame is
//!       |    `-- err => show it, then idle for good
//!       |-- surface.apply(frame)     // lit pixels go transparent
//!       |-- display.blit(surface)
//!       `-- sleep until the next tick (60 Hz)
pub mod config;
pub mod display;
pub mod frame;
pub mod input;
pub mod loader;
pub mod renderer;
pub mod surface;

#[cfg(test)]
mod testing;
