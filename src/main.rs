use std::error::Error;

use chip8_frame::config::{Args, DisplayConfig};
use chip8_frame::display::TermDisplay;
use chip8_frame::frame::Resolution;
use chip8_frame::input::TermInput;
use chip8_frame::loader::Loader;
use chip8_frame::renderer::Renderer;
use clap::Parser;
use log::info;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let config = DisplayConfig::from(Args::parse());
    info!("starting with {:?}", config);

    // initialise
    let display = TermDisplay::new(Resolution::CHIP8, config.backdrop)?;
    let mut input = TermInput::new();
    let mut renderer = Renderer::new(Loader::default(), &config, display);

    renderer.run(&mut input)?;
    Ok(())
}
