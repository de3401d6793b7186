use clap::{Parser, ValueEnum};
use std::fmt;

/// where the module is looked for if nothing else is given; this is what
/// `wasm-pack` names the output of a crate called `chip8`
pub const DEFAULT_URL: &str = "./chip8_bg.wasm";

/// how often the drawing surface is repainted
pub const FRAME_RATE_HZ: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0x00, 0x00, 0x00);
    pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);

    /// mix `self` over `under`, where alpha 0 is all `under` and 255 is all `self`
    pub fn over(self, under: Rgb, alpha: u8) -> Rgb {
        let mix = |top: u8, bottom: u8| {
            let a = alpha as u16;
            ((top as u16 * a + bottom as u16 * (255 - a) + 127) / 255) as u8
        };
        Rgb(
            mix(self.0, under.0),
            mix(self.1, under.1),
            mix(self.2, under.2),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// parse `RRGGBB`, with or without a leading `#`
pub fn parse_rgb(s: &str) -> Result<Rgb, String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(format!("expected a colour like 1a2b3c, got `{}`", s));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| format!("`{}` is not a hex colour", s))
    };
    Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// What happens to a pixel whose frame byte is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlphaPolicy {
    /// put its alpha back to the baseline, so the surface always mirrors the
    /// current frame
    Reset,
    /// leave it alone; once lit a pixel stays lit
    Trail,
}

/// When the module is asked where its frame buffer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AcquirePolicy {
    /// once after loading (and again only if its memory changes size)
    Once,
    /// before every tick; lets `next_frame` advance the module
    EveryTick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub url: String,
    pub alpha_policy: AlphaPolicy,
    pub acquire_policy: AcquirePolicy,
    /// RGB of every surface pixel; alpha is where the surface starts
    pub baseline: Rgb,
    pub baseline_alpha: u8,
    /// what shows through transparent pixels
    pub backdrop: Rgb,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            url: DEFAULT_URL.to_string(),
            alpha_policy: AlphaPolicy::Reset,
            acquire_policy: AcquirePolicy::Once,
            baseline: Rgb::BLACK,
            baseline_alpha: 0xff,
            backdrop: Rgb::WHITE,
        }
    }
}

/// Paint the frame buffer of a WebAssembly CHIP-8 module in the terminal.
///
/// Press Esc or q to quit. Set RUST_LOG (and redirect stderr) to see logs.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// http(s) URL, file:// URL or path of the compiled module
    #[arg(default_value = DEFAULT_URL)]
    pub url: String,

    /// what to do with pixels that are off in the current frame
    #[arg(long, value_enum, default_value_t = AlphaPolicy::Reset)]
    pub policy: AlphaPolicy,

    /// when to ask the module for the frame buffer offset
    #[arg(long, value_enum, default_value_t = AcquirePolicy::Once)]
    pub acquire: AcquirePolicy,

    /// surface colour, RRGGBB
    #[arg(long, value_parser = parse_rgb, default_value = "000000")]
    pub color: Rgb,

    /// colour seen through transparent pixels, RRGGBB
    #[arg(long, value_parser = parse_rgb, default_value = "ffffff")]
    pub backdrop: Rgb,
}

impl From<Args> for DisplayConfig {
    fn from(args: Args) -> Self {
        DisplayConfig {
            url: args.url,
            alpha_policy: args.policy,
            acquire_policy: args.acquire,
            baseline: args.color,
            backdrop: args.backdrop,
            ..DisplayConfig::default()
        }
    }
}
