// main.rs      anigif command
//
// Copyright (c) 2019-2026  Douglas Lau
//
#![forbid(unsafe_code)]

use anigif::{Config, Encoder, PixelFormat};
use clap::{App, AppSettings, Arg, ArgMatches};
use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::str::FromStr;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Crate version
const VERSION: &str = std::env!("CARGO_PKG_VERSION");

/// Main entry point
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder().format_timestamp(None).init();
    let mut out = StandardStream::stdout(ColorChoice::Auto);
    let matches = create_app().get_matches();
    let res = wrap(&mut out, &matches);
    if let Err(e) = &res {
        let mut red = ColorSpec::new();
        red.set_fg(Some(Color::Red)).set_intense(true);
        out.set_color(&red)?;
        writeln!(out, "error: {}", e)?;
    }
    out.reset()?;
    res
}

/// Create clap App
fn create_app() -> App<'static, 'static> {
    App::new("anigif")
        .version(VERSION)
        .about("Encode raw frames into an animated GIF")
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(
            Arg::with_name("width")
                .short("W")
                .long("width")
                .takes_value(true)
                .required(true)
                .validator(is_number::<u16>)
                .help("frame width"),
        )
        .arg(
            Arg::with_name("height")
                .short("H")
                .long("height")
                .takes_value(true)
                .required(true)
                .validator(is_number::<u16>)
                .help("frame height"),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .takes_value(true)
                .possible_values(&["bgr", "rgb", "bgra", "rgba"])
                .default_value("rgba")
                .help("pixel format of frames"),
        )
        .arg(
            Arg::with_name("quality")
                .short("q")
                .long("quality")
                .takes_value(true)
                .default_value("10")
                .validator(is_number::<u8>)
                .help("quantization quality (1 is best, 30 is fastest)"),
        )
        .arg(
            Arg::with_name("delay")
                .short("d")
                .long("delay")
                .takes_value(true)
                .default_value("10")
                .validator(is_number::<u16>)
                .help("frame delay (centiseconds)"),
        )
        .arg(
            Arg::with_name("loop")
                .short("l")
                .long("loop")
                .takes_value(true)
                .default_value("0")
                .validator(is_number::<u16>)
                .help("loop count (0 is endless)"),
        )
        .arg(
            Arg::with_name("no-loop")
                .long("no-loop")
                .help("play only once"),
        )
        .arg(
            Arg::with_name("global")
                .short("g")
                .long("global")
                .help("use a global color map"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true)
                .help("output GIF file"),
        )
        .arg(
            Arg::with_name("frames")
                .required(true)
                .min_values(1)
                .help("raw frame file(s)"),
        )
}

/// Validate a numeric argument
fn is_number<T: FromStr>(v: String) -> Result<(), String> {
    v.parse::<T>()
        .map(|_| ())
        .map_err(|_| format!("invalid number: {}", v))
}

/// Get a numeric argument
fn number<T: FromStr + Default>(matches: &ArgMatches, name: &str) -> T {
    matches
        .value_of(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

/// Get the pixel format argument
fn pixel_format(matches: &ArgMatches) -> PixelFormat {
    match matches.value_of("format") {
        Some("bgr") => PixelFormat::Bgr,
        Some("rgb") => PixelFormat::Rgb,
        Some("bgra") => PixelFormat::Bgra,
        _ => PixelFormat::Rgba,
    }
}

/// Wrap raw frames into a GIF file
fn wrap(
    out: &mut StandardStream,
    matches: &ArgMatches,
) -> Result<(), Box<dyn Error>> {
    let mut magenta = ColorSpec::new();
    magenta.set_fg(Some(Color::Magenta));
    let mut yellow = ColorSpec::new();
    yellow.set_fg(Some(Color::Yellow)).set_intense(true);
    let mut bold = ColorSpec::new();
    bold.set_fg(Some(Color::White))
        .set_intense(true)
        .set_bold(true);
    let width: u16 = number(matches, "width");
    let height: u16 = number(matches, "height");
    let format = pixel_format(matches);
    let delay: u16 = number(matches, "delay");
    let frames: Vec<&OsStr> = matches
        .values_of_os("frames")
        .map(|v| v.collect())
        .unwrap_or_default();
    let output = matches.value_of_os("output").unwrap_or_default();
    let config = Config::new(width, height)
        .with_quality(number(matches, "quality"))
        .with_loop_count(number(matches, "loop"))
        .with_no_loop(matches.is_present("no-loop"))
        .with_global_color_map(matches.is_present("global"))
        .with_pre_alloc_sz(
            usize::from(width) * usize::from(height) * 3 * frames.len(),
        );
    let mut enc = Encoder::with_file(output, config)?;
    enc.begin_stream()?;
    out.set_color(&yellow)?;
    writeln!(out, " Fr#  Delay  File")?;
    for (n, path) in frames.iter().enumerate() {
        let pixels = fs::read(path)?;
        enc.encode_frame(format, &pixels, width, height, delay)?;
        out.set_color(&bold)?;
        write!(out, "{:>4}", n)?;
        out.set_color(&ColorSpec::new())?;
        writeln!(
            out,
            " {:6.2}  {}",
            f32::from(delay) / 100.0,
            path.to_string_lossy()
        )?;
    }
    enc.end_stream()?;
    out.set_color(&magenta)?;
    writeln!(
        out,
        "{}: {}x{}, frames: {}",
        output.to_string_lossy(),
        width,
        height,
        enc.n_frames()
    )?;
    Ok(())
}
