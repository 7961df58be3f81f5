// lib.rs      anigif crate.
//
// Copyright (c) 2019-2026  Douglas Lau
//
//! Animated GIF encoder.
//!
//! Raw frames (BGR, RGB, BGRA or RGBA) are quantized to a palette of at
//! most 256 colors, LZW compressed and written as a GIF89a stream.
//!
//! * [Encoder] sequences a stream: `begin_stream`, `encode_frame`,
//!   `end_stream`
//! * [Quantizer] builds palettes by weighted median cut
//! * [lzw] compresses color indices
//! * [block] contains the GIF89a blocks
//!
//! [block]: block/index.html
//! [Encoder]: struct.Encoder.html
//! [lzw]: lzw/index.html
//! [Quantizer]: struct.Quantizer.html
#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod block;
mod convert;
mod encode;
mod error;
pub mod lzw;
mod private;
mod quantize;

pub use crate::convert::{convert, PixelFormat};
pub use crate::encode::BlockEnc;
pub use crate::error::{Error, Result};
pub use crate::private::{Config, Encoder, Sink};
pub use crate::quantize::{
    Palette, Quantized, Quantizer, BEST_QUALITY, MAX_COLORS, WORST_QUALITY,
};
