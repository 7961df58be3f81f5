// error.rs
//
// Copyright (c) 2019-2026  Douglas Lau
//
use std::fmt;
use std::io;

/// Errors encountered while encoding
#[derive(Debug)]
pub enum Error {
    /// A wrapped I/O error from the output sink.
    Io(io::Error),
    /// Unrecognized [PixelFormat](enum.PixelFormat.html) tag.
    InvalidFormat(u8),
    /// Pixel buffer length does not match the declared frame dimensions.
    DimensionMismatch {
        /// Length of the pixel buffer
        len: usize,
        /// Expected length (width * height * channels)
        expected: usize,
    },
    /// Frame size differs from the stream size in global color map mode,
    /// or does not fit on the logical screen.
    GeometryMismatch {
        /// Frame width and height
        frame: (u16, u16),
        /// Logical screen width and height
        screen: (u16, u16),
    },
    /// Stream has not been opened with
    /// [begin_stream](struct.Encoder.html#method.begin_stream).
    NotOpen,
    /// Stream has already been opened.
    AlreadyOpen,
    /// Stream has already been closed with
    /// [end_stream](struct.Encoder.html#method.end_stream).
    AlreadyClosed,
    /// Color index not less than the LZW clear code.
    InvalidIndex(u8),
    /// Palette built with more than 256 entries.
    PaletteOverflow(usize),
    /// Width or height is zero.
    InvalidDimensions,
    /// Quality outside of 1..=30.
    InvalidQuality(u8),
}

/// Anigif result type
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(fmt),
            Error::DimensionMismatch { len, expected } => write!(
                fmt,
                "pixel buffer length {len} does not match expected {expected}"
            ),
            Error::GeometryMismatch { frame, screen } => write!(
                fmt,
                "frame {}x{} does not match screen {}x{}",
                frame.0, frame.1, screen.0, screen.1
            ),
            _ => fmt::Debug::fmt(self, fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
