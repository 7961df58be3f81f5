// convert.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Pixel format conversion
use crate::error::{Error, Result};
use pix::rgb::SRgb8;
use pix::Raster;

/// Pixel format of raw frame data (8 bits per channel)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Blue, green, red
    Bgr,
    /// Red, green, blue
    Rgb,
    /// Blue, green, red, alpha
    Bgra,
    /// Red, green, blue, alpha
    Rgba,
}

impl TryFrom<u8> for PixelFormat {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        use self::PixelFormat::*;
        match tag {
            1 => Ok(Bgr),
            2 => Ok(Rgb),
            3 => Ok(Bgra),
            4 => Ok(Rgba),
            _ => Err(Error::InvalidFormat(tag)),
        }
    }
}

impl From<PixelFormat> for u8 {
    fn from(format: PixelFormat) -> Self {
        use self::PixelFormat::*;
        match format {
            Bgr => 1,
            Rgb => 2,
            Bgra => 3,
            Rgba => 4,
        }
    }
}

impl PixelFormat {
    /// Get the number of channels
    pub fn channels(self) -> usize {
        use self::PixelFormat::*;
        match self {
            Bgr | Rgb => 3,
            Bgra | Rgba => 4,
        }
    }

    /// Get the offsets of red, green and blue channels
    fn offsets(self) -> [usize; 3] {
        use self::PixelFormat::*;
        match self {
            Bgr | Bgra => [2, 1, 0],
            Rgb | Rgba => [0, 1, 2],
        }
    }
}

/// Get the expected buffer length for a frame
pub(crate) fn buffer_len(format: PixelFormat, width: u16, height: u16) -> usize {
    usize::from(width) * usize::from(height) * format.channels()
}

/// Convert raw pixel data to an sRGB raster.
///
/// Alpha channels are dropped.
pub fn convert(
    format: PixelFormat,
    bytes: &[u8],
    width: u16,
    height: u16,
) -> Result<Raster<SRgb8>> {
    let expected = buffer_len(format, width, height);
    if bytes.len() != expected {
        return Err(Error::DimensionMismatch {
            len: bytes.len(),
            expected,
        });
    }
    let buf = match format {
        PixelFormat::Rgb => bytes.to_vec(),
        _ => {
            let [r, g, b] = format.offsets();
            let mut buf = Vec::with_capacity(expected / format.channels() * 3);
            for px in bytes.chunks_exact(format.channels()) {
                buf.extend_from_slice(&[px[r], px[g], px[b]]);
            }
            buf
        }
    };
    Ok(Raster::with_u8_buffer(width.into(), height.into(), buf))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_tags() {
        assert_eq!(PixelFormat::try_from(1).unwrap(), PixelFormat::Bgr);
        assert_eq!(PixelFormat::try_from(4).unwrap(), PixelFormat::Rgba);
        assert!(matches!(
            PixelFormat::try_from(0),
            Err(Error::InvalidFormat(0))
        ));
        assert!(matches!(
            PixelFormat::try_from(5),
            Err(Error::InvalidFormat(5))
        ));
        for tag in 1..=4 {
            let format = PixelFormat::try_from(tag).unwrap();
            assert_eq!(u8::from(format), tag);
        }
    }

    #[test]
    fn rgb() {
        let r = convert(PixelFormat::Rgb, &[1, 2, 3, 4, 5, 6], 2, 1).unwrap();
        assert_eq!(r.width(), 2);
        assert_eq!(r.height(), 1);
        assert_eq!(r.as_u8_slice(), [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn bgr() {
        let r = convert(PixelFormat::Bgr, &[1, 2, 3, 4, 5, 6], 1, 2).unwrap();
        assert_eq!(r.as_u8_slice(), [3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn drop_alpha() {
        let px = [10, 20, 30, 0, 40, 50, 60, 255];
        let r = convert(PixelFormat::Rgba, &px, 2, 1).unwrap();
        assert_eq!(r.as_u8_slice(), [10, 20, 30, 40, 50, 60]);
        let r = convert(PixelFormat::Bgra, &px, 2, 1).unwrap();
        assert_eq!(r.as_u8_slice(), [30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn dimension_mismatch() {
        let res = convert(PixelFormat::Rgba, &[0; 12], 2, 2);
        assert!(matches!(
            res,
            Err(Error::DimensionMismatch {
                len: 12,
                expected: 16
            })
        ));
        let res = convert(PixelFormat::Rgb, &[0; 13], 2, 2);
        assert!(res.is_err());
    }
}
