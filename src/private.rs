// private.rs
//
// Copyright (c) 2019-2026  Douglas Lau
//
//! Private module for top-level items
use crate::block::*;
use crate::convert::{convert, PixelFormat};
use crate::encode::BlockEnc;
use crate::error::{Error, Result};
use crate::quantize::{Palette, Quantizer, BEST_QUALITY, WORST_QUALITY};
use pix::gray::Gray8;
use pix::Raster;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Stream configuration
///
/// ## Example
/// ```
/// use anigif::Config;
///
/// let config = Config::new(320, 240)
///     .with_quality(5)
///     .with_loop_count(2)
///     .with_pre_alloc_sz(320 * 240 * 3);
/// assert_eq!(config.quality(), 5);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Logical screen width
    width: u16,
    /// Logical screen height
    height: u16,
    /// Quantization quality (1 is best, 30 is fastest)
    quality: u8,
    /// Use one color table for all frames
    global_color_map: bool,
    /// Loop count (0 is endless)
    loop_count: u16,
    /// Play only once, ignoring loop count
    no_loop: bool,
    /// Working buffer size hint, in bytes
    pre_alloc_sz: usize,
}

impl Config {
    /// Create a new stream configuration.
    ///
    /// Defaults: quality 10, local color maps, endless looping.
    pub fn new(width: u16, height: u16) -> Self {
        Config {
            width,
            height,
            quality: 10,
            global_color_map: false,
            loop_count: 0,
            no_loop: false,
            pre_alloc_sz: 0,
        }
    }

    /// Set the quantization quality (1..=30, 1 is best)
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Use a global color map, shared by all frames.
    ///
    /// All frames must have the same size as the logical screen, and are
    /// retained in memory until the stream is ended.
    pub fn with_global_color_map(mut self, global_color_map: bool) -> Self {
        self.global_color_map = global_color_map;
        self
    }

    /// Set the loop count.
    ///
    /// Zero means loop forever; `n` means the animation plays `n + 1` times.
    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Play the animation only once, regardless of loop count
    pub fn with_no_loop(mut self, no_loop: bool) -> Self {
        self.no_loop = no_loop;
        self
    }

    /// Set the working buffer size hint (bytes).
    ///
    /// With a global color map, this should be `width * height * 3 *
    /// n_frames`; otherwise the largest encoded frame size.  It never
    /// changes the output.
    pub fn with_pre_alloc_sz(mut self, pre_alloc_sz: usize) -> Self {
        self.pre_alloc_sz = pre_alloc_sz;
        self
    }

    /// Get the logical screen width
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Get the logical screen height
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get the quantization quality
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Check if a global color map is used
    pub fn global_color_map(&self) -> bool {
        self.global_color_map
    }

    /// Get the loop count
    pub fn loop_count(&self) -> u16 {
        self.loop_count
    }

    /// Check if looping is disabled
    pub fn no_loop(&self) -> bool {
        self.no_loop
    }

    /// Get the working buffer size hint
    pub fn pre_alloc_sz(&self) -> usize {
        self.pre_alloc_sz
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimensions);
        }
        if !(BEST_QUALITY..=WORST_QUALITY).contains(&self.quality) {
            return Err(Error::InvalidQuality(self.quality));
        }
        Ok(())
    }

    /// Make the preamble blocks
    fn preamble(&self, palette: Option<&Palette>) -> Preamble {
        let (tbl, global_color_table) = match palette {
            Some(palette) => (
                palette.color_table_config(),
                Some(GlobalColorTable::with_colors(&palette.color_table())),
            ),
            None => (ColorTableConfig::default(), None),
        };
        let logical_screen_desc = LogicalScreenDesc::default()
            .with_screen_width(self.width)
            .with_screen_height(self.height)
            .with_color_table_config(tbl);
        let loop_count_ext = if self.no_loop {
            None
        } else {
            Some(Application::with_loop_count(self.loop_count))
        };
        Preamble {
            header: Header::default(),
            logical_screen_desc,
            global_color_table,
            loop_count_ext,
        }
    }
}

/// Output sink for an encoded stream
pub enum Sink {
    /// Buffered file
    File(BufWriter<File>),
    /// Growable memory buffer
    Memory(Vec<u8>),
}

impl Sink {
    /// Create a file sink
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Sink::File(BufWriter::new(File::create(path)?)))
    }

    /// Create a memory sink, with initial capacity (bytes)
    pub fn memory(capacity: usize) -> Self {
        Sink::Memory(Vec::with_capacity(capacity))
    }

    /// Get the encoded bytes of a memory sink
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Sink::File(_) => None,
            Sink::Memory(buf) => Some(buf),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::File(w) => w.write(buf),
            Sink::Memory(w) => w.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::File(w) => w.write_all(buf),
            Sink::Memory(w) => w.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::File(w) => w.flush(),
            Sink::Memory(w) => w.flush(),
        }
    }
}

/// Stream state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Stream not yet started
    Unopened,
    /// Stream started, frames may be encoded
    Opened,
    /// Trailer written
    Closed,
}

/// Animated GIF encoder session
///
/// Frames are quantized, compressed and written one at a time, in order.
/// Each frame is encoded completely in memory before any of it is written,
/// so a failed frame never leaves partial data in the output.
///
/// With a global color map, frames are retained until
/// [end_stream](#method.end_stream), when one palette is built from all of
/// them and the whole stream is written.
///
/// ## Example
/// ```
/// use anigif::{Config, Encoder, PixelFormat};
///
/// # fn main() -> Result<(), anigif::Error> {
/// let config = Config::new(2, 2).with_quality(10);
/// let mut enc = Encoder::with_memory(config);
/// enc.begin_stream()?;
/// let red = [255u8, 0, 0, 255].repeat(4);
/// enc.encode_frame(PixelFormat::Rgba, &red, 2, 2, 10)?;
/// enc.end_stream()?;
/// let gif = enc.into_inner().into_bytes().unwrap();
/// assert_eq!(&gif[..6], b"GIF89a");
/// assert_eq!(gif.last(), Some(&0x3B));
/// # Ok(())
/// # }
/// ```
pub struct Encoder<W: Write> {
    /// Writer for output data
    writer: W,
    /// Stream configuration
    config: Config,
    /// Color quantizer
    quantizer: Quantizer,
    /// Current state
    state: State,
    /// Number of encoded frames
    n_frames: usize,
    /// Delay of each retained frame (centiseconds)
    delays: Vec<u16>,
    /// Working buffer: retained samples (global) or encoded frame (local)
    buffer: Vec<u8>,
}

impl Encoder<Sink> {
    /// Create an encoder writing to a file
    pub fn with_file<P: AsRef<Path>>(path: P, config: Config) -> Result<Self> {
        Ok(Self::new(Sink::create(path)?, config))
    }

    /// Create an encoder writing to a memory buffer
    pub fn with_memory(config: Config) -> Self {
        let capacity = config.pre_alloc_sz();
        Self::new(Sink::memory(capacity), config)
    }
}

impl<W: Write> Encoder<W> {
    /// Create a new encoder session.
    ///
    /// Nothing is written until [begin_stream](#method.begin_stream).
    pub fn new(writer: W, config: Config) -> Self {
        let quantizer = Quantizer::new(config.quality());
        Encoder {
            writer,
            config,
            quantizer,
            state: State::Unopened,
            n_frames: 0,
            delays: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Get the stream configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the number of frames encoded
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Get a reference to the writer
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Get the writer, ending the session
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Begin the stream.
    ///
    /// Validates the configuration and (without a global color map) writes
    /// the header, logical screen descriptor and loop extension.
    pub fn begin_stream(&mut self) -> Result<()> {
        match self.state {
            State::Unopened => (),
            State::Opened => return Err(Error::AlreadyOpen),
            State::Closed => return Err(Error::AlreadyClosed),
        }
        self.config.validate()?;
        self.buffer = Vec::with_capacity(self.config.pre_alloc_sz());
        if !self.config.global_color_map() {
            let mut enc = BlockEnc::new(&mut self.buffer);
            enc.encode_preamble(self.config.preamble(None))?;
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        debug!(
            "begin stream: {}x{}, quality {}, global: {}",
            self.config.width(),
            self.config.height(),
            self.config.quality(),
            self.config.global_color_map()
        );
        self.state = State::Opened;
        Ok(())
    }

    /// Encode one frame.
    ///
    /// * `format`: Pixel format of `pixels`
    /// * `pixels`: Raw pixel data (`width * height * channels` bytes)
    /// * `width`, `height`: Frame size
    /// * `delay_cs`: Delay time (centiseconds)
    pub fn encode_frame(
        &mut self,
        format: PixelFormat,
        pixels: &[u8],
        width: u16,
        height: u16,
        delay_cs: u16,
    ) -> Result<()> {
        match self.state {
            State::Unopened => return Err(Error::NotOpen),
            State::Opened => (),
            State::Closed => return Err(Error::AlreadyClosed),
        }
        self.check_geometry(width, height)?;
        let raster = convert(format, pixels, width, height)?;
        if self.config.global_color_map() {
            self.buffer.extend_from_slice(raster.as_u8_slice());
            self.delays.push(delay_cs);
        } else {
            let quantized = self.quantizer.quantize(&raster)?;
            let frame = make_frame(
                &quantized.indexed,
                &quantized.palette,
                true,
                delay_cs,
            );
            self.buffer.clear();
            BlockEnc::new(&mut self.buffer).encode_frame(frame)?;
            self.writer.write_all(&self.buffer)?;
            debug!(
                "frame {}: {} colors, {} bytes",
                self.n_frames,
                quantized.palette.len(),
                self.buffer.len()
            );
        }
        self.n_frames += 1;
        Ok(())
    }

    /// Check frame size against the logical screen
    fn check_geometry(&self, width: u16, height: u16) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions);
        }
        let screen = (self.config.width(), self.config.height());
        let fits = if self.config.global_color_map() {
            (width, height) == screen
        } else {
            width <= screen.0 && height <= screen.1
        };
        if fits {
            if (width, height) != screen {
                warn!("frame {}x{} smaller than screen", width, height);
            }
            Ok(())
        } else {
            Err(Error::GeometryMismatch {
                frame: (width, height),
                screen,
            })
        }
    }

    /// End the stream.
    ///
    /// Writes any retained frames, followed by the trailer, and flushes
    /// the writer.  The working buffer is released even on failure.
    pub fn end_stream(&mut self) -> Result<()> {
        match self.state {
            State::Unopened => return Err(Error::NotOpen),
            State::Opened => (),
            State::Closed => return Err(Error::AlreadyClosed),
        }
        self.state = State::Closed;
        let buffer = std::mem::take(&mut self.buffer);
        let delays = std::mem::take(&mut self.delays);
        let mut enc = BlockEnc::new(&mut self.writer);
        if self.config.global_color_map() {
            let palette = self.quantizer.build_palette(&buffer)?;
            debug!("global palette: {} colors", palette.len());
            enc.encode_preamble(self.config.preamble(Some(&palette)))?;
            let (width, height) = (self.config.width(), self.config.height());
            let frame_len = usize::from(width) * usize::from(height) * 3;
            for (samples, delay_cs) in buffer.chunks_exact(frame_len).zip(delays)
            {
                let indexed = Raster::<Gray8>::with_u8_buffer(
                    width.into(),
                    height.into(),
                    palette.index_samples(samples),
                );
                enc.encode_frame(make_frame(&indexed, &palette, false, delay_cs))?;
            }
        }
        enc.encode(Trailer::default())?;
        self.writer.flush()?;
        debug!("end stream: {} frames", self.n_frames);
        Ok(())
    }
}

/// Make the blocks for one frame.
///
/// With `local` set, the palette is written as a local color table;
/// otherwise indices refer to the global color table.
fn make_frame(
    indexed: &Raster<Gray8>,
    palette: &Palette,
    local: bool,
    delay_cs: u16,
) -> Frame {
    let mut graphic_control_ext = GraphicControl::default();
    graphic_control_ext.set_disposal_method(DisposalMethod::Keep);
    graphic_control_ext.set_delay_time_cs(delay_cs);
    let tbl = palette.color_table_config();
    let (desc_tbl, local_color_table) = if local {
        (tbl, Some(LocalColorTable::with_colors(&palette.color_table())))
    } else {
        (ColorTableConfig::default(), None)
    };
    let image_desc = ImageDesc::default()
        .with_width(indexed.width() as u16)
        .with_height(indexed.height() as u16)
        .with_color_table_config(desc_tbl);
    let image_data = ImageData::with_indexed(indexed, tbl.min_code_size());
    Frame {
        graphic_control_ext,
        image_desc,
        local_color_table,
        image_data,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn red(n_pixels: usize) -> Vec<u8> {
        [255u8, 0, 0].repeat(n_pixels)
    }

    #[test]
    fn state_machine() {
        let mut enc = Encoder::new(Vec::new(), Config::new(2, 2));
        assert!(matches!(
            enc.encode_frame(PixelFormat::Rgb, &red(4), 2, 2, 0),
            Err(Error::NotOpen)
        ));
        assert!(matches!(enc.end_stream(), Err(Error::NotOpen)));
        assert!(enc.writer().is_empty());
        enc.begin_stream().unwrap();
        assert!(matches!(enc.begin_stream(), Err(Error::AlreadyOpen)));
        enc.encode_frame(PixelFormat::Rgb, &red(4), 2, 2, 0).unwrap();
        enc.end_stream().unwrap();
        let len = enc.writer().len();
        assert!(matches!(
            enc.encode_frame(PixelFormat::Rgb, &red(4), 2, 2, 0),
            Err(Error::AlreadyClosed)
        ));
        assert!(matches!(enc.end_stream(), Err(Error::AlreadyClosed)));
        assert!(matches!(enc.begin_stream(), Err(Error::AlreadyClosed)));
        assert_eq!(enc.writer().len(), len);
        assert_eq!(enc.n_frames(), 1);
    }

    #[test]
    fn invalid_config() {
        let mut enc = Encoder::new(Vec::new(), Config::new(0, 2));
        assert!(matches!(enc.begin_stream(), Err(Error::InvalidDimensions)));
        let config = Config::new(2, 2).with_quality(0);
        let mut enc = Encoder::new(Vec::new(), config);
        assert!(matches!(enc.begin_stream(), Err(Error::InvalidQuality(0))));
        let config = Config::new(2, 2).with_quality(31);
        let mut enc = Encoder::new(Vec::new(), config);
        assert!(matches!(enc.begin_stream(), Err(Error::InvalidQuality(31))));
        // still unopened
        assert!(matches!(enc.end_stream(), Err(Error::NotOpen)));
    }

    #[test]
    fn failed_frame_writes_nothing() {
        let mut enc = Encoder::new(Vec::new(), Config::new(2, 2));
        enc.begin_stream().unwrap();
        let len = enc.writer().len();
        assert!(matches!(
            enc.encode_frame(PixelFormat::Rgb, &red(3), 2, 2, 0),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            enc.encode_frame(PixelFormat::Rgb, &red(9), 3, 3, 0),
            Err(Error::GeometryMismatch { .. })
        ));
        assert!(matches!(
            enc.encode_frame(PixelFormat::Rgb, &[], 0, 2, 0),
            Err(Error::InvalidDimensions)
        ));
        assert_eq!(enc.writer().len(), len);
        assert_eq!(enc.n_frames(), 0);
        enc.end_stream().unwrap();
        assert_eq!(enc.writer().len(), len + 1);
    }

    #[test]
    fn global_geometry() {
        let config = Config::new(4, 4).with_global_color_map(true);
        let mut enc = Encoder::new(Vec::new(), config);
        enc.begin_stream().unwrap();
        // preamble deferred until end of stream
        assert!(enc.writer().is_empty());
        enc.encode_frame(PixelFormat::Rgb, &red(16), 4, 4, 5).unwrap();
        assert!(matches!(
            enc.encode_frame(PixelFormat::Rgb, &red(4), 2, 2, 5),
            Err(Error::GeometryMismatch {
                frame: (2, 2),
                screen: (4, 4)
            })
        ));
        enc.end_stream().unwrap();
        assert_eq!(enc.n_frames(), 1);
        let gif = enc.into_inner();
        assert_eq!(&gif[..6], b"GIF89a");
        // global color table flag
        assert_eq!(gif[10] & 0x80, 0x80);
        assert_eq!(gif.last(), Some(&0x3B));
    }

    #[test]
    fn pre_alloc_is_hint() {
        let frames: Vec<Vec<u8>> = (0..3u8)
            .map(|f| (0..48u8).map(|i| i.wrapping_mul(f + 7)).collect())
            .collect();
        let encode = |pre_alloc_sz| {
            let config = Config::new(4, 4).with_pre_alloc_sz(pre_alloc_sz);
            let mut enc = Encoder::with_memory(config);
            enc.begin_stream().unwrap();
            for f in &frames {
                enc.encode_frame(PixelFormat::Bgr, f, 4, 4, 3).unwrap();
            }
            enc.end_stream().unwrap();
            enc.into_inner().into_bytes().unwrap()
        };
        assert_eq!(encode(0), encode(1 << 16));
    }

    /// Writer which fails once a byte limit would be exceeded
    struct Limited {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "sink full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn io_error_keeps_session() {
        // header (6) + screen (7) + trailer (1)
        let writer = Limited {
            written: vec![],
            limit: 14,
        };
        let config = Config::new(4, 4).with_no_loop(true);
        let mut enc = Encoder::new(writer, config);
        enc.begin_stream().unwrap();
        let res = enc.encode_frame(PixelFormat::Rgb, &red(16), 4, 4, 0);
        assert!(matches!(res, Err(Error::Io(_))));
        assert_eq!(enc.n_frames(), 0);
        assert_eq!(enc.writer().written.len(), 13);
        enc.end_stream().unwrap();
        assert_eq!(enc.writer().written.last(), Some(&0x3B));
        assert_eq!(enc.writer().written.len(), 14);
    }

    #[test]
    fn io_error_at_end() {
        let writer = Limited {
            written: vec![],
            limit: 13,
        };
        let config = Config::new(4, 4).with_no_loop(true);
        let mut enc = Encoder::new(writer, config);
        enc.begin_stream().unwrap();
        assert!(matches!(enc.end_stream(), Err(Error::Io(_))));
        assert!(matches!(enc.end_stream(), Err(Error::AlreadyClosed)));
        assert_eq!(enc.into_inner().written.len(), 13);
    }

    #[test]
    fn empty_stream() {
        let config = Config::new(8, 8).with_no_loop(true);
        let mut enc = Encoder::new(Vec::new(), config);
        enc.begin_stream().unwrap();
        enc.end_stream().unwrap();
        let gif = enc.into_inner();
        assert_eq!(
            gif,
            [b'G', b'I', b'F', b'8', b'9', b'a', 8, 0, 8, 0, 0, 0, 0, 0x3B]
        );
    }
}
