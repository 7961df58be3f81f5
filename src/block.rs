// block.rs
//
// Copyright (c) 2019-2026  Douglas Lau
//
//! Blocks within a GIF89a stream
use pix::gray::Gray8;
use pix::Raster;

/// Number of channels in a color table entry
const CHANNELS: usize = 3;

/// Color table existence flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTableExistence {
    /// No color table
    Absent,
    /// Color table follows the block
    Present,
}

/// Color table configuration, shared by
/// [LogicalScreenDesc](struct.LogicalScreenDesc.html) and
/// [ImageDesc](struct.ImageDesc.html)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTableConfig {
    existence: ColorTableExistence,
    table_len: usize, // must be between 2...256
}

impl Default for ColorTableConfig {
    fn default() -> Self {
        let existence = ColorTableExistence::Absent;
        let table_len = 2;
        ColorTableConfig {
            existence,
            table_len,
        }
    }
}

impl ColorTableConfig {
    /// Create a color table config for a number of colors.
    ///
    /// The table length is rounded up to a power of two (2..=256).
    pub fn new(existence: ColorTableExistence, n_colors: usize) -> Self {
        let table_len = n_colors.max(2).next_power_of_two().min(256);
        ColorTableConfig {
            existence,
            table_len,
        }
    }

    /// Get the color table existence
    pub fn existence(&self) -> ColorTableExistence {
        self.existence
    }

    /// Get the number of entries in the table (0 if absent)
    pub fn len(&self) -> usize {
        match self.existence {
            ColorTableExistence::Absent => 0,
            ColorTableExistence::Present => self.table_len,
        }
    }

    /// Check if the table is absent
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the size field (table length = 2 << bits)
    fn len_bits(&self) -> u8 {
        let sz = self.table_len;
        for b in 0..7 {
            if (sz >> (b + 1)) == 1 {
                return b;
            }
        }
        7
    }

    /// Get the table size in bytes
    pub fn size_bytes(&self) -> usize {
        self.len() * CHANNELS
    }

    /// Get the LZW minimum code size for images using this table
    pub fn min_code_size(&self) -> u8 {
        (self.len_bits() + 1).max(2)
    }
}

/// Method for disposing of a frame before rendering the next one
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum DisposalMethod {
    /// No disposal specified
    NoAction,
    /// Leave the frame in place
    #[default]
    Keep,
    /// Restore to background color
    Background,
    /// Restore to previous frame
    Previous,
}

impl From<DisposalMethod> for u8 {
    fn from(d: DisposalMethod) -> Self {
        use self::DisposalMethod::*;
        match d {
            NoAction => 0,
            Keep => 1,
            Background => 2,
            Previous => 3,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BlockCode {
    Extension_,
    ImageDesc_,
    Trailer_,
}

impl BlockCode {
    pub fn signature(&self) -> &'static [u8] {
        use self::BlockCode::*;
        match self {
            ImageDesc_ => b",", // (0x2C) Image separator
            Extension_ => b"!", // (0x21) Extension introducer
            Trailer_ => b";",   // (0x3B) GIF trailer
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ExtensionCode {
    GraphicControl_,
    Application_,
}

impl From<ExtensionCode> for u8 {
    fn from(t: ExtensionCode) -> Self {
        use self::ExtensionCode::*;
        match t {
            GraphicControl_ => 0xF9,
            Application_ => 0xFF,
        }
    }
}

/// Header block, always first
#[derive(Clone, Debug)]
pub struct Header {
    version: [u8; 3],
}

impl Default for Header {
    fn default() -> Self {
        Header { version: *b"89a" }
    }
}

impl Header {
    /// Get the version
    pub fn version(&self) -> [u8; 3] {
        self.version
    }
}

/// Logical screen descriptor, follows the header
#[derive(Clone, Debug, Default)]
pub struct LogicalScreenDesc {
    screen_width: u16,
    screen_height: u16,
    flags: u8,
    background_color_idx: u8, // index into global color table
    pixel_aspect_ratio: u8,
}

impl LogicalScreenDesc {
    const COLOR_TABLE_PRESENT: u8 = 0b1000_0000;
    const COLOR_RESOLUTION: u8 = 0b0111_0000;
    const COLOR_TABLE_SIZE: u8 = 0b0000_0111;

    /// Adjust the screen width
    pub fn with_screen_width(mut self, screen_width: u16) -> Self {
        self.screen_width = screen_width;
        self
    }

    /// Get the screen width
    pub fn screen_width(&self) -> u16 {
        self.screen_width
    }

    /// Adjust the screen height
    pub fn with_screen_height(mut self, screen_height: u16) -> Self {
        self.screen_height = screen_height;
        self
    }

    /// Get the screen height
    pub fn screen_height(&self) -> u16 {
        self.screen_height
    }

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Adjust the global color table configuration
    pub fn with_color_table_config(mut self, tbl: ColorTableConfig) -> Self {
        let mut flags = tbl.len_bits() & Self::COLOR_TABLE_SIZE;
        flags |= (flags << 4) & Self::COLOR_RESOLUTION;
        if tbl.existence == ColorTableExistence::Present {
            flags |= Self::COLOR_TABLE_PRESENT;
        }
        self.flags = flags;
        self
    }

    /// Get the background color index
    pub fn background_color_idx(&self) -> u8 {
        self.background_color_idx
    }

    /// Get the pixel aspect ratio
    pub fn pixel_aspect_ratio(&self) -> u8 {
        self.pixel_aspect_ratio
    }
}

/// Global color table, follows the logical screen descriptor
#[derive(Clone, Debug)]
pub struct GlobalColorTable {
    colors: Vec<u8>,
}

impl GlobalColorTable {
    /// Create a global color table from packed RGB values
    pub fn with_colors(colors: &[u8]) -> Self {
        debug_assert_eq!(colors.len() % CHANNELS, 0);
        let colors = colors.to_vec();
        GlobalColorTable { colors }
    }

    /// Get the packed RGB values
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }
}

/// Graphic control extension, precedes each frame
#[derive(Clone, Debug, Default)]
pub struct GraphicControl {
    flags: u8,
    delay_time_cs: u16, // delay in centiseconds (hundredths of a second)
    transparent_color_idx: u8,
}

impl GraphicControl {
    const DISPOSAL_METHOD: u8 = 0b0001_1100;

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Set the disposal method
    pub fn set_disposal_method(&mut self, disposal_method: DisposalMethod) {
        let d: u8 = disposal_method.into();
        self.flags = (self.flags & !Self::DISPOSAL_METHOD) | (d << 2);
    }

    /// Get the delay time (centiseconds)
    pub fn delay_time_cs(&self) -> u16 {
        self.delay_time_cs
    }

    /// Set the delay time (centiseconds)
    pub fn set_delay_time_cs(&mut self, delay_time_cs: u16) {
        self.delay_time_cs = delay_time_cs;
    }

    /// Get the transparent color index (unused, transparent flag unset)
    pub fn transparent_color_idx(&self) -> u8 {
        self.transparent_color_idx
    }
}

/// Application extension
#[derive(Clone, Debug)]
pub struct Application {
    app_data: Vec<Vec<u8>>, // sequence of sub-blocks
}

impl Application {
    /// Create a looping (`NETSCAPE2.0`) application extension.
    ///
    /// A `loop_count` of zero means loop forever.
    pub fn with_loop_count(loop_count: u16) -> Self {
        let app_data = vec![
            b"NETSCAPE2.0".to_vec(),
            vec![1, loop_count as u8, (loop_count >> 8) as u8],
        ];
        Application { app_data }
    }

    /// Get the sub-blocks
    pub fn app_data(&self) -> &[Vec<u8>] {
        &self.app_data
    }

    /// Get the loop count, if this is a looping extension
    pub fn loop_count(&self) -> Option<u16> {
        // NOTE: this block must follow immediately after GlobalColorTable
        //       (or LogicalScreenDesc if there is no GlobalColorTable).
        let d = &self.app_data;
        let exists = d.len() == 2 &&            // 2 sub-blocks
                     d[0] == b"NETSCAPE2.0" &&  // app ID / auth code
                     d[1].len() == 3 &&         // app data sub-block length
                     d[1][0] == 1; // sub-block ID
        if exists {
            Some(u16::from_le_bytes([d[1][1], d[1][2]]))
        } else {
            None
        }
    }
}

/// Image descriptor, one per frame
#[derive(Clone, Debug, Default)]
pub struct ImageDesc {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    flags: u8,
}

impl ImageDesc {
    const COLOR_TABLE_PRESENT: u8 = 0b1000_0000;
    const COLOR_TABLE_SIZE: u8 = 0b0000_0111;

    /// Get the left position
    pub fn left(&self) -> u16 {
        self.left
    }

    /// Get the top position
    pub fn top(&self) -> u16 {
        self.top
    }

    /// Adjust the width
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    /// Get the width
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Adjust the height
    pub fn with_height(mut self, height: u16) -> Self {
        self.height = height;
        self
    }

    /// Get the height
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Get the packed flags
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Adjust the local color table configuration
    pub fn with_color_table_config(mut self, tbl: ColorTableConfig) -> Self {
        let mut flags = tbl.len_bits() & Self::COLOR_TABLE_SIZE;
        if tbl.existence == ColorTableExistence::Present {
            flags |= Self::COLOR_TABLE_PRESENT;
        }
        self.flags = flags;
        self
    }
}

/// Local color table, follows an image descriptor
#[derive(Clone, Debug, Default)]
pub struct LocalColorTable {
    colors: Vec<u8>,
}

impl LocalColorTable {
    /// Create a local color table from packed RGB values
    pub fn with_colors(colors: &[u8]) -> Self {
        debug_assert_eq!(colors.len() % CHANNELS, 0);
        let colors = colors.to_vec();
        LocalColorTable { colors }
    }

    /// Get the packed RGB values
    pub fn colors(&self) -> &[u8] {
        &self.colors
    }
}

/// Image data: color indices, LZW compressed when formatted
#[derive(Clone, Debug)]
pub struct ImageData {
    min_code_size: u8,
    data: Vec<u8>,
}

impl ImageData {
    /// Create image data from an indexed raster
    pub fn with_indexed(raster: &Raster<Gray8>, min_code_size: u8) -> Self {
        ImageData {
            min_code_size: min_code_size.max(2), // must be >= 2
            data: raster.as_u8_slice().to_vec(),
        }
    }

    /// Get the LZW minimum code size
    pub fn min_code_size(&self) -> u8 {
        self.min_code_size
    }

    /// Get the color indices
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Trailer block, always last
#[derive(Clone, Debug, Default)]
pub struct Trailer {}

/// A block within a GIF89a stream
#[derive(Clone, Debug)]
pub enum Block {
    Header(Header),
    LogicalScreenDesc(LogicalScreenDesc),
    GlobalColorTable(GlobalColorTable),
    GraphicControl(GraphicControl),
    Application(Application),
    ImageDesc(ImageDesc),
    LocalColorTable(LocalColorTable),
    ImageData(ImageData),
    Trailer(Trailer),
}

impl From<Header> for Block {
    fn from(b: Header) -> Self {
        Block::Header(b)
    }
}

impl From<LogicalScreenDesc> for Block {
    fn from(b: LogicalScreenDesc) -> Self {
        Block::LogicalScreenDesc(b)
    }
}

impl From<GlobalColorTable> for Block {
    fn from(b: GlobalColorTable) -> Self {
        Block::GlobalColorTable(b)
    }
}

impl From<GraphicControl> for Block {
    fn from(b: GraphicControl) -> Self {
        Block::GraphicControl(b)
    }
}

impl From<Application> for Block {
    fn from(b: Application) -> Self {
        Block::Application(b)
    }
}

impl From<ImageDesc> for Block {
    fn from(b: ImageDesc) -> Self {
        Block::ImageDesc(b)
    }
}

impl From<LocalColorTable> for Block {
    fn from(b: LocalColorTable) -> Self {
        Block::LocalColorTable(b)
    }
}

impl From<ImageData> for Block {
    fn from(b: ImageData) -> Self {
        Block::ImageData(b)
    }
}

impl From<Trailer> for Block {
    fn from(b: Trailer) -> Self {
        Block::Trailer(b)
    }
}

/// Blocks which are written once, before any frame
#[derive(Debug, Default)]
pub struct Preamble {
    pub header: Header,
    pub logical_screen_desc: LogicalScreenDesc,
    pub global_color_table: Option<GlobalColorTable>,
    pub loop_count_ext: Option<Application>,
}

/// Blocks of one frame
#[derive(Debug)]
pub struct Frame {
    pub graphic_control_ext: GraphicControl,
    pub image_desc: ImageDesc,
    pub local_color_table: Option<LocalColorTable>,
    pub image_data: ImageData,
}
