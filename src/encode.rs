// encode.rs
//
// Copyright (c) 2019-2026  Douglas Lau
//
//! GIF89a block formatting
use crate::block::*;
use crate::error::Result;
use crate::lzw::{Compressor, SUB_BLOCK_MAX};
use std::io::Write;

/// Block encoder, formats [Block]s into a writer.
///
/// [Block]: block/enum.Block.html
pub struct BlockEnc<W: Write> {
    /// Writer for output data
    writer: W,
}

impl<W: Write> BlockEnc<W> {
    /// Create a new block encoder
    pub fn new(writer: W) -> Self {
        BlockEnc { writer }
    }

    /// Get the inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Encode one block
    pub fn encode<B>(&mut self, block: B) -> Result<()>
    where
        B: Into<Block>,
    {
        use crate::block::Block::*;
        let w = &mut self.writer;
        match block.into() {
            Header(b) => b.format(w),
            LogicalScreenDesc(b) => b.format(w),
            GlobalColorTable(b) => b.format(w),
            GraphicControl(b) => b.format(w),
            Application(b) => b.format(w),
            ImageDesc(b) => b.format(w),
            LocalColorTable(b) => b.format(w),
            ImageData(b) => b.format(w),
            Trailer(b) => b.format(w),
        }
    }

    /// Encode preamble blocks
    pub fn encode_preamble(&mut self, preamble: Preamble) -> Result<()> {
        self.encode(preamble.header)?;
        self.encode(preamble.logical_screen_desc)?;
        if let Some(tbl) = preamble.global_color_table {
            self.encode(tbl)?;
        }
        if let Some(ext) = preamble.loop_count_ext {
            self.encode(ext)?;
        }
        Ok(())
    }

    /// Encode the blocks of one frame
    pub fn encode_frame(&mut self, frame: Frame) -> Result<()> {
        self.encode(frame.graphic_control_ext)?;
        self.encode(frame.image_desc)?;
        if let Some(tbl) = frame.local_color_table {
            self.encode(tbl)?;
        }
        self.encode(frame.image_data)
    }
}

impl Header {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(b"GIF")?;
        w.write_all(&self.version())?;
        Ok(())
    }
}

impl LogicalScreenDesc {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(7);
        buf.extend_from_slice(&self.screen_width().to_le_bytes());
        buf.extend_from_slice(&self.screen_height().to_le_bytes());
        buf.push(self.flags());
        buf.push(self.background_color_idx());
        buf.push(self.pixel_aspect_ratio());
        w.write_all(&buf)?;
        Ok(())
    }
}

impl GlobalColorTable {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(self.colors())?;
        Ok(())
    }
}

impl GraphicControl {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(BlockCode::Extension_.signature())?;
        let mut buf = Vec::with_capacity(7);
        buf.push(ExtensionCode::GraphicControl_.into());
        buf.push(4); // block size
        buf.push(self.flags());
        buf.extend_from_slice(&self.delay_time_cs().to_le_bytes());
        buf.push(self.transparent_color_idx());
        buf.push(0); // block size
        w.write_all(&buf)?;
        Ok(())
    }
}

impl Application {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(BlockCode::Extension_.signature())?;
        w.write_all(&[ExtensionCode::Application_.into()])?;
        for c in self.app_data() {
            debug_assert!(c.len() <= SUB_BLOCK_MAX);
            w.write_all(&[c.len() as u8])?; // block size
            w.write_all(c)?;
        }
        w.write_all(&[0])?; // block size
        Ok(())
    }
}

impl ImageDesc {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(BlockCode::ImageDesc_.signature())?;
        let mut buf = Vec::with_capacity(9);
        buf.extend_from_slice(&self.left().to_le_bytes());
        buf.extend_from_slice(&self.top().to_le_bytes());
        buf.extend_from_slice(&self.width().to_le_bytes());
        buf.extend_from_slice(&self.height().to_le_bytes());
        buf.push(self.flags());
        w.write_all(&buf)?;
        Ok(())
    }
}

impl LocalColorTable {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(self.colors())?;
        Ok(())
    }
}

impl ImageData {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buffer = Vec::with_capacity(self.data().len() / 2 + 5);
        buffer.push(self.min_code_size());
        Compressor::new(self.min_code_size())
            .compress(self.data(), &mut buffer)?;
        trace!(
            "image data: {} indices, {} bytes",
            self.data().len(),
            buffer.len()
        );
        w.write_all(&buffer)?;
        Ok(())
    }
}

impl Trailer {
    fn format<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(BlockCode::Trailer_.signature())?;
        Ok(())
    }
}
