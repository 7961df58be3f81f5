// quantize.rs
//
// Copyright (c) 2026  Douglas Lau
//
//! Color quantization by weighted median cut
use crate::block::{ColorTableConfig, ColorTableExistence};
use crate::error::{Error, Result};
use pix::gray::Gray8;
use pix::rgb::{Rgb, SRgb8};
use pix::Raster;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Maximum number of palette entries
pub const MAX_COLORS: usize = 256;

/// Best (slowest) quality
pub const BEST_QUALITY: u8 = 1;

/// Worst (fastest) quality
pub const WORST_QUALITY: u8 = 30;

/// Refinement passes at best quality
const MAX_PASSES: usize = 16;

/// Number of channels in packed sample data
const CHANNELS: usize = 3;

/// RGB color with channel values
type Color = [u8; 3];

/// Squared euclidean distance between two colors
fn distance_sq(a: Color, b: Color) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| {
            let d = i32::from(*a) - i32::from(*b);
            (d * d) as u32
        })
        .sum()
}

/// Get the channel values of an sRGB color
fn channels(clr: SRgb8) -> Color {
    [
        u8::from(Rgb::red(clr)),
        u8::from(Rgb::green(clr)),
        u8::from(Rgb::blue(clr)),
    ]
}

/// Color palette with at most 256 distinct entries.
///
/// Entries are stored in a [pix::Palette], which rejects duplicates.
#[derive(Clone)]
pub struct Palette {
    table: pix::Palette,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            table: pix::Palette::new(MAX_COLORS),
        }
    }
}

impl fmt::Debug for Palette {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_list()
            .entries(self.entries().iter().map(|c| channels(*c)))
            .finish()
    }
}

impl PartialEq for Palette {
    fn eq(&self, other: &Self) -> bool {
        self.entries() == other.entries()
    }
}

impl Palette {
    /// Create a palette from a list of entries.
    ///
    /// Repeated colors are dropped, keeping the first.
    pub fn with_entries(entries: Vec<SRgb8>) -> Result<Self> {
        let mut palette = Palette::default();
        for clr in &entries {
            if palette.table.set_entry(*clr).is_none() {
                return Err(Error::PaletteOverflow(entries.len()));
            }
        }
        Ok(palette)
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Check if the palette is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Get an entry
    pub fn entry(&self, idx: usize) -> Option<SRgb8> {
        self.table.entry(idx)
    }

    /// Get all entries
    pub fn entries(&self) -> &[SRgb8] {
        self.table.colors()
    }

    /// Get the color table config needed for this palette
    pub fn color_table_config(&self) -> ColorTableConfig {
        ColorTableConfig::new(ColorTableExistence::Present, self.len())
    }

    /// Get packed RGB color table, padded with black entries
    pub fn color_table(&self) -> Vec<u8> {
        let mut colors = self.entries().to_vec();
        colors.resize(self.color_table_config().len(), SRgb8::default());
        let width = colors.len() as u32;
        Raster::<SRgb8>::with_pixels(width, 1, colors)
            .as_u8_slice()
            .to_vec()
    }

    /// Find the nearest entry to a color.
    ///
    /// Ties are broken by lowest index.
    fn nearest(colors: &[Color], clr: Color) -> u8 {
        let mut best = 0;
        let mut best_dist = u32::MAX;
        for (i, c) in colors.iter().enumerate() {
            let dist = distance_sq(*c, clr);
            if dist < best_dist {
                best = i;
                best_dist = dist;
                if dist == 0 {
                    break;
                }
            }
        }
        best as u8
    }

    /// Map packed RGB samples to indices of nearest entries
    pub fn index_samples(&self, samples: &[u8]) -> Vec<u8> {
        let colors: Vec<Color> =
            self.entries().iter().map(|c| channels(*c)).collect();
        let mut cache = HashMap::<Color, u8>::new();
        samples
            .chunks_exact(CHANNELS)
            .map(|px| {
                let clr = [px[0], px[1], px[2]];
                *cache
                    .entry(clr)
                    .or_insert_with(|| Self::nearest(&colors, clr))
            })
            .collect()
    }

    /// Make an indexed raster from an sRGB raster
    pub fn make_indexed(&self, raster: &Raster<SRgb8>) -> Raster<Gray8> {
        let indices = self.index_samples(raster.as_u8_slice());
        Raster::with_u8_buffer(raster.width(), raster.height(), indices)
    }

    /// Calculate mean squared error of packed RGB samples
    pub fn mean_error(&self, samples: &[u8]) -> f64 {
        let n_pixels = samples.len() / CHANNELS;
        if n_pixels == 0 {
            return 0.0;
        }
        let indices = self.index_samples(samples);
        let total: u64 = samples
            .chunks_exact(CHANNELS)
            .zip(indices)
            .map(|(px, idx)| {
                let clr = channels(self.entries()[usize::from(idx)]);
                u64::from(distance_sq(clr, [px[0], px[1], px[2]]))
            })
            .sum();
        total as f64 / n_pixels as f64
    }
}

/// Histogram entry for one distinct color
#[derive(Clone, Copy, Debug)]
struct Entry {
    /// Color value
    clr: Color,
    /// Number of sampled pixels
    count: u32,
}

/// A box of colors for median cut subdivision
#[derive(Debug)]
struct ColorBox {
    entries: Vec<Entry>,
}

impl ColorBox {
    /// Total weight of all entries
    fn weight(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.count)).sum()
    }

    /// Range (max - min) along each axis
    fn ranges(&self) -> [u8; 3] {
        let mut min = [u8::MAX; 3];
        let mut max = [u8::MIN; 3];
        for e in &self.entries {
            for axis in 0..3 {
                min[axis] = min[axis].min(e.clr[axis]);
                max[axis] = max[axis].max(e.clr[axis]);
            }
        }
        [
            max[0].saturating_sub(min[0]),
            max[1].saturating_sub(min[1]),
            max[2].saturating_sub(min[2]),
        ]
    }

    /// Axis with the widest range (red wins ties, then green)
    fn widest_axis(&self) -> (usize, u8) {
        let ranges = self.ranges();
        let mut axis = 0;
        for a in 1..3 {
            if ranges[a] > ranges[axis] {
                axis = a;
            }
        }
        (axis, ranges[axis])
    }

    /// Split priority: heavy boxes with wide ranges split first
    fn priority(&self) -> u64 {
        self.weight() * u64::from(self.widest_axis().1)
    }

    /// Check whether the box can be split
    fn can_split(&self) -> bool {
        self.entries.len() >= 2
    }

    /// Weighted centroid of all entries
    fn centroid(&self) -> Color {
        centroid(self.entries.iter())
    }

    /// Split at the weighted median along the widest axis
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (axis, _) = self.widest_axis();
        self.entries.sort_unstable_by_key(|e| (e.clr[axis], e.clr));
        let half = self.weight() / 2;
        let mut accumulated = 0;
        let mut split_idx = 1;
        for (i, e) in self.entries.iter().enumerate() {
            accumulated += u64::from(e.count);
            if accumulated >= half {
                split_idx = i + 1;
                break;
            }
        }
        // at least one entry per side
        let split_idx = split_idx.clamp(1, self.entries.len() - 1);
        let right = self.entries.split_off(split_idx);
        (ColorBox { entries: self.entries }, ColorBox { entries: right })
    }
}

/// Weighted centroid of entries, rounded
fn centroid<'a>(entries: impl Iterator<Item = &'a Entry>) -> Color {
    let mut sums = [0u64; 3];
    let mut weight = 0u64;
    for e in entries {
        let w = u64::from(e.count);
        for axis in 0..3 {
            sums[axis] += u64::from(e.clr[axis]) * w;
        }
        weight += w;
    }
    if weight == 0 {
        return [0; 3];
    }
    let half = weight / 2;
    [
        ((sums[0] + half) / weight) as u8,
        ((sums[1] + half) / weight) as u8,
        ((sums[2] + half) / weight) as u8,
    ]
}

/// Color quantizer.
///
/// Every quality builds the same histogram of all pixels and the same
/// median cut palette.  Quality ranges from 1 (best / slowest) to 30
/// (worst / fastest), and sets how many passes of weighted k-means refine
/// the median cut centroids: 16 at quality 1, none at quality 30.  Each pass
/// never increases the mean error, so a lower quality is never worse than a
/// higher one.
///
/// Mapping pixels to the palette is always exact, with ties broken by the
/// lowest palette index.
#[derive(Clone, Copy, Debug)]
pub struct Quantizer {
    quality: u8,
}

/// Result of quantizing one raster
pub struct Quantized {
    /// Palette of colors
    pub palette: Palette,
    /// Raster of palette indices
    pub indexed: Raster<Gray8>,
}

impl Default for Quantizer {
    fn default() -> Self {
        Quantizer { quality: 10 }
    }
}

impl Quantizer {
    /// Create a new quantizer (quality clamped to 1..=30)
    pub fn new(quality: u8) -> Self {
        let quality = quality.clamp(BEST_QUALITY, WORST_QUALITY);
        Quantizer { quality }
    }

    /// Get the quality
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Get the maximum number of k-means refinement passes
    fn refine_passes(&self) -> usize {
        let steps = usize::from(WORST_QUALITY - BEST_QUALITY);
        usize::from(WORST_QUALITY - self.quality) * MAX_PASSES / steps
    }

    /// Build a histogram of sample colors
    fn histogram(&self, samples: &[u8]) -> Vec<Entry> {
        let mut counts = BTreeMap::<Color, u32>::new();
        for px in samples.chunks_exact(CHANNELS) {
            *counts.entry([px[0], px[1], px[2]]).or_insert(0) += 1;
        }
        trace!("histogram: {} colors", counts.len());
        counts
            .into_iter()
            .map(|(clr, count)| Entry { clr, count })
            .collect()
    }

    /// Build a palette from packed RGB samples.
    ///
    /// Samples may be pooled from any number of frames.
    pub fn build_palette(&self, samples: &[u8]) -> Result<Palette> {
        let hist = self.histogram(samples);
        let colors: Vec<Color> = if hist.len() <= MAX_COLORS {
            hist.iter().map(|e| e.clr).collect()
        } else {
            let boxes = median_cut(hist, MAX_COLORS);
            let centroids = boxes.iter().map(ColorBox::centroid).collect();
            let entries: Vec<Entry> =
                boxes.into_iter().flat_map(|b| b.entries).collect();
            kmeans_refine(centroids, &entries, self.refine_passes())
        };
        let entries = colors
            .into_iter()
            .map(|[r, g, b]| SRgb8::new(r, g, b))
            .collect();
        let palette = Palette::with_entries(entries)?;
        debug!("palette: {} colors, quality {}", palette.len(), self.quality);
        Ok(palette)
    }

    /// Quantize a raster with its own palette
    pub fn quantize(&self, raster: &Raster<SRgb8>) -> Result<Quantized> {
        let palette = self.build_palette(raster.as_u8_slice())?;
        let indexed = palette.make_indexed(raster);
        Ok(Quantized { palette, indexed })
    }
}

/// Perform weighted median cut, producing at most `max_colors` boxes
fn median_cut(hist: Vec<Entry>, max_colors: usize) -> Vec<ColorBox> {
    let mut boxes = Vec::with_capacity(max_colors);
    boxes.push(ColorBox { entries: hist });
    while boxes.len() < max_colors {
        let mut best: Option<(usize, u64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.can_split() {
                let p = b.priority();
                if best.map_or(true, |(_, bp)| p > bp) {
                    best = Some((i, p));
                }
            }
        }
        let Some((idx, _)) = best else {
            break; // no more splittable boxes
        };
        let (left, right) = boxes.remove(idx).split();
        boxes.insert(idx, right);
        boxes.insert(idx, left);
    }
    boxes
}

/// Refine centroids with passes of weighted k-means.
///
/// Each pass assigns entries to their nearest centroid, then moves every
/// centroid to the rounded mean of its cluster.  Stops early once no
/// centroid moves.
fn kmeans_refine(
    mut centroids: Vec<Color>,
    entries: &[Entry],
    passes: usize,
) -> Vec<Color> {
    for pass in 0..passes {
        let mut clusters: Vec<Vec<Entry>> = vec![Vec::new(); centroids.len()];
        for e in entries {
            let idx = Palette::nearest(&centroids, e.clr);
            clusters[usize::from(idx)].push(*e);
        }
        let mut moved = false;
        for (c, cluster) in centroids.iter_mut().zip(&clusters) {
            if !cluster.is_empty() {
                let mean = centroid(cluster.iter());
                moved |= mean != *c;
                *c = mean;
            }
        }
        if !moved {
            trace!("k-means converged after {} passes", pass);
            break;
        }
    }
    centroids
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut samples = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                samples.push((x * 255 / width) as u8);
                samples.push((y * 255 / height) as u8);
                samples.push(((x + y) * 127 / (width + height)) as u8);
            }
        }
        samples
    }

    #[test]
    fn solid_color() {
        let samples = [255u8, 0, 0].repeat(4);
        let palette = Quantizer::new(10).build_palette(&samples).unwrap();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.entry(0), Some(SRgb8::new(255, 0, 0)));
        assert_eq!(palette.index_samples(&samples), [0, 0, 0, 0]);
        assert_eq!(palette.color_table(), [255, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn few_colors_exact() {
        let mut samples = vec![];
        for i in 0..100u8 {
            samples.extend_from_slice(&[i, i.wrapping_mul(3), 255 - i]);
        }
        let palette = Quantizer::new(BEST_QUALITY).build_palette(&samples).unwrap();
        assert_eq!(palette.len(), 100);
        assert_eq!(palette.mean_error(&samples), 0.0);
    }

    #[test]
    fn palette_bound() {
        let samples = gradient(200, 150);
        for quality in [1, 5, 10, 20, 30] {
            let palette = Quantizer::new(quality).build_palette(&samples).unwrap();
            assert!(palette.len() <= MAX_COLORS);
            assert!(palette.len() > 128);
            let unique: HashSet<Color> =
                palette.entries().iter().map(|c| channels(*c)).collect();
            assert_eq!(unique.len(), palette.len());
        }
    }

    #[test]
    fn overflow() {
        let entries: Vec<SRgb8> = (0..257u32)
            .map(|i| SRgb8::new(i as u8, (i >> 8) as u8, 0))
            .collect();
        assert!(matches!(
            Palette::with_entries(entries),
            Err(Error::PaletteOverflow(257))
        ));
        // repeated colors are dropped
        let entries = vec![SRgb8::new(1, 2, 3); 300];
        let palette = Palette::with_entries(entries).unwrap();
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn nearest_ties() {
        let colors = [[0, 0, 0], [10, 0, 0], [10, 0, 0], [20, 0, 0]];
        assert_eq!(Palette::nearest(&colors, [5, 0, 0]), 0);
        assert_eq!(Palette::nearest(&colors, [10, 0, 0]), 1);
        assert_eq!(Palette::nearest(&colors, [15, 0, 0]), 1);
        assert_eq!(Palette::nearest(&colors, [255, 0, 0]), 3);
    }

    /// Random image drawn from a random set of colors
    fn random_image(seed: u32, n_pixels: usize) -> Vec<u8> {
        let mut state = seed.wrapping_mul(0x9E37_79B9) | 1;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let n_colors = 300 + (next() % 400) as usize;
        let colors: Vec<u32> = (0..n_colors).map(|_| next()).collect();
        let mut samples = Vec::with_capacity(n_pixels * CHANNELS);
        for _ in 0..n_pixels {
            let c = colors[next() as usize % n_colors];
            let clr = [c as u8, (c >> 8) as u8, (c >> 16) as u8];
            samples.extend_from_slice(&clr);
        }
        samples
    }

    #[test]
    fn refine_passes() {
        assert_eq!(Quantizer::new(BEST_QUALITY).refine_passes(), MAX_PASSES);
        assert_eq!(Quantizer::new(WORST_QUALITY).refine_passes(), 0);
        for quality in BEST_QUALITY..WORST_QUALITY {
            let passes = Quantizer::new(quality).refine_passes();
            assert!(Quantizer::new(quality + 1).refine_passes() <= passes);
        }
    }

    #[test]
    fn quality_monotonic() {
        for seed in 1..=6 {
            let samples = random_image(seed, 48 * 32);
            let best = Quantizer::new(BEST_QUALITY)
                .build_palette(&samples)
                .unwrap()
                .mean_error(&samples);
            for quality in BEST_QUALITY + 1..=WORST_QUALITY {
                let err = Quantizer::new(quality)
                    .build_palette(&samples)
                    .unwrap()
                    .mean_error(&samples);
                assert!(
                    best <= err,
                    "seed {seed}, quality {quality}: {best} > {err}"
                );
            }
        }
        let samples = gradient(256, 160);
        let best = Quantizer::new(BEST_QUALITY).build_palette(&samples).unwrap();
        let worst = Quantizer::new(WORST_QUALITY).build_palette(&samples).unwrap();
        assert!(best.mean_error(&samples) <= worst.mean_error(&samples));
    }

    #[test]
    fn kmeans_never_worse() {
        let samples = random_image(42, 40 * 30);
        let mut prev = f64::MAX;
        for passes in 0..6 {
            let quantizer = Quantizer::new(BEST_QUALITY);
            let hist = quantizer.histogram(&samples);
            let boxes = median_cut(hist, MAX_COLORS);
            let centroids = boxes.iter().map(ColorBox::centroid).collect();
            let entries: Vec<Entry> =
                boxes.into_iter().flat_map(|b| b.entries).collect();
            let colors = kmeans_refine(centroids, &entries, passes);
            let palette = Palette::with_entries(
                colors.iter().map(|[r, g, b]| SRgb8::new(*r, *g, *b)).collect(),
            )
            .unwrap();
            let err = palette.mean_error(&samples);
            assert!(err <= prev, "pass {passes}: {err} > {prev}");
            prev = err;
        }
    }

    #[test]
    fn deterministic() {
        let samples = gradient(120, 90);
        let a = Quantizer::new(7).build_palette(&samples).unwrap();
        let b = Quantizer::new(7).build_palette(&samples).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn median_cut_split() {
        let hist = vec![
            Entry { clr: [0, 0, 0], count: 10 },
            Entry { clr: [0, 0, 10], count: 10 },
            Entry { clr: [200, 0, 0], count: 1 },
            Entry { clr: [250, 0, 0], count: 1 },
        ];
        let boxes = median_cut(hist, 2);
        assert_eq!(boxes.len(), 2);
        // split along red axis
        assert_eq!(boxes[0].centroid(), [0, 0, 5]);
        assert_eq!(boxes[1].centroid(), [225, 0, 0]);
    }

    #[test]
    fn quantize_raster() {
        let raster = Raster::<SRgb8>::with_u8_buffer(64, 64, gradient(64, 64));
        let q = Quantizer::default().quantize(&raster).unwrap();
        assert_eq!(q.indexed.width(), 64);
        assert_eq!(q.indexed.height(), 64);
        for idx in q.indexed.as_u8_slice() {
            assert!(usize::from(*idx) < q.palette.len());
        }
    }
}
