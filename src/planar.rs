//! The EGA 16-color planar pixel format.
//!
//! A planar image stores four bitplanes one after another. Each plane holds
//! one bit of every pixel's 4-bit color index, row-major, 8 pixels per byte,
//! most significant bit first. Plane 0 holds the least significant bit.

use std::fmt;

/// An opaque RGB color.
pub type Rgb = [u8; 3];

/// The number of bitplanes in a planar image.
pub const NUM_PLANES: usize = 4;

/// The fixed EGA palette.
pub const PALETTE: [Rgb; 16] = [
    [0x00, 0x00, 0x00], //  0 black
    [0x00, 0x00, 0xaa], //  1 blue
    [0x00, 0xaa, 0x00], //  2 green
    [0x00, 0xaa, 0xaa], //  3 cyan
    [0xaa, 0x00, 0x00], //  4 red
    [0xaa, 0x00, 0xaa], //  5 magenta
    [0xaa, 0x55, 0x00], //  6 brown
    [0xaa, 0xaa, 0xaa], //  7 light gray
    [0x55, 0x55, 0x55], //  8 dark gray
    [0x55, 0x55, 0xff], //  9 light blue
    [0x55, 0xff, 0x55], // 10 light green
    [0x55, 0xff, 0xff], // 11 light cyan
    [0xff, 0x55, 0x55], // 12 light red
    [0xff, 0x55, 0xff], // 13 light magenta
    [0xff, 0xff, 0x55], // 14 yellow
    [0xff, 0xff, 0xff], // 15 white
];

/// Returns the index of the palette entry closest to `rgb` by squared
/// Euclidean distance. Ties go to the lowest index.
pub fn nearest_color(rgb: Rgb) -> u8 {
    let distance = |entry: &Rgb| -> u32 {
        entry.iter().zip(rgb.iter())
            .map(|(&a, &b)| {
                let d = a as i32 - b as i32;
                (d * d) as u32
            })
            .sum()
    };
    // min_by_key returns the first of several equal minima.
    PALETTE.iter()
        .enumerate()
        .min_by_key(|&(_, entry)| distance(entry))
        .map_or(0, |(i, _)| i as u8)
}

#[test]
fn test_nearest_color() {
    for (i, &entry) in PALETTE.iter().enumerate() {
        assert_eq!(nearest_color(entry), i as u8);
    }
    assert_eq!(nearest_color([0x10, 0x10, 0x10]), 0);
    assert_eq!(nearest_color([0xf0, 0xf0, 0xf0]), 15);
    assert_eq!(nearest_color([0xa0, 0x50, 0x08]), 6);
    // Equidistant from 0 (black) and 1 (blue).
    assert_eq!(nearest_color([0x00, 0x00, 0x55]), 0);
}

/// A planar codec error.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// A plane or pixel buffer does not have the length its dimensions call
    /// for.
    InvalidBufferSize { expected: usize, actual: usize },
    /// The width is not a multiple of 8.
    UnsupportedWidth { width: usize },
    /// A pixel's color index does not fit in 4 bits.
    InvalidColorIndex { offset: usize, index: u8 },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidBufferSize { expected, actual } =>
                write!(f, "buffer of {} bytes does not match expected size of {} bytes", actual, expected),
            Error::UnsupportedWidth { width } =>
                write!(f, "width {} is not a multiple of 8", width),
            Error::InvalidColorIndex { offset, index } =>
                write!(f, "color index {} at pixel {} is out of range", index, offset),
        }
    }
}

/// Returns the length of one bitplane of a `width`×`height` image.
pub fn plane_len(width: usize, height: usize) -> usize {
    (width * height + 7) / 8
}

/// A 4-plane EGA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planar {
    width: usize,
    height: usize,
    planes: Vec<u8>,
}

impl Planar {
    /// Wraps `planes`, which must be exactly `4 * plane_len(width, height)`
    /// bytes.
    pub fn new(width: usize, height: usize, planes: Vec<u8>) -> Result<Self, Error> {
        let expected = NUM_PLANES * plane_len(width, height);
        if planes.len() != expected {
            return Err(Error::InvalidBufferSize { expected, actual: planes.len() });
        }
        Ok(Self { width, height, planes })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The raw plane bytes, all four planes in sequence.
    pub fn planes(&self) -> &[u8] {
        &self.planes
    }

    /// Returns bitplane `p`.
    pub fn plane(&self, p: usize) -> &[u8] {
        let len = plane_len(self.width, self.height);
        &self.planes[p * len..(p + 1) * len]
    }

    pub fn into_planes(self) -> Vec<u8> {
        self.planes
    }

    /// Returns the 4-bit color index of the pixel at (`x`, `y`).
    ///
    /// # Panics
    ///
    /// Panics if (`x`, `y`) is outside the image.
    pub fn index_at(&self, x: usize, y: usize) -> u8 {
        assert!(x < self.width && y < self.height, "pixel ({}, {}) outside {}×{} image", x, y, self.width, self.height);
        let len = plane_len(self.width, self.height);
        let pos = y * self.width + x;
        let q = pos / 8;
        let r = 7 - pos % 8;
        (0..NUM_PLANES).fold(0, |index, p| {
            index | ((self.planes[p * len + q] >> r) & 0x01) << p
        })
    }
}

/// Decodes `image` into one color index per pixel, row-major.
pub fn decode(image: &Planar) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(image.width * image.height);
    for y in 0..image.height {
        for x in 0..image.width {
            pixels.push(image.index_at(x, y));
        }
    }
    pixels
}

/// Encodes row-major color indices into a planar image. `width` must be a
/// multiple of 8.
pub fn encode(pixels: &[u8], width: usize, height: usize) -> Result<Planar, Error> {
    if width % 8 != 0 {
        return Err(Error::UnsupportedWidth { width });
    }
    if pixels.len() != width * height {
        return Err(Error::InvalidBufferSize { expected: width * height, actual: pixels.len() });
    }
    if let Some((offset, &index)) = pixels.iter().enumerate().find(|&(_, &index)| index > 0x0f) {
        return Err(Error::InvalidColorIndex { offset, index });
    }

    let len = plane_len(width, height);
    let mut planes = vec![0; NUM_PLANES * len];
    for p in 0..NUM_PLANES {
        let plane = &mut planes[p * len..(p + 1) * len];
        for (byte, group) in plane.iter_mut().zip(pixels.chunks_exact(8)) {
            *byte = group.iter().enumerate().fold(0, |b, (j, &index)| {
                b | ((index >> p) & 0x01) << (7 - j)
            });
        }
    }
    Ok(Planar { width, height, planes })
}

/// Maps each RGB pixel to its nearest palette color and encodes the result.
pub fn encode_rgb(rgb: &[Rgb], width: usize, height: usize) -> Result<Planar, Error> {
    let pixels: Vec<u8> = rgb.iter().map(|&c| nearest_color(c)).collect();
    encode(&pixels, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bit_order() {
        // 8×1 image: plane 0 = 0x80, plane 1 = 0x01, plane 2 = 0x00,
        // plane 3 = 0xff.
        let image = Planar::new(8, 1, vec![0x80, 0x01, 0x00, 0xff]).unwrap();
        assert_eq!(decode(&image), vec![9, 8, 8, 8, 8, 8, 8, 10]);
    }

    #[test]
    fn test_new_wrong_size() {
        assert_eq!(
            Planar::new(16, 2, vec![0; 15]),
            Err(Error::InvalidBufferSize { expected: 16, actual: 15 }),
        );
        // Widths that aren't a multiple of 8 still decode, with rows packed
        // continuously.
        let image = Planar::new(4, 4, vec![0xf0, 0x0f, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(image.index_at(0, 0), 1);
        assert_eq!(image.index_at(0, 1), 0);
        assert_eq!(image.index_at(0, 3), 1);
    }

    #[test]
    fn test_encode_errors() {
        assert_eq!(encode(&[0; 12], 12, 1), Err(Error::UnsupportedWidth { width: 12 }));
        assert_eq!(encode(&[0; 15], 8, 2), Err(Error::InvalidBufferSize { expected: 16, actual: 15 }));
        let mut pixels = [0; 8];
        pixels[5] = 16;
        assert_eq!(encode(&pixels, 8, 1), Err(Error::InvalidColorIndex { offset: 5, index: 16 }));
    }

    #[test]
    fn test_encode_planes() {
        let pixels: Vec<u8> = (0..16).collect();
        let image = encode(&pixels, 16, 1).unwrap();
        assert_eq!(image.plane(0), &[0x55, 0x55]);
        assert_eq!(image.plane(1), &[0x33, 0x33]);
        assert_eq!(image.plane(2), &[0x0f, 0x0f]);
        assert_eq!(image.plane(3), &[0x00, 0xff]);
        assert_eq!(image.clone().into_planes(), image.planes());
    }

    #[test]
    #[should_panic(expected = "pixel (8, 0) outside 8×2 image")]
    fn test_index_at_past_row_end() {
        let image = Planar::new(8, 2, vec![0; 8]).unwrap();
        image.index_at(8, 0);
    }

    #[test]
    fn test_encode_rgb() {
        let rgb = [[0xff, 0xff, 0xff], [0x00, 0x00, 0xa0], [0xaa, 0x55, 0x00], [0, 0, 0],
                   [0x58, 0xfc, 0x50], [0xff, 0x50, 0xff], [0x50, 0x50, 0x50], [0xa0, 0xa0, 0xa0]];
        let image = encode_rgb(&rgb, 8, 1).unwrap();
        assert_eq!(decode(&image), vec![15, 1, 6, 0, 10, 13, 8, 7]);
    }
}
