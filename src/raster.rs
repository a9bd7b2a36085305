//! Things that can be looked at pixel by pixel: planar images, transparency
//! masks, and sprites that combine the two.

use std::fmt;

use crate::planar::{self, Planar, Rgb, PALETTE};

/// The color index `to_indexed` uses for transparent pixels, one past the
/// end of the EGA palette.
pub const TRANSPARENT_INDEX: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pixel {
    /// An opaque pixel of the given palette color.
    Index(u8),
    Transparent,
}

/// A rectangular grid of pixels.
pub trait Raster {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn pixel_at(&self, x: usize, y: usize) -> Pixel;
}

impl Raster for Planar {
    fn width(&self) -> usize {
        Planar::width(self)
    }

    fn height(&self) -> usize {
        Planar::height(self)
    }

    fn pixel_at(&self, x: usize, y: usize) -> Pixel {
        Pixel::Index(self.index_at(x, y))
    }
}

/// Flattens `raster` into one palette index per pixel, row-major, using
/// `TRANSPARENT_INDEX` for transparent pixels.
pub fn to_indexed<R: Raster + ?Sized>(raster: &R) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(raster.width() * raster.height());
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            pixels.push(match raster.pixel_at(x, y) {
                Pixel::Index(index) => index,
                Pixel::Transparent => TRANSPARENT_INDEX,
            });
        }
    }
    pixels
}

/// Flattens `raster` into RGBA bytes, row-major. Transparent pixels are
/// `[0, 0, 0, 0]`.
pub fn to_rgba<R: Raster + ?Sized>(raster: &R) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(4 * raster.width() * raster.height());
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            match raster.pixel_at(x, y) {
                Pixel::Index(index) => {
                    let [r, g, b]: Rgb = PALETTE[index as usize & 0x0f];
                    rgba.extend_from_slice(&[r, g, b, 0xff]);
                }
                Pixel::Transparent => rgba.extend_from_slice(&[0, 0, 0, 0]),
            }
        }
    }
    rgba
}

/// A 1-bit transparency mask, packed like a single bitplane. A set bit is
/// transparent; a clear bit is opaque black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    bits: Vec<u8>,
}

impl Mask {
    pub fn new(width: usize, height: usize, bits: Vec<u8>) -> Result<Self, planar::Error> {
        let expected = planar::plane_len(width, height);
        if bits.len() != expected {
            return Err(planar::Error::InvalidBufferSize { expected, actual: bits.len() });
        }
        Ok(Self { width, height, bits })
    }

    /// # Panics
    ///
    /// Panics if (`x`, `y`) is outside the mask.
    pub fn is_transparent(&self, x: usize, y: usize) -> bool {
        assert!(x < self.width && y < self.height, "pixel ({}, {}) outside {}×{} mask", x, y, self.width, self.height);
        let pos = y * self.width + x;
        (self.bits[pos / 8] >> (7 - pos % 8)) & 0x01 != 0
    }
}

impl Raster for Mask {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn pixel_at(&self, x: usize, y: usize) -> Pixel {
        if self.is_transparent(x, y) {
            Pixel::Transparent
        } else {
            Pixel::Index(0)
        }
    }
}

/// A sprite frame: a 16×16 planar image with a transparency mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    image: Planar,
    mask: Mask,
}

impl Sprite {
    pub const WIDTH: usize = 16;
    pub const HEIGHT: usize = 16;
    /// The length of the planar part of a frame.
    pub const PLANES_LEN: usize = planar::NUM_PLANES * Self::MASK_LEN;
    /// The length of the mask part of a frame.
    pub const MASK_LEN: usize = Self::WIDTH * Self::HEIGHT / 8;
    /// The length of a whole frame as stored in sprite files.
    pub const FRAME_LEN: usize = Self::PLANES_LEN + Self::MASK_LEN;

    /// Splits a stored frame into its image and mask.
    pub fn from_frame(frame: &[u8]) -> Result<Self, planar::Error> {
        if frame.len() != Self::FRAME_LEN {
            return Err(planar::Error::InvalidBufferSize { expected: Self::FRAME_LEN, actual: frame.len() });
        }
        let (planes, mask) = frame.split_at(Self::PLANES_LEN);
        Ok(Self {
            image: Planar::new(Self::WIDTH, Self::HEIGHT, planes.to_vec())?,
            mask: Mask::new(Self::WIDTH, Self::HEIGHT, mask.to_vec())?,
        })
    }

    pub fn image(&self) -> &Planar {
        &self.image
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }
}

impl Raster for Sprite {
    fn width(&self) -> usize {
        Self::WIDTH
    }

    fn height(&self) -> usize {
        Self::HEIGHT
    }

    fn pixel_at(&self, x: usize, y: usize) -> Pixel {
        if self.mask.is_transparent(x, y) {
            Pixel::Transparent
        } else {
            self.image.pixel_at(x, y)
        }
    }
}

impl fmt::Display for Sprite {
    /// Draws the sprite as text, one hex digit per opaque pixel and `.` for
    /// transparent ones.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for y in 0..Self::HEIGHT {
            for x in 0..Self::WIDTH {
                match self.pixel_at(x, y) {
                    Pixel::Index(index) => write!(f, "{:x}", index)?,
                    Pixel::Transparent => write!(f, ".")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(color: u8, transparent_rows: usize) -> Vec<u8> {
        let mut frame = Vec::new();
        for p in 0..planar::NUM_PLANES {
            let byte = if (color >> p) & 1 != 0 { 0xff } else { 0x00 };
            frame.extend(std::iter::repeat(byte).take(Sprite::MASK_LEN));
        }
        // Two mask bytes per 16-pixel row.
        frame.extend(std::iter::repeat(0xff).take(2 * transparent_rows));
        frame.extend(std::iter::repeat(0x00).take(Sprite::MASK_LEN - 2 * transparent_rows));
        frame
    }

    #[test]
    fn test_sprite_frame() {
        assert_eq!(Sprite::FRAME_LEN, 160);
        let sprite = Sprite::from_frame(&frame(12, 3)).unwrap();
        let pixels = to_indexed(&sprite);
        assert_eq!(pixels.len(), 256);
        assert!(pixels[..48].iter().all(|&p| p == TRANSPARENT_INDEX));
        assert!(pixels[48..].iter().all(|&p| p == 12));
        assert_eq!(to_indexed(sprite.image()), vec![12; 256]);
    }

    #[test]
    fn test_sprite_wrong_size() {
        assert_eq!(
            Sprite::from_frame(&[0; 128]),
            Err(planar::Error::InvalidBufferSize { expected: 160, actual: 128 }),
        );
    }

    #[test]
    fn test_mask() {
        let mask = Mask::new(8, 2, vec![0x81, 0x00]).unwrap();
        assert_eq!(mask.pixel_at(0, 0), Pixel::Transparent);
        assert_eq!(mask.pixel_at(1, 0), Pixel::Index(0));
        assert_eq!(mask.pixel_at(7, 0), Pixel::Transparent);
        assert_eq!(mask.pixel_at(0, 1), Pixel::Index(0));
        assert_eq!(&to_rgba(&mask)[..8], &[0, 0, 0, 0, 0, 0, 0, 0xff]);
    }

    #[test]
    #[should_panic(expected = "outside 8×2 mask")]
    fn test_mask_past_row_end() {
        Mask::new(8, 2, vec![0x00, 0xff]).unwrap().is_transparent(9, 0);
    }

    #[test]
    fn test_sprite_display() {
        let sprite = Sprite::from_frame(&frame(10, 15)).unwrap();
        let text = sprite.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "................");
        assert_eq!(lines[15], "aaaaaaaaaaaaaaaa");
    }
}
