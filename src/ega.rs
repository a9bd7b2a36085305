//! Full-screen EGA image files, such as title screens.
//!
//! The usual layout is a little-endian `u16` plane size, followed by the four
//! bitplanes of a 320×200 planar image, each compressed as its own
//! run-length stream (see the `rle` module). No block crosses from one plane
//! into the next. The earliest release of the game stored the four planes
//! uncompressed, with no plane size; set `Options::rle` to `false` for those.
//!
//! # References
//!
//! * <http://www.shikadi.net/moddingwiki/Captain_Comic_Image_Format#File_format>

use std::fmt;
use std::io::{self, Read};

use tracing::{debug, warn};

use crate::planar::{self, Planar, NUM_PLANES};
use crate::read_full;
use crate::rle;

pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 200;
/// The plane size of a 320×200 image.
pub const PLANE_SIZE: u16 = 8000;

/// How an image file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Whether the planes are run-length compressed and preceded by a plane
    /// size.
    pub rle: bool,
    pub width: usize,
    pub height: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { rle: true, width: WIDTH, height: HEIGHT }
    }
}

impl Options {
    /// The length of one decoded bitplane.
    pub fn plane_len(&self) -> usize {
        planar::plane_len(self.width, self.height)
    }
}

/// Bytes left over after a complete image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingData {
    /// Where the image ended.
    pub offset: u64,
    pub len: u64,
}

impl fmt::Display for TrailingData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} bytes of trailing data after image ending at offset {}", self.len, self.offset)
    }
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// A plane's run-length stream is malformed. `offset` is where the
    /// plane's stream starts.
    Rle { plane: usize, offset: u64, err: rle::Error },
    Planar(planar::Error),
    /// The input ended inside the plane size.
    TruncatedHeader { len: usize },
    /// The stored plane size is not the one the dimensions call for.
    PlaneSizeMismatch { expected: usize, actual: u16 },
    /// The plane size is too large to store.
    PlaneSizeTooLarge { plane_len: usize },
    /// The input ended before a plane was complete.
    TruncatedPlane { plane: usize, expected: usize, actual: usize },
    /// A run-length block continues past the end of a plane.
    BlockCrossesPlane { plane: usize, offset: u64 },
    /// The image does not have the dimensions given in `Options`.
    ImageSize { expected: (usize, usize), actual: (usize, usize) },
    TrailingData(TrailingData),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Rle { err, .. } => Some(err),
            Error::Planar(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Rle { plane, offset, err } =>
                write!(f, "plane {} at offset {}: {}", plane, offset, err),
            Error::Planar(err) => err.fmt(f),
            Error::TruncatedHeader { len } =>
                write!(f, "plane size truncated after {} bytes", len),
            Error::PlaneSizeMismatch { expected, actual } =>
                write!(f, "got plane size {}, expected {}", actual, expected),
            Error::PlaneSizeTooLarge { plane_len } =>
                write!(f, "plane size {} is too large to represent", plane_len),
            Error::TruncatedPlane { plane, expected, actual } =>
                write!(f, "plane {} truncated after {} of {} bytes", plane, actual, expected),
            Error::BlockCrossesPlane { plane, offset } =>
                write!(f, "run-length block at end of plane {} continues past offset {}", plane, offset),
            Error::ImageSize { expected, actual } =>
                write!(f, "image is {}×{}, expected {}×{}", actual.0, actual.1, expected.0, expected.1),
            Error::TrailingData(trailing) => trailing.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<planar::Error> for Error {
    fn from(err: planar::Error) -> Self {
        Error::Planar(err)
    }
}

/// The result of `unpack`.
#[derive(Debug)]
pub struct Unpacked {
    pub image: Planar,
    /// Set if there were bytes after the image.
    pub trailing: Option<TrailingData>,
}

impl Unpacked {
    /// Returns the image, treating trailing data as an error.
    pub fn strict(self) -> Result<Planar, Error> {
        match self.trailing {
            Some(trailing) => Err(Error::TrailingData(trailing)),
            None => Ok(self.image),
        }
    }
}

/// Reads an image file. The whole input is consumed, so that trailing data
/// can be noticed.
pub fn unpack<R: Read>(mut input: R, options: &Options) -> Result<Unpacked, Error> {
    let plane_len = options.plane_len();
    let mut offset: u64 = 0;

    if options.rle {
        let mut buf = [0; 2];
        let n = read_full(&mut input, &mut buf)?;
        if n < buf.len() {
            return Err(Error::TruncatedHeader { len: n });
        }
        let actual = u16::from_le_bytes(buf);
        if actual as usize != plane_len {
            return Err(Error::PlaneSizeMismatch { expected: plane_len, actual });
        }
        offset += buf.len() as u64;
    }

    let mut planes = vec![0; NUM_PLANES * plane_len];
    for plane in 0..NUM_PLANES {
        let buf = &mut planes[plane * plane_len..(plane + 1) * plane_len];
        let actual = if options.rle {
            let mut decoder = rle::Decoder::new(&mut input);
            let n = decoder.fill(buf)
                .map_err(|err| Error::Rle { plane, offset, err })?;
            offset += decoder.position();
            if n == plane_len && !decoder.is_idle() {
                return Err(Error::BlockCrossesPlane { plane, offset });
            }
            n
        } else {
            let n = read_full(&mut input, buf)?;
            offset += n as u64;
            n
        };
        if actual < plane_len {
            return Err(Error::TruncatedPlane { plane, expected: plane_len, actual });
        }
        debug!("plane {} ends at offset {}", plane, offset);
    }

    let trailing = match io::copy(&mut input, &mut io::sink())? {
        0 => None,
        len => {
            let trailing = TrailingData { offset, len };
            warn!("{}", trailing);
            Some(trailing)
        }
    };

    Ok(Unpacked {
        image: Planar::new(options.width, options.height, planes)?,
        trailing,
    })
}

/// Writes `image` in the layout given by `options`.
pub fn pack(image: &Planar, options: &Options) -> Result<Vec<u8>, Error> {
    if (image.width(), image.height()) != (options.width, options.height) {
        return Err(Error::ImageSize {
            expected: (options.width, options.height),
            actual: (image.width(), image.height()),
        });
    }

    if !options.rle {
        return Ok(image.planes().to_vec());
    }

    let plane_len = options.plane_len();
    let marker = u16::try_from(plane_len)
        .map_err(|_| Error::PlaneSizeTooLarge { plane_len })?;
    let mut output = Vec::new();
    output.extend_from_slice(&marker.to_le_bytes());
    for p in 0..NUM_PLANES {
        let start = output.len();
        rle::encode(&mut output, image.plane(p));
        debug!("plane {}: {} bytes compressed to {}", p, plane_len, output.len() - start);
    }
    Ok(output)
}
