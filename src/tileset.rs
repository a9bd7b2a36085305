//! Tileset files: a short header followed by 16×16 planar tiles.
//!
//! # References
//!
//! * <http://www.shikadi.net/moddingwiki/Captain_Comic_Tileset_Format>

use std::fmt;
use std::io::{self, Read};

use tracing::debug;

use crate::planar::{self, Planar};
use crate::read_full;

pub const TILE_WIDTH: usize = 16;
pub const TILE_HEIGHT: usize = 16;
/// The length of one stored tile.
pub const TILE_LEN: usize = planar::NUM_PLANES * TILE_WIDTH * TILE_HEIGHT / 8;
/// The length of the file header.
pub const HEADER_LEN: usize = 4;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// The input ended inside the header.
    TruncatedHeader { len: usize },
    /// The input ended `len` bytes into tile number `index`.
    TruncatedTile { index: usize, len: usize },
    Planar(planar::Error),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Planar(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::TruncatedHeader { len } =>
                write!(f, "tileset header truncated after {} of {} bytes", len, HEADER_LEN),
            Error::TruncatedTile { index, len } =>
                write!(f, "tile {} truncated after {} of {} bytes", index, len, TILE_LEN),
            Error::Planar(err) => err.fmt(f),
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    /// The header bytes, verbatim. Their meaning belongs to the level format.
    pub header: [u8; HEADER_LEN],
    pub tiles: Vec<Planar>,
}

impl Tileset {
    /// Reads tiles until the input ends.
    pub fn read<R: Read>(mut input: R) -> Result<Self, Error> {
        let mut header = [0; HEADER_LEN];
        let n = read_full(&mut input, &mut header)?;
        if n < HEADER_LEN {
            return Err(Error::TruncatedHeader { len: n });
        }

        let mut tiles = Vec::new();
        loop {
            let mut buf = vec![0; TILE_LEN];
            match read_full(&mut input, &mut buf)? {
                0 => break,
                TILE_LEN => {}
                len => return Err(Error::TruncatedTile { index: tiles.len(), len }),
            }
            tiles.push(Planar::new(TILE_WIDTH, TILE_HEIGHT, buf)?);
        }
        debug!("read {} tiles", tiles.len());

        Ok(Self { header, tiles })
    }
}
