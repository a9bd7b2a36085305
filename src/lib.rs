//! Decoders for the graphics embedded in and shipped alongside the DOS game
//! Captain Comic.
//!
//! Three formats interlock:
//!
//! * The `exe` module reads the MZ executable, which carries data tables
//!   after its code. The executable has no record of where those tables
//!   begin, so `exe::ExeFile` infers section boundaries from the segment
//!   values its relocations patch.
//! * The `planar` module converts between EGA 4-bitplane images and one
//!   palette index per pixel, using the fixed 16-color EGA palette. The
//!   `raster` module adds transparency masks and sprites on top.
//! * The `rle` module implements the run-length compression that wraps the
//!   planes of full-screen images. The `ega` module puts the pieces together
//!   for whole image files, and the `tileset` module reads tile graphics.
//!
//! Writing PNG or GIF files is left to the caller: every image here can be
//! flattened into palette indices (`planar::decode`, `raster::to_indexed`)
//! to go with `planar::PALETTE`.
//!
//! # Logging
//!
//! Diagnostics go through `tracing`. The library never installs a
//! subscriber.

use std::io::{self, Read};

pub mod ega;
pub mod exe;
pub mod planar;
mod pointer;
pub mod raster;
pub mod rle;
pub mod tileset;

pub use pointer::Pointer;

/// Reads into `buf` until it is full or the input ends. Returns the number of
/// bytes read, which is less than `buf.len()` only at end of input.
fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(n)
}

#[test]
fn test_read_full() {
    let mut input: &[u8] = &[1, 2, 3];
    let mut buf = [0; 2];
    assert_eq!(read_full(&mut input, &mut buf).unwrap(), 2);
    assert_eq!(buf, [1, 2]);
    assert_eq!(read_full(&mut input, &mut buf).unwrap(), 1);
    assert_eq!(buf[0], 3);
    assert_eq!(read_full(&mut input, &mut buf).unwrap(), 0);
}
