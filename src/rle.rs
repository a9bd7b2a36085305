//! The run-length compression used by the game's full-screen images.
//!
//! A compressed stream is a sequence of blocks, each introduced by a control
//! byte:
//!
//! * `0x00..=0x7f`: a Copy block. The control byte is a length, and that many
//!   literal bytes follow.
//! * `0x80..=0xff`: a Fill block. The low 7 bits are a repeat count, and one
//!   byte follows that is repeated that many times.
//!
//! The encoder never emits Copy blocks longer than `MAX_COPY` or Fill blocks
//! longer than `MAX_FILL`.
//!
//! # References
//!
//! * <http://www.shikadi.net/moddingwiki/Captain_Comic_Image_Format#File_format>

use std::cmp;
use std::fmt;
use std::io::{self, Read};

use tracing::trace;

use crate::read_full;

/// The longest Copy block the encoder emits.
pub const MAX_COPY: usize = 125;
/// The longest Fill block the encoder emits.
pub const MAX_FILL: usize = 127;
/// Runs shorter than this are cheaper to store in a Copy block.
pub const MIN_FILL_RUN: usize = 3;

const FILL_FLAG: u8 = 0x80;

/// A run-length decoding error.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// The input ended in the middle of a block, `missing` bytes short of
    /// completing it.
    UnexpectedEndOfStream { offset: u64, missing: usize },
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::UnexpectedEndOfStream { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::UnexpectedEndOfStream { offset, missing } =>
                write!(f, "run-length stream ends at offset {} with {} bytes of a block missing", offset, missing),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Appends Copy blocks holding `literal` to `output`.
fn push_copy(output: &mut Vec<u8>, literal: &[u8]) {
    for chunk in literal.chunks(MAX_COPY) {
        output.push(chunk.len() as u8);
        output.extend_from_slice(chunk);
    }
}

/// Appends Fill blocks repeating `value` `count` times to `output`.
fn push_fill(output: &mut Vec<u8>, value: u8, mut count: usize) {
    while count > 0 {
        let n = cmp::min(count, MAX_FILL);
        output.push(FILL_FLAG | n as u8);
        output.push(value);
        count -= n;
    }
}

/// Compresses `input` and appends the result to `output`.
///
/// The encoder is greedy. Scanning left to right, every run of `MIN_FILL_RUN`
/// or more equal bytes becomes Fill blocks, and the bytes between such runs
/// become Copy blocks.
pub fn encode(output: &mut Vec<u8>, input: &[u8]) {
    // Start of the pending literal bytes.
    let mut copy_start = 0;
    let mut i = 0;
    while i < input.len() {
        let value = input[i];
        let run = input[i..].iter().take_while(|&&x| x == value).count();
        if run >= MIN_FILL_RUN {
            push_copy(output, &input[copy_start..i]);
            push_fill(output, value, run);
            copy_start = i + run;
        }
        i += run;
    }
    push_copy(output, &input[copy_start..]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// Between blocks; the next input byte is a control byte.
    Idle,
    /// Inside a Copy block with this many literal bytes left.
    Copy(usize),
    /// Inside a Fill block with this many repetitions of the value left.
    Fill(usize, u8),
}

/// A pull decoder for a run-length stream.
///
/// Each call to `read_into` decodes as much as fits in the caller's buffer
/// and remembers where it stopped inside the current block, so the output
/// never has to be held in memory all at once. The decoder reads no further
/// than the block it is in, so several streams may follow each other in the
/// same reader.
#[derive(Debug)]
pub struct Decoder<R> {
    inner: R,
    position: u64,
    block: Block,
}

impl<R: Read> Decoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0, block: Block::Idle }
    }

    /// The number of compressed bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the decoder is between blocks, with nothing left over from the
    /// last one.
    pub fn is_idle(&self) -> bool {
        self.block == Block::Idle
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one byte, or `None` at end of input.
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0; 1];
        match read_full(&mut self.inner, &mut buf)? {
            0 => Ok(None),
            _ => {
                self.position += 1;
                Ok(Some(buf[0]))
            }
        }
    }

    /// Decodes up to `buf.len()` bytes into `buf` and returns how many were
    /// written. Returns `Ok(0)` only when `buf` is empty or the input ended
    /// cleanly where a control byte was expected.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.block {
                Block::Idle => {
                    let control = match self.next_byte()? {
                        // End of input here is the end of the stream, not an error.
                        None => return Ok(0),
                        Some(control) => control,
                    };
                    if control & FILL_FLAG == 0 {
                        trace!("{:#x}: copy {}", self.position - 1, control);
                        if control > 0 {
                            self.block = Block::Copy(control as usize);
                        }
                    } else {
                        let count = (control & !FILL_FLAG) as usize;
                        let value = self.next_byte()?
                            .ok_or(Error::UnexpectedEndOfStream { offset: self.position, missing: 1 })?;
                        trace!("{:#x}: fill {}×{:#04x}", self.position - 2, count, value);
                        if count > 0 {
                            self.block = Block::Fill(count, value);
                        }
                    }
                }
                Block::Copy(remaining) => {
                    let n = cmp::min(remaining, buf.len());
                    let got = read_full(&mut self.inner, &mut buf[..n])?;
                    self.position += got as u64;
                    if got < n {
                        return Err(Error::UnexpectedEndOfStream { offset: self.position, missing: remaining - got });
                    }
                    self.block = if remaining > n { Block::Copy(remaining - n) } else { Block::Idle };
                    return Ok(n);
                }
                Block::Fill(remaining, value) => {
                    let n = cmp::min(remaining, buf.len());
                    buf[..n].iter_mut().for_each(|x| *x = value);
                    self.block = if remaining > n { Block::Fill(remaining - n, value) } else { Block::Idle };
                    return Ok(n);
                }
            }
        }
    }

    /// Decodes until `buf` is full or the stream ends cleanly. Returns the
    /// number of bytes written.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.read_into(&mut buf[n..])? {
                0 => break,
                k => n += k,
            }
        }
        Ok(n)
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(|err| match err {
            Error::Io(err) => err,
            err @ Error::UnexpectedEndOfStream { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err),
        })
    }
}

/// Decodes a complete run-length stream.
pub fn decode(input: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = Decoder::new(input);
    let mut output = Vec::new();
    let mut buf = [0; 512];
    loop {
        match decoder.read_into(&mut buf)? {
            0 => break,
            n => output.extend_from_slice(&buf[..n]),
        }
    }
    Ok(output)
}
