//! Reading 16-bit DOS MZ executables as containers for embedded data.
//!
//! Nothing here relocates or runs the program. The header tells us where the
//! load image starts and how long the file claims to be, and the relocation
//! table is kept only as evidence of where the program's data tables begin:
//! every relocated word holds a segment number, and the program's fix-ups
//! point at the start of each table. See [`ExeFile::sections`].
//!
//! # References
//!
//! * <http://www.delorie.com/djgpp/doc/exe/>

use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{self, prelude::*, SeekFrom};
use std::path::Path;

use tracing::debug;

pub use crate::pointer::Pointer;
use crate::read_full;

/// The length of the fixed fields of an EXE header.
pub const HEADER_LEN: usize = 28;

pub const BYTES_PER_PARAGRAPH: usize = 16;
pub const BYTES_PER_BLOCK: usize = 512;

/// The length of one relocation table entry.
const RELOC_LEN: usize = 4;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Format(FormatError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Format(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Format(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::Format(err)
    }
}

/// An EXE container format error.
#[derive(Debug, PartialEq)]
pub enum FormatError {
    /// The input ended before all `HEADER_LEN` bytes of the header.
    TruncatedHeader { len: usize },
    /// `bytes_in_last_block` and `block_count` encode a negative length.
    BadNumPages { bytes_in_last_block: u16, block_count: u16 },
    /// The input ended inside the relocation table. `expected` and `actual`
    /// count entries.
    TruncatedRelocationTable { offset: u64, expected: usize, actual: usize },
    /// The input ended inside the load image. `expected` and `actual` count
    /// bytes.
    TruncatedData { offset: u64, expected: usize, actual: usize },
    /// A relocation names a word that is not inside the data.
    RelocationOutOfBounds { pointer: Pointer, data_len: usize },
}

impl std::error::Error for FormatError {}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatError::TruncatedHeader { len } =>
                write!(f, "EXE header truncated after {} of {} bytes", len, HEADER_LEN),
            FormatError::BadNumPages { bytes_in_last_block, block_count } =>
                write!(f, "bad EXE size ({} blocks, {} bytes in last block)", block_count, bytes_in_last_block),
            FormatError::TruncatedRelocationTable { offset, expected, actual } =>
                write!(f, "relocation table at {:#x} truncated after {} of {} entries", offset, actual, expected),
            FormatError::TruncatedData { offset, expected, actual } =>
                write!(f, "EXE data at {:#x} truncated after {} of {} bytes", offset, actual, expected),
            FormatError::RelocationOutOfBounds { pointer, data_len } =>
                write!(f, "relocation {} lies outside {} bytes of data", pointer, data_len),
        }
    }
}

/// The fixed fields of an EXE header, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: [u8; 2],
    pub bytes_in_last_block: u16,
    pub block_count: u16,
    pub relocation_count: u16,
    pub header_paragraphs: u16,
    pub min_alloc: u16,
    pub max_alloc: u16,
    pub initial_ss: u16,
    pub initial_sp: u16,
    pub checksum: u16,
    pub initial_ip: u16,
    pub initial_cs: u16,
    pub relocation_offset: u16,
    pub overlay: u16,
}

impl Header {
    pub fn parse(buf: &[u8; HEADER_LEN]) -> Self {
        let word = |i: usize| u16::from_le_bytes([buf[i], buf[i + 1]]);
        Self {
            magic: [buf[0], buf[1]],
            bytes_in_last_block: word(2),
            block_count: word(4),
            relocation_count: word(6),
            header_paragraphs: word(8),
            min_alloc: word(10),
            max_alloc: word(12),
            initial_ss: word(14),
            initial_sp: word(16),
            checksum: word(18),
            initial_ip: word(20),
            initial_cs: word(22),
            relocation_offset: word(24),
            overlay: word(26),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0; HEADER_LEN];
        buf[0..2].copy_from_slice(&self.magic);
        for (i, v) in [
            self.bytes_in_last_block,
            self.block_count,
            self.relocation_count,
            self.header_paragraphs,
            self.min_alloc,
            self.max_alloc,
            self.initial_ss,
            self.initial_sp,
            self.checksum,
            self.initial_ip,
            self.initial_cs,
            self.relocation_offset,
            self.overlay,
        ].iter().enumerate() {
            buf[2 + i * 2..4 + i * 2].copy_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// Whether the magic tag is `"MZ"` (or the rarer `"ZM"`).
    pub fn has_mz_magic(&self) -> bool {
        &self.magic == b"MZ" || &self.magic == b"ZM"
    }

    /// The file offset of the load image.
    pub fn data_offset(&self) -> u64 {
        self.header_paragraphs as u64 * BYTES_PER_PARAGRAPH as u64
    }

    /// The length of the file as stated by the header. Returns `None` if the
    /// fields are an invalid encoding.
    pub fn data_len(&self) -> Option<usize> {
        decode_exe_len(self.bytes_in_last_block, self.block_count)
    }
}

/// Converts a `(bytes_in_last_block, block_count)` pair into a single length
/// value. Returns `None` if the inputs encode a negative length.
///
/// A `bytes_in_last_block` above 511 is not a valid encoding, but DOS and
/// the game's tools apply the formula anyway, so it is accepted here.
fn decode_exe_len(bytes_in_last_block: u16, block_count: u16) -> Option<usize> {
    match (bytes_in_last_block, block_count) {
        (0, _) => Some(block_count as usize * BYTES_PER_BLOCK),
        (_, 0) => None, // Encodes a negative length.
        _ => Some(block_count as usize * BYTES_PER_BLOCK + bytes_in_last_block as usize - BYTES_PER_BLOCK),
    }
}

#[test]
fn test_decode_exe_len() {
    assert_eq!(decode_exe_len(0, 0), Some(0));
    assert_eq!(decode_exe_len(1, 1), Some(1));
    assert_eq!(decode_exe_len(511, 1), Some(511));
    assert_eq!(decode_exe_len(0, 1), Some(512));
    assert_eq!(decode_exe_len(1, 2), Some(513));
    assert_eq!(decode_exe_len(100, 2), Some(612));
    assert_eq!(decode_exe_len(511, 0xffff), Some(0xffff * 512 - 1));
    assert_eq!(decode_exe_len(0, 0xffff), Some(0xffff * 512));

    // Out-of-range bytes_in_last_block still goes through the formula.
    assert_eq!(decode_exe_len(512, 1), Some(512));
    assert_eq!(decode_exe_len(600, 1), Some(600));
    assert_eq!(decode_exe_len(0xffff, 1), Some(0xffff));

    // When block_count == 0, bytes_in_last_block must be 0, otherwise it
    // would encode a negative length.
    assert_eq!(decode_exe_len(1, 0), None);
    assert_eq!(decode_exe_len(511, 0), None);
    assert_eq!(decode_exe_len(0xffff, 0), None);
}

/// A parsed EXE file.
#[derive(Debug, Clone)]
pub struct ExeFile {
    pub header: Header,
    pub relocs: Vec<Pointer>,
    sections: Vec<usize>,
    /// The load image, `header.data_len()` bytes long.
    pub data: Vec<u8>,
}

impl ExeFile {
    /// Reads an EXE file from a seekable source. The whole file is read
    /// before anything is returned.
    ///
    /// `data` always has the length the header states for the whole file.
    /// Since that length counts the header too, only the first
    /// `data_len - data_offset` bytes (none, if the header is the longer) are
    /// required to be present in the input; the rest of `data` is left
    /// zeroed.
    pub fn read<R: Read + Seek + ?Sized>(input: &mut R) -> Result<Self, Error> {
        input.seek(SeekFrom::Start(0))?;
        let header = {
            let mut buf = [0; HEADER_LEN];
            let n = read_full(input, &mut buf)?;
            if n < HEADER_LEN {
                return Err(FormatError::TruncatedHeader { len: n }.into());
            }
            Header::parse(&buf)
        };
        debug!("{:?}", header);

        let data_len = header.data_len()
            .ok_or(FormatError::BadNumPages {
                bytes_in_last_block: header.bytes_in_last_block,
                block_count: header.block_count,
            })?;
        let data_offset = header.data_offset();
        let image_len = data_len.saturating_sub(data_offset as usize);

        // Read the relocation table.
        let relocs = {
            let offset = header.relocation_offset as u64;
            let expected = header.relocation_count as usize;
            input.seek(SeekFrom::Start(offset))?;
            let mut buf = vec![0; expected * RELOC_LEN];
            let n = read_full(input, &mut buf)?;
            if n < buf.len() {
                return Err(FormatError::TruncatedRelocationTable { offset, expected, actual: n / RELOC_LEN }.into());
            }
            buf.chunks_exact(RELOC_LEN)
                .map(|entry| Pointer {
                    offset: u16::from_le_bytes([entry[0], entry[1]]),
                    segment: u16::from_le_bytes([entry[2], entry[3]]),
                })
                .collect::<Vec<_>>()
        };
        debug!("{} relocations", relocs.len());

        // Read the load image.
        let data = {
            input.seek(SeekFrom::Start(data_offset))?;
            let mut data = vec![0; data_len];
            let n = read_full(input, &mut data)?;
            if n < image_len {
                return Err(FormatError::TruncatedData { offset: data_offset, expected: image_len, actual: n }.into());
            }
            data
        };

        let sections = infer_sections(&relocs, &data)?;
        debug!("inferred sections {:x?}", sections);

        Ok(Self { header, relocs, sections, data })
    }

    /// Reads an EXE file from an in-memory buffer.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        Self::read(&mut io::Cursor::new(buf))
    }

    /// Opens and reads the EXE file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let f = File::open(path)?;
        Self::read(&mut io::BufReader::new(f))
    }

    /// Byte offsets into `data` where inferred sections start. Always begins
    /// with 0; strictly increasing.
    pub fn sections(&self) -> &[usize] {
        &self.sections
    }

    /// Returns the index of the section that contains the data offset
    /// `offset`.
    pub fn section_index(&self, offset: usize) -> usize {
        // sections[0] == 0, so the partition point is at least 1.
        self.sections.partition_point(|&start| start <= offset) - 1
    }

    /// Returns the bytes of section `i`, up to the start of the next section.
    /// Returns `None` if there is no such section or it starts past the end
    /// of the data.
    pub fn section(&self, i: usize) -> Option<&[u8]> {
        let start = *self.sections.get(i)?;
        let end = self.sections.get(i + 1).map_or(self.data.len(), |&end| end.min(self.data.len()));
        self.data.get(start..end)
    }

    /// Returns the bytes from the start of section `i` to the end of the data.
    pub fn section_from(&self, i: usize) -> Option<&[u8]> {
        self.data.get(*self.sections.get(i)?..)
    }
}

/// Infers section boundaries from the segment values that relocations patch.
fn infer_sections(relocs: &[Pointer], data: &[u8]) -> Result<Vec<usize>, FormatError> {
    let mut sections = BTreeSet::new();
    // Always at least one section starting at 0000:0000.
    sections.insert(0);
    for &pointer in relocs {
        let i = pointer.abs() as usize;
        let word = data.get(i..i + 2)
            .ok_or(FormatError::RelocationOutOfBounds { pointer, data_len: data.len() })?;
        let segment = u16::from_le_bytes([word[0], word[1]]);
        sections.insert(segment as usize * BYTES_PER_PARAGRAPH);
    }
    Ok(sections.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer(segment: u16, offset: u16) -> Pointer {
        Pointer { segment, offset }
    }

    #[test]
    fn test_infer_sections_empty() {
        assert_eq!(infer_sections(&[], &[]), Ok(vec![0]));
        assert_eq!(infer_sections(&[], &[0x12, 0x34]), Ok(vec![0]));
    }

    #[test]
    fn test_infer_sections_dedup_and_sort() {
        let mut data = vec![0; 0x40];
        data[0x00..0x02].copy_from_slice(&0x0200u16.to_le_bytes());
        data[0x10..0x12].copy_from_slice(&0x0100u16.to_le_bytes());
        data[0x20..0x22].copy_from_slice(&0x0200u16.to_le_bytes());
        data[0x32..0x34].copy_from_slice(&0x0000u16.to_le_bytes());
        let relocs = [pointer(0, 0), pointer(1, 0), pointer(0, 0x20), pointer(3, 2)];
        assert_eq!(infer_sections(&relocs, &data), Ok(vec![0, 0x1000, 0x2000]));
    }

    #[test]
    fn test_infer_sections_out_of_bounds() {
        let data = [0; 0x10];
        assert_eq!(
            infer_sections(&[pointer(0, 0x0f)], &data),
            Err(FormatError::RelocationOutOfBounds { pointer: pointer(0, 0x0f), data_len: 0x10 }),
        );
        assert_eq!(
            infer_sections(&[pointer(1, 0)], &data),
            Err(FormatError::RelocationOutOfBounds { pointer: pointer(1, 0), data_len: 0x10 }),
        );
    }

    #[test]
    fn test_header_bytes() {
        let header = Header {
            magic: *b"MZ",
            bytes_in_last_block: 100,
            block_count: 2,
            relocation_count: 3,
            header_paragraphs: 4,
            min_alloc: 5,
            max_alloc: 0xffff,
            initial_ss: 7,
            initial_sp: 8,
            checksum: 9,
            initial_ip: 10,
            initial_cs: 11,
            relocation_offset: 0x1c,
            overlay: 0,
        };
        let buf = header.to_bytes();
        assert_eq!(&buf[0..6], &[b'M', b'Z', 100, 0, 2, 0]);
        assert_eq!(&buf[24..28], &[0x1c, 0, 0, 0]);
        assert_eq!(Header::parse(&buf), header);
        assert!(header.has_mz_magic());
        assert_eq!(header.data_offset(), 64);
        assert_eq!(header.data_len(), Some(612));
    }
}
