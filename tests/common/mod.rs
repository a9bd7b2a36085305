#![allow(dead_code)]

use comic_assets::exe::{Header, BYTES_PER_BLOCK, BYTES_PER_PARAGRAPH, HEADER_LEN};
use comic_assets::Pointer;

pub fn store_u16le(buf: &mut [u8], i: usize, v: u16) {
    buf[i..i + 2].clone_from_slice(&u16::to_le_bytes(v));
}

/// A header with every field zero except the magic.
pub fn blank_header() -> Header {
    let mut buf = [0; HEADER_LEN];
    buf[0..2].copy_from_slice(b"MZ");
    Header::parse(&buf)
}

/// Builds an EXE file whose header is followed by `relocs` and then `data`,
/// with the header padded to a whole number of paragraphs and the length
/// fields set to the true file length.
pub fn build_exe(relocs: &[Pointer], data: &[u8]) -> Vec<u8> {
    let header_len = (HEADER_LEN + 4 * relocs.len() + BYTES_PER_PARAGRAPH - 1)
        / BYTES_PER_PARAGRAPH * BYTES_PER_PARAGRAPH;
    let exe_len = header_len + data.len();
    let mut header = blank_header();
    header.bytes_in_last_block = (exe_len % BYTES_PER_BLOCK) as u16;
    header.block_count = ((exe_len + BYTES_PER_BLOCK - 1) / BYTES_PER_BLOCK) as u16;
    header.relocation_count = relocs.len() as u16;
    header.header_paragraphs = (header_len / BYTES_PER_PARAGRAPH) as u16;
    header.relocation_offset = HEADER_LEN as u16;

    let mut exe = header.to_bytes().to_vec();
    for pointer in relocs {
        exe.extend_from_slice(&pointer.offset.to_le_bytes());
        exe.extend_from_slice(&pointer.segment.to_le_bytes());
    }
    exe.resize(header_len, 0);
    exe.extend_from_slice(data);
    exe
}
