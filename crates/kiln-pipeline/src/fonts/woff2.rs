//! WOFF 2.0 encoding with null table transforms.
//!
//! All table data is concatenated into a single Brotli stream. `glyf` and
//! `loca` are stored untransformed (transform version 3), which every
//! conforming decoder must accept.

use std::io::Write;

use super::sfnt::{pad4, Font};
use super::FontError;

const SIGNATURE: &[u8; 4] = b"wOF2";
const HEADER_SIZE: usize = 48;

/// Tags with a one-byte code in the table directory, indexed by that code.
const KNOWN_TAGS: [&[u8; 4]; 63] = [
    b"cmap", b"head", b"hhea", b"hmtx", b"maxp", b"name", b"OS/2", b"post", b"cvt ", b"fpgm",
    b"glyf", b"loca", b"prep", b"CFF ", b"VORG", b"EBDT", b"EBLC", b"gasp", b"hdmx", b"kern",
    b"LTSH", b"PCLT", b"VDMX", b"vhea", b"vmtx", b"BASE", b"GDEF", b"GPOS", b"GSUB", b"EBSC",
    b"JSTF", b"MATH", b"CBDT", b"CBLC", b"COLR", b"CPAL", b"SVG ", b"sbix", b"acnt", b"avar",
    b"bdat", b"bloc", b"bsln", b"cvar", b"fdsc", b"feat", b"fmtx", b"fvar", b"gvar", b"hsty",
    b"just", b"lcar", b"mort", b"morx", b"opbd", b"prop", b"trak", b"Zapf", b"Silf", b"Glat",
    b"Gloc", b"Feat", b"Sill",
];

/// Flag value for a tag stored literally after the flags byte.
const ARBITRARY_TAG: u8 = 63;

/// Transform version meaning "no transform" for `glyf` and `loca`.
const NULL_GLYF_TRANSFORM: u8 = 3;

const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;

/// Encode `font` as WOFF2.
pub fn encode(font: &Font) -> Result<Vec<u8>, FontError> {
    let tables = font.sorted_tables();

    let mut directory = Vec::new();
    let mut stream = Vec::new();
    for table in &tables {
        match KNOWN_TAGS.iter().position(|known| **known == table.tag) {
            Some(index) => directory.push(transform_bits(&table.tag) | index as u8),
            None => {
                directory.push(transform_bits(&table.tag) | ARBITRARY_TAG);
                directory.extend_from_slice(&table.tag);
            }
        }
        write_base128(&mut directory, table.data.len() as u32);
        stream.extend_from_slice(&table.data);
    }

    let compressed = compress(&stream)?;
    let total_len = pad4(HEADER_SIZE + directory.len() + compressed.len());

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&font.flavor.to_be_bytes());
    out.extend_from_slice(&(total_len as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(font.sfnt_size() as u32).to_be_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
    // version 1.0
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata and private blocks
    out.extend_from_slice(&[0u8; 20]);

    out.extend_from_slice(&directory);
    out.extend_from_slice(&compressed);
    out.resize(total_len, 0);

    Ok(out)
}

fn transform_bits(tag: &[u8; 4]) -> u8 {
    if tag == b"glyf" || tag == b"loca" {
        NULL_GLYF_TRANSFORM << 6
    } else {
        0
    }
}

/// Append `value` as UIntBase128: big-endian 7-bit groups, high bit set on all
/// but the last byte.
pub(crate) fn write_base128(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut rest = value;
    loop {
        groups[len] = (rest & 0x7f) as u8;
        len += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }

    for i in (0..len).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, BROTLI_QUALITY, BROTLI_WINDOW);
    writer.write_all(data)?;
    writer.flush()?;
    Ok(writer.into_inner())
}
