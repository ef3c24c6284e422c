//! WOFF 1.0: per-table zlib compression around an SFNT table directory.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::sfnt::{pad4, read_tag, read_u16, read_u32, Font, Table};
use super::FontError;

const SIGNATURE: &[u8; 4] = b"wOFF";
const HEADER_SIZE: usize = 44;
const ENTRY_SIZE: usize = 20;

/// Encode `font` as WOFF. Tables are stored compressed only when that is smaller.
pub fn encode(font: &Font) -> Result<Vec<u8>, FontError> {
    let tables = font.sorted_tables();

    let mut stored = Vec::with_capacity(tables.len());
    for table in &tables {
        let compressed = deflate(&table.data)?;
        if compressed.len() < table.data.len() {
            stored.push(compressed);
        } else {
            stored.push(table.data.clone());
        }
    }

    let directory_end = HEADER_SIZE + ENTRY_SIZE * tables.len();
    let total_len = directory_end + stored.iter().map(|d| pad4(d.len())).sum::<usize>();

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&font.flavor.to_be_bytes());
    out.extend_from_slice(&(total_len as u32).to_be_bytes());
    out.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&(font.sfnt_size() as u32).to_be_bytes());
    // version 1.0
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    // metadata and private blocks
    out.extend_from_slice(&[0u8; 20]);

    let mut offset = directory_end;
    for (table, data) in tables.iter().zip(&stored) {
        out.extend_from_slice(&table.tag);
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&table.checksum.to_be_bytes());
        offset += pad4(data.len());
    }

    for data in &stored {
        out.extend_from_slice(data);
        out.resize(pad4(out.len()), 0);
    }

    Ok(out)
}

/// Decode a WOFF font back into its tables.
pub fn decode(bytes: &[u8]) -> Result<Font, FontError> {
    if bytes.get(..4) != Some(SIGNATURE.as_slice()) {
        return Err(FontError::Malformed("missing wOFF signature".to_string()));
    }

    let flavor = read_u32(bytes, 4)?;
    let num_tables = read_u16(bytes, 12)? as usize;
    let mut tables = Vec::with_capacity(num_tables);

    for i in 0..num_tables {
        let entry = HEADER_SIZE + ENTRY_SIZE * i;
        let tag = read_tag(bytes, entry)?;
        let offset = read_u32(bytes, entry + 4)? as usize;
        let comp_length = read_u32(bytes, entry + 8)? as usize;
        let orig_length = read_u32(bytes, entry + 12)? as usize;
        let checksum = read_u32(bytes, entry + 16)?;

        let stored = bytes
            .get(offset..offset + comp_length)
            .ok_or(FontError::Truncated(offset + comp_length))?;

        let data = if comp_length < orig_length {
            let mut data = Vec::with_capacity(orig_length);
            ZlibDecoder::new(stored).read_to_end(&mut data)?;
            if data.len() != orig_length {
                return Err(FontError::Malformed(format!(
                    "table {} inflated to {} bytes, expected {}",
                    String::from_utf8_lossy(&tag),
                    data.len(),
                    orig_length
                )));
            }
            data
        } else {
            stored.to_vec()
        };

        tables.push(Table {
            tag,
            checksum,
            data,
        });
    }

    Ok(Font { flavor, tables })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, FontError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
