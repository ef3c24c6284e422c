//! Minimal SFNT (TrueType/OpenType) table directory model.

use super::{woff, FontError};

/// `0x00010000`, TrueType outlines.
pub const TRUETYPE_FLAVOR: u32 = 0x0001_0000;
const TRUE_FLAVOR: u32 = u32::from_be_bytes(*b"true");
const WOFF_SIGNATURE: u32 = u32::from_be_bytes(*b"wOFF");
const WOFF2_SIGNATURE: u32 = u32::from_be_bytes(*b"wOF2");
const COLLECTION_SIGNATURE: u32 = u32::from_be_bytes(*b"ttcf");

/// A font table with its uncompressed data.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub data: Vec<u8>,
}

impl Table {
    pub fn new(tag: [u8; 4], data: Vec<u8>) -> Self {
        Self {
            tag,
            checksum: checksum(&data),
            data,
        }
    }
}

/// An SFNT font: its flavor plus its tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub flavor: u32,
    pub tables: Vec<Table>,
}

impl Font {
    /// Parse an SFNT or WOFF font.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FontError> {
        match read_u32(bytes, 0)? {
            WOFF_SIGNATURE => woff::decode(bytes),
            WOFF2_SIGNATURE => Err(FontError::Unsupported("WOFF2 input".to_string())),
            COLLECTION_SIGNATURE => Err(FontError::Unsupported("font collections".to_string())),
            _ => parse_sfnt(bytes),
        }
    }

    pub fn is_truetype(&self) -> bool {
        self.flavor == TRUETYPE_FLAVOR || self.flavor == TRUE_FLAVOR
    }

    /// `ttf` for TrueType outlines, `otf` otherwise.
    pub fn sfnt_extension(&self) -> &'static str {
        if self.is_truetype() {
            "ttf"
        } else {
            "otf"
        }
    }

    /// Tables in ascending tag order, as the table directory requires.
    pub fn sorted_tables(&self) -> Vec<&Table> {
        let mut tables: Vec<&Table> = self.tables.iter().collect();
        tables.sort_by_key(|t| t.tag);
        tables
    }

    pub fn table(&self, tag: &[u8; 4]) -> Option<&Table> {
        self.tables.iter().find(|t| &t.tag == tag)
    }

    /// Size of the font serialized as plain SFNT.
    pub fn sfnt_size(&self) -> usize {
        12 + 16 * self.tables.len()
            + self
                .tables
                .iter()
                .map(|t| pad4(t.data.len()))
                .sum::<usize>()
    }

    /// Serialize as plain SFNT.
    pub fn to_sfnt(&self) -> Vec<u8> {
        let tables = self.sorted_tables();
        let num_tables = tables.len() as u16;
        let (search_range, entry_selector, range_shift) = search_params(num_tables);

        let mut out = Vec::with_capacity(self.sfnt_size());
        out.extend_from_slice(&self.flavor.to_be_bytes());
        out.extend_from_slice(&num_tables.to_be_bytes());
        out.extend_from_slice(&search_range.to_be_bytes());
        out.extend_from_slice(&entry_selector.to_be_bytes());
        out.extend_from_slice(&range_shift.to_be_bytes());

        let mut offset = 12 + 16 * tables.len();
        for table in &tables {
            out.extend_from_slice(&table.tag);
            out.extend_from_slice(&table.checksum.to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(table.data.len() as u32).to_be_bytes());
            offset += pad4(table.data.len());
        }

        for table in &tables {
            out.extend_from_slice(&table.data);
            out.resize(pad4(out.len()), 0);
        }

        out
    }
}

fn parse_sfnt(bytes: &[u8]) -> Result<Font, FontError> {
    let flavor = read_u32(bytes, 0)?;
    if flavor != TRUETYPE_FLAVOR && flavor != TRUE_FLAVOR && flavor != u32::from_be_bytes(*b"OTTO")
    {
        return Err(FontError::Malformed(format!(
            "unknown sfnt version 0x{:08x}",
            flavor
        )));
    }

    let num_tables = read_u16(bytes, 4)? as usize;
    let mut tables = Vec::with_capacity(num_tables);

    for i in 0..num_tables {
        let record = 12 + 16 * i;
        let tag = read_tag(bytes, record)?;
        let checksum = read_u32(bytes, record + 4)?;
        let offset = read_u32(bytes, record + 8)? as usize;
        let length = read_u32(bytes, record + 12)? as usize;

        let data = bytes
            .get(offset..offset + length)
            .ok_or(FontError::Truncated(offset + length))?
            .to_vec();
        tables.push(Table {
            tag,
            checksum,
            data,
        });
    }

    Ok(Font { flavor, tables })
}

/// `(searchRange, entrySelector, rangeShift)` for a table directory.
pub(crate) fn search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let entry_selector = 15 - num_tables.leading_zeros() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = num_tables * 16 - search_range;
    (search_range, entry_selector, range_shift)
}

/// Sum of big-endian u32 words, zero-padded to a multiple of four bytes.
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

pub(crate) fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

pub(crate) fn read_u16(bytes: &[u8], at: usize) -> Result<u16, FontError> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(FontError::Truncated(at + 2))
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> Result<u32, FontError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(FontError::Truncated(at + 4))
}

pub(crate) fn read_tag(bytes: &[u8], at: usize) -> Result<[u8; 4], FontError> {
    read_u32(bytes, at).map(u32::to_be_bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A tiny two-table TrueType font.
    pub(crate) fn sample_font() -> Font {
        Font {
            flavor: TRUETYPE_FLAVOR,
            tables: vec![
                Table::new(*b"zzzz", b"custom table".to_vec()),
                Table::new(*b"head", vec![0u8; 54]),
            ],
        }
    }

    #[test]
    fn sfnt_round_trips() {
        let font = sample_font();

        let bytes = font.to_sfnt();
        let parsed = Font::from_bytes(&bytes).unwrap();

        assert_eq!(bytes.len(), font.sfnt_size());
        assert_eq!(parsed.tables[0].tag, *b"head");
        assert_eq!(parsed.table(b"zzzz").unwrap().data, b"custom table");
    }

    #[test]
    fn directory_search_params() {
        assert_eq!(search_params(1), (16, 0, 0));
        assert_eq!(search_params(2), (32, 1, 0));
        assert_eq!(search_params(11), (128, 3, 48));
    }

    #[test]
    fn checksum_pads_last_word() {
        assert_eq!(checksum(&[0, 0, 0, 1, 0, 0, 0, 2]), 3);
        assert_eq!(checksum(&[1]), 0x0100_0000);
    }

    #[test]
    fn rejects_unsupported_inputs() {
        assert!(matches!(
            Font::from_bytes(b"wOF2\0\0\0\0"),
            Err(FontError::Unsupported(_))
        ));
        assert!(matches!(
            Font::from_bytes(b"ttcf\0\0\0\0"),
            Err(FontError::Unsupported(_))
        ));
        assert!(matches!(
            Font::from_bytes(b"abcd\0\0"),
            Err(FontError::Malformed(_))
        ));
        assert!(matches!(Font::from_bytes(b"ab"), Err(FontError::Truncated(4))));
    }

    #[test]
    fn extension_follows_outline_flavor() {
        let mut font = sample_font();
        assert_eq!(font.sfnt_extension(), "ttf");

        font.flavor = u32::from_be_bytes(*b"OTTO");
        assert_eq!(font.sfnt_extension(), "otf");
    }
}
