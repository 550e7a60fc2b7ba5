//! Reading of the WOFF font format.
//!
//! <https://www.w3.org/TR/WOFF/>
//!
//! Each table is stored zlib-compressed; tables are inflated on access and
//! then handed to the same per-table parsers as bare sfnt input.

use flate2::bufread::ZlibDecoder;

use crate::binary::read::{ReadArray, ReadBinary, ReadBuf, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::tables::{FontTableProvider, SfntVersion};

use std::borrow::Cow;
use std::io::Read;

/// The magic number identifying a WOFF file: 'wOFF'
pub const MAGIC: u32 = 0x774F4646;

/// Maximum decompressed size accepted for one table.
///
/// Limits decompression-bomb amplification; no real font table approaches it.
const MAX_DECOMPRESSED_LENGTH: u32 = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct WoffFont<'a> {
    pub scope: ReadScope<'a>,
    pub woff_header: WoffHeader,
    pub table_directory: ReadArray<'a, TableDirectoryEntry>,
}

#[derive(Clone, Debug)]
pub struct WoffHeader {
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub total_sfnt_size: u32,
    pub meta_offset: u32,
    pub meta_length: u32,
    pub meta_orig_length: u32,
    pub priv_offset: u32,
    pub priv_length: u32,
}

#[derive(Debug, Clone)]
pub struct TableDirectoryEntry {
    pub tag: u32,
    pub offset: u32,
    pub comp_length: u32,
    pub orig_length: u32,
    pub orig_checksum: u32,
}

impl<'a> WoffFont<'a> {
    /// The "sfnt version" of the input font
    pub fn flavor(&self) -> u32 {
        self.woff_header.flavor
    }

    /// Find the table directory entry for the given `tag`
    pub fn find_table_directory_entry(&self, tag: u32) -> Option<TableDirectoryEntry> {
        self.table_directory
            .iter()
            .find(|table_entry| table_entry.tag == tag)
    }
}

impl<'b> ReadBinary for WoffFont<'b> {
    type HostType<'a> = WoffFont<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let woff_header = ctxt.read::<WoffHeader>()?;
        let table_directory =
            ctxt.read_array::<TableDirectoryEntry>(usize::from(woff_header.num_tables))?;

        // Directory entries must be sorted by tag and address data inside
        // the file without overlapping one another.
        let file_length = scope.data().len();
        let mut prev_tag = None;
        let mut ranges = Vec::with_capacity(table_directory.len());
        for entry in &table_directory {
            if prev_tag.map_or(false, |prev| entry.tag <= prev) {
                return Err(ParseError::BadValue);
            }
            prev_tag = Some(entry.tag);
            if entry.comp_length > entry.orig_length {
                return Err(ParseError::BadValue);
            }
            if entry.orig_length > MAX_DECOMPRESSED_LENGTH {
                return Err(ParseError::LimitExceeded);
            }
            let offset = usize::try_from(entry.offset)?;
            let end = offset
                .checked_add(usize::try_from(entry.comp_length)?)
                .ok_or(ParseError::BadOffset)?;
            if end > file_length {
                return Err(ParseError::BadOffset);
            }
            ranges.push((offset, end));
        }
        ranges.sort();
        for window in ranges.windows(2) {
            if window[0].1 > window[1].0 {
                return Err(ParseError::BadOffset);
            }
        }

        Ok(WoffFont {
            scope,
            woff_header,
            table_directory,
        })
    }
}

impl<'a> FontTableProvider for WoffFont<'a> {
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
        self.find_table_directory_entry(tag)
            .map(|table_entry| {
                table_entry
                    .read_table(&self.scope)
                    .map(|table| table.into_data())
            })
            .transpose()
    }

    fn has_table(&self, tag: u32) -> bool {
        self.find_table_directory_entry(tag).is_some()
    }

    fn table_tags(&self) -> Vec<u32> {
        self.table_directory.iter().map(|entry| entry.tag).collect()
    }
}

impl<'a> SfntVersion for WoffFont<'a> {
    fn sfnt_version(&self) -> u32 {
        self.flavor()
    }
}

impl ReadBinary for WoffHeader {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let signature = ctxt.read_u32be()?;
        match signature {
            MAGIC => {
                let flavor = ctxt.read_u32be()?;
                let length = ctxt.read_u32be()?;
                let num_tables = ctxt.read_u16be()?;
                let reserved = ctxt.read_u16be()?;
                // A conforming user agent must reject files with a non-zero
                // reserved field.
                ctxt.check(reserved == 0)?;
                let total_sfnt_size = ctxt.read_u32be()?;
                // The version fields have no effect on font loading
                let _major_version = ctxt.read_u16be()?;
                let _minor_version = ctxt.read_u16be()?;
                let meta_offset = ctxt.read_u32be()?;
                let meta_length = ctxt.read_u32be()?;
                let meta_orig_length = ctxt.read_u32be()?;
                let priv_offset = ctxt.read_u32be()?;
                let priv_length = ctxt.read_u32be()?;

                Ok(WoffHeader {
                    flavor,
                    length,
                    num_tables,
                    total_sfnt_size,
                    meta_offset,
                    meta_length,
                    meta_orig_length,
                    priv_offset,
                    priv_length,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadFrom for TableDirectoryEntry {
    type ReadType = ((U32Be, U32Be, U32Be), (U32Be, U32Be));
    fn read_from(
        ((tag, offset, comp_length), (orig_length, orig_checksum)): ((u32, u32, u32), (u32, u32)),
    ) -> Self {
        TableDirectoryEntry {
            tag,
            offset,
            comp_length,
            orig_length,
            orig_checksum,
        }
    }
}

impl TableDirectoryEntry {
    fn is_compressed(&self) -> bool {
        self.comp_length != self.orig_length
    }

    /// Read and uncompress the contents of a table entry
    pub fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<ReadBuf<'a>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.comp_length)?;
        let table_data = scope.offset_length(offset, length)?;

        if self.is_compressed() {
            let mut z = ZlibDecoder::new(table_data.data());
            let mut uncompressed = Vec::with_capacity(usize::try_from(self.orig_length)?);
            z.take(u64::from(self.orig_length))
                .read_to_end(&mut uncompressed)
                .map_err(|_err| ParseError::CompressionError)?;
            // the stated original length must be exact
            if uncompressed.len() != usize::try_from(self.orig_length)? {
                return Err(ParseError::CompressionError);
            }

            Ok(ReadBuf::from(uncompressed))
        } else {
            Ok(ReadBuf::from(table_data.data()))
        }
    }
}
