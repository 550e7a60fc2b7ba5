//! Parsing and writing of the `cmap` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>
//!
//! Only a fixed set of (platform, encoding) pairs survives sanitization, and
//! only subtable formats 0, 4, 6, 12, 13 and 14. Everything else is dropped
//! with a warning. Format 4 binary-search headers are recomputed on output
//! rather than trusted.

use itertools::Itertools;
use log::warn;

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{U16Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::size;

/// Highest valid Unicode code point.
const MAX_CHAR_CODE: u32 = 0x10FFFF;

/// Maximum number of encoding records worth considering.
///
/// The table is 16-bit-counted, this just bounds allocation on hostile input.
const MAX_ENCODING_RECORDS: usize = 256;

/// `cmap` table, holding only the retained encoding records.
pub struct Cmap<'a> {
    pub encoding_records: Vec<EncodingRecord>,
    pub subtables: Vec<CmapSubtable<'a>>,
}

/// A retained encoding record, pointing into [Cmap::subtables].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub subtable_index: usize,
}

/// A validated cmap subtable.
pub enum CmapSubtable<'a> {
    Format0 {
        language: u16,
        glyph_id_array: &'a [u8],
    },
    Format4(CmapSubtableFormat4<'a>),
    Format6 {
        language: u16,
        first_code: u16,
        glyph_ids: ReadArray<'a, U16Be>,
    },
    Format12 {
        language: u32,
        groups: Vec<SequentialMapGroup>,
    },
    Format13 {
        language: u32,
        groups: Vec<SequentialMapGroup>,
    },
    /// Unicode variation sequences, re-emitted verbatim after validation.
    Format14 { data: ReadScope<'a> },
}

/// Format 4 subtable with its parallel segment arrays.
pub struct CmapSubtableFormat4<'a> {
    pub language: u16,
    pub end_codes: ReadArray<'a, U16Be>,
    pub start_codes: ReadArray<'a, U16Be>,
    pub id_deltas: ReadArray<'a, I16Storage>,
    pub id_range_offsets: ReadArray<'a, U16Be>,
    pub glyph_id_array: ReadArray<'a, U16Be>,
}

/// idDelta entries are signed but compared modulo 2^16; stored raw.
pub type I16Storage = U16Be;

/// Group record shared by formats 12 and 13.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct SequentialMapGroup {
    pub start_char_code: u32,
    pub end_char_code: u32,
    /// Start glyph ID for format 12, the single glyph ID for format 13.
    pub glyph_id: u32,
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);

    fn read_from((start_char_code, end_char_code, glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            glyph_id,
        }
    }
}

impl WriteBinary for SequentialMapGroup {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, group: SequentialMapGroup) -> Result<(), WriteError> {
        U32Be::write(ctxt, group.start_char_code)?;
        U32Be::write(ctxt, group.end_char_code)?;
        U32Be::write(ctxt, group.glyph_id)?;
        Ok(())
    }
}

/// Whether a (platform, encoding) pair survives sanitization.
fn is_retained_encoding(platform_id: u16, encoding_id: u16) -> bool {
    match platform_id {
        // Unicode platform: the BMP and full-repertoire encodings
        0 => matches!(encoding_id, 3 | 4 | 6),
        // Macintosh platform, Roman encoding only
        1 => encoding_id == 0,
        // Windows platform: Symbol, Unicode BMP, Unicode full
        3 => matches!(encoding_id, 0 | 1 | 10),
        _ => false,
    }
}

impl<'b> ReadBinaryDep for Cmap<'b> {
    type Args<'a> = u16; // num_glyphs
    type HostType<'a> = Cmap<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        if num_tables == 0 || num_tables > MAX_ENCODING_RECORDS {
            return Err(ParseError::BadValue);
        }

        let mut encoding_records = Vec::new();
        let mut subtables = Vec::new();
        let mut offset_to_index: Vec<(u32, usize)> = Vec::new();

        let mut prev_key: Option<(u16, u16)> = None;
        for _ in 0..num_tables {
            let platform_id = ctxt.read_u16be()?;
            let encoding_id = ctxt.read_u16be()?;
            let offset = ctxt.read_u32be()?;

            // Encoding records must be sorted by platform, then encoding
            let key = (platform_id, encoding_id);
            if let Some(prev) = prev_key {
                if key < prev {
                    return Err(ParseError::BadValue);
                }
            }
            prev_key = Some(key);

            if !is_retained_encoding(platform_id, encoding_id) {
                warn!(
                    "cmap: dropping subtable for platform {} encoding {}",
                    platform_id, encoding_id
                );
                continue;
            }

            // Subtables may be shared between encoding records
            let subtable_index = match offset_to_index.iter().find(|(o, _)| *o == offset) {
                Some((_, index)) => *index,
                None => {
                    let subtable_scope = scope.offset(usize::try_from(offset)?);
                    let subtable = subtable_scope.read_dep::<CmapSubtable<'_>>(num_glyphs)?;
                    subtables.push(subtable);
                    let index = subtables.len() - 1;
                    offset_to_index.push((offset, index));
                    index
                }
            };

            encoding_records.push(EncodingRecord {
                platform_id,
                encoding_id,
                subtable_index,
            });
        }

        if encoding_records.is_empty() {
            // A font whose cmap has no usable subtable cannot map anything
            return Err(ParseError::MissingValue);
        }

        Ok(Cmap {
            encoding_records,
            subtables,
        })
    }
}

impl<'b> ReadBinaryDep for CmapSubtable<'b> {
    type Args<'a> = u16; // num_glyphs
    type HostType<'a> = CmapSubtable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let subtable_scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        match format {
            0 => {
                let length = ctxt.read_u16be()?;
                ctxt.check(usize::from(length) == 3 * size::U16 + 256)?;
                let language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_slice(256)?;
                if num_glyphs < 256 {
                    // A byte-valued mapping can still exceed a small glyph count
                    for &gid in glyph_id_array {
                        if u16::from(gid) >= num_glyphs {
                            return Err(ParseError::BadIndex);
                        }
                    }
                }
                Ok(CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                })
            }
            4 => read_format4(ctxt, num_glyphs),
            6 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = ctxt.read_u16be()?;
                let glyph_ids = ctxt.read_array::<U16Be>(usize::from(entry_count))?;
                for gid in &glyph_ids {
                    if gid >= num_glyphs {
                        return Err(ParseError::BadIndex);
                    }
                }
                Ok(CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_ids,
                })
            }
            12 | 13 => {
                let _reserved = ctxt.read_u16be()?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                let groups = groups.to_vec();
                for group in &groups {
                    if group.start_char_code > group.end_char_code
                        || group.end_char_code > MAX_CHAR_CODE
                    {
                        return Err(ParseError::BadValue);
                    }
                    let max_glyph = if format == 12 {
                        let span = group.end_char_code - group.start_char_code;
                        group.glyph_id.checked_add(span).ok_or(ParseError::BadValue)?
                    } else {
                        group.glyph_id
                    };
                    if max_glyph >= u32::from(num_glyphs) {
                        return Err(ParseError::BadIndex);
                    }
                }
                // groups must be sorted and non-overlapping
                for (a, b) in groups.iter().tuple_windows() {
                    if a.end_char_code >= b.start_char_code {
                        return Err(ParseError::BadValue);
                    }
                }
                if format == 12 {
                    Ok(CmapSubtable::Format12 { language, groups })
                } else {
                    Ok(CmapSubtable::Format13 { language, groups })
                }
            }
            14 => read_format14(ctxt, subtable_scope, num_glyphs),
            _ => {
                warn!("cmap: unsupported subtable format {}", format);
                Err(ParseError::BadVersion)
            }
        }
    }
}

fn read_format4<'a>(
    ctxt: &mut ReadCtxt<'a>,
    num_glyphs: u16,
) -> Result<CmapSubtable<'a>, ParseError> {
    let length = usize::from(ctxt.read_u16be()?);
    let language = ctxt.read_u16be()?;
    let seg_count_x2 = ctxt.read_u16be()?;
    if seg_count_x2 == 0 || seg_count_x2 & 1 != 0 {
        return Err(ParseError::BadValue);
    }
    let seg_count = usize::from(seg_count_x2 / 2);
    // searchRange, entrySelector, and rangeShift are recomputed on output
    let _search_range = ctxt.read_u16be()?;
    let _entry_selector = ctxt.read_u16be()?;
    let _range_shift = ctxt.read_u16be()?;

    let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
    let reserved_pad = ctxt.read_u16be()?;
    ctxt.check(reserved_pad == 0)?;
    let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
    let id_deltas = ctxt.read_array::<U16Be>(seg_count)?;
    let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;

    // The glyph id array occupies the rest of the subtable, per its stated
    // length; subtables may share the table so the remaining span can be
    // larger.
    let fixed_len = (8 + 4 * seg_count) * size::U16;
    if length < fixed_len {
        return Err(ParseError::BadValue);
    }
    let remaining = ctxt.scope().data().len();
    let glyph_id_bytes = (length - fixed_len).min(remaining);
    let glyph_id_array = ctxt.read_array::<U16Be>(glyph_id_bytes / size::U16)?;

    // Segments are sorted by end code, terminated by 0xFFFF, non-overlapping
    if end_codes.last() != Some(0xFFFF) {
        return Err(ParseError::BadValue);
    }
    for i in 0..seg_count {
        // NOTE(unwrap): index is within seg_count for all four arrays
        let start = start_codes.get_item(i).unwrap();
        let end = end_codes.get_item(i).unwrap();
        if start > end {
            return Err(ParseError::BadValue);
        }
        if i > 0 {
            let prev_end = end_codes.get_item(i - 1).unwrap();
            if start <= prev_end {
                return Err(ParseError::BadValue);
            }
        }

        let id_range_offset = id_range_offsets.get_item(i).unwrap();
        if id_range_offset != 0 {
            // The offset is in bytes from the idRangeOffset slot itself.
            // Check the whole segment's worth of slots resolves inside the
            // glyph id array.
            if id_range_offset & 1 != 0 {
                return Err(ParseError::BadValue);
            }
            let slots_from_end_of_offsets =
                usize::from(id_range_offset / 2).checked_sub(seg_count - i);
            let first_slot = match slots_from_end_of_offsets {
                Some(slot) => slot,
                None => return Err(ParseError::BadOffset),
            };
            let last_slot = first_slot + usize::from(end - start);
            if last_slot >= glyph_id_array.len() {
                return Err(ParseError::BadOffset);
            }
            let delta = id_deltas.get_item(i).unwrap();
            for slot in first_slot..=last_slot {
                // NOTE(unwrap): bounds checked above
                let gid = glyph_id_array.get_item(slot).unwrap();
                if gid != 0 {
                    let mapped = gid.wrapping_add(delta);
                    if mapped >= num_glyphs {
                        return Err(ParseError::BadIndex);
                    }
                }
            }
        }
    }

    Ok(CmapSubtable::Format4(CmapSubtableFormat4 {
        language,
        end_codes,
        start_codes,
        id_deltas,
        id_range_offsets,
        glyph_id_array,
    }))
}

fn read_format14<'a>(
    ctxt: &mut ReadCtxt<'a>,
    subtable_scope: ReadScope<'a>,
    num_glyphs: u16,
) -> Result<CmapSubtable<'a>, ParseError> {
    let length = usize::try_from(ctxt.read_u32be()?)?;
    let data = subtable_scope.offset_length(0, length)?;
    let num_records = usize::try_from(ctxt.read_u32be()?)?;

    let mut prev_selector = None;
    for _ in 0..num_records {
        let var_selector = ctxt.read_u24be()?;
        let default_uvs_offset = usize::try_from(ctxt.read_u32be()?)?;
        let non_default_uvs_offset = usize::try_from(ctxt.read_u32be()?)?;

        if let Some(prev) = prev_selector {
            if var_selector <= prev {
                return Err(ParseError::BadValue);
            }
        }
        prev_selector = Some(var_selector);

        if default_uvs_offset != 0 {
            let mut uvs = data.offset(default_uvs_offset).ctxt();
            let num_ranges = usize::try_from(uvs.read_u32be()?)?;
            let mut prev_end = None;
            for _ in 0..num_ranges {
                let start = uvs.read_u24be()?;
                let additional = u32::from(uvs.read_u8()?);
                let end = start.checked_add(additional).ok_or(ParseError::BadValue)?;
                if end > MAX_CHAR_CODE {
                    return Err(ParseError::BadValue);
                }
                if let Some(prev) = prev_end {
                    if start <= prev {
                        return Err(ParseError::BadValue);
                    }
                }
                prev_end = Some(end);
            }
        }

        if non_default_uvs_offset != 0 {
            let mut uvs = data.offset(non_default_uvs_offset).ctxt();
            let num_mappings = usize::try_from(uvs.read_u32be()?)?;
            let mut prev_value = None;
            for _ in 0..num_mappings {
                let unicode_value = uvs.read_u24be()?;
                let glyph_id = uvs.read_u16be()?;
                if unicode_value > MAX_CHAR_CODE || glyph_id >= num_glyphs {
                    return Err(ParseError::BadValue);
                }
                if let Some(prev) = prev_value {
                    if unicode_value <= prev {
                        return Err(ParseError::BadValue);
                    }
                }
                prev_value = Some(unicode_value);
            }
        }
    }

    Ok(CmapSubtable::Format14 { data })
}

impl<'a> WriteBinary<&Self> for Cmap<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, cmap: &Cmap<'a>) -> Result<(), WriteError> {
        let table_start = ctxt.bytes_written();
        U16Be::write(ctxt, 0u16)?; // version
        U16Be::write(ctxt, u16::try_from(cmap.encoding_records.len())?)?;

        let mut offset_placeholders = Vec::with_capacity(cmap.encoding_records.len());
        for record in &cmap.encoding_records {
            U16Be::write(ctxt, record.platform_id)?;
            U16Be::write(ctxt, record.encoding_id)?;
            offset_placeholders.push(ctxt.placeholder::<U32Be, u32>()?);
        }

        // Write each subtable once and point every record that shares it at
        // the same offset.
        let mut subtable_offsets = vec![0u32; cmap.subtables.len()];
        for (index, subtable) in cmap.subtables.iter().enumerate() {
            subtable_offsets[index] = u32::try_from(ctxt.bytes_written() - table_start)?;
            CmapSubtable::write(ctxt, subtable)?;
        }

        for (record, placeholder) in cmap.encoding_records.iter().zip(offset_placeholders) {
            ctxt.write_placeholder(placeholder, subtable_offsets[record.subtable_index])?;
        }

        Ok(())
    }
}

impl<'a> WriteBinary<&Self> for CmapSubtable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subtable: &CmapSubtable<'a>) -> Result<(), WriteError> {
        match subtable {
            CmapSubtable::Format0 {
                language,
                glyph_id_array,
            } => {
                U16Be::write(ctxt, 0u16)?;
                U16Be::write(ctxt, u16::try_from(3 * size::U16 + glyph_id_array.len())?)?;
                U16Be::write(ctxt, *language)?;
                ctxt.write_bytes(glyph_id_array)?;
            }
            CmapSubtable::Format4(format4) => {
                CmapSubtableFormat4::write(ctxt, format4)?;
            }
            CmapSubtable::Format6 {
                language,
                first_code,
                glyph_ids,
            } => {
                U16Be::write(ctxt, 6u16)?;
                let length = (5 + glyph_ids.len()) * size::U16;
                U16Be::write(ctxt, u16::try_from(length)?)?;
                U16Be::write(ctxt, *language)?;
                U16Be::write(ctxt, *first_code)?;
                U16Be::write(ctxt, u16::try_from(glyph_ids.len())?)?;
                ctxt.write_array(glyph_ids)?;
            }
            CmapSubtable::Format12 { language, groups } => {
                write_format12_or_13(ctxt, 12, *language, groups)?;
            }
            CmapSubtable::Format13 { language, groups } => {
                write_format12_or_13(ctxt, 13, *language, groups)?;
            }
            CmapSubtable::Format14 { data } => {
                ctxt.write_bytes(data.data())?;
            }
        }
        Ok(())
    }
}

fn write_format12_or_13<C: WriteContext>(
    ctxt: &mut C,
    format: u16,
    language: u32,
    groups: &[SequentialMapGroup],
) -> Result<(), WriteError> {
    U16Be::write(ctxt, format)?;
    U16Be::write(ctxt, 0u16)?; // reserved
    let length = 16 + groups.len() * 3 * size::U32;
    U32Be::write(ctxt, u32::try_from(length)?)?;
    U32Be::write(ctxt, language)?;
    U32Be::write(ctxt, u32::try_from(groups.len())?)?;
    for group in groups {
        SequentialMapGroup::write(ctxt, *group)?;
    }
    Ok(())
}

impl<'a> WriteBinary<&Self> for CmapSubtableFormat4<'a> {
    type Output = ();

    fn write<C: WriteContext>(
        ctxt: &mut C,
        table: &CmapSubtableFormat4<'a>,
    ) -> Result<(), WriteError> {
        let seg_count = table.end_codes.len();
        let length = (8 + 4 * seg_count + table.glyph_id_array.len()) * size::U16;

        U16Be::write(ctxt, 4u16)?;
        U16Be::write(ctxt, u16::try_from(length)?)?;
        U16Be::write(ctxt, table.language)?;
        let seg_count = u16::try_from(seg_count)?;
        U16Be::write(ctxt, seg_count * 2)?;

        // The binary search header is derived from segCount, never copied.
        let floor_log2 = (u16::BITS - 1 - seg_count.leading_zeros()) as u16;
        let search_range = 2 * (1 << floor_log2);
        U16Be::write(ctxt, search_range)?;
        U16Be::write(ctxt, floor_log2)?;
        U16Be::write(ctxt, seg_count * 2 - search_range)?;

        ctxt.write_array(&table.end_codes)?;
        U16Be::write(ctxt, 0u16)?; // reservedPad
        ctxt.write_array(&table.start_codes)?;
        ctxt.write_array(&table.id_deltas)?;
        ctxt.write_array(&table.id_range_offsets)?;
        ctxt.write_array(&table.glyph_id_array)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::WriteBuffer;

    /// Build a one-segment format 4 subtable mapping `ch` to glyph via delta.
    fn format4_bytes(ch: u16, gid: u16) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 4u16).unwrap(); // format
        U16Be::write(&mut w, 40u16).unwrap(); // length
        U16Be::write(&mut w, 0u16).unwrap(); // language
        U16Be::write(&mut w, 4u16).unwrap(); // segCountX2
        // deliberately bogus search fields, they must be recomputed not trusted
        U16Be::write(&mut w, 99u16).unwrap();
        U16Be::write(&mut w, 99u16).unwrap();
        U16Be::write(&mut w, 99u16).unwrap();
        // end codes
        U16Be::write(&mut w, ch).unwrap();
        U16Be::write(&mut w, 0xFFFFu16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap(); // reservedPad
        // start codes
        U16Be::write(&mut w, ch).unwrap();
        U16Be::write(&mut w, 0xFFFFu16).unwrap();
        // id deltas
        U16Be::write(&mut w, gid.wrapping_sub(ch)).unwrap();
        U16Be::write(&mut w, 1u16).unwrap();
        // id range offsets
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        w.into_inner()
    }

    fn cmap_bytes(subtable: &[u8]) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 0u16).unwrap(); // version
        U16Be::write(&mut w, 1u16).unwrap(); // numTables
        U16Be::write(&mut w, 3u16).unwrap(); // platform: Windows
        U16Be::write(&mut w, 1u16).unwrap(); // encoding: Unicode BMP
        U32Be::write(&mut w, 12u32).unwrap(); // offset
        w.write_bytes(subtable).unwrap();
        w.into_inner()
    }

    #[test]
    fn parses_format4_and_recomputes_search_header() {
        let data = cmap_bytes(&format4_bytes(0x20, 0));
        let cmap = ReadScope::new(&data).read_dep::<Cmap<'_>>(2).unwrap();
        assert_eq!(cmap.encoding_records.len(), 1);

        let mut out = WriteBuffer::new();
        Cmap::write(&mut out, &cmap).unwrap();
        let out = out.into_inner();
        // subtable begins at offset 12; searchRange at subtable offset 8
        assert_eq!(&out[12 + 8..12 + 14], &[0, 4, 0, 1, 0, 0]);
    }

    #[test]
    fn output_reparses() {
        let data = cmap_bytes(&format4_bytes(0x41, 1));
        let cmap = ReadScope::new(&data).read_dep::<Cmap<'_>>(2).unwrap();
        let mut out = WriteBuffer::new();
        Cmap::write(&mut out, &cmap).unwrap();
        let out = out.into_inner();
        assert!(ReadScope::new(&out).read_dep::<Cmap<'_>>(2).is_ok());
    }

    #[test]
    fn rejects_overlapping_segments() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 4u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 4u16).unwrap(); // two segments
        w.write_zeros(6).unwrap(); // search fields
        // end codes 0x30, 0xFFFF
        U16Be::write(&mut w, 0x30u16).unwrap();
        U16Be::write(&mut w, 0xFFFFu16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        // start codes: second segment starts before first ends
        U16Be::write(&mut w, 0x20u16).unwrap();
        U16Be::write(&mut w, 0x25u16).unwrap();
        w.write_zeros(8).unwrap(); // deltas + range offsets
        let data = cmap_bytes(&w.into_inner());
        assert!(ReadScope::new(&data).read_dep::<Cmap<'_>>(100).is_err());
    }

    #[test]
    fn rejects_format12_glyph_out_of_range() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 12u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        U32Be::write(&mut w, 28u32).unwrap(); // length
        U32Be::write(&mut w, 0u32).unwrap(); // language
        U32Be::write(&mut w, 1u32).unwrap(); // numGroups
        SequentialMapGroup::write(
            &mut w,
            SequentialMapGroup {
                start_char_code: 0x41,
                end_char_code: 0x44,
                glyph_id: 1,
            },
        )
        .unwrap();
        let data = cmap_bytes(&w.into_inner());
        // glyphs 1..=4 required but font only has 3
        assert_eq!(
            ReadScope::new(&data).read_dep::<Cmap<'_>>(3).err(),
            Some(ParseError::BadIndex)
        );
    }

    #[test]
    fn drops_unknown_platform() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 0u16).unwrap(); // version
        U16Be::write(&mut w, 2u16).unwrap(); // numTables
        // platform 2 (ISO, deprecated) is dropped
        U16Be::write(&mut w, 2u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        U32Be::write(&mut w, 20u32).unwrap();
        // platform 3 retained
        U16Be::write(&mut w, 3u16).unwrap();
        U16Be::write(&mut w, 1u16).unwrap();
        U32Be::write(&mut w, 20u32).unwrap();
        w.write_bytes(&format4_bytes(0x20, 0)).unwrap();
        let data = w.into_inner();
        let cmap = ReadScope::new(&data).read_dep::<Cmap<'_>>(1).unwrap();
        assert_eq!(cmap.encoding_records.len(), 1);
        assert_eq!(cmap.encoding_records[0].platform_id, 3);
    }

    #[test]
    fn fails_when_nothing_retained() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 2u16).unwrap(); // ISO platform, dropped
        U16Be::write(&mut w, 0u16).unwrap();
        U32Be::write(&mut w, 12u32).unwrap();
        w.write_bytes(&format4_bytes(0x20, 0)).unwrap();
        let data = w.into_inner();
        assert_eq!(
            ReadScope::new(&data).read_dep::<Cmap<'_>>(1).err(),
            Some(ParseError::MissingValue)
        );
    }
}
