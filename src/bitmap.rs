//! Validation of the `EBLC` and `EBDT` embedded bitmap tables.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/eblc>
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/ebdt>
//!
//! `EBLC` is the directory of strikes; each strike points to index subtables
//! which address glyph bitmap records in `EBDT`. The walker crosses from the
//! index subtables into the bitmap data, computing each image's size from
//! its format and metrics and checking it fits, and that it agrees with the
//! size implied by neighbouring offsets where one exists. Both tables are
//! re-emitted verbatim.

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::error::{ParseError, WriteError};

/// Size of a BitmapSize record in EBLC.
const BITMAP_SIZE_RECORD_LEN: usize = 48;

/// Size of the small glyph metrics header in EBDT.
const SMALL_METRICS_LEN: u32 = 5;

/// Size of the big glyph metrics header in EBDT.
const BIG_METRICS_LEN: u32 = 8;

/// `EBDT` table: version checked here, contents validated by the `EBLC` walk.
pub struct EbdtTable<'a> {
    data: ReadScope<'a>,
}

/// `EBLC` table, validated against its `EBDT`.
pub struct EblcTable<'a> {
    data: ReadScope<'a>,
}

impl<'b> ReadBinary for EbdtTable<'b> {
    type HostType<'a> = EbdtTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let version_major = ctxt.read_u16be()?;
        let version_minor = ctxt.read_u16be()?;
        ctxt.check_version(version_major == 2 && version_minor == 0)?;
        let data = scope.offset_length(0, scope.data().len())?;
        Ok(EbdtTable { data })
    }
}

impl<'a> EbdtTable<'a> {
    /// The whole table, for the EBLC walker.
    pub fn scope(&self) -> ReadScope<'a> {
        self.data.clone()
    }
}

impl<'a> WriteBinary<&Self> for EbdtTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &EbdtTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

impl<'b> ReadBinaryDep for EblcTable<'b> {
    type Args<'a> = ReadScope<'a>; // the EBDT table
    type HostType<'a> = EblcTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        ebdt: ReadScope<'a>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let eblc = ctxt.scope();
        let eblc_length = eblc.data().len();

        let version_major = ctxt.read_u16be()?;
        let version_minor = ctxt.read_u16be()?;
        ctxt.check_version(version_major == 2 && version_minor == 0)?;
        let num_sizes = usize::try_from(ctxt.read_u32be()?)?;
        let bitmap_size_end = 8 + num_sizes
            .checked_mul(BITMAP_SIZE_RECORD_LEN)
            .ok_or(ParseError::BadValue)?;

        let mut strikes = Vec::with_capacity(num_sizes.min(64));
        for _ in 0..num_sizes {
            let index_sub_table_array_offset = usize::try_from(ctxt.read_u32be()?)?;
            let _index_tables_size = ctxt.read_u32be()?;
            let number_of_index_sub_tables = ctxt.read_u32be()?;
            let color_ref = ctxt.read_u32be()?;
            // horizontal and vertical SbitLineMetrics
            let _line_metrics = ctxt.read_slice(24)?;
            let start_glyph_index = ctxt.read_u16be()?;
            let end_glyph_index = ctxt.read_u16be()?;
            let _ppem_x = ctxt.read_u8()?;
            let _ppem_y = ctxt.read_u8()?;
            let bit_depth = ctxt.read_u8()?;
            let flags = ctxt.read_u8()?;

            ctxt.check(color_ref == 0)?;
            ctxt.check(start_glyph_index <= end_glyph_index)?;
            if !matches!(bit_depth, 1 | 2 | 4 | 8) {
                return Err(ParseError::BadValue);
            }
            // bits 2..8 of the flags are reserved
            if flags & 0xFC != 0 {
                return Err(ParseError::BadValue);
            }
            if index_sub_table_array_offset < bitmap_size_end
                || index_sub_table_array_offset >= eblc_length
            {
                return Err(ParseError::BadOffset);
            }

            strikes.push((
                index_sub_table_array_offset,
                number_of_index_sub_tables,
                bit_depth,
            ));
        }

        for (array_offset, num_sub_tables, bit_depth) in strikes {
            let mut array = eblc.offset(array_offset).ctxt();
            for _ in 0..num_sub_tables {
                let first_glyph_index = array.read_u16be()?;
                let last_glyph_index = array.read_u16be()?;
                let additional_offset = usize::try_from(array.read_u32be()?)?;
                if last_glyph_index < first_glyph_index {
                    return Err(ParseError::BadValue);
                }
                let offset = array_offset
                    .checked_add(additional_offset)
                    .ok_or(ParseError::BadOffset)?;
                if offset >= eblc_length {
                    return Err(ParseError::BadOffset);
                }
                read_index_sub_table(
                    eblc.offset(offset),
                    &ebdt,
                    bit_depth,
                    first_glyph_index,
                    last_glyph_index,
                )?;
            }
        }

        let data = eblc.offset_length(0, eblc_length)?;
        Ok(EblcTable { data })
    }
}

impl<'a> WriteBinary<&Self> for EblcTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &EblcTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

fn read_index_sub_table(
    scope: ReadScope<'_>,
    ebdt: &ReadScope<'_>,
    bit_depth: u8,
    first_glyph_index: u16,
    last_glyph_index: u16,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let index_format = ctxt.read_u16be()?;
    let image_format = ctxt.read_u16be()?;
    let image_data_offset = ctxt.read_u32be()?;

    let num_glyphs = u32::from(last_glyph_index - first_glyph_index) + 1;

    match index_format {
        // IndexSubTable1: variable metrics, 4-byte offsets
        // IndexSubTable3: like 1 but with 2-byte offsets
        1 | 3 => {
            let mut prev_offset = read_index_offset(&mut ctxt, index_format)?;
            for _ in 0..num_glyphs {
                let next_offset = read_index_offset(&mut ctxt, index_format)?;
                if next_offset < prev_offset {
                    return Err(ParseError::BadOffset);
                }
                let image_size = next_offset - prev_offset;
                let glyph_offset = image_data_offset
                    .checked_add(prev_offset)
                    .ok_or(ParseError::BadOffset)?;
                prev_offset = next_offset;
                if image_size == 0 {
                    // zero-size entries mark absent glyphs
                    continue;
                }
                let computed =
                    read_variable_metrics_image(ebdt, glyph_offset, image_format, bit_depth)?;
                // the offset delta and the format-implied size must agree
                if computed != image_size {
                    return Err(ParseError::BadValue);
                }
            }
        }
        // IndexSubTable2: all glyphs share one size and metrics
        2 => {
            let image_size = ctxt.read_u32be()?;
            let (width, height) = read_big_metrics(&mut ctxt)?;
            for i in 0..num_glyphs {
                let glyph_offset = image_data_offset
                    .checked_add(image_size.checked_mul(i).ok_or(ParseError::BadValue)?)
                    .ok_or(ParseError::BadOffset)?;
                read_constant_metrics_image(
                    ebdt,
                    glyph_offset,
                    image_format,
                    bit_depth,
                    width,
                    height,
                )?;
            }
        }
        // IndexSubTable4: sparse glyph codes, variable metrics
        4 => {
            let num_glyphs = ctxt.read_u16be()?;
            let mut this_glyph_id = ctxt.read_u16be()?;
            let mut this_offset = ctxt.read_u16be()?;
            for i in 0..num_glyphs {
                let next_glyph_id = ctxt.read_u16be()?;
                let next_offset = ctxt.read_u16be()?;
                if i + 1 < num_glyphs && next_glyph_id < this_glyph_id {
                    return Err(ParseError::BadValue);
                }
                if this_glyph_id < first_glyph_index || this_glyph_id > last_glyph_index {
                    return Err(ParseError::BadIndex);
                }
                if next_offset < this_offset {
                    return Err(ParseError::BadOffset);
                }
                let image_size = u32::from(next_offset - this_offset);
                let glyph_offset = image_data_offset
                    .checked_add(u32::from(this_offset))
                    .ok_or(ParseError::BadOffset)?;
                this_glyph_id = next_glyph_id;
                this_offset = next_offset;
                if image_size == 0 {
                    continue;
                }
                let computed =
                    read_variable_metrics_image(ebdt, glyph_offset, image_format, bit_depth)?;
                if computed != image_size {
                    return Err(ParseError::BadValue);
                }
            }
        }
        // IndexSubTable5: sparse glyph codes, constant metrics
        5 => {
            let image_size = ctxt.read_u32be()?;
            let (width, height) = read_big_metrics(&mut ctxt)?;
            let num_glyphs = ctxt.read_u32be()?;
            let mut last_glyph_id = None;
            for i in 0..num_glyphs {
                let glyph_id = ctxt.read_u16be()?;
                if last_glyph_id.map_or(false, |last| glyph_id <= last) {
                    return Err(ParseError::BadValue);
                }
                last_glyph_id = Some(glyph_id);
                let glyph_offset = image_data_offset
                    .checked_add(image_size.checked_mul(i).ok_or(ParseError::BadValue)?)
                    .ok_or(ParseError::BadOffset)?;
                read_constant_metrics_image(
                    ebdt,
                    glyph_offset,
                    image_format,
                    bit_depth,
                    width,
                    height,
                )?;
            }
            // the glyph id array is padded to a 32-bit boundary
            if (num_glyphs + 1) % 2 != 0 {
                let pad = ctxt.read_u16be()?;
                if pad != 0 {
                    return Err(ParseError::BadValue);
                }
            }
        }
        _ => return Err(ParseError::BadVersion),
    }

    Ok(())
}

fn read_index_offset(ctxt: &mut ReadCtxt<'_>, index_format: u16) -> Result<u32, ParseError> {
    if index_format == 1 {
        Ok(ctxt.read_u32be()?)
    } else {
        Ok(u32::from(ctxt.read_u16be()?))
    }
}

/// Read big glyph metrics, returning (width, height).
fn read_big_metrics(ctxt: &mut ReadCtxt<'_>) -> Result<(u8, u8), ParseError> {
    let height = ctxt.read_u8()?;
    let width = ctxt.read_u8()?;
    let _hori_bearing_x = ctxt.read_i8()?;
    let _hori_bearing_y = ctxt.read_i8()?;
    let _hori_advance = ctxt.read_u8()?;
    let _vert_bearing_x = ctxt.read_i8()?;
    let _vert_bearing_y = ctxt.read_i8()?;
    let _vert_advance = ctxt.read_u8()?;
    Ok((width, height))
}

/// Read small glyph metrics, returning (width, height).
fn read_small_metrics(ctxt: &mut ReadCtxt<'_>) -> Result<(u8, u8), ParseError> {
    let height = ctxt.read_u8()?;
    let width = ctxt.read_u8()?;
    let _bearing_x = ctxt.read_i8()?;
    let _bearing_y = ctxt.read_i8()?;
    let _advance = ctxt.read_u8()?;
    Ok((width, height))
}

fn bit_aligned_len(width: u8, height: u8, bit_depth: u8) -> u32 {
    let bits = u32::from(width) * u32::from(height) * u32::from(bit_depth);
    (bits + 7) / 8
}

fn byte_aligned_len(width: u8, height: u8, bit_depth: u8) -> u32 {
    let bits_per_row = u32::from(width) * u32::from(bit_depth);
    ((bits_per_row + 7) / 8) * u32::from(height)
}

fn component_data_len(num_components: u16) -> u32 {
    // numComponents field plus (glyphId, xOffset, yOffset) per component
    2 + u32::from(num_components) * 4
}

/// Check that `size` bytes starting at `offset` lie within the EBDT table.
fn check_ebdt_range(ebdt: &ReadScope<'_>, offset: u32, size: u32) -> Result<(), ParseError> {
    let end = u64::from(offset) + u64::from(size);
    if end > ebdt.data().len() as u64 {
        return Err(ParseError::BadEof);
    }
    Ok(())
}

/// Parse one glyph image with its own metrics, returning the computed image
/// size in bytes.
fn read_variable_metrics_image(
    ebdt: &ReadScope<'_>,
    offset: u32,
    image_format: u16,
    bit_depth: u8,
) -> Result<u32, ParseError> {
    let mut ctxt = ebdt.offset(usize::try_from(offset)?).ctxt();
    let image_size = match image_format {
        // small metrics, byte-aligned data
        1 => {
            let (width, height) = read_small_metrics(&mut ctxt)?;
            SMALL_METRICS_LEN + byte_aligned_len(width, height, bit_depth)
        }
        // small metrics, bit-aligned data
        2 => {
            let (width, height) = read_small_metrics(&mut ctxt)?;
            SMALL_METRICS_LEN + bit_aligned_len(width, height, bit_depth)
        }
        // obsolete (3) and unsupported (4) compressed formats
        3 | 4 => return Err(ParseError::Unsupported),
        5 => {
            // format 5 carries no metrics of its own
            return Err(ParseError::BadValue);
        }
        // big metrics, byte-aligned data
        6 => {
            let (width, height) = read_big_metrics(&mut ctxt)?;
            BIG_METRICS_LEN + byte_aligned_len(width, height, bit_depth)
        }
        // big metrics, bit-aligned data
        7 => {
            let (width, height) = read_big_metrics(&mut ctxt)?;
            BIG_METRICS_LEN + bit_aligned_len(width, height, bit_depth)
        }
        // small metrics, component data
        8 => {
            let _metrics = read_small_metrics(&mut ctxt)?;
            let _pad = ctxt.read_u8()?;
            let num_components = ctxt.read_u16be()?;
            SMALL_METRICS_LEN + 1 + component_data_len(num_components)
        }
        // big metrics, component data
        9 => {
            let _metrics = read_big_metrics(&mut ctxt)?;
            let num_components = ctxt.read_u16be()?;
            BIG_METRICS_LEN + component_data_len(num_components)
        }
        _ => return Err(ParseError::Unsupported),
    };

    check_ebdt_range(ebdt, offset, image_size)?;
    Ok(image_size)
}

/// Parse one glyph image whose metrics live in the index subtable.
fn read_constant_metrics_image(
    ebdt: &ReadScope<'_>,
    offset: u32,
    image_format: u16,
    bit_depth: u8,
    width: u8,
    height: u8,
) -> Result<u32, ParseError> {
    match image_format {
        3 | 4 => Err(ParseError::Unsupported),
        // format 5 is the only image format without per-glyph metrics
        5 => {
            let image_size = bit_aligned_len(width, height, bit_depth);
            check_ebdt_range(ebdt, offset, image_size)?;
            Ok(image_size)
        }
        1 | 2 | 6 | 7 | 8 | 9 => {
            read_variable_metrics_image(ebdt, offset, image_format, bit_depth)
        }
        _ => Err(ParseError::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBuffer, WriteContext};
    use crate::binary::{U16Be, U32Be, U8};

    fn small_metrics(w: &mut WriteBuffer, width: u8, height: u8) {
        U8::write(w, height).unwrap();
        U8::write(w, width).unwrap();
        U8::write(w, 0u8).unwrap(); // bearingX
        U8::write(w, 0u8).unwrap(); // bearingY
        U8::write(w, width).unwrap(); // advance
    }

    /// EBDT with one format-1 glyph image: 2x2 pixels at 1 bit per pixel
    /// needs one byte per row.
    fn ebdt_fixture() -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 2u16).unwrap(); // major
        U16Be::write(&mut w, 0u16).unwrap(); // minor
        small_metrics(&mut w, 2, 2);
        w.write_bytes(&[0b1100_0000, 0b0100_0000]).unwrap();
        w.into_inner()
    }

    /// EBLC with one strike and one format-1 index subtable covering glyphs
    /// 1..=1, pointing at the image in [ebdt_fixture].
    fn eblc_fixture(image_size: u32) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 2u16).unwrap(); // major
        U16Be::write(&mut w, 0u16).unwrap(); // minor
        U32Be::write(&mut w, 1u32).unwrap(); // numSizes
        // BitmapSize record
        U32Be::write(&mut w, 56u32).unwrap(); // indexSubTableArrayOffset
        U32Be::write(&mut w, 16u32).unwrap(); // indexTablesSize
        U32Be::write(&mut w, 1u32).unwrap(); // numberOfIndexSubTables
        U32Be::write(&mut w, 0u32).unwrap(); // colorRef
        w.write_zeros(24).unwrap(); // line metrics
        U16Be::write(&mut w, 1u16).unwrap(); // startGlyphIndex
        U16Be::write(&mut w, 1u16).unwrap(); // endGlyphIndex
        U8::write(&mut w, 4u8).unwrap(); // ppemX
        U8::write(&mut w, 4u8).unwrap(); // ppemY
        U8::write(&mut w, 1u8).unwrap(); // bitDepth
        U8::write(&mut w, 1u8).unwrap(); // flags: horizontal
        // IndexSubTableArray at 56
        U16Be::write(&mut w, 1u16).unwrap(); // firstGlyphIndex
        U16Be::write(&mut w, 1u16).unwrap(); // lastGlyphIndex
        U32Be::write(&mut w, 8u32).unwrap(); // additionalOffsetToIndexSubtable
        // IndexSubTable1 at 64
        U16Be::write(&mut w, 1u16).unwrap(); // indexFormat
        U16Be::write(&mut w, 1u16).unwrap(); // imageFormat
        U32Be::write(&mut w, 4u32).unwrap(); // imageDataOffset (past EBDT header)
        U32Be::write(&mut w, 0u32).unwrap(); // offsets[0]
        U32Be::write(&mut w, image_size).unwrap(); // offsets[1]
        w.into_inner()
    }

    #[test]
    fn walks_format1_strike() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        // image = 5 byte small metrics + 2 rows of 1 byte
        let eblc_data = eblc_fixture(7);
        assert!(ReadScope::new(&eblc_data)
            .read_dep::<EblcTable<'_>>(ebdt.scope())
            .is_ok());
    }

    #[test]
    fn rejects_size_mismatch() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        // claims 8 bytes, format computes 7
        let eblc_data = eblc_fixture(8);
        assert_eq!(
            ReadScope::new(&eblc_data)
                .read_dep::<EblcTable<'_>>(ebdt.scope())
                .err(),
            Some(ParseError::BadValue)
        );
    }

    #[test]
    fn rejects_bad_bit_depth() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        let mut eblc_data = eblc_fixture(7);
        eblc_data[54] = 3; // bitDepth
        assert!(ReadScope::new(&eblc_data)
            .read_dep::<EblcTable<'_>>(ebdt.scope())
            .is_err());
    }

    #[test]
    fn rejects_reserved_flags() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        let mut eblc_data = eblc_fixture(7);
        eblc_data[55] = 0x04; // reserved flag bit
        assert!(ReadScope::new(&eblc_data)
            .read_dep::<EblcTable<'_>>(ebdt.scope())
            .is_err());
    }

    #[test]
    fn rejects_obsolete_image_format3() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        let mut eblc_data = eblc_fixture(7);
        eblc_data[67] = 3; // imageFormat low byte
        assert_eq!(
            ReadScope::new(&eblc_data)
                .read_dep::<EblcTable<'_>>(ebdt.scope())
                .err(),
            Some(ParseError::Unsupported)
        );
    }

    #[test]
    fn rejects_image_past_ebdt_end() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        let mut eblc_data = eblc_fixture(7);
        // push the image data offset past the EBDT end
        eblc_data[71] = 100; // imageDataOffset low byte
        assert!(ReadScope::new(&eblc_data)
            .read_dep::<EblcTable<'_>>(ebdt.scope())
            .is_err());
    }

    #[test]
    fn rejects_bad_eblc_version() {
        let ebdt_data = ebdt_fixture();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        let mut eblc_data = eblc_fixture(7);
        eblc_data[0] = 0;
        eblc_data[1] = 3;
        assert_eq!(
            ReadScope::new(&eblc_data)
                .read_dep::<EblcTable<'_>>(ebdt.scope())
                .err(),
            Some(ParseError::BadVersion)
        );
    }
}
