//! Parsing of the `CPAL` table.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/cpal>
//!
//! Validated and re-emitted verbatim. Supplies `numPaletteEntries` to the
//! `COLR` paint walker.

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{U16Be, U32Be};
use crate::error::{ParseError, WriteError};

/// `CPAL` — Color Palette Table
pub struct CpalTable<'a> {
    pub version: u16,
    pub num_palette_entries: u16,
    pub num_palettes: u16,
    data: ReadScope<'a>,
}

impl<'b> ReadBinary for CpalTable<'b> {
    type HostType<'a> = CpalTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version <= 1)?;
        let num_palette_entries = ctxt.read_u16be()?;
        let num_palettes = ctxt.read_u16be()?;
        // A CPAL table must provide at least one palette with at least one entry
        ctxt.check(num_palette_entries > 0)?;
        ctxt.check(num_palettes > 0)?;
        let num_color_records = ctxt.read_u16be()?;
        ctxt.check(num_color_records >= num_palette_entries)?;
        let color_records_array_offset = usize::try_from(ctxt.read_u32be()?)?;

        // None of the array offsets may point back into the header itself
        let mut header_size = 4 * 2 + 4 + usize::from(num_palettes) * 2;
        if version == 1 {
            header_size += 3 * 4;
        }
        if color_records_array_offset < header_size {
            return Err(ParseError::BadOffset);
        }

        let color_record_indices = ctxt.read_array::<U16Be>(usize::from(num_palettes))?;
        for index in &color_record_indices {
            // every palette must address a full run of palette entries
            if usize::from(index) + usize::from(num_palette_entries)
                > usize::from(num_color_records)
            {
                return Err(ParseError::BadIndex);
            }
        }

        // The color records are BGRA u32s; confirm they are all in bounds
        scope
            .offset(color_records_array_offset)
            .ctxt()
            .read_array::<U32Be>(usize::from(num_color_records))?;

        if version == 1 {
            let palette_types_offset = usize::try_from(ctxt.read_u32be()?)?;
            let palette_labels_offset = usize::try_from(ctxt.read_u32be()?)?;
            let palette_entry_labels_offset = usize::try_from(ctxt.read_u32be()?)?;
            if palette_types_offset != 0 {
                if palette_types_offset < header_size {
                    return Err(ParseError::BadOffset);
                }
                scope
                    .offset(palette_types_offset)
                    .ctxt()
                    .read_array::<U32Be>(usize::from(num_palettes))?;
            }
            if palette_labels_offset != 0 {
                if palette_labels_offset < header_size {
                    return Err(ParseError::BadOffset);
                }
                scope
                    .offset(palette_labels_offset)
                    .ctxt()
                    .read_array::<U16Be>(usize::from(num_palettes))?;
            }
            if palette_entry_labels_offset != 0 {
                if palette_entry_labels_offset < header_size {
                    return Err(ParseError::BadOffset);
                }
                scope
                    .offset(palette_entry_labels_offset)
                    .ctxt()
                    .read_array::<U16Be>(usize::from(num_palette_entries))?;
            }
        }

        let data = scope.offset_length(0, scope.data().len())?;
        Ok(CpalTable {
            version,
            num_palette_entries,
            num_palettes,
            data,
        })
    }
}

impl<'a> WriteBinary<&Self> for CpalTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &CpalTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}
