//! Parsing and writing of the `post` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/post>
//!
//! Version 2.0 glyph name data is validated but never carried into the
//! output: the sanitizer always emits a version 3.0 table, which consists of
//! the header alone.

use crate::binary::read::{ReadBinaryDep, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, U16Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::tables::Fixed;

/// Number of entries in the standard Macintosh glyph name set.
const NUM_STANDARD_NAMES: u16 = 258;

/// `post` table header. Name data from version 2.0 is validated and dropped.
pub struct PostTable {
    pub italic_angle: Fixed,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: u32,
    pub min_mem_type42: u32,
    pub max_mem_type42: u32,
    pub min_mem_type1: u32,
    pub max_mem_type1: u32,
}

impl ReadBinaryDep for PostTable {
    type Args<'a> = u16; // num_glyphs from maxp
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, num_glyphs: u16) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(matches!(
            version,
            0x00010000 | 0x00020000 | 0x00025000 | 0x00030000
        ))?;
        let italic_angle = ctxt.read::<Fixed>()?;
        let underline_position = ctxt.read_i16be()?;
        let underline_thickness = ctxt.read_i16be()?;
        let is_fixed_pitch = ctxt.read_u32be()?;
        let min_mem_type42 = ctxt.read_u32be()?;
        let max_mem_type42 = ctxt.read_u32be()?;
        let min_mem_type1 = ctxt.read_u32be()?;
        let max_mem_type1 = ctxt.read_u32be()?;

        if version == 0x00020000 {
            let name_count = ctxt.read_u16be()?;
            if name_count != num_glyphs {
                return Err(ParseError::BadValue);
            }
            let indices = ctxt.read_array::<U16Be>(usize::from(name_count))?;
            let mut max_custom_index = None;
            for index in &indices {
                if index >= 32768 {
                    return Err(ParseError::BadIndex);
                }
                if index >= NUM_STANDARD_NAMES {
                    let custom = index - NUM_STANDARD_NAMES;
                    if max_custom_index.map_or(true, |max| custom > max) {
                        max_custom_index = Some(custom);
                    }
                }
            }

            // Walk the Pascal strings, every referenced custom name must exist
            if let Some(max_index) = max_custom_index {
                for _ in 0..=max_index {
                    let length = ctxt.read_u8()?;
                    let _name = ctxt.read_slice(usize::from(length))?;
                }
            }
        }

        Ok(PostTable {
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
            min_mem_type42,
            max_mem_type42,
            min_mem_type1,
            max_mem_type1,
        })
    }
}

impl WriteBinary<&Self> for PostTable {
    type Output = ();

    /// Write the header as a version 3.0 table.
    fn write<C: WriteContext>(ctxt: &mut C, table: &PostTable) -> Result<(), WriteError> {
        U32Be::write(ctxt, 0x00030000u32)?;
        Fixed::write(ctxt, table.italic_angle)?;
        I16Be::write(ctxt, table.underline_position)?;
        I16Be::write(ctxt, table.underline_thickness)?;
        U32Be::write(ctxt, table.is_fixed_pitch)?;
        U32Be::write(ctxt, table.min_mem_type42)?;
        U32Be::write(ctxt, table.max_mem_type42)?;
        U32Be::write(ctxt, table.min_mem_type1)?;
        U32Be::write(ctxt, table.max_mem_type1)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::{WriteBuffer, WriteContext};
    use crate::binary::U8;

    fn post_header(version: u32) -> WriteBuffer {
        let mut w = WriteBuffer::new();
        U32Be::write(&mut w, version).unwrap();
        U32Be::write(&mut w, 0u32).unwrap(); // italicAngle
        I16Be::write(&mut w, -100i16).unwrap(); // underlinePosition
        I16Be::write(&mut w, 50i16).unwrap(); // underlineThickness
        U32Be::write(&mut w, 0u32).unwrap(); // isFixedPitch
        w.write_zeros(16).unwrap(); // memory fields
        w
    }

    #[test]
    fn version3_round_trips_as_version3() {
        let data = post_header(0x00030000).into_inner();
        let post = ReadScope::new(&data).read_dep::<PostTable>(2).unwrap();
        let mut out = WriteBuffer::new();
        PostTable::write(&mut out, &post).unwrap();
        assert_eq!(out.bytes(), &data[..]);
    }

    #[test]
    fn version2_downgrades_to_version3() {
        let mut w = post_header(0x00020000);
        U16Be::write(&mut w, 2u16).unwrap(); // numGlyphs
        U16Be::write(&mut w, 0u16).unwrap(); // .notdef
        U16Be::write(&mut w, 258u16).unwrap(); // first custom name
        U8::write(&mut w, 1u8).unwrap(); // Pascal string "A"
        w.write_bytes(b"A").unwrap();
        let data = w.into_inner();
        let post = ReadScope::new(&data).read_dep::<PostTable>(2).unwrap();

        let mut out = WriteBuffer::new();
        PostTable::write(&mut out, &post).unwrap();
        assert_eq!(&out.bytes()[0..4], &[0x00, 0x03, 0x00, 0x00]);
        assert_eq!(out.bytes().len(), 32);
    }

    #[test]
    fn version2_rejects_glyph_count_mismatch() {
        let mut w = post_header(0x00020000);
        U16Be::write(&mut w, 3u16).unwrap(); // numGlyphs disagrees with maxp
        let data = w.into_inner();
        assert_eq!(
            ReadScope::new(&data).read_dep::<PostTable>(2).err(),
            Some(ParseError::BadValue)
        );
    }

    #[test]
    fn version2_rejects_missing_name_data() {
        let mut w = post_header(0x00020000);
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 300u16).unwrap(); // custom index 42, no strings follow
        let data = w.into_inner();
        assert!(ReadScope::new(&data).read_dep::<PostTable>(1).is_err());
    }
}
