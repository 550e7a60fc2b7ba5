//! Parsing and writing of the `loca` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/loca>

use itertools::Itertools;

use crate::binary::read::{ReadArray, ReadBinaryDep, ReadCtxt};
use crate::binary::{U16Be, U32Be};
use crate::error::ParseError;
use crate::tables::IndexToLocFormat;

/// `loca` table
///
/// The offsets are validated to be monotonically non-decreasing on parse. The
/// last offset bounding the `glyf` table is checked by the `glyf` parser,
/// which regenerates this table when it repacks the glyph data.
#[derive(Clone, Debug)]
pub struct LocaTable<'a> {
    pub offsets: LocaOffsets<'a>,
}

/// The offset array in its short or long form.
#[derive(Clone, Debug)]
pub enum LocaOffsets<'a> {
    Short(ReadArray<'a, U16Be>),
    Long(ReadArray<'a, U32Be>),
}

impl<'b> ReadBinaryDep for LocaTable<'b> {
    type Args<'a> = (u16, IndexToLocFormat);
    type HostType<'a> = LocaTable<'a>;

    /// Read a `loca` table from `ctxt`
    ///
    /// * `num_glyphs` comes from `maxp`.
    /// * `index_to_loc_format` comes from `head`.
    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, index_to_loc_format): (u16, IndexToLocFormat),
    ) -> Result<Self::HostType<'a>, ParseError> {
        let num_offsets = usize::from(num_glyphs) + 1;
        let offsets = match index_to_loc_format {
            IndexToLocFormat::Short => {
                // The actual offset divided by 2 is stored.
                LocaOffsets::Short(ctxt.read_array::<U16Be>(num_offsets)?)
            }
            IndexToLocFormat::Long => LocaOffsets::Long(ctxt.read_array::<U32Be>(num_offsets)?),
        };

        let loca = LocaTable { offsets };
        for (start, end) in loca.offsets.iter().tuple_windows() {
            if start > end {
                return Err(ParseError::BadValue);
            }
        }

        Ok(loca)
    }
}

impl<'a> LocaTable<'a> {
    /// The last offset in the table, which must equal the `glyf` length.
    pub fn last_offset(&self) -> Option<u32> {
        self.offsets.last()
    }
}

impl<'a> LocaOffsets<'a> {
    /// Iterate the resolved byte offsets in this table.
    pub fn iter<'s>(&'s self) -> impl Iterator<Item = u32> + 's + use<'s, 'a> {
        // NOTE(unwrap): Safe as iteration is bounded by len
        (0..self.len()).map(move |index| self.get(index).unwrap())
    }

    /// Returns the number of offsets in the table.
    pub fn len(&self) -> usize {
        match self {
            LocaOffsets::Short(array) => array.len(),
            LocaOffsets::Long(array) => array.len(),
        }
    }

    /// Returns `true` if the table holds no offsets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the resolved byte offset at `index`.
    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            LocaOffsets::Short(array) => array.get_item(index).map(|offset| u32::from(offset) * 2),
            LocaOffsets::Long(array) => array.get_item(index),
        }
    }

    /// Get the last offset in the table.
    pub fn last(&self) -> Option<u32> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }
}

pub mod owned {
    //! Regenerated `loca` data produced by repacking `glyf`.

    use super::{IndexToLocFormat, U16Be, U32Be};
    use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteContext};
    use crate::error::WriteError;

    /// A regenerated offset array.
    pub struct LocaTable {
        pub offsets: Vec<u32>,
    }

    impl LocaTable {
        /// The `indexToLocFormat` required to represent these offsets.
        ///
        /// Offsets beyond `0xFFFF * 2` force the long format.
        pub fn required_format(&self) -> IndexToLocFormat {
            match self.offsets.last() {
                Some(&last) if last / 2 > u32::from(u16::MAX) => IndexToLocFormat::Long,
                _ => IndexToLocFormat::Short,
            }
        }
    }

    impl WriteBinaryDep<Self> for LocaTable {
        type Output = ();
        type Args = IndexToLocFormat;

        fn write_dep<C: WriteContext>(
            ctxt: &mut C,
            loca: LocaTable,
            index_to_loc_format: Self::Args,
        ) -> Result<(), WriteError> {
            match index_to_loc_format {
                IndexToLocFormat::Short => {
                    for offset in loca.offsets {
                        if offset & 1 == 1 {
                            // odd offsets can't use this format
                            return Err(WriteError::BadValue);
                        }
                        let short_offset = u16::try_from(offset / 2)?;
                        <U16Be as WriteBinary<u16>>::write(ctxt, short_offset)?;
                    }

                    Ok(())
                }
                IndexToLocFormat::Long => ctxt.write_vec::<U32Be, _>(loca.offsets),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::{WriteBinaryDep, WriteBuffer};

    fn write_offsets(offsets: Vec<u32>, format: IndexToLocFormat) -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        owned::LocaTable::write_dep(&mut buffer, owned::LocaTable { offsets }, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn short_offsets_resolve_doubled() {
        let data = write_offsets(vec![0, 4, 8], IndexToLocFormat::Short);
        let loca = ReadScope::new(&data)
            .read_dep::<LocaTable<'_>>((2, IndexToLocFormat::Short))
            .unwrap();
        let offsets: Vec<u32> = loca.offsets.iter().collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[test]
    fn rejects_decreasing_offsets() {
        let data = write_offsets(vec![0, 8, 4], IndexToLocFormat::Long);
        assert_eq!(
            ReadScope::new(&data)
                .read_dep::<LocaTable<'_>>((2, IndexToLocFormat::Long))
                .err(),
            Some(ParseError::BadValue)
        );
    }

    #[test]
    fn rejects_truncated_offset_array() {
        let data = write_offsets(vec![0, 4], IndexToLocFormat::Long);
        assert!(ReadScope::new(&data)
            .read_dep::<LocaTable<'_>>((2, IndexToLocFormat::Long))
            .is_err());
    }

    #[test]
    fn required_format_upgrades_past_16_bit_range() {
        let loca = owned::LocaTable {
            offsets: vec![0, 2 * 0xFFFF],
        };
        assert_eq!(loca.required_format(), IndexToLocFormat::Short);

        let loca = owned::LocaTable {
            offsets: vec![0, 2 * 0xFFFF + 2],
        };
        assert_eq!(loca.required_format(), IndexToLocFormat::Long);
    }

    #[test]
    fn short_format_rejects_odd_offsets() {
        let mut buffer = WriteBuffer::new();
        let loca = owned::LocaTable {
            offsets: vec![0, 3],
        };
        assert!(
            owned::LocaTable::write_dep(&mut buffer, loca, IndexToLocFormat::Short).is_err()
        );
    }
}
