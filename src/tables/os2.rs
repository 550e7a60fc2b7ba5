//! Parsing of the `OS/2` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/os2>
//!
//! The table is validated and then re-emitted verbatim.

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::error::{ParseError, WriteError};

/// `OS/2` table: header fields validated, body carried through.
pub struct Os2Table<'a> {
    pub version: u16,
    pub us_weight_class: u16,
    pub us_width_class: u16,
    data: ReadScope<'a>,
}

impl Os2Table<'_> {
    fn minimum_length(version: u16) -> usize {
        match version {
            0 => 78,
            1 => 86,
            2..=4 => 96,
            _ => 100,
        }
    }
}

impl<'b> ReadBinary for Os2Table<'b> {
    type HostType<'a> = Os2Table<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version <= 5)?;
        if scope.data().len() < Os2Table::minimum_length(version) {
            return Err(ParseError::BadEof);
        }

        let _x_avg_char_width = ctxt.read_i16be()?;
        let us_weight_class = ctxt.read_u16be()?;
        let us_width_class = ctxt.read_u16be()?;
        if !(1..=1000).contains(&us_weight_class) {
            warn!("OS/2: unusual usWeightClass {}", us_weight_class);
        }
        if !(1..=9).contains(&us_width_class) {
            warn!("OS/2: unusual usWidthClass {}", us_width_class);
        }

        let data = scope.offset_length(0, scope.data().len())?;
        Ok(Os2Table {
            version,
            us_weight_class,
            us_width_class,
            data,
        })
    }
}

impl<'a> WriteBinary<&Self> for Os2Table<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &Os2Table<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::WriteBuffer;
    use crate::binary::U16Be;

    #[test]
    fn rejects_truncated_table() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 0u16).unwrap(); // version 0 requires 78 bytes
        w.write_zeros(20).unwrap();
        let data = w.into_inner();
        assert_eq!(
            ReadScope::new(&data).read::<Os2Table<'_>>().err(),
            Some(ParseError::BadEof)
        );
    }

    #[test]
    fn rejects_unknown_version() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 6u16).unwrap();
        w.write_zeros(100).unwrap();
        let data = w.into_inner();
        assert_eq!(
            ReadScope::new(&data).read::<Os2Table<'_>>().err(),
            Some(ParseError::BadVersion)
        );
    }

    #[test]
    fn round_trips_verbatim() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 500u16).unwrap(); // xAvgCharWidth
        U16Be::write(&mut w, 400u16).unwrap(); // usWeightClass
        U16Be::write(&mut w, 5u16).unwrap(); // usWidthClass
        w.write_zeros(70).unwrap();
        let data = w.into_inner();
        let os2 = ReadScope::new(&data).read::<Os2Table<'_>>().unwrap();
        assert_eq!(os2.us_weight_class, 400);

        let mut out = WriteBuffer::new();
        Os2Table::write(&mut out, &os2).unwrap();
        assert_eq!(out.bytes(), &data[..]);
    }
}
