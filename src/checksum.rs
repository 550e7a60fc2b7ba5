#![deny(missing_docs)]

//! The OpenType table checksum.

use std::num::Wrapping;

use crate::binary::read::ReadScope;
use crate::binary::U32Be;
use crate::error::ParseError;

/// The value `head.checkSumAdjustment` must bring the whole-file checksum to.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/head>
pub const CHECKSUM_MAGIC: Wrapping<u32> = Wrapping(0xB1B0AFBA);

/// Calculate a checksum of `data` according to the OpenType table checksum algorithm
///
/// `data` must already be zero-padded to a multiple of four bytes.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums>
pub fn table_checksum(data: &[u8]) -> Result<Wrapping<u32>, ParseError> {
    assert_eq!(data.len() % 4, 0, "data end is not 32-bit aligned");

    let mut ctxt = ReadScope::new(data).ctxt();
    let array = ctxt.read_array::<U32Be>(data.len() / 4)?;
    Ok(array.iter().map(Wrapping).sum())
}
