//! Validation of the `CFF ` and `CFF2` tables.
//!
//! Refer to [Technical Note #5176](http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/font/pdfs/5176.CFF.pdf)
//! and the OpenType CFF2 specification for the formats.
//!
//! The INDEX and DICT structures are parsed with every offset confined to the
//! enclosing table, and every glyph's charstring is abstractly executed by
//! [charstring]. The tables are re-emitted verbatim once validated.

use log::warn;

use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::error::{ParseError, WriteError};
use crate::variations::read_item_variation_store;

pub(crate) mod charstring;

use charstring::{CharStringKind, CharStringValidator};

/// Marker for operands whose value the validator does not track.
const END_OF_FLOAT_FLAG: u8 = 0xF;

/// An operator may be preceded by up to a maximum of 48 operands.
const MAX_DICT_OPERANDS: usize = 48;

/// `CFF ` table: validated and re-emitted verbatim.
pub struct CffTable<'a> {
    data: ReadScope<'a>,
}

/// `CFF2` table: validated and re-emitted verbatim.
pub struct Cff2Table<'a> {
    data: ReadScope<'a>,
}

/// Cross-table inputs for CFF2 validation.
#[derive(Copy, Clone)]
pub struct Cff2Args {
    /// From `maxp`.
    pub num_glyphs: u16,
    /// From `fvar`, when the font is variable.
    pub axis_count: Option<u16>,
}

/// A CFF INDEX: an ordered sequence of variable-length byte blobs.
///
/// Offsets are validated on read: the first offset is 1 and they are
/// monotonically non-decreasing, so every object lies within the data array.
pub(crate) struct Index<'a> {
    offsets: Vec<usize>,
    data: &'a [u8],
}

/// Which flavor of INDEX count field to read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum IndexKind {
    /// CFF: 16-bit count.
    Cff,
    /// CFF2: 32-bit count.
    Cff2,
}

impl<'a> Index<'a> {
    pub(crate) fn empty() -> Index<'static> {
        Index {
            offsets: vec![1],
            data: &[],
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn read_object(&self, index: usize) -> Option<&'a [u8]> {
        let start = *self.offsets.get(index)? - 1;
        let end = *self.offsets.get(index + 1)? - 1;
        self.data.get(start..end)
    }
}

impl<'b> ReadBinaryDep for Index<'b> {
    type Args<'a> = IndexKind;
    type HostType<'a> = Index<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        kind: IndexKind,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let count = match kind {
            IndexKind::Cff => usize::from(ctxt.read_u16be()?),
            IndexKind::Cff2 => usize::try_from(ctxt.read_u32be()?)?,
        };

        if count == 0 {
            return Ok(Index {
                offsets: vec![1],
                data: &[],
            });
        }

        let off_size = ctxt.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }

        let mut offsets = Vec::with_capacity(count + 1);
        let offset_array = ctxt.read_slice(
            (count + 1)
                .checked_mul(usize::from(off_size))
                .ok_or(ParseError::BadValue)?,
        )?;
        for chunk in offset_array.chunks_exact(usize::from(off_size)) {
            let mut value = 0usize;
            for &byte in chunk {
                value = (value << 8) | usize::from(byte);
            }
            offsets.push(value);
        }

        // The first offset is always 1 and they never decrease
        if offsets[0] != 1 {
            return Err(ParseError::BadValue);
        }
        for window in offsets.windows(2) {
            if window[0] > window[1] {
                return Err(ParseError::BadValue);
            }
        }

        // NOTE(unwrap): offsets has count + 1 >= 2 entries
        let data_len = offsets.last().unwrap() - 1;
        let data = ctxt.read_slice(data_len)?;

        Ok(Index { offsets, data })
    }
}

/// DICT operators the validator cares about.
mod dict_operator {
    pub const CHARSET: u16 = 15;
    pub const ENCODING: u16 = 16;
    pub const CHAR_STRINGS: u16 = 17;
    pub const PRIVATE: u16 = 18;
    pub const SUBRS: u16 = 19;
    pub const VSTORE: u16 = 24;
    pub const CHARSTRING_TYPE: u16 = 0x0C06;
    pub const ROS: u16 = 0x0C1E;
    pub const FD_ARRAY: u16 = 0x0C24;
    pub const FD_SELECT: u16 = 0x0C25;
}

/// A parsed DICT: operators with their integer operands.
///
/// Real operands are parsed for validity but recorded as `None` since none
/// of the operators the sanitizer consults take real arguments.
struct Dict {
    entries: Vec<(u16, Vec<Option<i32>>)>,
}

impl Dict {
    fn read(scope: ReadScope<'_>) -> Result<Dict, ParseError> {
        let mut ctxt = scope.ctxt();
        let mut entries = Vec::new();
        let mut operands: Vec<Option<i32>> = Vec::new();

        while ctxt.bytes_available() {
            let b0 = ctxt.read_u8()?;
            match b0 {
                0..=11 | 13..=21 => {
                    entries.push((u16::from(b0), operands.clone()));
                    operands.clear();
                }
                12 => {
                    let b1 = ctxt.read_u8()?;
                    entries.push(((12 << 8) | u16::from(b1), operands.clone()));
                    operands.clear();
                }
                28 => {
                    let value = ctxt.read_i16be()?;
                    operands.push(Some(i32::from(value)));
                }
                29 => {
                    operands.push(Some(ctxt.read_i32be()?));
                }
                30 => {
                    // Real number: packed BCD nibbles terminated by 0xF
                    loop {
                        let byte = ctxt.read_u8()?;
                        if byte >> 4 == END_OF_FLOAT_FLAG || byte & 0xF == END_OF_FLOAT_FLAG {
                            break;
                        }
                    }
                    operands.push(None);
                }
                32..=246 => operands.push(Some(i32::from(b0) - 139)),
                247..=250 => {
                    let b1 = ctxt.read_u8()?;
                    operands.push(Some((i32::from(b0) - 247) * 256 + i32::from(b1) + 108));
                }
                251..=254 => {
                    let b1 = ctxt.read_u8()?;
                    operands.push(Some(-(i32::from(b0) - 251) * 256 - i32::from(b1) - 108));
                }
                22..=27 | 31 | 255 => return Err(ParseError::BadValue), // reserved
            }
            if operands.len() > MAX_DICT_OPERANDS {
                return Err(ParseError::LimitExceeded);
            }
        }

        Ok(Dict { entries })
    }

    fn get(&self, operator: u16) -> Option<&[Option<i32>]> {
        self.entries
            .iter()
            .find(|(op, _)| *op == operator)
            .map(|(_, operands)| operands.as_slice())
    }

    fn has(&self, operator: u16) -> bool {
        self.get(operator).is_some()
    }

    /// Fetch a single non-negative integer operand for `operator`.
    fn get_offset(&self, operator: u16) -> Result<Option<usize>, ParseError> {
        match self.get(operator) {
            Some([Some(value)]) => {
                let value = usize::try_from(*value).map_err(|_| ParseError::BadValue)?;
                Ok(Some(value))
            }
            Some(_) => Err(ParseError::BadValue),
            None => Ok(None),
        }
    }

    /// Fetch the (size, offset) operand pair of the Private operator.
    fn get_private(&self) -> Result<Option<(usize, usize)>, ParseError> {
        match self.get(dict_operator::PRIVATE) {
            Some([Some(size), Some(offset)]) => {
                let size = usize::try_from(*size).map_err(|_| ParseError::BadValue)?;
                let offset = usize::try_from(*offset).map_err(|_| ParseError::BadValue)?;
                Ok(Some((size, offset)))
            }
            Some(_) => Err(ParseError::BadValue),
            None => Ok(None),
        }
    }
}

/// Local subroutines and FD mapping for charstring validation.
struct LocalSubrs<'a> {
    /// Type 1 fonts: a single optional local subr index.
    single: Option<Index<'a>>,
    /// CID fonts: per-font-dict local subrs and the glyph to FD mapping.
    per_fd: Option<(Vec<Option<Index<'a>>>, Vec<u8>)>,
}

impl<'a> LocalSubrs<'a> {
    fn for_glyph(&self, glyph_id: usize) -> Result<Option<&Index<'a>>, ParseError> {
        match &self.per_fd {
            Some((subrs, fd_select)) => {
                let fd = *fd_select.get(glyph_id).ok_or(ParseError::BadIndex)?;
                let subrs = subrs.get(usize::from(fd)).ok_or(ParseError::BadIndex)?;
                Ok(subrs.as_ref())
            }
            None => Ok(self.single.as_ref()),
        }
    }
}

impl<'b> ReadBinaryDep for CffTable<'b> {
    type Args<'a> = u16; // num_glyphs
    type HostType<'a> = CffTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();

        // Header
        let major = ctxt.read_u8()?;
        ctxt.check_version(major == 1)?;
        let _minor = ctxt.read_u8()?;
        let hdr_size = ctxt.read_u8()?;
        let off_size = ctxt.read_u8()?;
        if hdr_size < 4 || !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }
        let _reserved = ctxt.read_slice(usize::from(hdr_size) - 4)?;

        let name_index = ctxt.read_dep::<Index<'_>>(IndexKind::Cff)?;
        // The table is the source for exactly one font
        if name_index.count() != 1 {
            return Err(ParseError::BadValue);
        }
        let top_dict_index = ctxt.read_dep::<Index<'_>>(IndexKind::Cff)?;
        if top_dict_index.count() != name_index.count() {
            return Err(ParseError::BadValue);
        }
        let _string_index = ctxt.read_dep::<Index<'_>>(IndexKind::Cff)?;
        let global_subrs = ctxt.read_dep::<Index<'_>>(IndexKind::Cff)?;

        let top_dict_data = top_dict_index.read_object(0).ok_or(ParseError::BadIndex)?;
        let top_dict = Dict::read(ReadScope::new(top_dict_data))?;

        // Only Type 2 charstrings are supported
        if let Some(operands) = top_dict.get(dict_operator::CHARSTRING_TYPE) {
            if operands != [Some(2)] {
                return Err(ParseError::Unsupported);
            }
        }

        let char_strings_offset = top_dict
            .get_offset(dict_operator::CHAR_STRINGS)?
            .ok_or(ParseError::MissingValue)?;
        let char_strings = scope
            .offset(char_strings_offset)
            .read_dep::<Index<'_>>(IndexKind::Cff)?;
        if char_strings.count() != usize::from(num_glyphs) {
            return Err(ParseError::BadValue);
        }

        read_charset(&scope, &top_dict, num_glyphs)?;
        read_encoding(&scope, &top_dict)?;

        let local_subrs = if top_dict.has(dict_operator::ROS) {
            read_cid_data(&scope, &top_dict, num_glyphs)?
        } else {
            let single = match top_dict.get_private()? {
                Some((size, offset)) => read_private_dict(&scope, size, offset)?,
                None => None,
            };
            LocalSubrs {
                single,
                per_fd: None,
            }
        };

        // Abstract execution of every charstring
        for glyph_id in 0..char_strings.count() {
            let char_string = char_strings
                .read_object(glyph_id)
                .ok_or(ParseError::BadIndex)?;
            let validator = CharStringValidator {
                kind: CharStringKind::Cff,
                global_subrs: &global_subrs,
                local_subrs: local_subrs.for_glyph(glyph_id)?,
            };
            validator.validate(char_string)?;
        }

        let data = scope.offset_length(0, scope.data().len())?;
        Ok(CffTable { data })
    }
}

impl<'a> WriteBinary<&Self> for CffTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &CffTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

/// Read a Private DICT and its local subroutine index.
fn read_private_dict<'a>(
    scope: &ReadScope<'a>,
    size: usize,
    offset: usize,
) -> Result<Option<Index<'a>>, ParseError> {
    let private_scope = scope.offset_length(offset, size)?;
    let private_dict = Dict::read(private_scope)?;

    match private_dict.get_offset(dict_operator::SUBRS)? {
        Some(subrs_offset) => {
            // Subrs offsets are relative to the start of the Private DICT
            let subrs_scope = scope.offset(
                offset
                    .checked_add(subrs_offset)
                    .ok_or(ParseError::BadOffset)?,
            );
            let subrs = subrs_scope.read_dep::<Index<'_>>(IndexKind::Cff)?;
            Ok(Some(subrs))
        }
        None => Ok(None),
    }
}

/// Read FDArray and FDSelect for a CID-keyed font.
fn read_cid_data<'a>(
    scope: &ReadScope<'a>,
    top_dict: &Dict,
    num_glyphs: u16,
) -> Result<LocalSubrs<'a>, ParseError> {
    let fd_array_offset = top_dict
        .get_offset(dict_operator::FD_ARRAY)?
        .ok_or(ParseError::MissingValue)?;
    let fd_select_offset = top_dict
        .get_offset(dict_operator::FD_SELECT)?
        .ok_or(ParseError::MissingValue)?;

    let fd_array = scope
        .offset(fd_array_offset)
        .read_dep::<Index<'_>>(IndexKind::Cff)?;
    if fd_array.count() == 0 {
        return Err(ParseError::BadValue);
    }

    let mut per_fd_subrs = Vec::with_capacity(fd_array.count());
    for fd_index in 0..fd_array.count() {
        let font_dict_data = fd_array.read_object(fd_index).ok_or(ParseError::BadIndex)?;
        let font_dict = Dict::read(ReadScope::new(font_dict_data))?;
        let subrs = match font_dict.get_private()? {
            Some((size, offset)) => read_private_dict(scope, size, offset)?,
            None => None,
        };
        per_fd_subrs.push(subrs);
    }

    let fd_select = read_fd_select(
        scope.offset(fd_select_offset),
        num_glyphs,
        fd_array.count(),
    )?;

    Ok(LocalSubrs {
        single: None,
        per_fd: Some((per_fd_subrs, fd_select)),
    })
}

/// Read an FDSelect structure into a per-glyph FD index vector.
fn read_fd_select(
    scope: ReadScope<'_>,
    num_glyphs: u16,
    fd_count: usize,
) -> Result<Vec<u8>, ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u8()?;
    let mut fd_select = vec![0u8; usize::from(num_glyphs)];
    match format {
        0 => {
            for entry in fd_select.iter_mut() {
                *entry = ctxt.read_u8()?;
            }
        }
        3 => {
            let num_ranges = ctxt.read_u16be()?;
            let mut first = ctxt.read_u16be()?;
            for _ in 0..num_ranges {
                let fd = ctxt.read_u8()?;
                let next = ctxt.read_u16be()?;
                if next < first || next > num_glyphs {
                    return Err(ParseError::BadValue);
                }
                for glyph in first..next {
                    fd_select[usize::from(glyph)] = fd;
                }
                first = next;
            }
            // the final sentinel must cover the whole glyph range
            if first != num_glyphs {
                return Err(ParseError::BadValue);
            }
        }
        _ => return Err(ParseError::BadVersion),
    }

    for &fd in &fd_select {
        if usize::from(fd) >= fd_count {
            return Err(ParseError::BadIndex);
        }
    }
    Ok(fd_select)
}

/// Validate the charset. Predefined charsets 0-2 carry no data.
fn read_charset(
    scope: &ReadScope<'_>,
    top_dict: &Dict,
    num_glyphs: u16,
) -> Result<(), ParseError> {
    let offset = match top_dict.get_offset(dict_operator::CHARSET)? {
        // 0..=2 select the predefined ISOAdobe/Expert/ExpertSubset charsets
        None | Some(0..=2) => return Ok(()),
        Some(offset) => offset,
    };

    let mut ctxt = scope.offset(offset).ctxt();
    let format = ctxt.read_u8()?;
    // glyph 0 (.notdef) is implicit in every charset
    let to_cover = usize::from(num_glyphs).saturating_sub(1);
    match format {
        0 => {
            for _ in 0..to_cover {
                let _sid = ctxt.read_u16be()?;
            }
        }
        1 | 2 => {
            let mut covered = 0usize;
            while covered < to_cover {
                let _first_sid = ctxt.read_u16be()?;
                let n_left = if format == 1 {
                    usize::from(ctxt.read_u8()?)
                } else {
                    usize::from(ctxt.read_u16be()?)
                };
                covered += n_left + 1;
            }
            if covered != to_cover {
                return Err(ParseError::BadValue);
            }
        }
        _ => return Err(ParseError::BadVersion),
    }
    Ok(())
}

/// Validate the encoding. Predefined encodings 0-1 carry no data.
fn read_encoding(scope: &ReadScope<'_>, top_dict: &Dict) -> Result<(), ParseError> {
    let offset = match top_dict.get_offset(dict_operator::ENCODING)? {
        // 0 and 1 select the Standard and Expert encodings
        None | Some(0 | 1) => return Ok(()),
        Some(offset) => offset,
    };

    let mut ctxt = scope.offset(offset).ctxt();
    let format = ctxt.read_u8()?;
    let has_supplements = format & 0x80 != 0;
    match format & 0x7F {
        0 => {
            let n_codes = ctxt.read_u8()?;
            let _codes = ctxt.read_slice(usize::from(n_codes))?;
        }
        1 => {
            let n_ranges = ctxt.read_u8()?;
            for _ in 0..n_ranges {
                let _first = ctxt.read_u8()?;
                let _n_left = ctxt.read_u8()?;
            }
        }
        _ => return Err(ParseError::BadVersion),
    }
    if has_supplements {
        let n_sups = ctxt.read_u8()?;
        for _ in 0..n_sups {
            let _code = ctxt.read_u8()?;
            let _sid = ctxt.read_u16be()?;
        }
    }
    Ok(())
}

impl<'b> ReadBinaryDep for Cff2Table<'b> {
    type Args<'a> = Cff2Args;
    type HostType<'a> = Cff2Table<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Cff2Args,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();

        let major = ctxt.read_u8()?;
        ctxt.check_version(major == 2)?;
        let _minor = ctxt.read_u8()?;
        let header_size = ctxt.read_u8()?;
        if header_size < 5 {
            return Err(ParseError::BadValue);
        }
        let top_dict_length = ctxt.read_u16be()?;
        let _reserved = ctxt.read_slice(usize::from(header_size) - 5)?;

        let top_dict_scope = ctxt.read_scope(usize::from(top_dict_length))?;
        let top_dict = Dict::read(top_dict_scope)?;
        let global_subrs = ctxt.read_dep::<Index<'_>>(IndexKind::Cff2)?;

        let char_strings_offset = top_dict
            .get_offset(dict_operator::CHAR_STRINGS)?
            .ok_or(ParseError::MissingValue)?;
        let char_strings = scope
            .offset(char_strings_offset)
            .read_dep::<Index<'_>>(IndexKind::Cff2)?;
        if char_strings.count() != usize::from(args.num_glyphs) {
            return Err(ParseError::BadValue);
        }

        if let Some(vstore_offset) = top_dict.get_offset(dict_operator::VSTORE)? {
            // The variation store is preceded by a 16-bit length field
            let mut vstore = scope.offset(vstore_offset).ctxt();
            let vstore_length = vstore.read_u16be()?;
            let vstore_scope = vstore.read_scope(usize::from(vstore_length))?;
            read_item_variation_store(vstore_scope, args.axis_count)?;
        }

        // CFF2 fonts always use an FDArray; FDSelect is optional when there
        // is only one font dict.
        let local_subrs = if top_dict.has(dict_operator::FD_ARRAY) {
            let per_fd = read_cff2_fd_data(&scope, &top_dict, args.num_glyphs)?;
            per_fd
        } else if let Some((size, offset)) = top_dict.get_private()? {
            warn!("CFF2: top-level Private DICT in place of FDArray");
            LocalSubrs {
                single: read_private_dict(&scope, size, offset)?,
                per_fd: None,
            }
        } else {
            LocalSubrs {
                single: None,
                per_fd: None,
            }
        };

        for glyph_id in 0..char_strings.count() {
            let char_string = char_strings
                .read_object(glyph_id)
                .ok_or(ParseError::BadIndex)?;
            let validator = CharStringValidator {
                kind: CharStringKind::Cff2,
                global_subrs: &global_subrs,
                local_subrs: local_subrs.for_glyph(glyph_id)?,
            };
            validator.validate(char_string)?;
        }

        let data = scope.offset_length(0, scope.data().len())?;
        Ok(Cff2Table { data })
    }
}

fn read_cff2_fd_data<'a>(
    scope: &ReadScope<'a>,
    top_dict: &Dict,
    num_glyphs: u16,
) -> Result<LocalSubrs<'a>, ParseError> {
    let fd_array_offset = top_dict
        .get_offset(dict_operator::FD_ARRAY)?
        .ok_or(ParseError::MissingValue)?;
    let fd_array = scope
        .offset(fd_array_offset)
        .read_dep::<Index<'_>>(IndexKind::Cff2)?;
    if fd_array.count() == 0 {
        return Err(ParseError::BadValue);
    }

    let mut per_fd_subrs = Vec::with_capacity(fd_array.count());
    for fd_index in 0..fd_array.count() {
        let font_dict_data = fd_array.read_object(fd_index).ok_or(ParseError::BadIndex)?;
        let font_dict = Dict::read(ReadScope::new(font_dict_data))?;
        let subrs = match font_dict.get_private()? {
            Some((size, offset)) => read_private_dict(scope, size, offset)?,
            None => None,
        };
        per_fd_subrs.push(subrs);
    }

    let fd_select = match top_dict.get_offset(dict_operator::FD_SELECT)? {
        Some(fd_select_offset) => read_fd_select(
            scope.offset(fd_select_offset),
            num_glyphs,
            fd_array.count(),
        )?,
        // Without FDSelect every glyph uses font dict 0
        None => vec![0u8; usize::from(num_glyphs)],
    };

    Ok(LocalSubrs {
        single: None,
        per_fd: Some((per_fd_subrs, fd_select)),
    })
}

impl<'a> WriteBinary<&Self> for Cff2Table<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &Cff2Table<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}
