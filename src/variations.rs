//! OpenType variations common table formats.
//!
//! The item variation store and delta-set index map are shared by `COLR`,
//! `HVAR`/`VVAR`/`MVAR` and CFF2. The `fvar` table supplies the axis count
//! that region records must agree with.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/otvarcommonformats>

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::error::{ParseError, WriteError};

/// F2DOT14 1.0, the bound for normalized axis coordinates.
const F2DOT14_ONE: i16 = 0x4000;

/// `fvar` table: axis records validated, body carried through.
pub struct FvarTable<'a> {
    pub axis_count: u16,
    data: ReadScope<'a>,
}

impl<'b> ReadBinary for FvarTable<'b> {
    type HostType<'a> = FvarTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let major_version = ctxt.read_u16be()?;
        let minor_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1 && minor_version == 0)?;
        let axes_array_offset = usize::from(ctxt.read_u16be()?);
        let _reserved = ctxt.read_u16be()?;
        let axis_count = ctxt.read_u16be()?;
        ctxt.check(axis_count > 0)?;
        let axis_size = ctxt.read_u16be()?;
        ctxt.check(axis_size == 20)?;
        let instance_count = ctxt.read_u16be()?;
        let instance_size = usize::from(ctxt.read_u16be()?);
        // instances hold one tuple plus flags, optionally a postscript name id
        let tuple_size = usize::from(axis_count) * 4;
        ctxt.check(instance_size == tuple_size + 4 || instance_size == tuple_size + 6)?;

        let mut axes = scope.offset(axes_array_offset).ctxt();
        for _ in 0..axis_count {
            let _axis_tag = axes.read_u32be()?;
            let min_value = axes.read_i32be()?;
            let default_value = axes.read_i32be()?;
            let max_value = axes.read_i32be()?;
            let _flags = axes.read_u16be()?;
            let _axis_name_id = axes.read_u16be()?;
            if min_value > default_value || default_value > max_value {
                return Err(ParseError::BadValue);
            }
        }
        // the instance records follow the axes
        let instances_len = usize::from(instance_count) * instance_size;
        let _instances = axes.read_slice(instances_len)?;

        let data = scope.offset_length(0, scope.data().len())?;
        Ok(FvarTable { axis_count, data })
    }
}

impl<'a> WriteBinary<&Self> for FvarTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &FvarTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

/// Validate an item variation store.
///
/// When `expected_axis_count` is supplied (from `fvar`) the region list's
/// axis count must match it.
pub fn read_item_variation_store(
    scope: ReadScope<'_>,
    expected_axis_count: Option<u16>,
) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_version(format == 1)?;
    let region_list_offset = usize::try_from(ctxt.read_u32be()?)?;
    let data_count = ctxt.read_u16be()?;

    // the region list must not overlap the subtable offset array
    if region_list_offset < 8 + 4 * usize::from(data_count) || region_list_offset > length {
        return Err(ParseError::BadOffset);
    }

    let region_count = read_variation_region_list(
        scope.offset(region_list_offset),
        expected_axis_count,
    )?;

    for _ in 0..data_count {
        let offset = usize::try_from(ctxt.read_u32be()?)?;
        if offset >= length {
            return Err(ParseError::BadOffset);
        }
        read_item_variation_data(scope.offset(offset), region_count)?;
    }

    Ok(())
}

fn read_variation_region_list(
    scope: ReadScope<'_>,
    expected_axis_count: Option<u16>,
) -> Result<u16, ParseError> {
    let mut ctxt = scope.ctxt();
    let axis_count = ctxt.read_u16be()?;
    let region_count = ctxt.read_u16be()?;

    if let Some(expected) = expected_axis_count {
        if axis_count != expected {
            return Err(ParseError::BadValue);
        }
    }

    for _ in 0..region_count {
        for _ in 0..axis_count {
            let start = ctxt.read_i16be()?;
            let peak = ctxt.read_i16be()?;
            let end = ctxt.read_i16be()?;
            if start > peak || peak > end {
                return Err(ParseError::BadValue);
            }
            if start < -F2DOT14_ONE || end > F2DOT14_ONE {
                return Err(ParseError::BadValue);
            }
            // the region must not straddle zero away from its peak
            if (peak < 0 && end > 0) || (peak > 0 && start < 0) {
                return Err(ParseError::BadValue);
            }
        }
    }

    Ok(region_count)
}

fn read_item_variation_data(scope: ReadScope<'_>, region_count: u16) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let item_count = usize::from(ctxt.read_u16be()?);
    let word_delta_count = ctxt.read_u16be()?;
    let region_index_count = ctxt.read_u16be()?;

    for _ in 0..region_index_count {
        let region_index = ctxt.read_u16be()?;
        if region_index >= region_count {
            return Err(ParseError::BadIndex);
        }
    }

    // high bit flags 32-bit deltas, low bits count the wider entries
    let long_words = word_delta_count & 0x8000 != 0;
    let word_count = usize::from(word_delta_count & 0x7FFF);
    let region_index_count = usize::from(region_index_count);
    if word_count > region_index_count {
        return Err(ParseError::BadValue);
    }
    let row_size = if long_words {
        4 * word_count + 2 * (region_index_count - word_count)
    } else {
        2 * word_count + (region_index_count - word_count)
    };
    let delta_len = item_count
        .checked_mul(row_size)
        .ok_or(ParseError::BadValue)?;
    let _deltas = ctxt.read_slice(delta_len)?;

    Ok(())
}

/// Validate a delta-set index map.
pub fn read_delta_set_index_map(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u8()?;
    let entry_format = ctxt.read_u8()?;
    let map_count = match format {
        0 => usize::from(ctxt.read_u16be()?),
        1 => usize::try_from(ctxt.read_u32be()?)?,
        _ => return Err(ParseError::BadVersion),
    };

    let inner_index_bit_count = usize::from(entry_format & 0x0F) + 1;
    let entry_size = usize::from((entry_format & 0x30) >> 4) + 1;
    if inner_index_bit_count > 8 * entry_size {
        return Err(ParseError::BadValue);
    }

    let map_len = map_count
        .checked_mul(entry_size)
        .ok_or(ParseError::BadValue)?;
    let _map_data = ctxt.read_slice(map_len)?;

    Ok(())
}
