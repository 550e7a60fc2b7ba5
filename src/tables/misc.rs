//! Length and version checks for the simple tables that are otherwise
//! copied through unchanged: `cvt `, `gasp`, `kern`, `VORG`, `hdmx`,
//! `LTSH` and `VDMX`.
//!
//! These tables are non-critical: a caller that finds one invalid drops it
//! from the output rather than rejecting the font.

use crate::binary::read::ReadScope;
use crate::error::ParseError;

/// `cvt ` values are 16-bit words.
pub fn check_cvt(scope: ReadScope<'_>) -> Result<(), ParseError> {
    if scope.data().len() % 2 != 0 {
        return Err(ParseError::BadValue);
    }
    Ok(())
}

/// `gasp` version 0 or 1 with ranges ascending by ppem, terminated at 0xFFFF.
pub fn check_gasp(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let version = ctxt.read_u16be()?;
    ctxt.check_version(version <= 1)?;
    let num_ranges = ctxt.read_u16be()?;
    let mut prev_ppem = None;
    for _ in 0..num_ranges {
        let range_max_ppem = ctxt.read_u16be()?;
        let range_gasp_behavior = ctxt.read_u16be()?;
        if prev_ppem.map_or(false, |prev| range_max_ppem <= prev) {
            return Err(ParseError::BadValue);
        }
        prev_ppem = Some(range_max_ppem);
        // version 0 defines behavior bits 0-1, version 1 adds bits 2-3
        let allowed = if version == 0 { 0x0003 } else { 0x000F };
        if range_gasp_behavior & !allowed != 0 {
            return Err(ParseError::BadValue);
        }
    }
    // the final range must cover all remaining sizes
    if num_ranges > 0 && prev_ppem != Some(0xFFFF) {
        return Err(ParseError::BadValue);
    }
    Ok(())
}

/// `kern` version 0 with format 0 subtables; pairs sorted by key.
pub fn check_kern(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let version = ctxt.read_u16be()?;
    ctxt.check_version(version == 0)?;
    let n_tables = ctxt.read_u16be()?;
    for _ in 0..n_tables {
        let sub_version = ctxt.read_u16be()?;
        ctxt.check(sub_version == 0)?;
        let length = usize::from(ctxt.read_u16be()?);
        let coverage = ctxt.read_u16be()?;
        let format = coverage >> 8;
        if format != 0 {
            return Err(ParseError::Unsupported);
        }
        if length < 14 {
            return Err(ParseError::BadValue);
        }
        let n_pairs = ctxt.read_u16be()?;
        let _search_range = ctxt.read_u16be()?;
        let _entry_selector = ctxt.read_u16be()?;
        let _range_shift = ctxt.read_u16be()?;
        if length < 14 + usize::from(n_pairs) * 6 {
            return Err(ParseError::BadValue);
        }
        let mut prev_key = None;
        for _ in 0..n_pairs {
            let left = ctxt.read_u16be()?;
            let right = ctxt.read_u16be()?;
            let _value = ctxt.read_i16be()?;
            let key = (u32::from(left) << 16) | u32::from(right);
            if prev_key.map_or(false, |prev| key <= prev) {
                return Err(ParseError::BadValue);
            }
            prev_key = Some(key);
        }
    }
    Ok(())
}

/// `VORG` version 1.0 with records sorted by glyph index.
pub fn check_vorg(scope: ReadScope<'_>, num_glyphs: u16) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let major = ctxt.read_u16be()?;
    let minor = ctxt.read_u16be()?;
    ctxt.check_version(major == 1 && minor == 0)?;
    let _default_vert_origin_y = ctxt.read_i16be()?;
    let num_records = ctxt.read_u16be()?;
    let mut prev_glyph = None;
    for _ in 0..num_records {
        let glyph_index = ctxt.read_u16be()?;
        let _vert_origin_y = ctxt.read_i16be()?;
        if glyph_index >= num_glyphs {
            return Err(ParseError::BadIndex);
        }
        if prev_glyph.map_or(false, |prev| glyph_index <= prev) {
            return Err(ParseError::BadValue);
        }
        prev_glyph = Some(glyph_index);
    }
    Ok(())
}

/// `hdmx` version 0; device records sized by the glyph count.
pub fn check_hdmx(scope: ReadScope<'_>, num_glyphs: u16) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let version = ctxt.read_u16be()?;
    ctxt.check_version(version == 0)?;
    let num_records = ctxt.read_i16be()?;
    let size_device_record = usize::try_from(ctxt.read_u32be()?)?;
    if num_records < 0 {
        return Err(ParseError::BadValue);
    }
    // each record is the two header bytes plus one width per glyph,
    // long-aligned
    let minimum = crate::binary::long_align(usize::from(num_glyphs) + 2);
    if size_device_record < minimum {
        return Err(ParseError::BadValue);
    }
    let total = (num_records as usize)
        .checked_mul(size_device_record)
        .ok_or(ParseError::BadValue)?;
    let _records = ctxt.read_slice(total)?;
    Ok(())
}

/// `LTSH` version 0; one entry per glyph.
pub fn check_ltsh(scope: ReadScope<'_>, num_glyphs: u16) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let version = ctxt.read_u16be()?;
    ctxt.check_version(version == 0)?;
    let count = ctxt.read_u16be()?;
    if count != num_glyphs {
        return Err(ParseError::BadValue);
    }
    let _y_pels = ctxt.read_slice(usize::from(count))?;
    Ok(())
}

/// `VDMX` version 0 or 1; ratio ranges with group offsets in bounds.
pub fn check_vdmx(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let version = ctxt.read_u16be()?;
    ctxt.check_version(version <= 1)?;
    let num_recs = ctxt.read_u16be()?;
    let num_ratios = usize::from(ctxt.read_u16be()?);
    let _ = num_recs;

    // ratio records
    for _ in 0..num_ratios {
        let _b_char_set = ctxt.read_u8()?;
        let _x_ratio = ctxt.read_u8()?;
        let _y_start_ratio = ctxt.read_u8()?;
        let _y_end_ratio = ctxt.read_u8()?;
    }
    // group offsets
    for _ in 0..num_ratios {
        let offset = usize::from(ctxt.read_u16be()?);
        if offset >= length {
            return Err(ParseError::BadOffset);
        }
        let mut group = scope.offset(offset).ctxt();
        let recs = group.read_u16be()?;
        let _startsz = group.read_u8()?;
        let _endsz = group.read_u8()?;
        // each vTable record is 6 bytes
        let _vtable = group.read_slice(usize::from(recs) * 6)?;
    }
    Ok(())
}
