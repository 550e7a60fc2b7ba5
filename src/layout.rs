//! Validation of the OpenType Layout common table formats and the GDEF,
//! GSUB and GPOS tables built from them.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2>
//!
//! These parsers only validate; the tables are re-emitted verbatim. Lookup
//! flags are cross-checked against GDEF: `MarkAttachmentType` requires a
//! mark-attachment class definition and `UseMarkFilteringSet` requires mark
//! glyph sets.

use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::error::{ParseError, WriteError};
use crate::variations::read_item_variation_store;

/// `LookupFlag` bit for mark filtering sets.
const USE_MARK_FILTERING_SET: u16 = 0x0010;
/// `LookupFlag` mask for the mark attachment class.
const MARK_ATTACHMENT_TYPE_MASK: u16 = 0xFF00;
/// No required feature in a LangSys table.
const NO_REQUIRED_FEATURE: u16 = 0xFFFF;
/// GDEF glyph classes run from 1 (base) to 4 (component).
const GDEF_NUM_GLYPH_CLASSES: u16 = 4;
/// Mark attachment classes are 8-bit values in the lookup flag.
const GDEF_NUM_MARK_ATTACH_CLASSES: u16 = 255;

/// Which layout table a lookup list belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LayoutTableKind {
    Gsub,
    Gpos,
}

/// Facts about a GDEF table that lookup validation needs.
#[derive(Debug, Default, Copy, Clone)]
pub struct GdefInfo {
    pub has_mark_attachment_class_def: bool,
    pub num_mark_glyph_sets: Option<u16>,
}

/// `GDEF` table: validated and re-emitted verbatim.
pub struct GdefTable<'a> {
    pub info: GdefInfo,
    data: ReadScope<'a>,
}

/// `GSUB` or `GPOS` table: validated and re-emitted verbatim.
pub struct LayoutTable<'a> {
    pub kind: LayoutTableKind,
    data: ReadScope<'a>,
}

/// Arguments for validating a GSUB/GPOS table.
#[derive(Copy, Clone)]
pub struct LayoutArgs {
    pub kind: LayoutTableKind,
    pub num_glyphs: u16,
    pub gdef: GdefInfo,
}

/// Validate a coverage table and return the number of glyphs it covers.
///
/// `expected_count`, when supplied by the caller, must equal the covered
/// count exactly.
pub fn read_coverage(
    scope: ReadScope<'_>,
    num_glyphs: u16,
    expected_count: Option<u16>,
) -> Result<u16, ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    let count = match format {
        1 => {
            let glyph_count = ctxt.read_u16be()?;
            let mut prev = None;
            for _ in 0..glyph_count {
                let glyph = ctxt.read_u16be()?;
                if glyph >= num_glyphs {
                    return Err(ParseError::BadIndex);
                }
                // glyph IDs must be strictly increasing
                if prev.map_or(false, |prev| glyph <= prev) {
                    return Err(ParseError::BadValue);
                }
                prev = Some(glyph);
            }
            glyph_count
        }
        2 => {
            let range_count = ctxt.read_u16be()?;
            let mut prev_end = None;
            let mut running_index = 0u16;
            for _ in 0..range_count {
                let start = ctxt.read_u16be()?;
                let end = ctxt.read_u16be()?;
                let start_coverage_index = ctxt.read_u16be()?;
                if start > end || end >= num_glyphs {
                    return Err(ParseError::BadValue);
                }
                if prev_end.map_or(false, |prev| start <= prev) {
                    return Err(ParseError::BadValue);
                }
                // each range's coverage index continues from the one before
                if start_coverage_index != running_index {
                    return Err(ParseError::BadValue);
                }
                running_index = running_index
                    .checked_add(end - start + 1)
                    .ok_or(ParseError::LimitExceeded)?;
                prev_end = Some(end);
            }
            running_index
        }
        _ => return Err(ParseError::BadVersion),
    };

    if let Some(expected) = expected_count {
        if count != expected {
            return Err(ParseError::BadValue);
        }
    }

    Ok(count)
}

/// Validate a class definition table. All class values must be within
/// `1..=num_classes`.
pub fn read_class_def(
    scope: ReadScope<'_>,
    num_glyphs: u16,
    num_classes: u16,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    match format {
        1 => {
            let start_glyph = ctxt.read_u16be()?;
            let glyph_count = ctxt.read_u16be()?;
            if start_glyph > num_glyphs || glyph_count > num_glyphs {
                return Err(ParseError::BadValue);
            }
            for _ in 0..glyph_count {
                let class_value = ctxt.read_u16be()?;
                if class_value == 0 || class_value > num_classes {
                    return Err(ParseError::BadValue);
                }
            }
        }
        2 => {
            let range_count = ctxt.read_u16be()?;
            let mut prev_end = None;
            for _ in 0..range_count {
                let start = ctxt.read_u16be()?;
                let end = ctxt.read_u16be()?;
                let class_value = ctxt.read_u16be()?;
                if start > end || prev_end.map_or(false, |prev| start <= prev) {
                    return Err(ParseError::BadValue);
                }
                if class_value == 0 || class_value > num_classes {
                    return Err(ParseError::BadValue);
                }
                prev_end = Some(end);
            }
        }
        _ => return Err(ParseError::BadVersion),
    }
    Ok(())
}

/// Validate a device table. The packed delta payload is skipped unread.
pub fn read_device(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let start_size = ctxt.read_u16be()?;
    let end_size = ctxt.read_u16be()?;
    let delta_format = ctxt.read_u16be()?;
    if start_size > end_size {
        return Err(ParseError::BadValue);
    }
    if !(1..=3).contains(&delta_format) {
        return Err(ParseError::BadValue);
    }
    let num_units = usize::from((end_size - start_size) / (1 << (4 - delta_format)) + 1);
    let _deltas = ctxt.read_slice(num_units * 2)?;
    Ok(())
}

impl<'b> ReadBinaryDep for GdefTable<'b> {
    type Args<'a> = u16; // num_glyphs
    type HostType<'a> = GdefTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        num_glyphs: u16,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let table = ctxt.scope();
        let length = table.data().len();

        let major_version = ctxt.read_u16be()?;
        let minor_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1 && matches!(minor_version, 0 | 2 | 3))?;

        let glyph_class_def_offset = usize::from(ctxt.read_u16be()?);
        let attach_list_offset = usize::from(ctxt.read_u16be()?);
        let lig_caret_list_offset = usize::from(ctxt.read_u16be()?);
        let mark_attach_class_def_offset = usize::from(ctxt.read_u16be()?);
        let mark_glyph_sets_def_offset = if minor_version >= 2 {
            usize::from(ctxt.read_u16be()?)
        } else {
            0
        };
        let item_var_store_offset = if minor_version >= 3 {
            usize::try_from(ctxt.read_u32be()?)?
        } else {
            0
        };

        let check = |offset: usize| -> Result<(), ParseError> {
            if offset >= length {
                Err(ParseError::BadOffset)
            } else {
                Ok(())
            }
        };

        if glyph_class_def_offset != 0 {
            check(glyph_class_def_offset)?;
            read_class_def(
                table.offset(glyph_class_def_offset),
                num_glyphs,
                GDEF_NUM_GLYPH_CLASSES,
            )?;
        }

        if attach_list_offset != 0 {
            check(attach_list_offset)?;
            read_attach_list(table.offset(attach_list_offset), num_glyphs)?;
        }

        if lig_caret_list_offset != 0 {
            check(lig_caret_list_offset)?;
            read_lig_caret_list(table.offset(lig_caret_list_offset), num_glyphs)?;
        }

        if mark_attach_class_def_offset != 0 {
            check(mark_attach_class_def_offset)?;
            read_class_def(
                table.offset(mark_attach_class_def_offset),
                num_glyphs,
                GDEF_NUM_MARK_ATTACH_CLASSES,
            )?;
        }

        let num_mark_glyph_sets = if mark_glyph_sets_def_offset != 0 {
            check(mark_glyph_sets_def_offset)?;
            Some(read_mark_glyph_sets(
                table.offset(mark_glyph_sets_def_offset),
                num_glyphs,
            )?)
        } else {
            None
        };

        if item_var_store_offset != 0 {
            check(item_var_store_offset)?;
            read_item_variation_store(table.offset(item_var_store_offset), None)?;
        }

        let info = GdefInfo {
            has_mark_attachment_class_def: mark_attach_class_def_offset != 0,
            num_mark_glyph_sets,
        };
        let data = table.offset_length(0, length)?;
        Ok(GdefTable { info, data })
    }
}

fn read_attach_list(scope: ReadScope<'_>, num_glyphs: u16) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let glyph_count = ctxt.read_u16be()?;
    if coverage_offset >= length {
        return Err(ParseError::BadOffset);
    }
    read_coverage(scope.offset(coverage_offset), num_glyphs, Some(glyph_count))?;

    for _ in 0..glyph_count {
        let attach_point_offset = usize::from(ctxt.read_u16be()?);
        if attach_point_offset >= length {
            return Err(ParseError::BadOffset);
        }
        let mut attach_point = scope.offset(attach_point_offset).ctxt();
        let point_count = attach_point.read_u16be()?;
        let _point_indices = attach_point.read_array::<crate::binary::U16Be>(
            usize::from(point_count),
        )?;
    }
    Ok(())
}

fn read_lig_caret_list(scope: ReadScope<'_>, num_glyphs: u16) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let lig_glyph_count = ctxt.read_u16be()?;
    if coverage_offset >= length {
        return Err(ParseError::BadOffset);
    }
    read_coverage(
        scope.offset(coverage_offset),
        num_glyphs,
        Some(lig_glyph_count),
    )?;

    for _ in 0..lig_glyph_count {
        let lig_glyph_offset = usize::from(ctxt.read_u16be()?);
        if lig_glyph_offset >= length {
            return Err(ParseError::BadOffset);
        }
        let lig_glyph_scope = scope.offset(lig_glyph_offset);
        let mut lig_glyph = lig_glyph_scope.ctxt();
        let caret_count = lig_glyph.read_u16be()?;
        for _ in 0..caret_count {
            let caret_value_offset = usize::from(lig_glyph.read_u16be()?);
            if caret_value_offset >= lig_glyph_scope.data().len() {
                return Err(ParseError::BadOffset);
            }
            read_caret_value(lig_glyph_scope.offset(caret_value_offset))?;
        }
    }
    Ok(())
}

fn read_caret_value(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    match format {
        1 => {
            let _coordinate = ctxt.read_i16be()?;
        }
        2 => {
            let _point_index = ctxt.read_u16be()?;
        }
        3 => {
            let _coordinate = ctxt.read_i16be()?;
            let device_offset = usize::from(ctxt.read_u16be()?);
            if device_offset >= scope.data().len() {
                return Err(ParseError::BadOffset);
            }
            read_device(scope.offset(device_offset))?;
        }
        _ => return Err(ParseError::BadVersion),
    }
    Ok(())
}

fn read_mark_glyph_sets(scope: ReadScope<'_>, num_glyphs: u16) -> Result<u16, ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_version(format == 1)?;
    let mark_glyph_set_count = ctxt.read_u16be()?;
    for _ in 0..mark_glyph_set_count {
        let coverage_offset = usize::try_from(ctxt.read_u32be()?)?;
        if coverage_offset >= length {
            return Err(ParseError::BadOffset);
        }
        read_coverage(scope.offset(coverage_offset), num_glyphs, None)?;
    }
    Ok(mark_glyph_set_count)
}

impl<'a> WriteBinary<&Self> for GdefTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &GdefTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

impl<'b> ReadBinaryDep for LayoutTable<'b> {
    type Args<'a> = LayoutArgs;
    type HostType<'a> = LayoutTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: LayoutArgs,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let table = ctxt.scope();
        let length = table.data().len();

        let major_version = ctxt.read_u16be()?;
        let minor_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1 && minor_version <= 1)?;

        let script_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_list_offset = usize::from(ctxt.read_u16be()?);
        let lookup_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_variations_offset = if minor_version == 1 {
            usize::try_from(ctxt.read_u32be()?)?
        } else {
            0
        };

        let check = |offset: usize| -> Result<(), ParseError> {
            if offset >= length {
                Err(ParseError::BadOffset)
            } else {
                Ok(())
            }
        };

        // The lookup list is parsed first to learn the lookup count, then the
        // feature list (which indexes lookups), then the script list (which
        // indexes features).
        let num_lookups = if lookup_list_offset != 0 {
            check(lookup_list_offset)?;
            read_lookup_list(table.offset(lookup_list_offset), &args)?
        } else {
            0
        };

        let num_features = if feature_list_offset != 0 {
            check(feature_list_offset)?;
            read_feature_list(table.offset(feature_list_offset), num_lookups)?
        } else {
            0
        };

        if script_list_offset != 0 {
            check(script_list_offset)?;
            read_script_list(table.offset(script_list_offset), num_features)?;
        }

        if feature_variations_offset != 0 {
            check(feature_variations_offset)?;
            // Structure validated only to the header; the body is opaque
            let mut fv = table.offset(feature_variations_offset).ctxt();
            let fv_major = fv.read_u16be()?;
            let fv_minor = fv.read_u16be()?;
            if fv_major != 1 || fv_minor != 0 {
                return Err(ParseError::BadVersion);
            }
            let _record_count = fv.read_u32be()?;
        }

        let data = table.offset_length(0, length)?;
        Ok(LayoutTable {
            kind: args.kind,
            data,
        })
    }
}

impl<'a> WriteBinary<&Self> for LayoutTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &LayoutTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

fn read_script_list(scope: ReadScope<'_>, num_features: u16) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let script_count = ctxt.read_u16be()?;
    let record_end = 2 + usize::from(script_count) * 6;

    let mut offsets = Vec::with_capacity(usize::from(script_count));
    let mut last_tag = None;
    for _ in 0..script_count {
        let tag = ctxt.read_u32be()?;
        let offset = usize::from(ctxt.read_u16be()?);
        // records are sorted alphabetically by tag
        if last_tag.map_or(false, |last| tag < last) {
            return Err(ParseError::BadValue);
        }
        last_tag = Some(tag);
        if offset < record_end || offset >= length {
            return Err(ParseError::BadOffset);
        }
        offsets.push((tag, offset));
    }

    for (tag, offset) in offsets {
        read_script_table(scope.offset(offset), tag, num_features)?;
    }
    Ok(())
}

fn read_script_table(scope: ReadScope<'_>, tag: u32, num_features: u16) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let default_lang_sys_offset = usize::from(ctxt.read_u16be()?);
    let lang_sys_count = ctxt.read_u16be()?;

    // A 'DFLT' script must carry a default LangSys and no other LangSys records
    if tag == crate::tag!(b"DFLT") && (default_lang_sys_offset == 0 || lang_sys_count != 0) {
        return Err(ParseError::BadValue);
    }

    let record_end = 4 + usize::from(lang_sys_count) * 6;
    let mut offsets = Vec::with_capacity(usize::from(lang_sys_count) + 1);
    if default_lang_sys_offset != 0 {
        if default_lang_sys_offset < record_end || default_lang_sys_offset >= length {
            return Err(ParseError::BadOffset);
        }
        offsets.push(default_lang_sys_offset);
    }

    let mut last_tag = None;
    for _ in 0..lang_sys_count {
        let tag = ctxt.read_u32be()?;
        let offset = usize::from(ctxt.read_u16be()?);
        if last_tag.map_or(false, |last| tag < last) {
            return Err(ParseError::BadValue);
        }
        last_tag = Some(tag);
        if offset < record_end || offset >= length {
            return Err(ParseError::BadOffset);
        }
        offsets.push(offset);
    }

    for offset in offsets {
        read_lang_sys(scope.offset(offset), num_features)?;
    }
    Ok(())
}

fn read_lang_sys(scope: ReadScope<'_>, num_features: u16) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let lookup_order_offset = ctxt.read_u16be()?;
    // reserved, must be NULL
    if lookup_order_offset != 0 {
        return Err(ParseError::BadValue);
    }
    let required_feature_index = ctxt.read_u16be()?;
    if required_feature_index != NO_REQUIRED_FEATURE && required_feature_index >= num_features {
        return Err(ParseError::BadIndex);
    }
    let feature_count = ctxt.read_u16be()?;
    if feature_count > num_features {
        return Err(ParseError::BadValue);
    }
    for _ in 0..feature_count {
        let feature_index = ctxt.read_u16be()?;
        if feature_index >= num_features {
            return Err(ParseError::BadIndex);
        }
    }
    Ok(())
}

fn read_feature_list(scope: ReadScope<'_>, num_lookups: u16) -> Result<u16, ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let feature_count = ctxt.read_u16be()?;
    let record_end = 2 + usize::from(feature_count) * 6;

    let mut offsets = Vec::with_capacity(usize::from(feature_count));
    let mut last_tag = None;
    for _ in 0..feature_count {
        let tag = ctxt.read_u32be()?;
        let offset = usize::from(ctxt.read_u16be()?);
        if last_tag.map_or(false, |last| tag < last) {
            return Err(ParseError::BadValue);
        }
        last_tag = Some(tag);
        if offset < record_end || offset >= length {
            return Err(ParseError::BadOffset);
        }
        offsets.push(offset);
    }

    for offset in offsets {
        read_feature_table(scope.offset(offset), num_lookups)?;
    }
    Ok(feature_count)
}

fn read_feature_table(scope: ReadScope<'_>, num_lookups: u16) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let feature_params_offset = usize::from(ctxt.read_u16be()?);
    let lookup_count = ctxt.read_u16be()?;
    let table_end = 4 + usize::from(num_lookups) * 2;
    if feature_params_offset != 0
        && (feature_params_offset < table_end || feature_params_offset >= length)
    {
        return Err(ParseError::BadOffset);
    }
    for _ in 0..lookup_count {
        let lookup_index = ctxt.read_u16be()?;
        if lookup_index >= num_lookups {
            return Err(ParseError::BadIndex);
        }
    }
    Ok(())
}

fn read_lookup_list(scope: ReadScope<'_>, args: &LayoutArgs) -> Result<u16, ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let lookup_count = ctxt.read_u16be()?;
    let record_end = 2 + usize::from(lookup_count) * 2;

    let mut offsets = Vec::with_capacity(usize::from(lookup_count));
    for _ in 0..lookup_count {
        let offset = usize::from(ctxt.read_u16be()?);
        if offset < record_end || offset >= length {
            return Err(ParseError::BadOffset);
        }
        offsets.push(offset);
    }

    for offset in offsets {
        read_lookup(scope.offset(offset), args, lookup_count)?;
    }
    Ok(lookup_count)
}

fn read_lookup(scope: ReadScope<'_>, args: &LayoutArgs, num_lookups: u16) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let lookup_type = ctxt.read_u16be()?;
    let lookup_flag = ctxt.read_u16be()?;
    let subtable_count = ctxt.read_u16be()?;

    let max_type = match args.kind {
        LayoutTableKind::Gsub => 8,
        LayoutTableKind::Gpos => 9,
    };
    if lookup_type == 0 || lookup_type > max_type {
        return Err(ParseError::BadValue);
    }

    if lookup_flag & MARK_ATTACHMENT_TYPE_MASK != 0 && !args.gdef.has_mark_attachment_class_def {
        return Err(ParseError::MissingValue);
    }
    let use_mark_filtering_set = lookup_flag & USE_MARK_FILTERING_SET != 0;
    if use_mark_filtering_set && args.gdef.num_mark_glyph_sets.is_none() {
        return Err(ParseError::MissingValue);
    }

    let header_len = if use_mark_filtering_set { 8 } else { 6 };
    let table_end = header_len + usize::from(subtable_count) * 2;
    let mut offsets = Vec::with_capacity(usize::from(subtable_count));
    for _ in 0..subtable_count {
        let offset = usize::from(ctxt.read_u16be()?);
        if offset < table_end || offset >= length {
            return Err(ParseError::BadOffset);
        }
        offsets.push(offset);
    }

    if use_mark_filtering_set {
        let mark_filtering_set = ctxt.read_u16be()?;
        // NOTE(unwrap): checked above
        let num_sets = args.gdef.num_mark_glyph_sets.unwrap();
        if num_sets == 0 || mark_filtering_set >= num_sets {
            return Err(ParseError::BadIndex);
        }
    }

    for offset in offsets {
        read_lookup_subtable(scope.offset(offset), args, lookup_type, num_lookups)?;
    }
    Ok(())
}

/// Whether the extension lookup type for this table kind.
fn extension_lookup_type(kind: LayoutTableKind) -> u16 {
    match kind {
        LayoutTableKind::Gsub => 7,
        LayoutTableKind::Gpos => 9,
    }
}

/// Validate a lookup subtable.
///
/// Validation covers the subtable's format, its coverage table(s), and for
/// the contextual formats the sequence lookup indices. Payload arrays beyond
/// those are bounds-checked implicitly by the coverage reads.
fn read_lookup_subtable(
    scope: ReadScope<'_>,
    args: &LayoutArgs,
    lookup_type: u16,
    num_lookups: u16,
) -> Result<(), ParseError> {
    let length = scope.data().len();

    if lookup_type == extension_lookup_type(args.kind) {
        let mut ctxt = scope.ctxt();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 1)?;
        let extension_lookup_type_inner = ctxt.read_u16be()?;
        if extension_lookup_type_inner == lookup_type {
            // extensions must not nest
            return Err(ParseError::BadValue);
        }
        let extension_offset = usize::try_from(ctxt.read_u32be()?)?;
        if extension_offset >= length {
            return Err(ParseError::BadOffset);
        }
        return read_lookup_subtable(
            scope.offset(extension_offset),
            args,
            extension_lookup_type_inner,
            num_lookups,
        );
    }

    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;

    let context_like = match args.kind {
        LayoutTableKind::Gsub => lookup_type == 5 || lookup_type == 6,
        LayoutTableKind::Gpos => lookup_type == 7 || lookup_type == 8,
    };
    let chaining = match args.kind {
        LayoutTableKind::Gsub => lookup_type == 6,
        LayoutTableKind::Gpos => lookup_type == 8,
    };

    if context_like && format == 3 {
        if chaining {
            // ChainContext format 3: three coverage arrays then sequence
            // lookup records
            let backtrack_count = ctxt.read_u16be()?;
            read_coverage_array(scope.clone(), &mut ctxt, backtrack_count, args.num_glyphs)?;
            let input_count = ctxt.read_u16be()?;
            ctxt.check(input_count > 0)?;
            read_coverage_array(scope.clone(), &mut ctxt, input_count, args.num_glyphs)?;
            let lookahead_count = ctxt.read_u16be()?;
            read_coverage_array(scope, &mut ctxt, lookahead_count, args.num_glyphs)?;
            read_sequence_lookups(&mut ctxt, num_lookups)?;
        } else {
            // Context format 3: coverage array and sequence lookup records
            let glyph_count = ctxt.read_u16be()?;
            ctxt.check(glyph_count > 0)?;
            let seq_lookup_count = ctxt.read_u16be()?;
            read_coverage_array(scope, &mut ctxt, glyph_count, args.num_glyphs)?;
            for _ in 0..seq_lookup_count {
                let sequence_index = ctxt.read_u16be()?;
                let lookup_index = ctxt.read_u16be()?;
                if sequence_index >= glyph_count || lookup_index >= num_lookups {
                    return Err(ParseError::BadIndex);
                }
            }
        }
        return Ok(());
    }

    let max_format = lookup_subtable_max_format(args.kind, lookup_type);
    if format == 0 || format > max_format {
        return Err(ParseError::BadVersion);
    }

    // Every remaining subtable format carries its primary coverage offset
    // directly after the format field.
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    if coverage_offset >= length {
        return Err(ParseError::BadOffset);
    }
    read_coverage(scope.offset(coverage_offset), args.num_glyphs, None)?;

    // The mark attachment lookups carry a second coverage table.
    let has_second_coverage = match args.kind {
        LayoutTableKind::Gpos => matches!(lookup_type, 4 | 5 | 6),
        LayoutTableKind::Gsub => false,
    };
    if has_second_coverage {
        let second_coverage_offset = usize::from(ctxt.read_u16be()?);
        if second_coverage_offset >= length {
            return Err(ParseError::BadOffset);
        }
        read_coverage(scope.offset(second_coverage_offset), args.num_glyphs, None)?;
    }

    Ok(())
}

fn lookup_subtable_max_format(kind: LayoutTableKind, lookup_type: u16) -> u16 {
    match kind {
        LayoutTableKind::Gsub => match lookup_type {
            1 | 5 | 6 => 2,
            _ => 1,
        },
        LayoutTableKind::Gpos => match lookup_type {
            1 | 2 | 7 | 8 => 2,
            _ => 1,
        },
    }
}

fn read_coverage_array(
    scope: ReadScope<'_>,
    ctxt: &mut ReadCtxt<'_>,
    count: u16,
    num_glyphs: u16,
) -> Result<(), ParseError> {
    for _ in 0..count {
        let offset = usize::from(ctxt.read_u16be()?);
        if offset >= scope.data().len() {
            return Err(ParseError::BadOffset);
        }
        read_coverage(scope.offset(offset), num_glyphs, None)?;
    }
    Ok(())
}

fn read_sequence_lookups(ctxt: &mut ReadCtxt<'_>, num_lookups: u16) -> Result<(), ParseError> {
    let seq_lookup_count = ctxt.read_u16be()?;
    for _ in 0..seq_lookup_count {
        let _sequence_index = ctxt.read_u16be()?;
        let lookup_index = ctxt.read_u16be()?;
        if lookup_index >= num_lookups {
            return Err(ParseError::BadIndex);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBuffer, WriteContext};
    use crate::binary::{U16Be, U32Be};

    fn coverage_format1(glyphs: &[u16]) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, glyphs.len() as u16).unwrap();
        for &glyph in glyphs {
            U16Be::write(&mut w, glyph).unwrap();
        }
        w.into_inner()
    }

    #[test]
    fn coverage_format1_counts_glyphs() {
        let data = coverage_format1(&[1, 3, 5]);
        assert_eq!(read_coverage(ReadScope::new(&data), 10, None), Ok(3));
    }

    #[test]
    fn coverage_format1_rejects_unsorted() {
        let data = coverage_format1(&[3, 1]);
        assert!(read_coverage(ReadScope::new(&data), 10, None).is_err());
    }

    #[test]
    fn coverage_format1_rejects_out_of_range_glyph() {
        let data = coverage_format1(&[1, 20]);
        assert_eq!(
            read_coverage(ReadScope::new(&data), 10, None),
            Err(ParseError::BadIndex)
        );
    }

    #[test]
    fn coverage_expected_count_mismatch() {
        let data = coverage_format1(&[1, 3]);
        assert_eq!(
            read_coverage(ReadScope::new(&data), 10, Some(3)),
            Err(ParseError::BadValue)
        );
    }

    #[test]
    fn coverage_format2_validates_indices() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 2u16).unwrap(); // format
        U16Be::write(&mut w, 2u16).unwrap(); // rangeCount
        // range 1..3, index 0
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 3u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        // range 5..6, index 3 (continues after the 3 glyphs of range 1)
        U16Be::write(&mut w, 5u16).unwrap();
        U16Be::write(&mut w, 6u16).unwrap();
        U16Be::write(&mut w, 3u16).unwrap();
        let data = w.into_inner();
        assert_eq!(read_coverage(ReadScope::new(&data), 10, None), Ok(5));

        // Break the start coverage index of the second range
        let mut bad = data.clone();
        bad[15] = 4;
        assert!(read_coverage(ReadScope::new(&bad), 10, None).is_err());
    }

    #[test]
    fn class_def_rejects_class_zero() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap(); // format
        U16Be::write(&mut w, 1u16).unwrap(); // startGlyph
        U16Be::write(&mut w, 1u16).unwrap(); // glyphCount
        U16Be::write(&mut w, 0u16).unwrap(); // class 0 is invalid
        let data = w.into_inner();
        assert!(read_class_def(ReadScope::new(&data), 10, 4).is_err());
    }

    #[test]
    fn device_table_length_follows_format() {
        // sizes 12..17 inclusive with format 2 (4 bits per size): 6 values,
        // 4 per word, so 2 words
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 12u16).unwrap();
        U16Be::write(&mut w, 17u16).unwrap();
        U16Be::write(&mut w, 2u16).unwrap();
        w.write_zeros(4).unwrap();
        let data = w.into_inner();
        assert!(read_device(ReadScope::new(&data)).is_ok());

        // truncating the payload fails
        assert!(read_device(ReadScope::new(&data[..8])).is_err());
    }

    fn minimal_layout_table(lookup_flag: u16) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap(); // major
        U16Be::write(&mut w, 0u16).unwrap(); // minor
        U16Be::write(&mut w, 0u16).unwrap(); // scriptListOffset
        U16Be::write(&mut w, 0u16).unwrap(); // featureListOffset
        U16Be::write(&mut w, 10u16).unwrap(); // lookupListOffset
        // lookup list at 10
        U16Be::write(&mut w, 1u16).unwrap(); // lookupCount
        U16Be::write(&mut w, 4u16).unwrap(); // offset to lookup
        // lookup at 14
        U16Be::write(&mut w, 1u16).unwrap(); // lookupType: single subst
        U16Be::write(&mut w, lookup_flag).unwrap();
        U16Be::write(&mut w, 1u16).unwrap(); // subTableCount
        U16Be::write(&mut w, 8u16).unwrap(); // subtable offset
        // single subst format 1 at 22
        U16Be::write(&mut w, 1u16).unwrap(); // format
        U16Be::write(&mut w, 6u16).unwrap(); // coverage offset
        U16Be::write(&mut w, 2u16).unwrap(); // deltaGlyphID
        // coverage at 28
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 1u16).unwrap(); // glyph 1
        w.into_inner()
    }

    #[test]
    fn parses_minimal_gsub() {
        let data = minimal_layout_table(0);
        let args = LayoutArgs {
            kind: LayoutTableKind::Gsub,
            num_glyphs: 10,
            gdef: GdefInfo::default(),
        };
        assert!(ReadScope::new(&data)
            .read_dep::<LayoutTable<'_>>(args)
            .is_ok());
    }

    #[test]
    fn mark_attachment_flag_requires_gdef() {
        let data = minimal_layout_table(0x0100);
        let args = LayoutArgs {
            kind: LayoutTableKind::Gsub,
            num_glyphs: 10,
            gdef: GdefInfo::default(),
        };
        assert_eq!(
            ReadScope::new(&data).read_dep::<LayoutTable<'_>>(args).err(),
            Some(ParseError::MissingValue)
        );

        let args = LayoutArgs {
            kind: LayoutTableKind::Gsub,
            num_glyphs: 10,
            gdef: GdefInfo {
                has_mark_attachment_class_def: true,
                num_mark_glyph_sets: None,
            },
        };
        assert!(ReadScope::new(&data)
            .read_dep::<LayoutTable<'_>>(args)
            .is_ok());
    }

    #[test]
    fn gdef_with_class_def_parses() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap(); // major
        U16Be::write(&mut w, 0u16).unwrap(); // minor
        U16Be::write(&mut w, 12u16).unwrap(); // glyphClassDef offset
        U16Be::write(&mut w, 0u16).unwrap(); // attachList
        U16Be::write(&mut w, 0u16).unwrap(); // ligCaretList
        U16Be::write(&mut w, 0u16).unwrap(); // markAttachClassDef
        // class def format 1 at 12
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 1u16).unwrap(); // startGlyph
        U16Be::write(&mut w, 2u16).unwrap(); // glyphCount
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 3u16).unwrap();
        let data = w.into_inner();
        let gdef = ReadScope::new(&data).read_dep::<GdefTable<'_>>(10).unwrap();
        assert!(!gdef.info.has_mark_attachment_class_def);
    }

    #[test]
    fn script_list_requires_sorted_tags() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 2u16).unwrap(); // scriptCount
        U32Be::write(&mut w, crate::tag!(b"latn")).unwrap();
        U16Be::write(&mut w, 14u16).unwrap();
        U32Be::write(&mut w, crate::tag!(b"cyrl")).unwrap(); // out of order
        U16Be::write(&mut w, 14u16).unwrap();
        // script table at 14: defaultLangSys 0, langSysCount 0
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        let data = w.into_inner();
        assert!(read_script_list(ReadScope::new(&data), 0).is_err());
    }
}
