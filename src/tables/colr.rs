//! Validation of the `COLR` table.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/colr>
//!
//! The COLRv1 paint graph is a directed graph of paint records reached
//! through 24-bit offsets, and it may contain cycles through
//! `PaintColrGlyph`. The walker visits every physical record at most once
//! (per-format visited sets keyed by absolute offset), which both bounds the
//! work and breaks cycles. The table is re-emitted verbatim after
//! validation.

use log::warn;
use rustc_hash::FxHashSet;

use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::error::{ParseError, WriteError};
use crate::variations::{read_delta_set_index_map, read_item_variation_store};

/// 1.0 as F2DOT14, the upper bound for alpha values.
const F2DOT14_ONE: i16 = 0x4000;

/// Highest defined composite mode (HSL luminosity).
const MAX_COMPOSITE_MODE: u8 = 27;

/// Bound on paint graph descent depth.
///
/// The visited sets bound total work but a degenerate chain of tiny records
/// could still nest arbitrarily deep before any record repeats.
const MAX_PAINT_DEPTH: u32 = 256;

/// `COLR` table: validated on parse, serialized verbatim.
pub struct ColrTable<'a> {
    pub version: u16,
    data: ReadScope<'a>,
}

/// Cross-table inputs for COLR validation.
#[derive(Copy, Clone)]
pub struct ColrArgs {
    /// From `maxp`.
    pub num_glyphs: u16,
    /// From `CPAL`. COLRv1 requires CPAL; a COLRv0-only font may have none.
    pub num_palette_entries: u16,
}

/// Traversal state for one COLR table walk.
struct ColrState {
    num_glyphs: u16,
    num_palette_entries: u16,
    num_layers: u32,
    base_glyph_ids: FxHashSet<u16>,
    visited_paints: FxHashSet<usize>,
    visited_color_lines: FxHashSet<usize>,
    visited_var_color_lines: FxHashSet<usize>,
    visited_affines: FxHashSet<usize>,
    visited_var_affines: FxHashSet<usize>,
    visited_clip_boxes: FxHashSet<usize>,
}

impl<'b> ReadBinaryDep for ColrTable<'b> {
    type Args<'a> = ColrArgs;
    type HostType<'a> = ColrTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: ColrArgs,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let table = ctxt.scope();
        let length = table.data().len();

        let version = ctxt.read_u16be()?;
        ctxt.check_version(version <= 1)?;
        let num_base_glyph_records = ctxt.read_u16be()?;
        let base_glyph_records_offset = usize::try_from(ctxt.read_u32be()?)?;
        let layer_records_offset = usize::try_from(ctxt.read_u32be()?)?;
        let num_layer_records = ctxt.read_u16be()?;

        let (
            base_glyph_list_offset,
            layer_list_offset,
            clip_list_offset,
            var_index_map_offset,
            item_variation_store_offset,
        ) = if version == 1 {
            (
                usize::try_from(ctxt.read_u32be()?)?,
                usize::try_from(ctxt.read_u32be()?)?,
                usize::try_from(ctxt.read_u32be()?)?,
                usize::try_from(ctxt.read_u32be()?)?,
                usize::try_from(ctxt.read_u32be()?)?,
            )
        } else {
            (0, 0, 0, 0, 0)
        };
        let header_size = if version == 1 { 34 } else { 14 };

        let check_offset = |offset: usize| -> Result<(), ParseError> {
            if offset < header_size || offset >= length {
                Err(ParseError::BadOffset)
            } else {
                Ok(())
            }
        };

        let mut state = ColrState {
            num_glyphs: args.num_glyphs,
            num_palette_entries: args.num_palette_entries,
            num_layers: 0,
            base_glyph_ids: FxHashSet::default(),
            visited_paints: FxHashSet::default(),
            visited_color_lines: FxHashSet::default(),
            visited_var_color_lines: FxHashSet::default(),
            visited_affines: FxHashSet::default(),
            visited_var_affines: FxHashSet::default(),
            visited_clip_boxes: FxHashSet::default(),
        };

        if num_base_glyph_records > 0 {
            check_offset(base_glyph_records_offset)?;
            read_base_glyph_records(
                table.offset(base_glyph_records_offset),
                num_base_glyph_records,
                num_layer_records,
                &state,
            )?;
        }

        if num_layer_records > 0 {
            check_offset(layer_records_offset)?;
            read_layer_records(
                table.offset(layer_records_offset),
                num_layer_records,
                &state,
            )?;
        }

        // The layer count is needed before any paint descends, so the layer
        // list header is read ahead of the base glyph list.
        if layer_list_offset != 0 {
            check_offset(layer_list_offset)?;
            let mut layers = table.offset(layer_list_offset).ctxt();
            state.num_layers = layers.read_u32be()?;
        }

        if base_glyph_list_offset != 0 {
            check_offset(base_glyph_list_offset)?;
            read_base_glyph_list(table.offset(base_glyph_list_offset), &mut state)?;
        }

        if layer_list_offset != 0 {
            read_layer_list(table.offset(layer_list_offset), &mut state)?;
        }

        if clip_list_offset != 0 {
            check_offset(clip_list_offset)?;
            read_clip_list(table.offset(clip_list_offset), &mut state)?;
        }

        if var_index_map_offset != 0 {
            check_offset(var_index_map_offset)?;
            read_delta_set_index_map(table.offset(var_index_map_offset))?;
        }

        if item_variation_store_offset != 0 {
            check_offset(item_variation_store_offset)?;
            // COLR variations are resolved through the index map against its
            // own store, so there is no fvar axis count to cross-check here.
            read_item_variation_store(table.offset(item_variation_store_offset), None)?;
        }

        let data = table.offset_length(0, length)?;
        Ok(ColrTable { version, data })
    }
}

impl<'a> WriteBinary<&Self> for ColrTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &ColrTable<'a>) -> Result<(), WriteError> {
        ctxt.write_bytes(table.data.data())
    }
}

fn read_base_glyph_records(
    scope: ReadScope<'_>,
    count: u16,
    num_layer_records: u16,
    state: &ColrState,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let mut prev_glyph_id = None;
    for _ in 0..count {
        let glyph_id = ctxt.read_u16be()?;
        let first_layer_index = ctxt.read_u16be()?;
        let num_layers = ctxt.read_u16be()?;

        if glyph_id >= state.num_glyphs {
            return Err(ParseError::BadIndex);
        }
        // records are sorted by glyph ID
        if prev_glyph_id.map_or(false, |prev| glyph_id <= prev) {
            return Err(ParseError::BadValue);
        }
        prev_glyph_id = Some(glyph_id);

        if u32::from(first_layer_index) + u32::from(num_layers) > u32::from(num_layer_records) {
            return Err(ParseError::BadIndex);
        }
    }
    Ok(())
}

fn read_layer_records(
    scope: ReadScope<'_>,
    count: u16,
    state: &ColrState,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    for _ in 0..count {
        let glyph_id = ctxt.read_u16be()?;
        let palette_index = ctxt.read_u16be()?;
        if glyph_id >= state.num_glyphs {
            return Err(ParseError::BadIndex);
        }
        check_palette_index(palette_index, state)?;
    }
    Ok(())
}

/// Palette index 0xFFFF means "use the text foreground color".
fn check_palette_index(palette_index: u16, state: &ColrState) -> Result<(), ParseError> {
    if palette_index >= state.num_palette_entries && palette_index != 0xFFFF {
        Err(ParseError::BadIndex)
    } else {
        Ok(())
    }
}

fn check_alpha(alpha: i16) {
    if !(0..=F2DOT14_ONE).contains(&alpha) {
        warn!("COLR: alpha outside the range 0.0 to 1.0");
    }
}

fn read_base_glyph_list(scope: ReadScope<'_>, state: &mut ColrState) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let num_records = ctxt.read_u32be()?;

    // First pass: collect the declared base glyph IDs so that PaintColrGlyph
    // can reference peers regardless of their order in the list.
    let mut prev_glyph_id = None;
    let mut offsets = Vec::new();
    for _ in 0..num_records {
        let glyph_id = ctxt.read_u16be()?;
        let paint_offset = usize::try_from(ctxt.read_u32be()?)?;

        if glyph_id >= state.num_glyphs {
            return Err(ParseError::BadIndex);
        }
        if prev_glyph_id.map_or(false, |prev| glyph_id <= prev) {
            return Err(ParseError::BadValue);
        }
        prev_glyph_id = Some(glyph_id);

        if paint_offset == 0 || paint_offset >= length {
            return Err(ParseError::BadOffset);
        }

        state.base_glyph_ids.insert(glyph_id);
        offsets.push(paint_offset);
    }

    // Second pass: descend the paints.
    for paint_offset in offsets {
        read_paint(scope.offset(paint_offset), state, 0)?;
    }

    Ok(())
}

fn read_layer_list(scope: ReadScope<'_>, state: &mut ColrState) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let num_layers = ctxt.read_u32be()?;
    for _ in 0..num_layers {
        let paint_offset = usize::try_from(ctxt.read_u32be()?)?;
        if paint_offset == 0 || paint_offset >= length {
            return Err(ParseError::BadOffset);
        }
        read_paint(scope.offset(paint_offset), state, 0)?;
    }
    Ok(())
}

/// Dispatch on the paint record's format, validating its fields and
/// descending into child paints.
///
/// `scope` extends from the record's start to the end of the enclosing span,
/// so forward 24-bit offsets are resolved with `scope.offset`.
fn read_paint(scope: ReadScope<'_>, state: &mut ColrState, depth: u32) -> Result<(), ParseError> {
    if !state.visited_paints.insert(scope.base()) {
        return Ok(());
    }
    if depth >= MAX_PAINT_DEPTH {
        return Err(ParseError::LimitExceeded);
    }
    let length = scope.data().len();

    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u8()?;
    match format {
        1 => {
            // PaintColrLayers
            let num_layers = ctxt.read_u8()?;
            let first_layer_index = ctxt.read_u32be()?;
            if u64::from(first_layer_index) + u64::from(num_layers) > u64::from(state.num_layers) {
                return Err(ParseError::BadIndex);
            }
        }
        2 | 3 => {
            // Paint[Var]Solid
            let palette_index = ctxt.read_u16be()?;
            let alpha = ctxt.read_i16be()?;
            check_palette_index(palette_index, state)?;
            check_alpha(alpha);
            if format == 3 {
                let _var_index_base = ctxt.read_u32be()?;
            }
        }
        4 | 5 => {
            // Paint[Var]LinearGradient
            let color_line = usize::try_from(ctxt.read_u24be()?)?;
            for _ in 0..6 {
                let _coord = ctxt.read_i16be()?;
            }
            if format == 5 {
                let _var_index_base = ctxt.read_u32be()?;
            }
            read_color_line(scope, color_line, state, format == 5)?;
        }
        6 | 7 => {
            // Paint[Var]RadialGradient
            let color_line = usize::try_from(ctxt.read_u24be()?)?;
            for _ in 0..6 {
                let _coord = ctxt.read_i16be()?;
            }
            if format == 7 {
                let _var_index_base = ctxt.read_u32be()?;
            }
            read_color_line(scope, color_line, state, format == 7)?;
        }
        8 | 9 => {
            // Paint[Var]SweepGradient
            let color_line = usize::try_from(ctxt.read_u24be()?)?;
            for _ in 0..4 {
                let _value = ctxt.read_i16be()?;
            }
            if format == 9 {
                let _var_index_base = ctxt.read_u32be()?;
            }
            read_color_line(scope, color_line, state, format == 9)?;
        }
        10 => {
            // PaintGlyph
            let paint_offset = usize::try_from(ctxt.read_u24be()?)?;
            let glyph_id = ctxt.read_u16be()?;
            if paint_offset >= length {
                return Err(ParseError::BadOffset);
            }
            if glyph_id >= state.num_glyphs {
                return Err(ParseError::BadIndex);
            }
            read_paint(scope.offset(paint_offset), state, depth + 1)?;
        }
        11 => {
            // PaintColrGlyph: resolved against the declared base glyph set
            // rather than by descent, which is what breaks reference cycles.
            let glyph_id = ctxt.read_u16be()?;
            if !state.base_glyph_ids.contains(&glyph_id) {
                return Err(ParseError::BadIndex);
            }
        }
        12 | 13 => {
            // Paint[Var]Transform
            let paint_offset = usize::try_from(ctxt.read_u24be()?)?;
            let transform_offset = usize::try_from(ctxt.read_u24be()?)?;
            if paint_offset >= length || transform_offset >= length {
                return Err(ParseError::BadOffset);
            }
            read_paint(scope.offset(paint_offset), state, depth + 1)?;
            read_affine(scope.offset(transform_offset), state, format == 13)?;
        }
        14 | 15 => {
            // Paint[Var]Translate
            let paint_offset = usize::try_from(ctxt.read_u24be()?)?;
            let _dx = ctxt.read_i16be()?;
            let _dy = ctxt.read_i16be()?;
            if format == 15 {
                let _var_index_base = ctxt.read_u32be()?;
            }
            if paint_offset >= length {
                return Err(ParseError::BadOffset);
            }
            read_paint(scope.offset(paint_offset), state, depth + 1)?;
        }
        16..=23 => {
            // Paint[Var]Scale[Uniform][AroundCenter]
            let var = format & 1 != 0;
            let around_center = matches!(format, 18 | 19 | 22 | 23);
            let uniform = format >= 20;
            let paint_offset = usize::try_from(ctxt.read_u24be()?)?;
            let _scale_x = ctxt.read_i16be()?;
            if !uniform {
                let _scale_y = ctxt.read_i16be()?;
            }
            if around_center {
                let _center_x = ctxt.read_i16be()?;
                let _center_y = ctxt.read_i16be()?;
            }
            if var {
                let _var_index_base = ctxt.read_u32be()?;
            }
            if paint_offset >= length {
                return Err(ParseError::BadOffset);
            }
            read_paint(scope.offset(paint_offset), state, depth + 1)?;
        }
        24..=27 => {
            // Paint[Var]Rotate[AroundCenter]
            let var = format & 1 != 0;
            let around_center = format >= 26;
            let paint_offset = usize::try_from(ctxt.read_u24be()?)?;
            let _angle = ctxt.read_i16be()?;
            if around_center {
                let _center_x = ctxt.read_i16be()?;
                let _center_y = ctxt.read_i16be()?;
            }
            if var {
                let _var_index_base = ctxt.read_u32be()?;
            }
            if paint_offset >= length {
                return Err(ParseError::BadOffset);
            }
            read_paint(scope.offset(paint_offset), state, depth + 1)?;
        }
        28..=31 => {
            // Paint[Var]Skew[AroundCenter]
            let var = format & 1 != 0;
            let around_center = format >= 30;
            let paint_offset = usize::try_from(ctxt.read_u24be()?)?;
            let _x_skew = ctxt.read_i16be()?;
            let _y_skew = ctxt.read_i16be()?;
            if around_center {
                let _center_x = ctxt.read_i16be()?;
                let _center_y = ctxt.read_i16be()?;
            }
            if var {
                let _var_index_base = ctxt.read_u32be()?;
            }
            if paint_offset >= length {
                return Err(ParseError::BadOffset);
            }
            read_paint(scope.offset(paint_offset), state, depth + 1)?;
        }
        32 => {
            // PaintComposite
            let source_offset = usize::try_from(ctxt.read_u24be()?)?;
            let composite_mode = ctxt.read_u8()?;
            let backdrop_offset = usize::try_from(ctxt.read_u24be()?)?;
            if composite_mode > MAX_COMPOSITE_MODE {
                warn!("COLR: unknown composite mode {}", composite_mode);
            }
            if source_offset >= length || backdrop_offset >= length {
                return Err(ParseError::BadOffset);
            }
            read_paint(scope.offset(source_offset), state, depth + 1)?;
            read_paint(scope.offset(backdrop_offset), state, depth + 1)?;
        }
        _ => {
            // Clients ignore unknown paint formats, so the sanitizer passes
            // them through without descending.
            warn!("COLR: unknown paint format {}", format);
        }
    }

    Ok(())
}

fn read_color_line(
    paint_scope: ReadScope<'_>,
    offset: usize,
    state: &mut ColrState,
    var: bool,
) -> Result<(), ParseError> {
    if offset >= paint_scope.data().len() {
        return Err(ParseError::BadOffset);
    }
    let scope = paint_scope.offset(offset);
    let visited = if var {
        &mut state.visited_var_color_lines
    } else {
        &mut state.visited_color_lines
    };
    if !visited.insert(scope.base()) {
        return Ok(());
    }

    let mut ctxt = scope.ctxt();
    let extend = ctxt.read_u8()?;
    if extend > 2 {
        warn!("COLR: unknown color-line extend mode {}", extend);
    }
    let num_stops = ctxt.read_u16be()?;
    for _ in 0..num_stops {
        let _stop_offset = ctxt.read_i16be()?;
        let palette_index = ctxt.read_u16be()?;
        let alpha = ctxt.read_i16be()?;
        if var {
            let _var_index_base = ctxt.read_u32be()?;
        }
        check_palette_index(palette_index, state)?;
        check_alpha(alpha);
    }

    Ok(())
}

fn read_affine(scope: ReadScope<'_>, state: &mut ColrState, var: bool) -> Result<(), ParseError> {
    let visited = if var {
        &mut state.visited_var_affines
    } else {
        &mut state.visited_affines
    };
    if !visited.insert(scope.base()) {
        return Ok(());
    }

    let mut ctxt = scope.ctxt();
    for _ in 0..6 {
        let _component = ctxt.read_i32be()?;
    }
    if var {
        let _var_index_base = ctxt.read_u32be()?;
    }
    Ok(())
}

fn read_clip_list(scope: ReadScope<'_>, state: &mut ColrState) -> Result<(), ParseError> {
    let length = scope.data().len();
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u8()?;
    if format != 1 {
        return Err(ParseError::BadVersion);
    }
    let num_clip_records = ctxt.read_u32be()?;
    let mut prev_end = None;
    for _ in 0..num_clip_records {
        let start_glyph_id = ctxt.read_u16be()?;
        let end_glyph_id = ctxt.read_u16be()?;
        let clip_box_offset = usize::try_from(ctxt.read_u24be()?)?;

        if start_glyph_id > end_glyph_id || end_glyph_id >= state.num_glyphs {
            return Err(ParseError::BadValue);
        }
        if prev_end.map_or(false, |prev| start_glyph_id <= prev) {
            return Err(ParseError::BadValue);
        }
        prev_end = Some(end_glyph_id);

        if clip_box_offset >= length {
            return Err(ParseError::BadOffset);
        }
        read_clip_box(scope.offset(clip_box_offset), state)?;
    }
    Ok(())
}

fn read_clip_box(scope: ReadScope<'_>, state: &mut ColrState) -> Result<(), ParseError> {
    if !state.visited_clip_boxes.insert(scope.base()) {
        return Ok(());
    }

    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u8()?;
    let x_min = ctxt.read_i16be()?;
    let y_min = ctxt.read_i16be()?;
    let x_max = ctxt.read_i16be()?;
    let y_max = ctxt.read_i16be()?;
    match format {
        1 => {}
        2 => {
            let _var_index_base = ctxt.read_u32be()?;
        }
        _ => return Err(ParseError::BadVersion),
    }
    if x_min > x_max || y_min > y_max {
        return Err(ParseError::BadValue);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBuffer, WriteContext};
    use crate::binary::{U16Be, U24Be, U32Be, U8};

    const ARGS: ColrArgs = ColrArgs {
        num_glyphs: 10,
        num_palette_entries: 4,
    };

    fn write_v1_header(
        w: &mut WriteBuffer,
        base_glyph_list_offset: u32,
        layer_list_offset: u32,
    ) {
        U16Be::write(w, 1u16).unwrap(); // version
        U16Be::write(w, 0u16).unwrap(); // numBaseGlyphRecords
        U32Be::write(w, 0u32).unwrap(); // baseGlyphRecordsOffset
        U32Be::write(w, 0u32).unwrap(); // layerRecordsOffset
        U16Be::write(w, 0u16).unwrap(); // numLayerRecords
        U32Be::write(w, base_glyph_list_offset).unwrap();
        U32Be::write(w, layer_list_offset).unwrap();
        U32Be::write(w, 0u32).unwrap(); // clipListOffset
        U32Be::write(w, 0u32).unwrap(); // varIndexMapOffset
        U32Be::write(w, 0u32).unwrap(); // itemVariationStoreOffset
    }

    fn paint_solid(w: &mut WriteBuffer, palette_index: u16, alpha: i16) {
        U8::write(w, 2u8).unwrap();
        U16Be::write(w, palette_index).unwrap();
        U16Be::write(w, alpha as u16).unwrap();
    }

    /// BaseGlyphList with one glyph whose paint graph is
    /// PaintGlyph -> PaintSolid.
    fn v1_fixture(palette_index: u16) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        write_v1_header(&mut w, 34, 0);
        // BaseGlyphList at 34
        U32Be::write(&mut w, 1u32).unwrap(); // numBaseGlyphPaintRecords
        U16Be::write(&mut w, 2u16).unwrap(); // glyphID
        U32Be::write(&mut w, 10u32).unwrap(); // paintOffset (from list start)
        // PaintGlyph at 34 + 10
        U8::write(&mut w, 10u8).unwrap();
        U24Be::write(&mut w, 6u32).unwrap(); // child paint offset
        U16Be::write(&mut w, 3u16).unwrap(); // glyphID
        // PaintSolid at 34 + 16
        paint_solid(&mut w, palette_index, 0x4000);
        w.into_inner()
    }

    #[test]
    fn parses_simple_v1_graph() {
        let data = v1_fixture(1);
        assert!(ReadScope::new(&data)
            .read_dep::<ColrTable<'_>>(ARGS)
            .is_ok());
    }

    #[test]
    fn rejects_palette_index_out_of_range() {
        let data = v1_fixture(9);
        assert_eq!(
            ReadScope::new(&data).read_dep::<ColrTable<'_>>(ARGS).err(),
            Some(ParseError::BadIndex)
        );
    }

    #[test]
    fn allows_foreground_palette_index() {
        let data = v1_fixture(0xFFFF);
        assert!(ReadScope::new(&data)
            .read_dep::<ColrTable<'_>>(ARGS)
            .is_ok());
    }

    /// A PaintColrGlyph that references its own base glyph: the two-pass
    /// design must terminate and accept it.
    #[test]
    fn self_referential_colr_glyph_terminates() {
        let mut w = WriteBuffer::new();
        write_v1_header(&mut w, 34, 0);
        U32Be::write(&mut w, 1u32).unwrap();
        U16Be::write(&mut w, 2u16).unwrap(); // glyphID 2
        U32Be::write(&mut w, 10u32).unwrap();
        // PaintColrGlyph referencing glyph 2 (itself)
        U8::write(&mut w, 11u8).unwrap();
        U16Be::write(&mut w, 2u16).unwrap();
        let data = w.into_inner();
        assert!(ReadScope::new(&data)
            .read_dep::<ColrTable<'_>>(ARGS)
            .is_ok());
    }

    #[test]
    fn rejects_colr_glyph_without_base_record() {
        let mut w = WriteBuffer::new();
        write_v1_header(&mut w, 34, 0);
        U32Be::write(&mut w, 1u32).unwrap();
        U16Be::write(&mut w, 2u16).unwrap();
        U32Be::write(&mut w, 10u32).unwrap();
        // PaintColrGlyph referencing glyph 5, which has no base record
        U8::write(&mut w, 11u8).unwrap();
        U16Be::write(&mut w, 5u16).unwrap();
        let data = w.into_inner();
        assert_eq!(
            ReadScope::new(&data).read_dep::<ColrTable<'_>>(ARGS).err(),
            Some(ParseError::BadIndex)
        );
    }

    #[test]
    fn rejects_glyph_id_out_of_range() {
        let mut w = WriteBuffer::new();
        write_v1_header(&mut w, 34, 0);
        U32Be::write(&mut w, 1u32).unwrap();
        U16Be::write(&mut w, 50u16).unwrap(); // out of range for numGlyphs 10
        U32Be::write(&mut w, 10u32).unwrap();
        paint_solid(&mut w, 0, 0x4000);
        let data = w.into_inner();
        assert_eq!(
            ReadScope::new(&data).read_dep::<ColrTable<'_>>(ARGS).err(),
            Some(ParseError::BadIndex)
        );
    }

    #[test]
    fn unknown_paint_format_is_tolerated() {
        let mut w = WriteBuffer::new();
        write_v1_header(&mut w, 34, 0);
        U32Be::write(&mut w, 1u32).unwrap();
        U16Be::write(&mut w, 2u16).unwrap();
        U32Be::write(&mut w, 10u32).unwrap();
        U8::write(&mut w, 60u8).unwrap(); // paint format >= 33: ignored
        w.write_zeros(4).unwrap();
        let data = w.into_inner();
        assert!(ReadScope::new(&data)
            .read_dep::<ColrTable<'_>>(ARGS)
            .is_ok());
    }

    #[test]
    fn v0_round_trips_verbatim() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 0u16).unwrap(); // version
        U16Be::write(&mut w, 1u16).unwrap(); // numBaseGlyphRecords
        U32Be::write(&mut w, 14u32).unwrap(); // baseGlyphRecordsOffset
        U32Be::write(&mut w, 20u32).unwrap(); // layerRecordsOffset
        U16Be::write(&mut w, 1u16).unwrap(); // numLayerRecords
        // base glyph record: glyph 1, first layer 0, one layer
        U16Be::write(&mut w, 1u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        U16Be::write(&mut w, 1u16).unwrap();
        // layer record: glyph 2, palette 0
        U16Be::write(&mut w, 2u16).unwrap();
        U16Be::write(&mut w, 0u16).unwrap();
        let data = w.into_inner();

        let colr = ReadScope::new(&data)
            .read_dep::<ColrTable<'_>>(ARGS)
            .unwrap();
        assert_eq!(colr.version, 0);
        let mut out = WriteBuffer::new();
        ColrTable::write(&mut out, &colr).unwrap();
        assert_eq!(out.bytes(), &data[..]);
    }
}
