//! Parsing and writing of the `glyf` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/glyf>
//!
//! Glyphs are fully decoded on parse so that every offset, flag run, and
//! component reference in the table has been checked before any byte of it is
//! emitted again. Writing repacks the glyphs tightly with 4-byte padding and
//! regenerates the `loca` offsets to match.

use std::iter;

use bitflags::bitflags;
use itertools::Itertools;
use log::warn;

use crate::binary::read::{ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteContext};
use crate::binary::{long_align, I16Be, U16Be, I8, U8};
use crate::error::{ParseError, WriteError};
use crate::tables::loca::{owned, LocaTable};
use crate::tables::F2Dot14;

/// Trailing zero padding tolerated after a glyph's data, in bytes.
///
/// Glyph blocks are commonly 4-byte aligned so up to 3 bytes of slack can
/// appear between the parsed data and the next `loca` offset. More than that
/// means the offsets do not actually describe this glyph.
const MAX_GLYPH_PADDING: u32 = 3;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SimpleGlyphFlag: u8 {
        const ON_CURVE_POINT                       = 0b0000_0001;
        const X_SHORT_VECTOR                       = 0b0000_0010;
        const Y_SHORT_VECTOR                       = 0b0000_0100;
        const REPEAT_FLAG                          = 0b0000_1000;
        const X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR = 0b0001_0000;
        const Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR = 0b0010_0000;
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct CompositeGlyphFlag: u16 {
        const ARG_1_AND_2_ARE_WORDS = 0x0001;
        const ARGS_ARE_XY_VALUES = 0x0002;
        const ROUND_XY_TO_GRID = 0x0004;
        const WE_HAVE_A_SCALE = 0x0008;
        const MORE_COMPONENTS = 0x0020;
        const WE_HAVE_AN_X_AND_Y_SCALE = 0x0040;
        const WE_HAVE_A_TWO_BY_TWO = 0x0080;
        const WE_HAVE_INSTRUCTIONS = 0x0100;
        const USE_MY_METRICS = 0x0200;
        const OVERLAP_COMPOUND = 0x0400;
        const SCALED_COMPONENT_OFFSET = 0x0800;
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
        // Bits 4, 13, 14 and 15 are reserved: set to 0.
    }
}

/// `glyf` table
#[derive(Debug, PartialEq)]
pub struct GlyfTable<'a> {
    records: Vec<GlyfRecord<'a>>,
}

/// A single validated glyph.
#[derive(Debug, PartialEq, Clone)]
pub enum GlyfRecord<'a> {
    /// A glyph without an outline. Serializes to nothing.
    Empty,
    Simple(SimpleGlyph<'a>),
    Composite(CompositeGlyph<'a>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct SimpleGlyph<'a> {
    pub bounding_box: BoundingBox,
    pub end_pts_of_contours: Vec<u16>,
    pub instructions: &'a [u8],
    pub coordinates: Vec<(SimpleGlyphFlag, Point)>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyph<'a> {
    pub bounding_box: BoundingBox,
    pub glyphs: Vec<CompositeGlyphComponent>,
    pub instructions: &'a [u8],
}

#[derive(Debug, PartialEq, Clone)]
pub struct CompositeGlyphComponent {
    pub flags: CompositeGlyphFlag,
    pub glyph_index: u16,
    pub argument1: CompositeGlyphArgument,
    pub argument2: CompositeGlyphArgument,
    pub scale: Option<CompositeGlyphScale>,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphArgument {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum CompositeGlyphScale {
    Scale(F2Dot14),
    XY { x_scale: F2Dot14, y_scale: F2Dot14 },
    Matrix([[F2Dot14; 2]; 2]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point(pub i16, pub i16);

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct BoundingBox {
    pub x_min: i16,
    pub x_max: i16,
    pub y_min: i16,
    pub y_max: i16,
}

/// Arguments needed to parse and validate a `glyf` table.
#[derive(Copy, Clone)]
pub struct GlyfArgs<'a> {
    pub loca: &'a LocaTable<'a>,
    /// `maxp.numGlyphs`, the bound on composite component indices.
    pub num_glyphs: u16,
    /// `maxp.maxSizeOfInstructions` when maxp is version 1.0.
    pub max_instructions: Option<u16>,
}

impl<'b> ReadBinaryDep for GlyfTable<'b> {
    type Args<'a> = GlyfArgs<'a>;
    type HostType<'a> = GlyfTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: GlyfArgs<'a>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let glyf_length = u32::try_from(scope.data().len())?;
        if args.loca.offsets.len() != usize::from(args.num_glyphs) + 1 {
            return Err(ParseError::BadIndex);
        }
        match args.loca.last_offset() {
            Some(last) if last <= glyf_length => {}
            _ => return Err(ParseError::BadOffset),
        }

        let records = args
            .loca
            .offsets
            .iter()
            .tuple_windows()
            .map(|(start, end)| {
                // LOCA guarantees start <= end
                let length = end - start;
                if length == 0 {
                    return Ok(GlyfRecord::Empty);
                }
                let glyph_scope =
                    scope.offset_length(usize::try_from(start)?, usize::try_from(length)?)?;
                read_glyph(glyph_scope, &args)
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(GlyfTable { records })
    }
}

fn read_glyph<'a>(scope: ReadScope<'a>, args: &GlyfArgs<'a>) -> Result<GlyfRecord<'a>, ParseError> {
    let mut ctxt = scope.ctxt();
    let number_of_contours = ctxt.read_i16be()?;
    if number_of_contours < -1 {
        // -2, -3, ... are reserved for future use
        return Err(ParseError::BadValue);
    }
    let bounding_box = ctxt.read::<BoundingBox>()?;
    let bounding_box = bounding_box.normalize_sentinel()?;

    if number_of_contours == 0 {
        // A glyph without contours should not carry data; any that is present
        // is dropped from the output.
        return Ok(GlyfRecord::Empty);
    }

    let record = if number_of_contours > 0 {
        let glyph = read_simple_glyph(
            &mut ctxt,
            number_of_contours as u16,
            bounding_box,
            args.max_instructions,
        )?;
        GlyfRecord::Simple(glyph)
    } else {
        let glyph = read_composite_glyph(&mut ctxt, bounding_box, args.num_glyphs)?;
        GlyfRecord::Composite(glyph)
    };

    // Tolerate the padding that 4-byte alignment introduces, nothing more.
    let remaining = u32::try_from(ctxt.scope().data().len())?;
    if remaining > MAX_GLYPH_PADDING {
        return Err(ParseError::BadValue);
    }

    Ok(record)
}

fn read_simple_glyph<'a>(
    ctxt: &mut ReadCtxt<'a>,
    number_of_contours: u16,
    bounding_box: BoundingBox,
    max_instructions: Option<u16>,
) -> Result<SimpleGlyph<'a>, ParseError> {
    let end_pts_of_contours = ctxt
        .read_array::<U16Be>(usize::from(number_of_contours))?
        .to_vec();
    let mut number_of_coordinates = 0usize;
    for &end in &end_pts_of_contours {
        if end == 0xFFFF {
            return Err(ParseError::BadValue);
        }
        // end point indices must be monotonically increasing
        if usize::from(end) + 1 <= number_of_coordinates {
            return Err(ParseError::BadValue);
        }
        number_of_coordinates = usize::from(end) + 1;
    }

    let instruction_length = ctxt.read_u16be()?;
    if let Some(max) = max_instructions {
        if instruction_length > max {
            return Err(ParseError::LimitExceeded);
        }
    }
    let instructions = ctxt.read_slice(usize::from(instruction_length))?;

    // Read the flags, expanding repeats
    let mut coordinates = Vec::with_capacity(number_of_coordinates);
    while coordinates.len() < number_of_coordinates {
        let raw = ctxt.read_u8()?;
        if raw & 0xC0 != 0 {
            // reserved flag bits must be zero
            return Err(ParseError::BadValue);
        }
        let flag = SimpleGlyphFlag::from_bits_truncate(raw);
        if flag.is_repeated() {
            let repeat = usize::from(ctxt.read_u8()?);
            if repeat == 0 {
                return Err(ParseError::BadValue);
            }
            let count = repeat + 1; // + 1 to include the current entry
            if coordinates.len() + count > number_of_coordinates {
                return Err(ParseError::BadValue);
            }
            coordinates.extend(iter::repeat((flag, Point::zero())).take(count));
        } else {
            coordinates.push((flag, Point::zero()));
        }
    }

    // Read the x coordinate deltas
    let mut prev_x = 0i16;
    for (flag, point) in coordinates.iter_mut() {
        let delta = if flag.x_is_short() {
            i16::from(ctxt.read_u8()?) * flag.x_short_sign()
        } else if flag.x_is_same_or_positive() {
            0
        } else {
            ctxt.read_i16be()?
        };
        // absolute positions accumulate modulo 2^16, matching the rasterizer
        prev_x = prev_x.wrapping_add(delta);
        point.0 = prev_x;
    }

    // Read the y coordinate deltas
    let mut prev_y = 0i16;
    for (flag, point) in coordinates.iter_mut() {
        let delta = if flag.y_is_short() {
            i16::from(ctxt.read_u8()?) * flag.y_short_sign()
        } else if flag.y_is_same_or_positive() {
            0
        } else {
            ctxt.read_i16be()?
        };
        prev_y = prev_y.wrapping_add(delta);
        point.1 = prev_y;
    }

    Ok(SimpleGlyph {
        bounding_box,
        end_pts_of_contours,
        instructions,
        coordinates,
    })
}

fn read_composite_glyph<'a>(
    ctxt: &mut ReadCtxt<'a>,
    bounding_box: BoundingBox,
    num_glyphs: u16,
) -> Result<CompositeGlyph<'a>, ParseError> {
    let mut have_instructions = false;
    let mut glyphs = Vec::new();
    loop {
        let flags = ctxt.read::<CompositeGlyphFlag>()?;
        let component = ctxt.read_dep::<CompositeGlyphComponent>(flags)?;

        if component.glyph_index >= num_glyphs {
            return Err(ParseError::BadIndex);
        }
        if flags.we_have_instructions() {
            have_instructions = true;
        }

        glyphs.push(component);

        if !flags.more_components() {
            break;
        }
    }

    let instruction_length = if have_instructions {
        usize::from(ctxt.read_u16be()?)
    } else {
        0
    };
    let instructions = ctxt.read_slice(instruction_length)?;

    Ok(CompositeGlyph {
        bounding_box,
        glyphs,
        instructions,
    })
}

impl<'a> WriteBinaryDep<Self> for GlyfTable<'a> {
    type Output = owned::LocaTable;
    type Args = ();

    /// Write this glyf table into `ctxt`, returning the regenerated `loca`
    /// offsets.
    ///
    /// Each glyph block is zero-padded to a 4-byte boundary. A font whose
    /// glyphs are all empty gets a single zero byte so the table is not
    /// zero-length in the output.
    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        table: GlyfTable<'a>,
        (): (),
    ) -> Result<Self::Output, WriteError> {
        let mut offsets: Vec<u32> = Vec::with_capacity(table.records.len() + 1);

        let start = ctxt.bytes_written();
        for record in table.records {
            offsets.push(u32::try_from(ctxt.bytes_written() - start)?);

            let offset = ctxt.bytes_written();
            match record {
                GlyfRecord::Empty => {}
                GlyfRecord::Simple(glyph) => SimpleGlyph::write(ctxt, glyph)?,
                GlyfRecord::Composite(glyph) => CompositeGlyph::write(ctxt, glyph)?,
            }
            let length = ctxt.bytes_written() - offset;
            ctxt.write_zeros(long_align(length) - length)?;
        }

        offsets.push(u32::try_from(ctxt.bytes_written() - start)?);

        if ctxt.bytes_written() == start {
            // All glyphs are empty. Emit one zero byte, not reflected in the
            // offsets, so consumers that reject zero-length tables still
            // accept the font.
            ctxt.write_zeros(1)?;
        }

        Ok(owned::LocaTable { offsets })
    }
}

impl<'a> WriteBinary for SimpleGlyph<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, glyph: SimpleGlyph<'_>) -> Result<(), WriteError> {
        I16Be::write(ctxt, i16::try_from(glyph.end_pts_of_contours.len())?)?;
        BoundingBox::write(ctxt, glyph.bounding_box)?;
        ctxt.write_vec::<U16Be, _>(glyph.end_pts_of_contours)?;
        U16Be::write(ctxt, u16::try_from(glyph.instructions.len())?)?;
        ctxt.write_bytes(glyph.instructions)?;

        // Flags and coordinates are written without attempting to compact
        // them with REPEAT or the short vector forms.
        let mask = SimpleGlyphFlag::ON_CURVE_POINT;
        for flag in glyph.coordinates.iter().map(|(flag, _)| *flag) {
            U8::write(ctxt, (flag & mask).bits())?;
        }

        let mut prev_x = 0i16;
        for (_, Point(x, _)) in &glyph.coordinates {
            I16Be::write(ctxt, x.wrapping_sub(prev_x))?;
            prev_x = *x;
        }

        let mut prev_y = 0i16;
        for (_, Point(_, y)) in &glyph.coordinates {
            I16Be::write(ctxt, y.wrapping_sub(prev_y))?;
            prev_y = *y;
        }

        Ok(())
    }
}

impl<'a> WriteBinary for CompositeGlyph<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, composite: Self) -> Result<(), WriteError> {
        I16Be::write(ctxt, -1i16)?; // number_of_contours
        BoundingBox::write(ctxt, composite.bounding_box)?;
        let mut has_instructions = false;
        for glyph in composite.glyphs {
            has_instructions |= glyph.flags.we_have_instructions();
            CompositeGlyphComponent::write(ctxt, glyph)?;
        }
        if has_instructions {
            U16Be::write(ctxt, u16::try_from(composite.instructions.len())?)?;
            ctxt.write_bytes(composite.instructions)?;
        }
        Ok(())
    }
}

impl ReadFrom for CompositeGlyphFlag {
    type ReadType = U16Be;

    fn read_from(flag: u16) -> Self {
        CompositeGlyphFlag::from_bits_truncate(flag)
    }
}

impl ReadBinaryDep for CompositeGlyphArgument {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, flags: Self::Args<'a>) -> Result<Self, ParseError> {
        let arg = match (flags.arg_1_and_2_are_words(), flags.args_are_xy_values()) {
            (true, true) => CompositeGlyphArgument::I16(ctxt.read_i16be()?),
            (true, false) => CompositeGlyphArgument::U16(ctxt.read_u16be()?),
            (false, true) => CompositeGlyphArgument::I8(ctxt.read_i8()?),
            (false, false) => CompositeGlyphArgument::U8(ctxt.read_u8()?),
        };

        Ok(arg)
    }
}

impl WriteBinary for CompositeGlyphArgument {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, arg: CompositeGlyphArgument) -> Result<(), WriteError> {
        match arg {
            CompositeGlyphArgument::U8(val) => U8::write(ctxt, val),
            CompositeGlyphArgument::I8(val) => I8::write(ctxt, val),
            CompositeGlyphArgument::U16(val) => U16Be::write(ctxt, val),
            CompositeGlyphArgument::I16(val) => I16Be::write(ctxt, val),
        }
    }
}

impl ReadBinaryDep for CompositeGlyphComponent {
    type Args<'a> = CompositeGlyphFlag;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, flags: Self::Args<'a>) -> Result<Self, ParseError> {
        let glyph_index = ctxt.read_u16be()?;
        let argument1 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;
        let argument2 = ctxt.read_dep::<CompositeGlyphArgument>(flags)?;

        let scale = if flags.we_have_a_scale() {
            Some(CompositeGlyphScale::Scale(ctxt.read::<F2Dot14>()?))
        } else if flags.we_have_an_x_and_y_scale() {
            Some(CompositeGlyphScale::XY {
                x_scale: ctxt.read::<F2Dot14>()?,
                y_scale: ctxt.read::<F2Dot14>()?,
            })
        } else if flags.we_have_a_two_by_two() {
            Some(CompositeGlyphScale::Matrix([
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
                [ctxt.read::<F2Dot14>()?, ctxt.read::<F2Dot14>()?],
            ]))
        } else {
            None
        };

        Ok(CompositeGlyphComponent {
            flags,
            glyph_index,
            argument1,
            argument2,
            scale,
        })
    }
}

impl WriteBinary for CompositeGlyphComponent {
    type Output = ();

    fn write<C: WriteContext>(
        ctxt: &mut C,
        glyph: CompositeGlyphComponent,
    ) -> Result<(), WriteError> {
        U16Be::write(ctxt, glyph.flags.bits())?;
        U16Be::write(ctxt, glyph.glyph_index)?;
        CompositeGlyphArgument::write(ctxt, glyph.argument1)?;
        CompositeGlyphArgument::write(ctxt, glyph.argument2)?;
        if let Some(scale) = glyph.scale {
            CompositeGlyphScale::write(ctxt, scale)?;
        }
        Ok(())
    }
}

impl WriteBinary for CompositeGlyphScale {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, scale: CompositeGlyphScale) -> Result<(), WriteError> {
        match scale {
            CompositeGlyphScale::Scale(scale) => F2Dot14::write(ctxt, scale)?,
            CompositeGlyphScale::XY { x_scale, y_scale } => {
                F2Dot14::write(ctxt, x_scale)?;
                F2Dot14::write(ctxt, y_scale)?;
            }
            CompositeGlyphScale::Matrix(matrix) => {
                F2Dot14::write(ctxt, matrix[0][0])?;
                F2Dot14::write(ctxt, matrix[0][1])?;
                F2Dot14::write(ctxt, matrix[1][0])?;
                F2Dot14::write(ctxt, matrix[1][1])?;
            }
        }

        Ok(())
    }
}

impl ReadFrom for BoundingBox {
    type ReadType = ((I16Be, I16Be), (I16Be, I16Be));

    fn read_from(((x_min, y_min), (x_max, y_max)): ((i16, i16), (i16, i16))) -> Self {
        BoundingBox {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }
}

impl WriteBinary for BoundingBox {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, bbox: BoundingBox) -> Result<(), WriteError> {
        I16Be::write(ctxt, bbox.x_min)?;
        I16Be::write(ctxt, bbox.y_min)?;
        I16Be::write(ctxt, bbox.x_max)?;
        I16Be::write(ctxt, bbox.y_max)?;
        Ok(())
    }
}

impl BoundingBox {
    pub fn empty() -> Self {
        BoundingBox {
            x_min: 0,
            x_max: 0,
            y_min: 0,
            y_max: 0,
        }
    }

    /// Zero the inverted sentinel bounding box some fonts carry on empty
    /// glyphs, and reject any other inverted box.
    fn normalize_sentinel(self) -> Result<BoundingBox, ParseError> {
        if self.x_min == 32767 && self.x_max == -32767 && self.y_min == 32767 && self.y_max == -32767
        {
            warn!("glyf: zeroing sentinel bounding box");
            return Ok(BoundingBox::empty());
        }
        if self.x_min > self.x_max || self.y_min > self.y_max {
            return Err(ParseError::BadValue);
        }
        Ok(self)
    }
}

impl SimpleGlyphFlag {
    pub fn x_is_short(self) -> bool {
        self.contains(Self::X_SHORT_VECTOR)
    }

    pub fn y_is_short(self) -> bool {
        self.contains(Self::Y_SHORT_VECTOR)
    }

    pub fn is_repeated(self) -> bool {
        self.contains(Self::REPEAT_FLAG)
    }

    pub fn x_short_sign(self) -> i16 {
        if self.x_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn y_short_sign(self) -> i16 {
        if self.y_is_same_or_positive() {
            1
        } else {
            -1
        }
    }

    pub fn x_is_same_or_positive(self) -> bool {
        self.contains(Self::X_IS_SAME_OR_POSITIVE_X_SHORT_VECTOR)
    }

    pub fn y_is_same_or_positive(self) -> bool {
        self.contains(Self::Y_IS_SAME_OR_POSITIVE_Y_SHORT_VECTOR)
    }
}

impl CompositeGlyphFlag {
    pub fn arg_1_and_2_are_words(self) -> bool {
        self.contains(Self::ARG_1_AND_2_ARE_WORDS)
    }

    pub fn args_are_xy_values(self) -> bool {
        self.contains(Self::ARGS_ARE_XY_VALUES)
    }

    pub fn we_have_a_scale(self) -> bool {
        self.contains(Self::WE_HAVE_A_SCALE)
    }

    pub fn we_have_an_x_and_y_scale(self) -> bool {
        self.contains(Self::WE_HAVE_AN_X_AND_Y_SCALE)
    }

    pub fn we_have_a_two_by_two(self) -> bool {
        self.contains(Self::WE_HAVE_A_TWO_BY_TWO)
    }

    pub fn more_components(self) -> bool {
        self.contains(Self::MORE_COMPONENTS)
    }

    pub fn we_have_instructions(self) -> bool {
        self.contains(Self::WE_HAVE_INSTRUCTIONS)
    }
}

impl Point {
    pub fn zero() -> Self {
        Point(0, 0)
    }
}

impl<'a> GlyfTable<'a> {
    pub fn new(records: Vec<GlyfRecord<'a>>) -> Result<Self, ParseError> {
        if records.len() > usize::from(u16::MAX) {
            return Err(ParseError::LimitExceeded);
        }
        Ok(GlyfTable { records })
    }

    /// Returns the number of glyphs in this `glyf` table.
    pub fn num_glyphs(&self) -> u16 {
        // NOTE(cast): Safe as records length is checked in `new`
        self.records.len() as u16
    }

    pub fn records(&self) -> &[GlyfRecord<'a>] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::{WriteBuffer, WriteContext};
    use crate::tables::IndexToLocFormat;

    pub(crate) fn simple_glyph_fixture() -> SimpleGlyph<'static> {
        SimpleGlyph {
            bounding_box: BoundingBox {
                x_min: 0,
                x_max: 1073,
                y_min: 0,
                y_max: 1434,
            },
            end_pts_of_contours: vec![3],
            instructions: &[],
            coordinates: vec![
                (SimpleGlyphFlag::ON_CURVE_POINT, Point(0, 1434)),
                (SimpleGlyphFlag::ON_CURVE_POINT, Point(1073, 1434)),
                (SimpleGlyphFlag::ON_CURVE_POINT, Point(1073, 0)),
                (SimpleGlyphFlag::ON_CURVE_POINT, Point(0, 0)),
            ],
        }
    }

    fn composite_glyph_fixture() -> CompositeGlyph<'static> {
        CompositeGlyph {
            bounding_box: BoundingBox {
                x_min: 0,
                x_max: 500,
                y_min: 0,
                y_max: 500,
            },
            glyphs: vec![CompositeGlyphComponent {
                flags: CompositeGlyphFlag::ARG_1_AND_2_ARE_WORDS
                    | CompositeGlyphFlag::ARGS_ARE_XY_VALUES,
                glyph_index: 1,
                argument1: CompositeGlyphArgument::I16(10),
                argument2: CompositeGlyphArgument::I16(0),
                scale: None,
            }],
            instructions: &[],
        }
    }

    fn build_glyf_and_loca(records: Vec<GlyfRecord<'static>>) -> (Vec<u8>, Vec<u8>, u16) {
        let num_glyphs = records.len() as u16;
        let glyf = GlyfTable { records };
        let mut glyf_buffer = WriteBuffer::new();
        let loca = GlyfTable::write_dep(&mut glyf_buffer, glyf, ()).unwrap();
        let mut loca_buffer = WriteBuffer::new();
        owned::LocaTable::write_dep(&mut loca_buffer, loca, IndexToLocFormat::Long).unwrap();
        (glyf_buffer.into_inner(), loca_buffer.into_inner(), num_glyphs)
    }

    fn parse_glyf<'a>(
        glyf_data: &'a [u8],
        loca: &'a LocaTable<'a>,
        num_glyphs: u16,
    ) -> Result<GlyfTable<'a>, ParseError> {
        ReadScope::new(glyf_data).read_dep::<GlyfTable<'_>>(GlyfArgs {
            loca,
            num_glyphs,
            max_instructions: None,
        })
    }

    #[test]
    fn round_trip_simple_glyph() {
        let records = vec![GlyfRecord::Empty, GlyfRecord::Simple(simple_glyph_fixture())];
        let (glyf_data, loca_data, num_glyphs) = build_glyf_and_loca(records.clone());
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((num_glyphs, IndexToLocFormat::Long))
            .unwrap();
        let glyf = parse_glyf(&glyf_data, &loca, num_glyphs).unwrap();
        assert_eq!(glyf.records(), &records[..]);
    }

    #[test]
    fn round_trip_composite_glyph() {
        let records = vec![
            GlyfRecord::Empty,
            GlyfRecord::Empty,
            GlyfRecord::Composite(composite_glyph_fixture()),
        ];
        let (glyf_data, loca_data, num_glyphs) = build_glyf_and_loca(records.clone());
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((num_glyphs, IndexToLocFormat::Long))
            .unwrap();
        let glyf = parse_glyf(&glyf_data, &loca, num_glyphs).unwrap();
        assert_eq!(glyf.records(), &records[..]);
    }

    #[test]
    fn rejects_composite_component_out_of_range() {
        let mut component = composite_glyph_fixture();
        // The font only has two glyphs, so a component index of 5 is invalid
        component.glyphs[0].glyph_index = 5;
        let records = vec![GlyfRecord::Empty, GlyfRecord::Composite(component)];
        let (glyf_data, loca_data, num_glyphs) = build_glyf_and_loca(records);
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((num_glyphs, IndexToLocFormat::Long))
            .unwrap();
        assert_eq!(
            parse_glyf(&glyf_data, &loca, num_glyphs).err(),
            Some(ParseError::BadIndex)
        );
    }

    #[test]
    fn rejects_instructions_over_maxp_limit() {
        let glyph = SimpleGlyph {
            instructions: &[0xB0, 0x00, 0xB0, 0x00],
            ..simple_glyph_fixture()
        };
        let (glyf_data, loca_data, num_glyphs) =
            build_glyf_and_loca(vec![GlyfRecord::Simple(glyph)]);
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((num_glyphs, IndexToLocFormat::Long))
            .unwrap();
        let result = ReadScope::new(&glyf_data).read_dep::<GlyfTable<'_>>(GlyfArgs {
            loca: &loca,
            num_glyphs,
            max_instructions: Some(2),
        });
        assert_eq!(result.err(), Some(ParseError::LimitExceeded));
    }

    #[test]
    fn rejects_reserved_contour_count() {
        let mut buffer = WriteBuffer::new();
        I16Be::write(&mut buffer, -2i16).unwrap();
        buffer.write_zeros(8).unwrap();
        let glyf_data = buffer.into_inner();

        let mut loca_buffer = WriteBuffer::new();
        owned::LocaTable::write_dep(
            &mut loca_buffer,
            owned::LocaTable {
                offsets: vec![0, glyf_data.len() as u32],
            },
            IndexToLocFormat::Long,
        )
        .unwrap();
        let loca_data = loca_buffer.into_inner();
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((1, IndexToLocFormat::Long))
            .unwrap();

        assert!(parse_glyf(&glyf_data, &loca, 1).is_err());
    }

    #[test]
    fn zeroes_sentinel_bounding_box() {
        let mut buffer = WriteBuffer::new();
        I16Be::write(&mut buffer, 0i16).unwrap(); // zero contours
        I16Be::write(&mut buffer, 32767i16).unwrap();
        I16Be::write(&mut buffer, 32767i16).unwrap();
        I16Be::write(&mut buffer, -32767i16).unwrap();
        I16Be::write(&mut buffer, -32767i16).unwrap();
        buffer.write_zeros(2).unwrap(); // align to 4
        let glyf_data = buffer.into_inner();

        let mut loca_buffer = WriteBuffer::new();
        owned::LocaTable::write_dep(
            &mut loca_buffer,
            owned::LocaTable {
                offsets: vec![0, glyf_data.len() as u32],
            },
            IndexToLocFormat::Long,
        )
        .unwrap();
        let loca_data = loca_buffer.into_inner();
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((1, IndexToLocFormat::Long))
            .unwrap();

        let glyf = parse_glyf(&glyf_data, &loca, 1).unwrap();
        assert_eq!(glyf.records(), &[GlyfRecord::Empty]);
    }

    #[test]
    fn all_empty_glyphs_emit_one_byte() {
        let glyf = GlyfTable {
            records: vec![GlyfRecord::Empty, GlyfRecord::Empty],
        };
        let mut buffer = WriteBuffer::new();
        let loca = GlyfTable::write_dep(&mut buffer, glyf, ()).unwrap();
        assert_eq!(buffer.bytes(), &[0]);
        assert_eq!(loca.offsets, vec![0, 0, 0]);
    }

    #[test]
    fn rejects_excess_trailing_padding() {
        // A valid glyph followed by more than three spare bytes
        let mut buffer = WriteBuffer::new();
        SimpleGlyph::write(&mut buffer, simple_glyph_fixture()).unwrap();
        let glyph_len = buffer.bytes().len();
        buffer.write_zeros(8).unwrap();
        let glyf_data = buffer.into_inner();

        let mut loca_buffer = WriteBuffer::new();
        owned::LocaTable::write_dep(
            &mut loca_buffer,
            owned::LocaTable {
                offsets: vec![0, (glyph_len + 8) as u32],
            },
            IndexToLocFormat::Long,
        )
        .unwrap();
        let loca_data = loca_buffer.into_inner();
        let loca = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((1, IndexToLocFormat::Long))
            .unwrap();

        assert!(parse_glyf(&glyf_data, &loca, 1).is_err());
    }
}
