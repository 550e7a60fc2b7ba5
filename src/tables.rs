//! Core OpenType table parsing and writing.
//!
//! Holds the sfnt container structures (offset table, TTC header, table
//! records) and the small fixed-layout tables: `head`, `hhea`/`vhea`,
//! `hmtx`/`vmtx`, `maxp` and `name`.

pub mod cmap;
pub mod colr;
pub mod cpal;
pub mod glyf;
pub mod loca;
pub mod misc;
pub mod os2;
pub mod post;

use itertools::Itertools;
use std::borrow::Cow;

use crate::binary::read::{
    ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope,
};
use crate::binary::write::{Placeholder, WriteBinary, WriteContext};
use crate::binary::{I16Be, I32Be, I64Be, U16Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::size;
use crate::tag;

/// Magic value identifying a CFF font (`OTTO`)
pub const CFF_MAGIC: u32 = tag::OTTO;

/// Magic number identifying TrueType 1.0
pub const TTF_MAGIC: u32 = 0x00010000;

/// Magic value identifying a TrueType font collection `ttcf`
pub const TTCF_MAGIC: u32 = tag::TTCF;

/// Magic value of the `magicNumber` field of the `head` table.
pub const HEAD_MAGIC: u32 = 0x5F0F3CF5;

/// `head.flags` bits the sanitizer lets through: bits 0..4 and 11..13.
const HEAD_FLAGS_MASK: u16 = 0x381F;

/// `head.macStyle` bits the sanitizer lets through: bits 0..6.
const MAC_STYLE_MASK: u16 = 0x7F;

/// 32-bit signed fixed-point number (16.16)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fixed(i32);

/// Date represented in number of seconds since 12:00 midnight, January 1, 1904
type LongDateTime = i64;

/// The F2DOT14 format: a signed 2's complement integer plus an unsigned fraction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct F2Dot14(u16);

/// The size of the offsets in the `loca` table
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexToLocFormat {
    /// Offsets are 16-bit. The actual offset divided by 2 is stored.
    Short,
    /// Offsets are 32-bit. The actual offset is stored.
    Long,
}

/// Source of table data for one font.
pub trait FontTableProvider {
    /// Return data for the specified table if present
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError>;

    /// Whether the font contains the table.
    fn has_table(&self, tag: u32) -> bool;

    /// The tags of all tables in the font, in directory order.
    fn table_tags(&self) -> Vec<u32>;

    /// Return data for the specified table, failing if absent.
    fn read_table_data<'a>(&'a self, tag: u32) -> Result<Cow<'a, [u8]>, ParseError> {
        self.table_data(tag)?.ok_or(ParseError::MissingTable(tag))
    }
}

/// The "sfnt version" of a font.
pub trait SfntVersion {
    /// The sfnt version tag.
    fn sfnt_version(&self) -> u32;
}

/// A parsed sfnt, either a single font or a collection.
pub struct OpenTypeFont<'a> {
    pub scope: ReadScope<'a>,
    pub data: OpenTypeData<'a>,
}

/// An `OpenTypeFont` containing a single font or a collection of fonts
pub enum OpenTypeData<'a> {
    Single(OffsetTable<'a>),
    Collection(TTCHeader<'a>),
}

/// TrueType collection header
pub struct TTCHeader<'a> {
    pub major_version: u16,
    pub minor_version: u16,
    pub offset_tables: ReadArray<'a, U32Be>,
}

/// OpenType Offset Table
///
/// The stored `searchRange`/`entrySelector`/`rangeShift` fields are not
/// trusted; they are recomputed on output.
#[derive(Clone)]
pub struct OffsetTable<'a> {
    pub sfnt_version: u32,
    pub table_records: ReadArray<'a, TableRecord>,
}

/// Table provider backed by an offset table.
pub struct OffsetTableFontProvider<'a> {
    scope: ReadScope<'a>,
    offset_table: OffsetTable<'a>,
}

/// An entry in the Offset Table
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
pub struct TableRecord {
    pub table_tag: u32,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// `head` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/head>
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
pub struct HeadTable {
    pub font_revision: Fixed,
    pub flags: u16,
    pub units_per_em: u16,
    pub created: LongDateTime,
    pub modified: LongDateTime,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: u16,
    pub lowest_rec_ppem: u16,
    pub index_to_loc_format: IndexToLocFormat,
}

/// `hhea` horizontal header table
///
/// This struct is also used for the `vhea` table.
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
pub struct HheaTable {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub num_h_metrics: u16,
}

/// `hmtx` horizontal metrics table
///
/// This struct is also used for the `vmtx` table.
#[derive(Debug, Clone)]
pub struct HmtxTable<'a> {
    pub h_metrics: ReadArray<'a, LongHorMetric>,
    pub left_side_bearings: ReadArray<'a, I16Be>,
}

/// A `longHorMetric` record in the `hmtx` table (also LongVerMetric in `vmtx`).
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct LongHorMetric {
    pub advance_width: u16,
    pub lsb: i16,
}

/// maxp - Maximum profile
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
pub struct MaxpTable {
    pub num_glyphs: u16,
    /// Extra fields, present if maxp table is version 1.0, absent if version 0.5.
    pub version1_sub_table: Option<MaxpVersion1SubTable>,
}

#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
#[allow(missing_docs)]
pub struct MaxpVersion1SubTable {
    pub max_points: u16,
    pub max_contours: u16,
    pub max_composite_points: u16,
    pub max_composite_contours: u16,
    pub max_zones: u16,
    pub max_twilight_points: u16,
    pub max_storage: u16,
    pub max_function_defs: u16,
    pub max_instruction_defs: u16,
    pub max_stack_elements: u16,
    /// Maximum byte count for glyph instructions. Used to bound `glyf` bytecode.
    pub max_size_of_instructions: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

/// `name` table, parsed for validation only.
///
/// The sanitizer never serializes attacker-controlled name strings; the output
/// `name` table is the canonical one produced by [CanonicalNames].
pub struct NameTable<'a> {
    pub string_storage: ReadScope<'a>,
    pub name_records: ReadArray<'a, NameRecord>,
    pub opt_langtag_records: Option<ReadArray<'a, LangTagRecord>>,
}

/// Record within the `name` table
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub length: u16,
    pub offset: u16,
}

/// Language-tag record within the `name` table
pub struct LangTagRecord {
    pub length: u16,
    pub offset: u16,
}

/// Writer for the fixed `name` table emitted for every sanitized font.
pub struct CanonicalNames;

/// The canonical name strings, indexed by name ID. `None` entries are omitted.
const CANONICAL_NAMES: [Option<&str>; 10] = [
    Some("Derived font data"),  // 0: copyright
    Some("Sanitized font"),     // 1: family
    Some("Unspecified"),        // 2: subfamily
    Some("UniqueID"),           // 3: unique id
    Some("Sanitized font"),     // 4: full name
    Some("Version 0.0"),        // 5: version
    Some("Sanitized"),          // 6: postscript name
    None,                       // 7: trademark
    Some("fontscrub"),          // 8: manufacturer
    Some("fontscrub"),          // 9: designer
];

impl<'b> ReadBinary for OpenTypeFont<'b> {
    type HostType<'a> = OpenTypeFont<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let mut peek = ctxt.clone();
        let magic = peek.read_u32be()?;
        match magic {
            TTF_MAGIC | CFF_MAGIC | tag::TRUE | tag::TYP1 => {
                let offset_table = ctxt.read::<OffsetTable<'_>>()?;
                Ok(OpenTypeFont {
                    scope,
                    data: OpenTypeData::Single(offset_table),
                })
            }
            TTCF_MAGIC => {
                let ttc_header = ctxt.read::<TTCHeader<'_>>()?;
                Ok(OpenTypeFont {
                    scope,
                    data: OpenTypeData::Collection(ttc_header),
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> OpenTypeFont<'a> {
    /// The number of fonts contained. 1 unless this is a collection.
    pub fn num_fonts(&self) -> usize {
        match &self.data {
            OpenTypeData::Single(_) => 1,
            OpenTypeData::Collection(ttc) => ttc.offset_tables.len(),
        }
    }

    /// Construct a validated table provider for font `index`.
    pub fn table_provider(
        &self,
        index: usize,
    ) -> Result<OffsetTableFontProvider<'a>, ParseError> {
        let offset_table = match &self.data {
            OpenTypeData::Single(offset_table) => {
                if index != 0 {
                    return Err(ParseError::BadIndex);
                }
                offset_table.clone()
            }
            OpenTypeData::Collection(ttc) => {
                let offset = ttc
                    .offset_tables
                    .get_item(index)
                    .ok_or(ParseError::BadIndex)?;
                let offset = usize::try_from(offset)?;
                self.scope.offset(offset).read::<OffsetTable<'_>>()?
            }
        };
        offset_table.check_directory(&self.scope)?;
        Ok(OffsetTableFontProvider {
            scope: self.scope.clone(),
            offset_table,
        })
    }
}

impl<'b> ReadBinary for TTCHeader<'b> {
    type HostType<'a> = TTCHeader<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let ttc_tag = ctxt.read_u32be()?;
        match ttc_tag {
            TTCF_MAGIC => {
                let major_version = ctxt.read_u16be()?;
                let minor_version = ctxt.read_u16be()?;
                ctxt.check_version(major_version == 1 || major_version == 2)?;
                let num_fonts = usize::try_from(ctxt.read_u32be()?)?;
                ctxt.check(num_fonts > 0)?;
                let offset_tables = ctxt.read_array::<U32Be>(num_fonts)?;
                // Version 2 adds digital signature fields, which the output
                // never carries, so they are not read.
                Ok(TTCHeader {
                    major_version,
                    minor_version,
                    offset_tables,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'b> ReadBinary for OffsetTable<'b> {
    type HostType<'a> = OffsetTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let sfnt_version = ctxt.read_u32be()?;
        match sfnt_version {
            TTF_MAGIC | CFF_MAGIC | tag::TRUE | tag::TYP1 => {
                let num_tables = ctxt.read_u16be()?;
                // searchRange, entrySelector, and rangeShift are recomputed on
                // output, so the stored values are skipped rather than trusted.
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let table_records = ctxt.read_array::<TableRecord>(usize::from(num_tables))?;
                Ok(OffsetTable {
                    sfnt_version,
                    table_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> OffsetTable<'a> {
    /// Find the record for `tag`, `None` if the font does not contain it.
    pub fn find_table_record(&self, tag: u32) -> Option<TableRecord> {
        self.table_records
            .iter()
            .find(|record| record.table_tag == tag)
    }

    /// Read the data of the table with the given `tag`.
    pub fn read_table(
        &self,
        scope: &ReadScope<'a>,
        tag: u32,
    ) -> Result<Option<ReadScope<'a>>, ParseError> {
        if let Some(table_record) = self.find_table_record(tag) {
            let table = table_record.read_table(scope)?;
            Ok(Some(table))
        } else {
            Ok(None)
        }
    }

    /// Validate the table directory against the whole-file scope.
    ///
    /// Records must be strictly sorted by tag, lie fully within the file, and
    /// must not overlap one another.
    pub fn check_directory(&self, scope: &ReadScope<'a>) -> Result<(), ParseError> {
        let file_length = scope.data().len();

        for (a, b) in self.table_records.iter().tuple_windows() {
            if a.table_tag >= b.table_tag {
                return Err(ParseError::BadValue);
            }
        }

        let mut ranges = Vec::with_capacity(self.table_records.len());
        for record in &self.table_records {
            let offset = usize::try_from(record.offset)?;
            let length = usize::try_from(record.length)?;
            let end = offset.checked_add(length).ok_or(ParseError::BadOffset)?;
            if end > file_length {
                return Err(ParseError::BadOffset);
            }
            ranges.push((offset, end));
        }
        ranges.sort();
        for ((_, a_end), (b_start, _)) in ranges.iter().tuple_windows() {
            if a_end > b_start {
                return Err(ParseError::BadOffset);
            }
        }

        Ok(())
    }
}

impl<'a> FontTableProvider for OffsetTableFontProvider<'a> {
    fn table_data<'b>(&'b self, tag: u32) -> Result<Option<Cow<'b, [u8]>>, ParseError> {
        self.offset_table
            .read_table(&self.scope, tag)
            .map(|scope| scope.map(|scope| Cow::Borrowed(scope.data())))
    }

    fn has_table(&self, tag: u32) -> bool {
        self.offset_table.find_table_record(tag).is_some()
    }

    fn table_tags(&self) -> Vec<u32> {
        self.offset_table
            .table_records
            .iter()
            .map(|record| record.table_tag)
            .collect()
    }
}

impl<'a> SfntVersion for OffsetTableFontProvider<'a> {
    fn sfnt_version(&self) -> u32 {
        self.offset_table.sfnt_version
    }
}

impl ReadFrom for TableRecord {
    type ReadType = ((U32Be, U32Be), (U32Be, U32Be));
    fn read_from(((table_tag, checksum), (offset, length)): ((u32, u32), (u32, u32))) -> Self {
        TableRecord {
            table_tag,
            checksum,
            offset,
            length,
        }
    }
}

impl WriteBinary<&Self> for TableRecord {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &TableRecord) -> Result<(), WriteError> {
        U32Be::write(ctxt, table.table_tag)?;
        U32Be::write(ctxt, table.checksum)?;
        U32Be::write(ctxt, table.offset)?;
        U32Be::write(ctxt, table.length)?;

        Ok(())
    }
}

impl TableRecord {
    /// Size of a table record in bytes.
    pub const SIZE: usize = 4 * size::U32;

    /// Resolve this record against the whole-file scope.
    pub fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<ReadScope<'a>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.length)?;
        scope.offset_length(offset, length)
    }
}

impl ReadBinary for HeadTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let font_revision = ctxt.read::<Fixed>()?;
        // checkSumAdjustment is not validated at parse time; the serializer
        // recomputes it for the whole output file.
        let _check_sum_adjustment = ctxt.read_u32be()?;
        let magic_number = ctxt.read_u32be()?;
        ctxt.check(magic_number == HEAD_MAGIC)?;
        let flags = ctxt.read_u16be()?;
        if flags & !HEAD_FLAGS_MASK != 0 {
            log::warn!("head: masking reserved flag bits 0x{:04x}", flags);
        }
        let flags = flags & HEAD_FLAGS_MASK;
        let units_per_em = ctxt.read_u16be()?;
        ctxt.check((16..=16384).contains(&units_per_em))?;
        let created = ctxt.read_i64be()?;
        let modified = ctxt.read_i64be()?;
        let x_min = ctxt.read_i16be()?;
        let y_min = ctxt.read_i16be()?;
        let x_max = ctxt.read_i16be()?;
        let y_max = ctxt.read_i16be()?;
        ctxt.check(x_min <= x_max)?;
        ctxt.check(y_min <= y_max)?;
        let mac_style = ctxt.read_u16be()?;
        if mac_style & !MAC_STYLE_MASK != 0 {
            log::warn!("head: masking reserved macStyle bits 0x{:04x}", mac_style);
        }
        let mac_style = mac_style & MAC_STYLE_MASK;
        let lowest_rec_ppem = ctxt.read_u16be()?;
        // The font direction hint is obsolete; it is rewritten as 2 on output.
        let _font_direction_hint = ctxt.read_i16be()?;
        let index_to_loc_format = ctxt.read::<IndexToLocFormat>()?;
        let glyph_data_format = ctxt.read_i16be()?;
        ctxt.check(glyph_data_format == 0)?;

        Ok(HeadTable {
            font_revision,
            flags,
            units_per_em,
            created,
            modified,
            x_min,
            y_min,
            x_max,
            y_max,
            mac_style,
            lowest_rec_ppem,
            index_to_loc_format,
        })
    }
}

impl WriteBinary<&Self> for HeadTable {
    type Output = Placeholder<U32Be, u32>;

    /// Writes the table to the `WriteContext` and returns a placeholder for the
    /// `checkSumAdjustment` field, which only the container serializer can
    /// compute.
    fn write<C: WriteContext>(ctxt: &mut C, table: &HeadTable) -> Result<Self::Output, WriteError> {
        U16Be::write(ctxt, 1u16)?; // major_version
        U16Be::write(ctxt, 0u16)?; // minor_version
        Fixed::write(ctxt, table.font_revision)?;
        let check_sum_adjustment = ctxt.placeholder()?;
        U32Be::write(ctxt, HEAD_MAGIC)?;
        U16Be::write(ctxt, table.flags)?;
        U16Be::write(ctxt, table.units_per_em)?;
        I64Be::write(ctxt, table.created)?;
        I64Be::write(ctxt, table.modified)?;
        I16Be::write(ctxt, table.x_min)?;
        I16Be::write(ctxt, table.y_min)?;
        I16Be::write(ctxt, table.x_max)?;
        I16Be::write(ctxt, table.y_max)?;
        U16Be::write(ctxt, table.mac_style)?;
        U16Be::write(ctxt, table.lowest_rec_ppem)?;
        I16Be::write(ctxt, 2i16)?; // font_direction_hint
        IndexToLocFormat::write(ctxt, table.index_to_loc_format)?;
        I16Be::write(ctxt, 0i16)?; // glyph_data_format

        Ok(check_sum_adjustment)
    }
}

impl ReadBinary for HheaTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let ascender = ctxt.read_i16be()?;
        let descender = ctxt.read_i16be()?;
        let line_gap = ctxt.read_i16be()?;
        let advance_width_max = ctxt.read_u16be()?;
        let min_left_side_bearing = ctxt.read_i16be()?;
        let min_right_side_bearing = ctxt.read_i16be()?;
        let x_max_extent = ctxt.read_i16be()?;
        let caret_slope_rise = ctxt.read_i16be()?;
        let caret_slope_run = ctxt.read_i16be()?;
        let caret_offset = ctxt.read_i16be()?;
        let _reserved1 = ctxt.read_i16be()?;
        let _reserved2 = ctxt.read_i16be()?;
        let _reserved3 = ctxt.read_i16be()?;
        let _reserved4 = ctxt.read_i16be()?;
        let metric_data_format = ctxt.read_i16be()?;
        ctxt.check(metric_data_format == 0)?;
        let num_h_metrics = ctxt.read_u16be()?;

        Ok(HheaTable {
            ascender,
            descender,
            line_gap,
            advance_width_max,
            min_left_side_bearing,
            min_right_side_bearing,
            x_max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            num_h_metrics,
        })
    }
}

impl WriteBinary<&Self> for HheaTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &HheaTable) -> Result<(), WriteError> {
        U16Be::write(ctxt, 1u16)?; // major_version
        U16Be::write(ctxt, 0u16)?; // minor_version

        I16Be::write(ctxt, table.ascender)?;
        I16Be::write(ctxt, table.descender)?;
        I16Be::write(ctxt, table.line_gap)?;
        U16Be::write(ctxt, table.advance_width_max)?;
        I16Be::write(ctxt, table.min_left_side_bearing)?;
        I16Be::write(ctxt, table.min_right_side_bearing)?;
        I16Be::write(ctxt, table.x_max_extent)?;
        I16Be::write(ctxt, table.caret_slope_rise)?;
        I16Be::write(ctxt, table.caret_slope_run)?;
        I16Be::write(ctxt, table.caret_offset)?;

        I16Be::write(ctxt, 0i16)?; // reserved
        I16Be::write(ctxt, 0i16)?; // reserved
        I16Be::write(ctxt, 0i16)?; // reserved
        I16Be::write(ctxt, 0i16)?; // reserved

        I16Be::write(ctxt, 0i16)?; // metric_data_format

        U16Be::write(ctxt, table.num_h_metrics)?;

        Ok(())
    }
}

impl<'b> ReadBinaryDep for HmtxTable<'b> {
    type Args<'a> = (usize, usize); // num_glyphs, num_h_metrics
    type HostType<'a> = HmtxTable<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, num_h_metrics): (usize, usize),
    ) -> Result<Self::HostType<'a>, ParseError> {
        // The spec requires at least one long metric, and no more than there
        // are glyphs.
        if num_h_metrics == 0 || num_h_metrics > num_glyphs {
            return Err(ParseError::BadValue);
        }
        let h_metrics = ctxt.read_array::<LongHorMetric>(num_h_metrics)?;
        let left_side_bearings = ctxt.read_array::<I16Be>(num_glyphs - num_h_metrics)?;
        Ok(HmtxTable {
            h_metrics,
            left_side_bearings,
        })
    }
}

impl<'a> WriteBinary<&Self> for HmtxTable<'a> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &HmtxTable<'a>) -> Result<(), WriteError> {
        ctxt.write_array(&table.h_metrics)?;
        ctxt.write_array(&table.left_side_bearings)?;

        Ok(())
    }
}

impl ReadFrom for LongHorMetric {
    type ReadType = (U16Be, I16Be);
    fn read_from((advance_width, lsb): (u16, i16)) -> Self {
        LongHorMetric { advance_width, lsb }
    }
}

impl WriteBinary for LongHorMetric {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, metric: LongHorMetric) -> Result<(), WriteError> {
        U16Be::write(ctxt, metric.advance_width)?;
        I16Be::write(ctxt, metric.lsb)?;

        Ok(())
    }
}

impl ReadBinary for MaxpTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x00005000 || version == 0x00010000)?;
        let num_glyphs = ctxt.read_u16be()?;
        let sub_table = if version == 0x00010000 {
            Some(ctxt.read::<MaxpVersion1SubTable>()?)
        } else {
            None
        };
        Ok(MaxpTable {
            num_glyphs,
            version1_sub_table: sub_table,
        })
    }
}

impl WriteBinary<&Self> for MaxpTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &MaxpTable) -> Result<(), WriteError> {
        if let Some(sub_table) = &table.version1_sub_table {
            U32Be::write(ctxt, 0x00010000u32)?; // version 1.0
            U16Be::write(ctxt, table.num_glyphs)?;
            MaxpVersion1SubTable::write(ctxt, sub_table)?;
        } else {
            U32Be::write(ctxt, 0x00005000u32)?; // version 0.5
            U16Be::write(ctxt, table.num_glyphs)?;
        }
        Ok(())
    }
}

impl MaxpTable {
    /// The `maxSizeOfInstructions` bound on `glyf` bytecode, if known.
    pub fn max_size_of_instructions(&self) -> Option<u16> {
        self.version1_sub_table
            .as_ref()
            .map(|sub| sub.max_size_of_instructions)
    }
}

impl ReadBinary for MaxpVersion1SubTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let max_points = ctxt.read_u16be()?;
        let max_contours = ctxt.read_u16be()?;
        let max_composite_points = ctxt.read_u16be()?;
        let max_composite_contours = ctxt.read_u16be()?;
        let max_zones = ctxt.read_u16be()?;
        let max_twilight_points = ctxt.read_u16be()?;
        let max_storage = ctxt.read_u16be()?;
        let max_function_defs = ctxt.read_u16be()?;
        let max_instruction_defs = ctxt.read_u16be()?;
        let max_stack_elements = ctxt.read_u16be()?;
        let max_size_of_instructions = ctxt.read_u16be()?;
        let max_component_elements = ctxt.read_u16be()?;
        let max_component_depth = ctxt.read_u16be()?;

        Ok(MaxpVersion1SubTable {
            max_points,
            max_contours,
            max_composite_points,
            max_composite_contours,
            max_zones,
            max_twilight_points,
            max_storage,
            max_function_defs,
            max_instruction_defs,
            max_stack_elements,
            max_size_of_instructions,
            max_component_elements,
            max_component_depth,
        })
    }
}

impl WriteBinary<&Self> for MaxpVersion1SubTable {
    type Output = ();

    fn write<C: WriteContext>(
        ctxt: &mut C,
        table: &MaxpVersion1SubTable,
    ) -> Result<(), WriteError> {
        U16Be::write(ctxt, table.max_points)?;
        U16Be::write(ctxt, table.max_contours)?;
        U16Be::write(ctxt, table.max_composite_points)?;
        U16Be::write(ctxt, table.max_composite_contours)?;
        U16Be::write(ctxt, table.max_zones)?;
        U16Be::write(ctxt, table.max_twilight_points)?;
        U16Be::write(ctxt, table.max_storage)?;
        U16Be::write(ctxt, table.max_function_defs)?;
        U16Be::write(ctxt, table.max_instruction_defs)?;
        U16Be::write(ctxt, table.max_stack_elements)?;
        U16Be::write(ctxt, table.max_size_of_instructions)?;
        U16Be::write(ctxt, table.max_component_elements)?;
        U16Be::write(ctxt, table.max_component_depth)?;

        Ok(())
    }
}

impl<'b> ReadBinary for NameTable<'b> {
    type HostType<'a> = NameTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();

        let format = ctxt.read_u16be()?;
        ctxt.check_version(format <= 1)?;
        let count = usize::from(ctxt.read_u16be()?);
        let string_offset = usize::from(ctxt.read_u16be()?);
        let string_storage = scope.offset(string_offset);
        let name_records = ctxt.read_array::<NameRecord>(count)?;
        let opt_langtag_records = if format > 0 {
            let langtag_count = usize::from(ctxt.read_u16be()?);
            let langtag_records = ctxt.read_array::<LangTagRecord>(langtag_count)?;
            Some(langtag_records)
        } else {
            None
        };

        // Each record's string must lie within the storage area.
        let storage_len = string_storage.data().len();
        for record in &name_records {
            let end = usize::from(record.offset) + usize::from(record.length);
            if end > storage_len {
                return Err(ParseError::BadOffset);
            }
        }
        if let Some(langtags) = &opt_langtag_records {
            for record in langtags {
                let end = usize::from(record.offset) + usize::from(record.length);
                if end > storage_len {
                    return Err(ParseError::BadOffset);
                }
            }
        }

        Ok(NameTable {
            string_storage,
            name_records,
            opt_langtag_records,
        })
    }
}

impl ReadFrom for NameRecord {
    type ReadType = ((U16Be, U16Be, U16Be), (U16Be, U16Be, U16Be));
    fn read_from(
        ((platform_id, encoding_id, language_id), (name_id, length, offset)): (
            (u16, u16, u16),
            (u16, u16, u16),
        ),
    ) -> Self {
        NameRecord {
            platform_id,
            encoding_id,
            language_id,
            name_id,
            length,
            offset,
        }
    }
}

impl ReadFrom for LangTagRecord {
    type ReadType = (U16Be, U16Be);
    fn read_from((length, offset): (u16, u16)) -> Self {
        LangTagRecord { length, offset }
    }
}

impl WriteBinary for CanonicalNames {
    type Output = ();

    /// Write the canonical `name` table: Windows platform, Unicode BMP
    /// encoding, US English, UTF-16BE strings for each non-empty slot.
    fn write<C: WriteContext>(ctxt: &mut C, _names: Self) -> Result<(), WriteError> {
        let strings = CANONICAL_NAMES
            .iter()
            .enumerate()
            .filter_map(|(id, s)| s.map(|s| (id as u16, s)));
        let count = strings.clone().count() as u16;

        U16Be::write(ctxt, 0u16)?; // format
        U16Be::write(ctxt, count)?;
        U16Be::write(ctxt, 6 + count * 12)?; // string storage offset

        let mut offset = 0u16;
        for (name_id, s) in strings.clone() {
            let length = (s.len() * 2) as u16;
            U16Be::write(ctxt, 3u16)?; // platform: Windows
            U16Be::write(ctxt, 1u16)?; // encoding: Unicode BMP
            U16Be::write(ctxt, 0x0409u16)?; // language: US English
            U16Be::write(ctxt, name_id)?;
            U16Be::write(ctxt, length)?;
            U16Be::write(ctxt, offset)?;
            offset += length;
        }

        for (_, s) in strings {
            for unit in s.encode_utf16() {
                U16Be::write(ctxt, unit)?;
            }
        }

        Ok(())
    }
}

impl ReadFrom for F2Dot14 {
    type ReadType = U16Be;

    fn read_from(value: u16) -> Self {
        F2Dot14(value)
    }
}

impl WriteBinary for F2Dot14 {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, val: Self) -> Result<(), WriteError> {
        U16Be::write(ctxt, val.0)
    }
}

impl F2Dot14 {
    /// Construct from the raw bit pattern.
    pub fn new(value: u16) -> Self {
        F2Dot14(value)
    }

    /// The raw bit pattern.
    pub fn raw_value(self) -> u16 {
        self.0
    }

    /// The value interpreted as a signed 2.14 fixed-point number.
    pub fn to_i32(self) -> i32 {
        i32::from(self.0 as i16)
    }
}

impl From<F2Dot14> for f32 {
    fn from(value: F2Dot14) -> Self {
        f32::from(value.0 as i16) / 16384.
    }
}

impl Fixed {
    /// Construct from the raw 16.16 bit pattern.
    pub fn new(value: i32) -> Fixed {
        Fixed(value)
    }

    /// The raw 16.16 bit pattern.
    pub fn raw_value(self) -> i32 {
        self.0
    }
}

impl ReadFrom for Fixed {
    type ReadType = I32Be;

    fn read_from(value: i32) -> Self {
        Fixed(value)
    }
}

impl WriteBinary for Fixed {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, val: Self) -> Result<(), WriteError> {
        I32Be::write(ctxt, val.0)
    }
}

impl From<Fixed> for f32 {
    fn from(value: Fixed) -> f32 {
        (f64::from(value.0) / 65536.0) as f32
    }
}

impl ReadBinary for IndexToLocFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let index_to_loc_format = ctxt.read_i16be()?;

        match index_to_loc_format {
            0 => Ok(IndexToLocFormat::Short),
            1 => Ok(IndexToLocFormat::Long),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl WriteBinary for IndexToLocFormat {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, index_to_loc_format: Self) -> Result<(), WriteError> {
        match index_to_loc_format {
            IndexToLocFormat::Short => I16Be::write(ctxt, 0i16),
            IndexToLocFormat::Long => I16Be::write(ctxt, 1i16),
        }
    }
}
