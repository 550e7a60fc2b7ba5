//! The sanitize driver: dependency-ordered parsing, policy routing, and
//! serialization of the clean font.
//!
//! Parsing follows a fixed topological order so that every table can consult
//! its dependencies (`maxp.numGlyphs`, `head.indexToLocFormat`,
//! `hhea.numberOfHMetrics`, GDEF facts, CPAL palette count). Serialization
//! collects one buffer per table, recomputes the directory and per-table
//! checksums, and patches `head.checkSumAdjustment` over the whole file.

use std::collections::BTreeMap;
use std::num::Wrapping;

use itertools::Itertools;

use crate::binary::read::ReadScope;
use crate::binary::write::{Placeholder, WriteBinary, WriteBinaryDep, WriteBuffer, WriteContext};
use crate::binary::{long_align, U16Be, U32Be};
use crate::cff::{Cff2Args, Cff2Table, CffTable};
use crate::checksum::{self, CHECKSUM_MAGIC};
use crate::context::{
    is_graphite_tag, sanitize_error, sanitize_warn, DefaultContext, SanitizeContext, TableAction,
};
use crate::error::{ParseError, SanitizeError, WriteError};
use crate::font_data::FontData;
use crate::layout::{GdefInfo, GdefTable, LayoutArgs, LayoutTable, LayoutTableKind};
use crate::tables::cmap::Cmap;
use crate::tables::colr::{ColrArgs, ColrTable};
use crate::tables::cpal::CpalTable;
use crate::tables::glyf::{GlyfArgs, GlyfTable};
use crate::tables::loca::{owned, LocaTable};
use crate::tables::misc;
use crate::tables::os2::Os2Table;
use crate::tables::post::PostTable;
use crate::tables::{
    CanonicalNames, FontTableProvider, HeadTable, HheaTable, HmtxTable, IndexToLocFormat,
    MaxpTable, NameTable, SfntVersion, TableRecord, CFF_MAGIC, TTF_MAGIC,
};
use crate::tag::{self, DisplayTag};
use crate::variations::FvarTable;

/// Tags handled by the driver itself rather than the catalog loop.
const STRUCTURAL_TAGS: &[u32] = &[
    tag::HEAD,
    tag::MAXP,
    tag::LOCA,
    tag::GLYF,
    tag::CFF,
    tag::CFF2,
    tag::HHEA,
    tag::HMTX,
    tag::VHEA,
    tag::VMTX,
    tag::NAME,
];

/// Sanitize a single font, or the first member of a collection.
pub fn sanitize(data: &[u8]) -> Result<Vec<u8>, SanitizeError> {
    sanitize_with(&mut DefaultContext, data, 0)
}

/// Sanitize member `index` of a collection.
pub fn sanitize_index(data: &[u8], index: usize) -> Result<Vec<u8>, SanitizeError> {
    sanitize_with(&mut DefaultContext, data, index)
}

/// Sanitize with a caller-supplied context.
///
/// On success the output is always a bare sfnt: directory sorted by tag,
/// tables padded to four bytes, checksums recomputed. On failure nothing is
/// returned; there is no partial output.
pub fn sanitize_with(
    ctxt: &mut dyn SanitizeContext,
    data: &[u8],
    index: usize,
) -> Result<Vec<u8>, SanitizeError> {
    let scope = ReadScope::new(data);
    let font_data = scope.read::<FontData<'_>>().map_err(|err| {
        sanitize_error!(ctxt, "unrecognized font container: {}", err);
        SanitizeError::Parse(err)
    })?;

    if let FontData::Woff2(_) = &font_data {
        if ctxt.woff2_enabled() {
            sanitize_error!(
                ctxt,
                "WOFF2 input must be decompressed to sfnt bytes by the caller"
            );
        } else {
            sanitize_error!(ctxt, "WOFF2 input is not enabled");
        }
        return Err(SanitizeError::Parse(ParseError::Unsupported));
    }

    let provider = font_data.table_provider(index).map_err(|err| {
        sanitize_error!(ctxt, "font {} unusable: {}", index, err);
        SanitizeError::Parse(err)
    })?;

    sanitize_tables(ctxt, &provider)
}

/// Record of one table's fate during a sanitize run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TableDisposition {
    /// Parsed by the built-in sanitizer and re-serialized.
    Sanitized,
    /// Copied through verbatim by policy or catalog rule.
    Passthru,
    /// Excluded from the output.
    Dropped,
    /// Reused from an earlier collection member.
    Reused,
}

/// Tracks which tables a font's sanitize run has handled.
///
/// Insert is idempotent per tag; later insertions for a tag are ignored so a
/// table parsed once is never re-parsed. In collections the second and later
/// references to a shared physical table are recorded with
/// [TableDisposition::Reused] via [FontRegistry::mark_reused].
#[derive(Default)]
pub struct FontRegistry {
    tables: BTreeMap<u32, TableDisposition>,
}

impl FontRegistry {
    pub fn new() -> Self {
        FontRegistry::default()
    }

    pub fn insert(&mut self, tag: u32, disposition: TableDisposition) {
        self.tables.entry(tag).or_insert(disposition);
    }

    pub fn has(&self, tag: u32) -> bool {
        self.tables.contains_key(&tag)
    }

    pub fn get(&self, tag: u32) -> Option<TableDisposition> {
        self.tables.get(&tag).copied()
    }

    pub fn mark_reused(&mut self, tag: u32) {
        self.tables.insert(tag, TableDisposition::Reused);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, TableDisposition)> + '_ {
        self.tables.iter().map(|(&tag, &disposition)| (tag, disposition))
    }

    /// Whether the table made it into the output in some form.
    fn in_output(&self, tag: u32) -> bool {
        matches!(
            self.get(tag),
            Some(
                TableDisposition::Sanitized
                    | TableDisposition::Passthru
                    | TableDisposition::Reused
            )
        )
    }
}

fn table_error(ctxt: &mut dyn SanitizeContext, tag: u32, err: ParseError) -> SanitizeError {
    sanitize_error!(ctxt, "'{}' table failed to sanitize: {}", DisplayTag(tag), err);
    SanitizeError::in_table(tag, err)
}

fn sanitize_tables(
    ctxt: &mut dyn SanitizeContext,
    provider: &(impl FontTableProvider + SfntVersion),
) -> Result<Vec<u8>, SanitizeError> {
    let mut registry = FontRegistry::new();

    // head and maxp first: nearly everything depends on them
    let head_data = provider
        .read_table_data(tag::HEAD)
        .map_err(|e| table_error(ctxt, tag::HEAD, e))?;
    let mut head = ReadScope::new(&head_data)
        .read::<HeadTable>()
        .map_err(|e| table_error(ctxt, tag::HEAD, e))?;

    let maxp_data = provider
        .read_table_data(tag::MAXP)
        .map_err(|e| table_error(ctxt, tag::MAXP, e))?;
    let maxp = ReadScope::new(&maxp_data)
        .read::<MaxpTable>()
        .map_err(|e| table_error(ctxt, tag::MAXP, e))?;
    let num_glyphs = maxp.num_glyphs;

    // exactly one glyph data source
    let has_glyf = provider.has_table(tag::GLYF);
    let has_cff = provider.has_table(tag::CFF);
    let has_cff2 = provider.has_table(tag::CFF2);
    if usize::from(has_glyf) + usize::from(has_cff) + usize::from(has_cff2) != 1 {
        sanitize_error!(ctxt, "font must contain exactly one of glyf, CFF, or CFF2");
        return Err(SanitizeError::Parse(ParseError::MissingValue));
    }
    if has_glyf && !provider.has_table(tag::LOCA) {
        return Err(table_error(ctxt, tag::LOCA, ParseError::MissingTable(tag::LOCA)));
    }

    // cmap
    let cmap_data = provider
        .read_table_data(tag::CMAP)
        .map_err(|e| table_error(ctxt, tag::CMAP, e))?;
    let cmap = ReadScope::new(&cmap_data)
        .read_dep::<Cmap<'_>>(num_glyphs)
        .map_err(|e| table_error(ctxt, tag::CMAP, e))?;

    // horizontal metrics
    let hhea_data = provider
        .read_table_data(tag::HHEA)
        .map_err(|e| table_error(ctxt, tag::HHEA, e))?;
    let hhea = ReadScope::new(&hhea_data)
        .read::<HheaTable>()
        .map_err(|e| table_error(ctxt, tag::HHEA, e))?;
    let hmtx_data = provider
        .read_table_data(tag::HMTX)
        .map_err(|e| table_error(ctxt, tag::HMTX, e))?;
    let hmtx = ReadScope::new(&hmtx_data)
        .read_dep::<HmtxTable<'_>>((usize::from(num_glyphs), usize::from(hhea.num_h_metrics)))
        .map_err(|e| table_error(ctxt, tag::HMTX, e))?;

    // vertical metrics come in a pair or not at all
    let has_vhea = provider.has_table(tag::VHEA);
    let has_vmtx = provider.has_table(tag::VMTX);
    let vertical = if has_vhea && has_vmtx {
        let vhea_data = provider
            .read_table_data(tag::VHEA)
            .map_err(|e| table_error(ctxt, tag::VHEA, e))?;
        let vhea = ReadScope::new(&vhea_data)
            .read::<HheaTable>()
            .map_err(|e| table_error(ctxt, tag::VHEA, e))?;
        let vmtx_data = provider
            .read_table_data(tag::VMTX)
            .map_err(|e| table_error(ctxt, tag::VMTX, e))?;
        let vmtx_data_vec = vmtx_data.to_vec();
        let _check = ReadScope::new(&vmtx_data_vec)
            .read_dep::<HmtxTable<'_>>((usize::from(num_glyphs), usize::from(vhea.num_h_metrics)))
            .map_err(|e| table_error(ctxt, tag::VMTX, e))?;
        Some((vhea, vmtx_data_vec))
    } else {
        if has_vhea != has_vmtx {
            sanitize_warn!(ctxt, "dropping unpaired vertical metrics tables");
        }
        None
    };

    // OS/2
    let os2_data = provider
        .table_data(tag::OS_2)
        .map_err(|e| table_error(ctxt, tag::OS_2, e))?;
    let os2 = match &os2_data {
        Some(data) => Some(
            ReadScope::new(data)
                .read::<Os2Table<'_>>()
                .map_err(|e| table_error(ctxt, tag::OS_2, e))?,
        ),
        None => None,
    };

    // post
    let post_data = provider
        .read_table_data(tag::POST)
        .map_err(|e| table_error(ctxt, tag::POST, e))?;
    let post = ReadScope::new(&post_data)
        .read_dep::<PostTable>(num_glyphs)
        .map_err(|e| table_error(ctxt, tag::POST, e))?;

    // name is validated only for diagnostics; the output is always canonical
    if let Ok(name_data) = provider.read_table_data(tag::NAME) {
        if ReadScope::new(&name_data).read::<NameTable<'_>>().is_err() {
            sanitize_warn!(ctxt, "name table is malformed; replacing it");
        }
    }

    // fvar supplies the axis count to the variation stores
    let fvar_data = provider
        .table_data(tag::FVAR)
        .map_err(|e| table_error(ctxt, tag::FVAR, e))?;
    let fvar = match &fvar_data {
        Some(data) => Some(
            ReadScope::new(data)
                .read::<FvarTable<'_>>()
                .map_err(|e| table_error(ctxt, tag::FVAR, e))?,
        ),
        None => None,
    };
    let axis_count = fvar.as_ref().map(|fvar| fvar.axis_count);

    // glyph data
    let cff_data;
    let cff = if has_cff {
        cff_data = provider
            .read_table_data(tag::CFF)
            .map_err(|e| table_error(ctxt, tag::CFF, e))?;
        Some(
            ReadScope::new(&cff_data)
                .read_dep::<CffTable<'_>>(num_glyphs)
                .map_err(|e| table_error(ctxt, tag::CFF, e))?,
        )
    } else {
        None
    };

    let cff2_data;
    let cff2 = if has_cff2 {
        cff2_data = provider
            .read_table_data(tag::CFF2)
            .map_err(|e| table_error(ctxt, tag::CFF2, e))?;
        Some(
            ReadScope::new(&cff2_data)
                .read_dep::<Cff2Table<'_>>(Cff2Args {
                    num_glyphs,
                    axis_count,
                })
                .map_err(|e| table_error(ctxt, tag::CFF2, e))?,
        )
    } else {
        None
    };

    let loca_data;
    let glyf_data;
    let loca_table;
    let glyf = if has_glyf {
        loca_data = provider
            .read_table_data(tag::LOCA)
            .map_err(|e| table_error(ctxt, tag::LOCA, e))?;
        loca_table = ReadScope::new(&loca_data)
            .read_dep::<LocaTable<'_>>((num_glyphs, head.index_to_loc_format))
            .map_err(|e| table_error(ctxt, tag::LOCA, e))?;
        glyf_data = provider
            .read_table_data(tag::GLYF)
            .map_err(|e| table_error(ctxt, tag::GLYF, e))?;
        let glyf = ReadScope::new(&glyf_data)
            .read_dep::<GlyfTable<'_>>(GlyfArgs {
                loca: &loca_table,
                num_glyphs,
                max_instructions: maxp.max_size_of_instructions(),
            })
            .map_err(|e| table_error(ctxt, tag::GLYF, e))?;
        Some(glyf)
    } else {
        None
    };

    // GDEF feeds the lookup-flag checks in GSUB and GPOS
    let gdef_data = provider
        .table_data(tag::GDEF)
        .map_err(|e| table_error(ctxt, tag::GDEF, e))?;
    let gdef = match &gdef_data {
        Some(data) => Some(
            ReadScope::new(data)
                .read_dep::<GdefTable<'_>>(num_glyphs)
                .map_err(|e| table_error(ctxt, tag::GDEF, e))?,
        ),
        None => None,
    };
    let gdef_info = gdef.as_ref().map(|gdef| gdef.info).unwrap_or(GdefInfo::default());

    let gsub_data = provider
        .table_data(tag::GSUB)
        .map_err(|e| table_error(ctxt, tag::GSUB, e))?;
    let gsub = match &gsub_data {
        Some(data) => Some(
            ReadScope::new(data)
                .read_dep::<LayoutTable<'_>>(LayoutArgs {
                    kind: LayoutTableKind::Gsub,
                    num_glyphs,
                    gdef: gdef_info,
                })
                .map_err(|e| table_error(ctxt, tag::GSUB, e))?,
        ),
        None => None,
    };

    let gpos_data = provider
        .table_data(tag::GPOS)
        .map_err(|e| table_error(ctxt, tag::GPOS, e))?;
    let gpos = match &gpos_data {
        Some(data) => Some(
            ReadScope::new(data)
                .read_dep::<LayoutTable<'_>>(LayoutArgs {
                    kind: LayoutTableKind::Gpos,
                    num_glyphs,
                    gdef: gdef_info,
                })
                .map_err(|e| table_error(ctxt, tag::GPOS, e))?,
        ),
        None => None,
    };

    // color tables: COLR requires CPAL
    let cpal_data = provider
        .table_data(tag::CPAL)
        .map_err(|e| table_error(ctxt, tag::CPAL, e))?;
    let cpal = match &cpal_data {
        Some(data) => Some(
            ReadScope::new(data)
                .read::<CpalTable<'_>>()
                .map_err(|e| table_error(ctxt, tag::CPAL, e))?,
        ),
        None => None,
    };

    let colr_data = provider
        .table_data(tag::COLR)
        .map_err(|e| table_error(ctxt, tag::COLR, e))?;
    let colr = match &colr_data {
        Some(data) => {
            let cpal = cpal.as_ref().ok_or_else(|| {
                table_error(ctxt, tag::COLR, ParseError::MissingTable(tag::CPAL))
            })?;
            Some(
                ReadScope::new(data)
                    .read_dep::<ColrTable<'_>>(ColrArgs {
                        num_glyphs,
                        num_palette_entries: cpal.num_palette_entries,
                    })
                    .map_err(|e| table_error(ctxt, tag::COLR, e))?,
            )
        }
        None => None,
    };

    // embedded bitmaps: EBLC requires EBDT
    let ebdt_data = provider
        .table_data(tag::EBDT)
        .map_err(|e| table_error(ctxt, tag::EBDT, e))?;
    let eblc_data = provider
        .table_data(tag::EBLC)
        .map_err(|e| table_error(ctxt, tag::EBLC, e))?;
    let bitmaps = match (&eblc_data, &ebdt_data) {
        (Some(eblc_bytes), Some(ebdt_bytes)) => {
            let ebdt = ReadScope::new(ebdt_bytes)
                .read::<crate::bitmap::EbdtTable<'_>>()
                .map_err(|e| table_error(ctxt, tag::EBDT, e))?;
            let eblc = ReadScope::new(eblc_bytes)
                .read_dep::<crate::bitmap::EblcTable<'_>>(ebdt.scope())
                .map_err(|e| table_error(ctxt, tag::EBLC, e))?;
            Some((eblc, ebdt))
        }
        (Some(_), None) => {
            return Err(table_error(
                ctxt,
                tag::EBLC,
                ParseError::MissingTable(tag::EBDT),
            ));
        }
        (None, Some(_)) => {
            sanitize_warn!(ctxt, "dropping EBDT without EBLC");
            None
        }
        (None, None) => None,
    };

    // Build the output
    let sfnt_version = if has_cff || has_cff2 {
        CFF_MAGIC
    } else {
        TTF_MAGIC
    };
    let mut builder = FontBuilder::new(sfnt_version);

    builder.add_table::<_, Cmap<'_>>(tag::CMAP, &cmap, ())?;
    registry.insert(tag::CMAP, TableDisposition::Sanitized);
    builder.add_table::<_, HheaTable>(tag::HHEA, &hhea, ())?;
    builder.add_table::<_, HmtxTable<'_>>(tag::HMTX, &hmtx, ())?;
    builder.add_table::<_, MaxpTable>(tag::MAXP, &maxp, ())?;
    registry.insert(tag::HHEA, TableDisposition::Sanitized);
    registry.insert(tag::HMTX, TableDisposition::Sanitized);
    registry.insert(tag::MAXP, TableDisposition::Sanitized);

    if let Some((vhea, vmtx_data)) = &vertical {
        builder.add_table::<_, HheaTable>(tag::VHEA, vhea, ())?;
        builder.add_table::<_, ReadScope<'_>>(tag::VMTX, ReadScope::new(vmtx_data), ())?;
        registry.insert(tag::VHEA, TableDisposition::Sanitized);
        registry.insert(tag::VMTX, TableDisposition::Sanitized);
    }

    if let Some(os2) = &os2 {
        builder.add_table::<_, Os2Table<'_>>(tag::OS_2, os2, ())?;
        registry.insert(tag::OS_2, TableDisposition::Sanitized);
    }

    builder.add_table::<_, PostTable>(tag::POST, &post, ())?;
    builder.add_table::<_, CanonicalNames>(tag::NAME, CanonicalNames, ())?;
    registry.insert(tag::POST, TableDisposition::Sanitized);
    registry.insert(tag::NAME, TableDisposition::Sanitized);

    if let Some(fvar) = &fvar {
        builder.add_table::<_, FvarTable<'_>>(tag::FVAR, fvar, ())?;
        registry.insert(tag::FVAR, TableDisposition::Sanitized);
    }
    if let Some(cff) = &cff {
        builder.add_table::<_, CffTable<'_>>(tag::CFF, cff, ())?;
        registry.insert(tag::CFF, TableDisposition::Sanitized);
    }
    if let Some(cff2) = &cff2 {
        builder.add_table::<_, Cff2Table<'_>>(tag::CFF2, cff2, ())?;
        registry.insert(tag::CFF2, TableDisposition::Sanitized);
    }
    if let Some(gdef) = &gdef {
        builder.add_table::<_, GdefTable<'_>>(tag::GDEF, gdef, ())?;
        registry.insert(tag::GDEF, TableDisposition::Sanitized);
    }
    if let Some(gsub) = &gsub {
        builder.add_table::<_, LayoutTable<'_>>(tag::GSUB, gsub, ())?;
        registry.insert(tag::GSUB, TableDisposition::Sanitized);
    }
    if let Some(gpos) = &gpos {
        builder.add_table::<_, LayoutTable<'_>>(tag::GPOS, gpos, ())?;
        registry.insert(tag::GPOS, TableDisposition::Sanitized);
    }
    if let Some(cpal) = &cpal {
        builder.add_table::<_, CpalTable<'_>>(tag::CPAL, cpal, ())?;
        registry.insert(tag::CPAL, TableDisposition::Sanitized);
    }
    if let Some(colr) = &colr {
        builder.add_table::<_, ColrTable<'_>>(tag::COLR, colr, ())?;
        registry.insert(tag::COLR, TableDisposition::Sanitized);
    }
    if let Some((eblc, ebdt)) = &bitmaps {
        builder.add_table::<_, crate::bitmap::EblcTable<'_>>(tag::EBLC, eblc, ())?;
        builder.add_table::<_, crate::bitmap::EbdtTable<'_>>(tag::EBDT, ebdt, ())?;
        registry.insert(tag::EBLC, TableDisposition::Sanitized);
        registry.insert(tag::EBDT, TableDisposition::Sanitized);
    }

    // the simple catalog tables, policy-routed tables, and everything else
    for tag in provider.table_tags() {
        if registry.has(tag) || STRUCTURAL_TAGS.contains(&tag) {
            continue;
        }
        match ctxt.table_action(tag) {
            TableAction::Drop => {
                sanitize_warn!(ctxt, "dropping '{}' table by policy", DisplayTag(tag));
                registry.insert(tag, TableDisposition::Dropped);
                continue;
            }
            TableAction::Passthru => {
                let data = provider
                    .read_table_data(tag)
                    .map_err(|e| table_error(ctxt, tag, e))?;
                builder.add_table::<_, ReadScope<'_>>(tag, ReadScope::new(&data), ())?;
                registry.insert(tag, TableDisposition::Passthru);
                continue;
            }
            TableAction::Default | TableAction::Sanitize => {}
        }

        if is_graphite_tag(tag) {
            // Unparsed by this sanitizer; only an explicit PASSTHRU keeps them
            sanitize_warn!(ctxt, "dropping Graphite '{}' table", DisplayTag(tag));
            registry.insert(tag, TableDisposition::Dropped);
            continue;
        }

        if matches!(tag, tag::CBDT | tag::CBLC) {
            if ctxt.drop_color_bitmap_tables() {
                sanitize_warn!(ctxt, "dropping color bitmap '{}' table", DisplayTag(tag));
                registry.insert(tag, TableDisposition::Dropped);
            } else {
                let data = provider
                    .read_table_data(tag)
                    .map_err(|e| table_error(ctxt, tag, e))?;
                builder.add_table::<_, ReadScope<'_>>(tag, ReadScope::new(&data), ())?;
                registry.insert(tag, TableDisposition::Passthru);
            }
            continue;
        }

        match tag {
            // Signatures cannot survive re-serialization
            tag::DSIG => {
                sanitize_warn!(ctxt, "dropping DSIG table");
                registry.insert(tag, TableDisposition::Dropped);
            }
            tag::CVT | tag::FPGM | tag::PREP | tag::GASP | tag::KERN | tag::VORG | tag::HDMX
            | tag::LTSH | tag::VDMX | tag::EBSC => {
                let data = provider
                    .read_table_data(tag)
                    .map_err(|e| table_error(ctxt, tag, e))?;
                let scope = ReadScope::new(&data);
                let check = match tag {
                    tag::CVT => misc::check_cvt(scope.clone()),
                    tag::GASP => misc::check_gasp(scope.clone()),
                    tag::KERN => misc::check_kern(scope.clone()),
                    tag::VORG => misc::check_vorg(scope.clone(), num_glyphs),
                    tag::HDMX => misc::check_hdmx(scope.clone(), num_glyphs),
                    tag::LTSH => misc::check_ltsh(scope.clone(), num_glyphs),
                    tag::VDMX => misc::check_vdmx(scope.clone()),
                    tag::EBSC => check_ebsc(scope.clone()),
                    // fpgm and prep are opaque bytecode, length-checked only
                    _ => Ok(()),
                };
                match check {
                    Ok(()) => {
                        builder.add_table::<_, ReadScope<'_>>(tag, scope, ())?;
                        registry.insert(tag, TableDisposition::Passthru);
                    }
                    Err(err) => {
                        // non-critical tables are dropped rather than fatal
                        sanitize_warn!(
                            ctxt,
                            "dropping invalid '{}' table: {}",
                            DisplayTag(tag),
                            err
                        );
                        registry.insert(tag, TableDisposition::Dropped);
                    }
                }
            }
            _ => {
                sanitize_warn!(ctxt, "dropping unrecognized '{}' table", DisplayTag(tag));
                registry.insert(tag, TableDisposition::Dropped);
            }
        }
    }

    // glyf is serialized before head so the rewritten loca can upgrade
    // head.indexToLocFormat when its offsets outgrow the short form.
    let font = if let Some(glyf) = glyf {
        let mut glyf_buffer = WriteBuffer::new();
        let loca = GlyfTable::write_dep(&mut glyf_buffer, glyf, ())?;
        let max_offset = loca.offsets.last().copied().unwrap_or(0);
        if max_offset >= 2 * u32::from(u16::MAX)
            && head.index_to_loc_format == IndexToLocFormat::Short
        {
            head.index_to_loc_format = IndexToLocFormat::Long;
        }
        let index_to_loc_format = head.index_to_loc_format;

        builder.add_buffer(tag::GLYF, glyf_buffer);
        registry.insert(tag::GLYF, TableDisposition::Sanitized);
        builder.add_table::<_, owned::LocaTable>(tag::LOCA, loca, index_to_loc_format)?;
        registry.insert(tag::LOCA, TableDisposition::Sanitized);
        registry.insert(tag::HEAD, TableDisposition::Sanitized);
        builder.add_head_table(&head)?
    } else {
        registry.insert(tag::HEAD, TableDisposition::Sanitized);
        builder.add_head_table(&head)?
    };

    debug_assert!(registry.in_output(tag::HEAD));

    font.data().map_err(SanitizeError::from)
}

/// `EBSC` carries the same 2.0 version header as the other bitmap tables.
fn check_ebsc(scope: ReadScope<'_>) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let major = ctxt.read_u16be()?;
    let minor = ctxt.read_u16be()?;
    ctxt.check_version(major == 2 && minor == 0)?;
    Ok(())
}

/// Accumulates the output tables and assembles the final sfnt.
///
/// Tables are keyed by tag in a `BTreeMap`, which yields the sorted
/// directory the format requires.
struct FontBuilder {
    sfnt_version: u32,
    tables: BTreeMap<u32, WriteBuffer>,
}

/// A `FontBuilder` whose `head` table has been written, ready to assemble.
struct FontBuilderWithHead {
    inner: FontBuilder,
    check_sum_adjustment: Placeholder<U32Be, u32>,
}

struct TaggedBuffer {
    tag: u32,
    buffer: WriteBuffer,
}

struct OrderedTables {
    tables: Vec<TaggedBuffer>,
    checksum: Wrapping<u32>,
}

impl FontBuilder {
    fn new(sfnt_version: u32) -> Self {
        FontBuilder {
            sfnt_version,
            tables: BTreeMap::new(),
        }
    }

    fn add_table<HostType, T: WriteBinaryDep<HostType>>(
        &mut self,
        tag: u32,
        table: HostType,
        args: T::Args,
    ) -> Result<T::Output, WriteError> {
        assert_ne!(tag, tag::HEAD, "head table must use add_head_table");

        let mut buffer = WriteBuffer::new();
        let output = T::write_dep(&mut buffer, table, args)?;
        self.tables.insert(tag, buffer);

        Ok(output)
    }

    /// Add an already-serialized table.
    fn add_buffer(&mut self, tag: u32, buffer: WriteBuffer) {
        self.tables.insert(tag, buffer);
    }

    fn add_head_table(mut self, table: &HeadTable) -> Result<FontBuilderWithHead, WriteError> {
        let mut buffer = WriteBuffer::new();
        let placeholder = HeadTable::write(&mut buffer, table)?;
        self.tables.insert(tag::HEAD, buffer);

        Ok(FontBuilderWithHead {
            inner: self,
            check_sum_adjustment: placeholder,
        })
    }
}

impl FontBuilderWithHead {
    /// Returns a `Vec<u8>` containing the built font
    fn data(mut self) -> Result<Vec<u8>, WriteError> {
        let mut font = WriteBuffer::new();

        self.write_offset_table(&mut font)?;
        let table_offset =
            long_align(self.inner.tables.len() * TableRecord::SIZE + font.bytes_written());

        let mut ordered_tables = self.write_table_directory(&mut font)?;

        // pad the directory to a 4-byte boundary
        let length = font.bytes_written();
        let padded_length = long_align(length);
        debug_assert_eq!(
            padded_length, table_offset,
            "offset after writing table directory is not at expected position"
        );
        font.write_zeros(padded_length - length)?;

        // Fill in check_sum_adjustment in the head table
        let headers_checksum = checksum::table_checksum(font.bytes())
            .map_err(|_| WriteError::BadValue)?;
        let checksum = CHECKSUM_MAGIC - (headers_checksum + ordered_tables.checksum);

        let mut placeholder = Some(self.check_sum_adjustment);
        for TaggedBuffer { tag, buffer } in ordered_tables.tables.iter_mut() {
            if *tag == tag::HEAD {
                // NOTE(unwrap): head is written exactly once
                buffer.write_placeholder(placeholder.take().unwrap(), checksum.0)?;
            }
            font.write_bytes(buffer.bytes())?;
        }

        Ok(font.into_inner())
    }

    fn write_offset_table(&self, font: &mut WriteBuffer) -> Result<(), WriteError> {
        let num_tables = u16::try_from(self.inner.tables.len())?;
        let n = max_power_of_2(num_tables);
        let search_range = (1 << n) * 16;
        let entry_selector = n;
        let range_shift = num_tables * 16 - search_range;

        U32Be::write(font, self.inner.sfnt_version)?;
        U16Be::write(font, num_tables)?;
        U16Be::write(font, search_range)?;
        U16Be::write(font, entry_selector)?;
        U16Be::write(font, range_shift)?;

        Ok(())
    }

    fn write_table_directory(&mut self, font: &mut WriteBuffer) -> Result<OrderedTables, WriteError> {
        let mut tables = Vec::with_capacity(self.inner.tables.len());
        let mut checksum = Wrapping(0);
        let mut table_offset =
            long_align(self.inner.tables.len() * TableRecord::SIZE + font.bytes_written());

        let tags = self.inner.tables.keys().copied().collect_vec();
        for tag in tags {
            if let Some(mut table) = self.inner.tables.remove(&tag) {
                let length = table.len();
                let padded_length = long_align(length);
                table.write_zeros(padded_length - length)?;

                let table_checksum =
                    checksum::table_checksum(table.bytes()).map_err(|_| WriteError::BadValue)?;
                checksum += table_checksum;

                let record = TableRecord {
                    table_tag: tag,
                    checksum: table_checksum.0,
                    offset: u32::try_from(table_offset)?,
                    length: u32::try_from(length)?,
                };

                table_offset += padded_length;
                TableRecord::write(font, &record)?;
                tables.push(TaggedBuffer { tag, buffer: table });
            }
        }

        Ok(OrderedTables { tables, checksum })
    }
}

/// Calculate the maximum power of 2 that is <= num
fn max_power_of_2(num: u16) -> u16 {
    15u16.saturating_sub(num.leading_zeros() as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_power_of_2() {
        assert_eq!(max_power_of_2(0), 0);
        assert_eq!(max_power_of_2(1), 0);
        assert_eq!(max_power_of_2(2), 1);
        assert_eq!(max_power_of_2(4), 2);
        assert_eq!(max_power_of_2(9), 3);
        assert_eq!(max_power_of_2(16), 4);
        assert_eq!(max_power_of_2(u16::MAX), 15);
    }

    #[test]
    fn registry_insert_is_idempotent() {
        let mut registry = FontRegistry::new();
        registry.insert(tag::GLYF, TableDisposition::Sanitized);
        registry.insert(tag::GLYF, TableDisposition::Dropped);
        assert_eq!(registry.get(tag::GLYF), Some(TableDisposition::Sanitized));
    }

    #[test]
    fn registry_mark_reused_overrides() {
        let mut registry = FontRegistry::new();
        registry.insert(tag::GLYF, TableDisposition::Sanitized);
        registry.mark_reused(tag::GLYF);
        assert_eq!(registry.get(tag::GLYF), Some(TableDisposition::Reused));
        assert!(registry.in_output(tag::GLYF));
    }
}
