//! End-to-end sanitizer tests over fonts constructed in memory.

use fontscrub::binary::long_align;
use fontscrub::binary::read::ReadScope;
use fontscrub::binary::write::{WriteBinary, WriteBuffer, WriteContext};
use fontscrub::binary::{I16Be, U16Be, U32Be, U8};
use fontscrub::checksum::table_checksum;
use fontscrub::tables::{
    Fixed, HeadTable, HheaTable, IndexToLocFormat, NameTable, OffsetTable, TableRecord,
};
use fontscrub::{sanitize, tag};

/// Assemble an sfnt from tag/data pairs. Directory checksums are left zero;
/// the sanitizer recomputes them anyway.
fn build_sfnt(version: u32, tables: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let mut tables: Vec<_> = tables.to_vec();
    tables.sort_by_key(|(tag, _)| *tag);

    let mut w = WriteBuffer::new();
    U32Be::write(&mut w, version).unwrap();
    U16Be::write(&mut w, tables.len() as u16).unwrap();
    U16Be::write(&mut w, 16u16).unwrap(); // searchRange, not trusted
    U16Be::write(&mut w, 0u16).unwrap(); // entrySelector
    U16Be::write(&mut w, 0u16).unwrap(); // rangeShift

    let mut offset = long_align(12 + tables.len() * 16);
    for (tag, data) in &tables {
        U32Be::write(&mut w, *tag).unwrap();
        U32Be::write(&mut w, 0u32).unwrap(); // checksum
        U32Be::write(&mut w, offset as u32).unwrap();
        U32Be::write(&mut w, data.len() as u32).unwrap();
        offset += long_align(data.len());
    }

    for (_, data) in &tables {
        let padding = long_align(w.bytes_written()) - w.bytes_written();
        w.write_zeros(padding).unwrap();
        w.write_bytes(data).unwrap();
    }

    w.into_inner()
}

fn head_bytes(index_to_loc_format: IndexToLocFormat) -> Vec<u8> {
    let head = HeadTable {
        font_revision: Fixed::new(0x00010000),
        flags: 0x0003,
        units_per_em: 1000,
        created: 0,
        modified: 0,
        x_min: 0,
        y_min: 0,
        x_max: 100,
        y_max: 100,
        mac_style: 0,
        lowest_rec_ppem: 8,
        index_to_loc_format,
    };
    let mut w = WriteBuffer::new();
    let placeholder = HeadTable::write(&mut w, &head).unwrap();
    w.write_placeholder(placeholder, 0u32).unwrap();
    w.into_inner()
}

fn maxp_bytes(num_glyphs: u16, max_instructions: u16) -> Vec<u8> {
    let mut w = WriteBuffer::new();
    U32Be::write(&mut w, 0x00010000u32).unwrap();
    U16Be::write(&mut w, num_glyphs).unwrap();
    // maxPoints .. maxStackElements
    for _ in 0..9 {
        U16Be::write(&mut w, 0u16).unwrap();
    }
    U16Be::write(&mut w, 0u16).unwrap(); // maxStackElements
    U16Be::write(&mut w, max_instructions).unwrap();
    U16Be::write(&mut w, 0u16).unwrap(); // maxComponentElements
    U16Be::write(&mut w, 0u16).unwrap(); // maxComponentDepth
    w.into_inner()
}

fn maxp_v05_bytes(num_glyphs: u16) -> Vec<u8> {
    let mut w = WriteBuffer::new();
    U32Be::write(&mut w, 0x00005000u32).unwrap();
    U16Be::write(&mut w, num_glyphs).unwrap();
    w.into_inner()
}

fn hhea_bytes(num_h_metrics: u16) -> Vec<u8> {
    let hhea = HheaTable {
        ascender: 800,
        descender: -200,
        line_gap: 0,
        advance_width_max: 500,
        min_left_side_bearing: 0,
        min_right_side_bearing: 0,
        x_max_extent: 100,
        caret_slope_rise: 1,
        caret_slope_run: 0,
        caret_offset: 0,
        num_h_metrics,
    };
    let mut w = WriteBuffer::new();
    HheaTable::write(&mut w, &hhea).unwrap();
    w.into_inner()
}

fn hmtx_bytes(num_glyphs: u16, num_h_metrics: u16) -> Vec<u8> {
    let mut w = WriteBuffer::new();
    for _ in 0..num_h_metrics {
        U16Be::write(&mut w, 500u16).unwrap(); // advance
        I16Be::write(&mut w, 0i16).unwrap(); // lsb
    }
    for _ in num_h_metrics..num_glyphs {
        I16Be::write(&mut w, 0i16).unwrap();
    }
    w.into_inner()
}

fn cmap_bytes() -> Vec<u8> {
    let mut w = WriteBuffer::new();
    U16Be::write(&mut w, 0u16).unwrap(); // version
    U16Be::write(&mut w, 1u16).unwrap(); // numTables
    U16Be::write(&mut w, 3u16).unwrap(); // Windows
    U16Be::write(&mut w, 1u16).unwrap(); // Unicode BMP
    U32Be::write(&mut w, 12u32).unwrap(); // offset
    // format 4 subtable: one segment mapping U+0020 to glyph 0
    U16Be::write(&mut w, 4u16).unwrap(); // format
    U16Be::write(&mut w, 40u16).unwrap(); // length
    U16Be::write(&mut w, 0u16).unwrap(); // language
    U16Be::write(&mut w, 4u16).unwrap(); // segCountX2
    U16Be::write(&mut w, 4u16).unwrap(); // searchRange
    U16Be::write(&mut w, 1u16).unwrap(); // entrySelector
    U16Be::write(&mut w, 0u16).unwrap(); // rangeShift
    U16Be::write(&mut w, 0x20u16).unwrap(); // endCode[0]
    U16Be::write(&mut w, 0xFFFFu16).unwrap(); // endCode[1]
    U16Be::write(&mut w, 0u16).unwrap(); // reservedPad
    U16Be::write(&mut w, 0x20u16).unwrap(); // startCode[0]
    U16Be::write(&mut w, 0xFFFFu16).unwrap(); // startCode[1]
    U16Be::write(&mut w, 0u16.wrapping_sub(0x20)).unwrap(); // idDelta[0]
    U16Be::write(&mut w, 1u16).unwrap(); // idDelta[1]
    U16Be::write(&mut w, 0u16).unwrap(); // idRangeOffset[0]
    U16Be::write(&mut w, 0u16).unwrap(); // idRangeOffset[1]
    w.into_inner()
}

fn name_bytes() -> Vec<u8> {
    let mut w = WriteBuffer::new();
    U16Be::write(&mut w, 0u16).unwrap(); // format
    U16Be::write(&mut w, 0u16).unwrap(); // count
    U16Be::write(&mut w, 6u16).unwrap(); // string offset
    w.into_inner()
}

fn post_bytes() -> Vec<u8> {
    let mut w = WriteBuffer::new();
    U32Be::write(&mut w, 0x00030000u32).unwrap();
    U32Be::write(&mut w, 0u32).unwrap(); // italicAngle
    I16Be::write(&mut w, -100i16).unwrap();
    I16Be::write(&mut w, 50i16).unwrap();
    U32Be::write(&mut w, 0u32).unwrap(); // isFixedPitch
    w.write_zeros(16).unwrap();
    w.into_inner()
}

/// Serialize a CFF INDEX with one-byte offsets.
fn write_cff_index(w: &mut WriteBuffer, objects: &[&[u8]]) {
    U16Be::write(w, objects.len() as u16).unwrap();
    if objects.is_empty() {
        return;
    }
    U8::write(w, 1u8).unwrap(); // offSize
    let mut offset = 1u8;
    U8::write(w, offset).unwrap();
    for object in objects {
        offset += object.len() as u8;
        U8::write(w, offset).unwrap();
    }
    for object in objects {
        w.write_bytes(object).unwrap();
    }
}

/// A minimal CFF table whose single charstring is `charstring`. The font has
/// no local or global subroutines.
fn cff_table_bytes(charstring: &[u8]) -> Vec<u8> {
    let mut w = WriteBuffer::new();
    // header
    U8::write(&mut w, 1u8).unwrap(); // major
    U8::write(&mut w, 0u8).unwrap(); // minor
    U8::write(&mut w, 4u8).unwrap(); // hdrSize
    U8::write(&mut w, 1u8).unwrap(); // offSize

    write_cff_index(&mut w, &[b"T"]); // Name INDEX

    // Top DICT: a 5-byte CharStrings offset operand then operator 17.
    // header 4 + name index 6 + top dict index 11 + string 2 + gsubr 2 = 25
    let mut top_dict = WriteBuffer::new();
    U8::write(&mut top_dict, 29u8).unwrap();
    top_dict.write_bytes(&25i32.to_be_bytes()).unwrap();
    U8::write(&mut top_dict, 17u8).unwrap();
    let top_dict = top_dict.into_inner();
    write_cff_index(&mut w, &[&top_dict]);

    write_cff_index(&mut w, &[]); // String INDEX
    write_cff_index(&mut w, &[]); // Global Subr INDEX
    write_cff_index(&mut w, &[charstring]); // CharStrings INDEX

    w.into_inner()
}

/// Short-format loca for the given byte offsets.
fn loca_bytes_short(offsets: &[u32]) -> Vec<u8> {
    let mut w = WriteBuffer::new();
    for &offset in offsets {
        assert_eq!(offset % 2, 0);
        U16Be::write(&mut w, (offset / 2) as u16).unwrap();
    }
    w.into_inner()
}

/// The minimal single-glyph TrueType font of the first end-to-end scenario.
fn minimal_ttf() -> Vec<u8> {
    build_sfnt(
        0x00010000,
        &[
            (tag::HEAD, head_bytes(IndexToLocFormat::Short)),
            (tag::MAXP, maxp_bytes(2, 0)),
            (tag::LOCA, loca_bytes_short(&[0, 0, 0])),
            (tag::GLYF, vec![0]),
            (tag::CMAP, cmap_bytes()),
            (tag::HHEA, hhea_bytes(1)),
            (tag::HMTX, hmtx_bytes(2, 1)),
            (tag::NAME, name_bytes()),
            (tag::POST, post_bytes()),
        ],
    )
}

/// Verify the directory invariants of a sanitized output file.
fn assert_output_well_formed(output: &[u8]) {
    let scope = ReadScope::new(output);
    let offset_table = scope.read::<OffsetTable<'_>>().unwrap();
    offset_table.check_directory(&scope).unwrap();

    let records: Vec<TableRecord> = offset_table.table_records.iter().collect();
    for pair in records.windows(2) {
        assert!(pair[0].table_tag < pair[1].table_tag, "directory not sorted");
    }
    for record in &records {
        assert_eq!(record.offset % 4, 0, "table offset not 4-byte aligned");
        let start = record.offset as usize;
        let end = start + long_align(record.length as usize);
        let padded = &output[start..end];
        assert_eq!(
            table_checksum(padded).unwrap().0,
            if record.table_tag == tag::HEAD {
                // head's checksum entry is computed with a zero adjustment
                let mut copy = padded.to_vec();
                copy[8..12].fill(0);
                table_checksum(&copy).unwrap().0
            } else {
                record.checksum
            },
            "bad checksum for table {:08x}",
            record.table_tag
        );
    }

    // the whole-file checksum, including checkSumAdjustment, is the magic
    let mut whole = output.to_vec();
    while whole.len() % 4 != 0 {
        whole.push(0);
    }
    assert_eq!(table_checksum(&whole).unwrap().0, 0xB1B0AFBA);
}

#[test]
fn minimal_font_round_trips() {
    let input = minimal_ttf();
    let output = sanitize(&input).expect("minimal font rejected");
    assert_output_well_formed(&output);

    // idempotence: sanitizing the output reproduces it byte for byte
    let again = sanitize(&output).expect("output rejected");
    assert_eq!(output, again);
}

#[test]
fn name_table_is_rewritten_canonically() {
    let input = minimal_ttf();
    let output = sanitize(&input).unwrap();

    let scope = ReadScope::new(&output);
    let offset_table = scope.read::<OffsetTable<'_>>().unwrap();
    let name_scope = offset_table.read_table(&scope, tag::NAME).unwrap().unwrap();
    let name = name_scope.read::<NameTable<'_>>().unwrap();
    assert_eq!(name.name_records.len(), 9);
    let record = name.name_records.read_item(0).unwrap();
    assert_eq!(record.platform_id, 3);
    assert_eq!(record.encoding_id, 1);
}

#[test]
fn glyf_growth_upgrades_index_to_loc_format() {
    // Nine identical simple glyphs, each 14562 bytes, an input size that a
    // short loca can just represent; the 4-byte output padding pushes the
    // final offset past 2 * 0xFFFF so head.indexToLocFormat must become long.
    let instructions = 14543usize;
    let mut glyph = WriteBuffer::new();
    I16Be::write(&mut glyph, 1i16).unwrap(); // numberOfContours
    for _ in 0..4 {
        I16Be::write(&mut glyph, 0i16).unwrap(); // bbox
    }
    U16Be::write(&mut glyph, 0u16).unwrap(); // endPtsOfContours[0]
    U16Be::write(&mut glyph, instructions as u16).unwrap();
    glyph.write_zeros(instructions).unwrap();
    U8::write(&mut glyph, 0x01u8).unwrap(); // ON_CURVE_POINT
    I16Be::write(&mut glyph, 0i16).unwrap(); // x
    I16Be::write(&mut glyph, 0i16).unwrap(); // y
    let glyph = glyph.into_inner();
    assert_eq!(glyph.len(), 14562);

    let mut glyf = Vec::new();
    let mut offsets = vec![0u32, 0]; // glyph 0 is empty
    for _ in 0..9 {
        glyf.extend_from_slice(&glyph);
        offsets.push(glyf.len() as u32);
    }
    assert!(*offsets.last().unwrap() <= 2 * 0xFFFF);

    let num_glyphs = 10u16;
    let input = build_sfnt(
        0x00010000,
        &[
            (tag::HEAD, head_bytes(IndexToLocFormat::Short)),
            (tag::MAXP, maxp_bytes(num_glyphs, 20000)),
            (tag::LOCA, loca_bytes_short(&offsets)),
            (tag::GLYF, glyf),
            (tag::CMAP, cmap_bytes()),
            (tag::HHEA, hhea_bytes(1)),
            (tag::HMTX, hmtx_bytes(num_glyphs, 1)),
            (tag::NAME, name_bytes()),
            (tag::POST, post_bytes()),
        ],
    );

    let output = sanitize(&input).expect("font rejected");
    assert_output_well_formed(&output);

    let scope = ReadScope::new(&output);
    let offset_table = scope.read::<OffsetTable<'_>>().unwrap();
    let head_scope = offset_table.read_table(&scope, tag::HEAD).unwrap().unwrap();
    let head = head_scope.read::<HeadTable>().unwrap();
    assert_eq!(head.index_to_loc_format, IndexToLocFormat::Long);

    let again = sanitize(&output).unwrap();
    assert_eq!(output, again);
}

#[test]
fn composite_component_out_of_range_is_rejected() {
    // glyph 1 is a composite referencing glyph index 2 == numGlyphs
    let mut glyph = WriteBuffer::new();
    I16Be::write(&mut glyph, -1i16).unwrap(); // composite
    for _ in 0..4 {
        I16Be::write(&mut glyph, 0i16).unwrap(); // bbox
    }
    U16Be::write(&mut glyph, 0x0003u16).unwrap(); // ARGS_ARE_WORDS | XY
    U16Be::write(&mut glyph, 2u16).unwrap(); // glyph index out of range
    I16Be::write(&mut glyph, 0i16).unwrap();
    I16Be::write(&mut glyph, 0i16).unwrap();
    let glyph = glyph.into_inner();
    let glyph_len = glyph.len() as u32;
    assert_eq!(glyph_len % 2, 0);

    let input = build_sfnt(
        0x00010000,
        &[
            (tag::HEAD, head_bytes(IndexToLocFormat::Short)),
            (tag::MAXP, maxp_bytes(2, 0)),
            (tag::LOCA, loca_bytes_short(&[0, 0, glyph_len])),
            (tag::GLYF, glyph),
            (tag::CMAP, cmap_bytes()),
            (tag::HHEA, hhea_bytes(1)),
            (tag::HMTX, hmtx_bytes(2, 1)),
            (tag::NAME, name_bytes()),
            (tag::POST, post_bytes()),
        ],
    );

    let err = sanitize(&input).unwrap_err();
    match err {
        fontscrub::SanitizeError::Table(tag, _) => assert_eq!(tag, tag::GLYF),
        other => panic!("expected glyf table error, got {:?}", other),
    }
}

#[test]
fn cff_subr_index_out_of_range_is_rejected() {
    // The charstring is the bytes 139 139 139 10: three zeros pushed, then
    // callsubr against a font with no local subroutines at all.
    let cff = cff_table_bytes(&[139, 139, 139, 10]);
    let input = build_sfnt(
        0x4F54544F, // OTTO
        &[
            (tag::HEAD, head_bytes(IndexToLocFormat::Short)),
            (tag::MAXP, maxp_v05_bytes(1)),
            (tag::CFF, cff),
            (tag::CMAP, cmap_bytes()),
            (tag::HHEA, hhea_bytes(1)),
            (tag::HMTX, hmtx_bytes(1, 1)),
            (tag::NAME, name_bytes()),
            (tag::POST, post_bytes()),
        ],
    );

    let err = sanitize(&input).unwrap_err();
    match err {
        fontscrub::SanitizeError::Table(tag, _) => assert_eq!(tag, tag::CFF),
        other => panic!("expected CFF table error, got {:?}", other),
    }
}

#[test]
fn cff_font_round_trips() {
    // The same font with a well-formed charstring sanitizes and is idempotent
    let cff = cff_table_bytes(&[14]); // endchar
    let input = build_sfnt(
        0x4F54544F,
        &[
            (tag::HEAD, head_bytes(IndexToLocFormat::Short)),
            (tag::MAXP, maxp_v05_bytes(1)),
            (tag::CFF, cff),
            (tag::CMAP, cmap_bytes()),
            (tag::HHEA, hhea_bytes(1)),
            (tag::HMTX, hmtx_bytes(1, 1)),
            (tag::NAME, name_bytes()),
            (tag::POST, post_bytes()),
        ],
    );

    let output = sanitize(&input).expect("CFF font rejected");
    assert_output_well_formed(&output);
    let again = sanitize(&output).unwrap();
    assert_eq!(output, again);
}

#[test]
fn duplicate_directory_tags_are_rejected() {
    let mut input = minimal_ttf();
    // overwrite the second directory entry's tag with the first one's
    let tag = input[12..16].to_vec();
    input[28..32].copy_from_slice(&tag);
    assert!(sanitize(&input).is_err());
}

#[test]
fn truncated_input_is_rejected() {
    let input = minimal_ttf();
    for length in [0, 4, 11, 40] {
        assert!(sanitize(&input[..length]).is_err());
    }
}

#[test]
fn self_referential_colr_glyph_is_accepted_and_idempotent() {
    // CPAL with two palette entries
    let mut cpal = WriteBuffer::new();
    U16Be::write(&mut cpal, 0u16).unwrap(); // version
    U16Be::write(&mut cpal, 2u16).unwrap(); // numPaletteEntries
    U16Be::write(&mut cpal, 1u16).unwrap(); // numPalettes
    U16Be::write(&mut cpal, 2u16).unwrap(); // numColorRecords
    U32Be::write(&mut cpal, 14u32).unwrap(); // colorRecordsArrayOffset
    U16Be::write(&mut cpal, 0u16).unwrap(); // colorRecordIndices[0]
    U32Be::write(&mut cpal, 0xFF0000FFu32).unwrap();
    U32Be::write(&mut cpal, 0x00FF00FFu32).unwrap();

    // COLRv1 with a PaintColrGlyph that references its own base glyph
    let mut colr = WriteBuffer::new();
    U16Be::write(&mut colr, 1u16).unwrap(); // version
    U16Be::write(&mut colr, 0u16).unwrap(); // numBaseGlyphRecords
    U32Be::write(&mut colr, 0u32).unwrap();
    U32Be::write(&mut colr, 0u32).unwrap();
    U16Be::write(&mut colr, 0u16).unwrap(); // numLayerRecords
    U32Be::write(&mut colr, 34u32).unwrap(); // baseGlyphListOffset
    U32Be::write(&mut colr, 0u32).unwrap(); // layerListOffset
    U32Be::write(&mut colr, 0u32).unwrap(); // clipListOffset
    U32Be::write(&mut colr, 0u32).unwrap(); // varIndexMapOffset
    U32Be::write(&mut colr, 0u32).unwrap(); // itemVariationStoreOffset
    // BaseGlyphList
    U32Be::write(&mut colr, 1u32).unwrap();
    U16Be::write(&mut colr, 1u16).unwrap(); // glyph 1
    U32Be::write(&mut colr, 10u32).unwrap(); // paint offset
    // PaintColrGlyph referencing glyph 1, its own base glyph
    U8::write(&mut colr, 11u8).unwrap();
    U16Be::write(&mut colr, 1u16).unwrap();

    let mut tables = vec![
        (tag::HEAD, head_bytes(IndexToLocFormat::Short)),
        (tag::MAXP, maxp_bytes(2, 0)),
        (tag::LOCA, loca_bytes_short(&[0, 0, 0])),
        (tag::GLYF, vec![0]),
        (tag::CMAP, cmap_bytes()),
        (tag::HHEA, hhea_bytes(1)),
        (tag::HMTX, hmtx_bytes(2, 1)),
        (tag::NAME, name_bytes()),
        (tag::POST, post_bytes()),
    ];
    tables.push((tag::CPAL, cpal.into_inner()));
    tables.push((tag::COLR, colr.into_inner()));
    let input = build_sfnt(0x00010000, &tables);

    let output = sanitize(&input).expect("COLR font rejected");
    assert_output_well_formed(&output);
    let again = sanitize(&output).unwrap();
    assert_eq!(output, again);
}

#[test]
fn woff_input_produces_same_sfnt() {
    let sfnt = minimal_ttf();
    let sfnt_output = sanitize(&sfnt).unwrap();

    // wrap the same tables in a WOFF container, uncompressed
    let scope = ReadScope::new(&sfnt);
    let offset_table = scope.read::<OffsetTable<'_>>().unwrap();
    let records: Vec<TableRecord> = offset_table.table_records.iter().collect();

    let mut w = WriteBuffer::new();
    U32Be::write(&mut w, 0x774F4646u32).unwrap(); // wOFF
    U32Be::write(&mut w, 0x00010000u32).unwrap(); // flavor
    U32Be::write(&mut w, 0u32).unwrap(); // length, not validated
    U16Be::write(&mut w, records.len() as u16).unwrap();
    U16Be::write(&mut w, 0u16).unwrap(); // reserved
    U32Be::write(&mut w, sfnt.len() as u32).unwrap();
    U16Be::write(&mut w, 0u16).unwrap();
    U16Be::write(&mut w, 0u16).unwrap();
    for _ in 0..5 {
        U32Be::write(&mut w, 0u32).unwrap(); // meta/priv fields
    }
    let mut offset = 44 + records.len() * 20;
    let mut entries = Vec::new();
    for record in &records {
        U32Be::write(&mut w, record.table_tag).unwrap();
        U32Be::write(&mut w, offset as u32).unwrap();
        U32Be::write(&mut w, record.length).unwrap(); // compLength
        U32Be::write(&mut w, record.length).unwrap(); // origLength
        U32Be::write(&mut w, 0u32).unwrap(); // origChecksum
        entries.push((record.offset as usize, record.length as usize));
        offset += long_align(record.length as usize);
    }
    for (table_offset, length) in entries {
        w.write_bytes(&sfnt[table_offset..table_offset + length]).unwrap();
        let padding = long_align(w.bytes_written()) - w.bytes_written();
        w.write_zeros(padding).unwrap();
    }
    let woff = w.into_inner();

    let woff_output = sanitize(&woff).expect("WOFF rejected");
    assert_eq!(woff_output, sfnt_output);
}
