//! Top-level font container dispatch.
//!
//! Recognizes sfnt, TrueType collection, WOFF and WOFF2 input and exposes a
//! uniform [FontTableProvider] over the selected font's tables.

use std::borrow::Cow;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::ParseError;
use crate::tables::{
    FontTableProvider, OpenTypeFont, SfntVersion, CFF_MAGIC, TTCF_MAGIC, TTF_MAGIC,
};
use crate::woff::{self, WoffFont};
use crate::woff2;
use crate::tag;

/// Type that can represent any of the supported font formats.
pub enum FontData<'a> {
    OpenType(OpenTypeFont<'a>),
    Woff(WoffFont<'a>),
    /// WOFF2 input is recognized but must be decompressed by a collaborator.
    Woff2(woff2::Woff2Header),
}

/// Generic implementation of the `FontTableProvider` trait
pub struct DynamicFontTableProvider<'a> {
    sfnt_version: u32,
    provider: Box<dyn FontTableProvider + 'a>,
}

impl<'b> ReadBinary for FontData<'b> {
    type HostType<'a> = FontData<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let mut peek = ctxt.clone();
        let magic = peek.read_u32be()?;
        match magic {
            TTF_MAGIC | CFF_MAGIC | tag::TRUE | tag::TYP1 | TTCF_MAGIC => {
                Ok(FontData::OpenType(OpenTypeFont::read(ctxt)?))
            }
            woff::MAGIC => Ok(FontData::Woff(WoffFont::read(ctxt)?)),
            woff2::MAGIC => Ok(FontData::Woff2(woff2::Woff2Header::read(ctxt)?)),
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> FontTableProvider for DynamicFontTableProvider<'a> {
    fn table_data<'b>(&'b self, tag: u32) -> Result<Option<Cow<'b, [u8]>>, ParseError> {
        self.provider.table_data(tag)
    }

    fn has_table(&self, tag: u32) -> bool {
        self.provider.has_table(tag)
    }

    fn table_tags(&self) -> Vec<u32> {
        self.provider.table_tags()
    }
}

impl<'a> SfntVersion for DynamicFontTableProvider<'a> {
    fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }
}

impl<'a> FontData<'a> {
    /// The number of fonts contained. 1 unless this is a collection.
    pub fn num_fonts(&self) -> usize {
        match self {
            FontData::OpenType(font) => font.num_fonts(),
            FontData::Woff(_) | FontData::Woff2(_) => 1,
        }
    }

    /// Obtain an implementation of `FontTableProvider` for the font at `index`.
    pub fn table_provider(
        &'a self,
        index: usize,
    ) -> Result<DynamicFontTableProvider<'a>, ParseError> {
        match self {
            FontData::OpenType(font) => {
                let provider = font.table_provider(index)?;
                Ok(DynamicFontTableProvider {
                    sfnt_version: provider.sfnt_version(),
                    provider: Box::new(provider),
                })
            }
            FontData::Woff(font) => {
                if index != 0 {
                    return Err(ParseError::BadIndex);
                }
                // This clone is cheap as WoffFont is mostly borrowed data
                Ok(DynamicFontTableProvider {
                    sfnt_version: font.sfnt_version(),
                    provider: Box::new(font.clone()),
                })
            }
            FontData::Woff2(_) => Err(ParseError::Unsupported),
        }
    }
}
