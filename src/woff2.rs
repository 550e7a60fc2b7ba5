//! The WOFF2 interface boundary.
//!
//! Brotli decompression and glyf/loca reconstruction are a collaborator's
//! concern; this module only recognizes the `wOF2` signature and accepts
//! already-reconstructed sfnt bytes from the caller. Sanitizing a WOFF2 font
//! is therefore a two-step affair: decompress externally, then run the
//! reconstructed sfnt through [crate::sanitize].

use crate::binary::read::ReadCtxt;
use crate::error::ParseError;

/// The magic number identifying a WOFF2 file: 'wOF2'
pub const MAGIC: u32 = 0x774F4632;

/// Minimal WOFF2 header facts, read to report a useful error.
#[derive(Clone, Debug)]
pub struct Woff2Header {
    pub flavor: u32,
    pub length: u32,
    pub num_tables: u16,
    pub total_sfnt_size: u32,
    pub total_compressed_size: u32,
}

impl Woff2Header {
    pub(crate) fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Woff2Header, ParseError> {
        let signature = ctxt.read_u32be()?;
        if signature != MAGIC {
            return Err(ParseError::BadVersion);
        }
        let flavor = ctxt.read_u32be()?;
        let length = ctxt.read_u32be()?;
        let num_tables = ctxt.read_u16be()?;
        let reserved = ctxt.read_u16be()?;
        ctxt.check(reserved == 0)?;
        let total_sfnt_size = ctxt.read_u32be()?;
        let total_compressed_size = ctxt.read_u32be()?;

        Ok(Woff2Header {
            flavor,
            length,
            num_tables,
            total_sfnt_size,
            total_compressed_size,
        })
    }
}
