#![deny(missing_docs)]

//! Caller-supplied policy and diagnostics for a sanitize run.

use std::fmt;

use crate::tag;

/// Severity of a diagnostic message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum MessageLevel {
    /// The condition aborts the sanitize run.
    Error,
    /// The condition was tolerated or repaired.
    Warning,
}

/// What to do with a table identified by its tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TableAction {
    /// Run the built-in parser/sanitizer for the tag, dropping unrecognized tables.
    Default,
    /// Copy the table bytes through without structural validation.
    Passthru,
    /// Exclude the table from the output.
    Drop,
    /// Alias for `Default`.
    Sanitize,
}

/// Callback surface threaded through a sanitize run.
///
/// The message sink is the only diagnostic channel; parsers report the failing
/// table and the abstract reason through it before returning an error. The
/// per-tag action hook and the feature flags replace the process-wide globals
/// of older sanitizers so that concurrent runs with different policies do not
/// interfere.
pub trait SanitizeContext {
    /// Receive a diagnostic message.
    fn message(&mut self, level: MessageLevel, args: fmt::Arguments<'_>);

    /// Decide how to treat the table with the given tag.
    fn table_action(&self, tag: u32) -> TableAction {
        let _ = tag;
        TableAction::Default
    }

    /// Whether WOFF2 input (pre-decompressed by a collaborator) is accepted.
    fn woff2_enabled(&self) -> bool {
        false
    }

    /// Whether `CBDT`/`CBLC` color bitmap tables are dropped from the output.
    fn drop_color_bitmap_tables(&self) -> bool {
        false
    }
}

/// Returns true for the Graphite tables this sanitizer does not parse.
pub fn is_graphite_tag(tag: u32) -> bool {
    matches!(
        tag,
        tag::SILF | tag::SILL | tag::GLOC | tag::GLAT | tag::FEAT_GR
    )
}

/// Default context: diagnostics forwarded to [`log`], Graphite tables dropped,
/// all flags off.
#[derive(Debug, Default, Copy, Clone)]
pub struct DefaultContext;

impl SanitizeContext for DefaultContext {
    fn message(&mut self, level: MessageLevel, args: fmt::Arguments<'_>) {
        match level {
            MessageLevel::Error => log::error!("{}", args),
            MessageLevel::Warning => log::warn!("{}", args),
        }
    }

    fn table_action(&self, tag: u32) -> TableAction {
        if is_graphite_tag(tag) {
            TableAction::Drop
        } else {
            TableAction::Default
        }
    }
}

/// Report a warning through the context.
macro_rules! sanitize_warn {
    ($ctxt:expr, $($arg:tt)*) => {
        $ctxt.message($crate::context::MessageLevel::Warning, format_args!($($arg)*))
    };
}

/// Report an error through the context.
macro_rules! sanitize_error {
    ($ctxt:expr, $($arg:tt)*) => {
        $ctxt.message($crate::context::MessageLevel::Error, format_args!($($arg)*))
    };
}

pub(crate) use {sanitize_error, sanitize_warn};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_drops_graphite() {
        let ctxt = DefaultContext;
        assert_eq!(ctxt.table_action(tag::SILF), TableAction::Drop);
        assert_eq!(ctxt.table_action(tag::GLAT), TableAction::Drop);
        assert_eq!(ctxt.table_action(tag::GLYF), TableAction::Default);
    }

    #[test]
    fn default_context_flags_off() {
        let ctxt = DefaultContext;
        assert!(!ctxt.woff2_enabled());
        assert!(!ctxt.drop_color_bitmap_tables());
    }
}
