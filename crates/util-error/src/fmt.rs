// SPDX-License-Identifier: MIT

use std::error::Error;
use std::fmt;

/// Display an error and its whole source chain on a single line
///
/// Meant for log fields, where multi-line backtrace-style output
/// is unreadable.
pub struct Compact<'e, E>(&'e E);

impl<E> fmt::Display for Compact<'_, E>
where
    E: Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

pub trait FmtCompact {
    fn fmt_compact(&self) -> Compact<'_, Self>
    where
        Self: Sized;
}

impl<E> FmtCompact for E
where
    E: Error,
{
    fn fmt_compact(&self) -> Compact<'_, Self> {
        Compact(self)
    }
}
