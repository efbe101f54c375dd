//! Byte-offset spans into module source text.

use serde::{Deserialize, Serialize};

/// Half-open byte range of a specifier string literal (quotes included).
///
/// The transpiler splices rewritten specifiers over these ranges, which is
/// what keeps plain-JavaScript output line-preserving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: u32,
    pub end: u32,
}

impl SourceSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}
