//! Front/back pairing of duplex scan output.
//!
//! The feeder emits pages in physical order: front of sheet one, back of sheet
//! one, front of sheet two and so on. Physical order is recovered from the file
//! names alone. The scan tool numbers its output with a zero padded counter
//! (`scan_0001.jpg`, `scan_0002.jpg`, ...), so sorting names lexicographically
//! is sorting by page number. Modification times are never consulted; their
//! granularity is too coarse on some filesystems to order a fast feeder.

use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Front => "Front",
            Side::Back => "Back",
        }
    }
}

/// One sheet: always a front, a back unless the sheet was the odd last page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePair<T> {
    pub front: T,
    pub back: Option<T>,
}

impl<T> PagePair<T> {
    pub fn front_only(front: T) -> Self {
        Self { front, back: None }
    }

    /// Present sides in page order.
    pub fn sides(&self) -> impl Iterator<Item = (Side, &T)> + '_ {
        std::iter::once((Side::Front, &self.front))
            .chain(self.back.as_ref().map(|back| (Side::Back, back)))
    }
}

/// Sorts page files into scan order by file name.
pub fn sort_pages(pages: &mut [PathBuf]) {
    pages.sort_by_key(|p| p.file_name().map(OsString::from).unwrap_or_default());
}

/// Groups already ordered pages two at a time. A trailing odd page becomes a
/// front-only pair; nothing is ever dropped.
pub fn pair_pages<T>(pages: Vec<T>) -> Vec<PagePair<T>> {
    let mut pairs = Vec::with_capacity(pages.len().div_ceil(2));
    let mut iter = pages.into_iter();
    while let Some(front) = iter.next() {
        pairs.push(PagePair {
            front,
            back: iter.next(),
        });
    }
    pairs
}
