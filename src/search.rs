//! Searches a byte image for every occurrence of a needle

/// Returns an iterator over each offset at which `needle` occurs in `haystack`.
///
/// Overlapping occurrences are reported individually, so `aa` occurs twice in `aaa`.
pub fn occurrences<'a>(haystack: &'a [u8], needle: &'a [u8]) -> Occurrences<'a> {
    Occurrences::new(haystack, needle)
}

/// Outcome of scanning an image for a needle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// The needle does not occur
    None,
    /// The needle occurs exactly once, at this offset
    Unique(usize),
    /// The needle occurs more than once, at these offsets
    Multiple(Vec<usize>),
}

impl Match {
    /// Number of occurrences found
    pub fn count(&self) -> usize {
        match self {
            Match::None => 0,
            Match::Unique(_) => 1,
            Match::Multiple(offsets) => offsets.len(),
        }
    }
}

/// Scans `haystack` and classifies how often `needle` occurs
pub fn scan(haystack: &[u8], needle: &[u8]) -> Match {
    let mut iter = occurrences(haystack, needle);
    let first = match iter.next() {
        Some(offset) => offset,
        None => return Match::None,
    };
    match iter.next() {
        None => Match::Unique(first),
        Some(second) => {
            let mut offsets = vec![first, second];
            offsets.extend(iter);
            Match::Multiple(offsets)
        }
    }
}

/// An iterator over needle offsets in a haystack.
pub struct Occurrences<'a> {
    /// Bytes being searched
    haystack: &'a [u8],
    /// Bytes being searched for
    needle: &'a [u8],
    /// Next offset to test
    current: usize,
}

impl<'a> Occurrences<'a> {
    /// Creates a new iterator starting at offset 0
    fn new(haystack: &'a [u8], needle: &'a [u8]) -> Self {
        Occurrences {
            haystack,
            needle,
            current: 0,
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = usize;

    /// Returns the next offset at or after the current position
    fn next(&mut self) -> Option<Self::Item> {
        let (first, rest) = self.needle.split_first()?;

        while self.current + self.needle.len() <= self.haystack.len() {
            // Jump straight to the next candidate first byte
            let window = &self.haystack[self.current..=self.haystack.len() - self.needle.len()];
            let candidate = self.current + window.iter().position(|b| b == first)?;

            // Overlapping matches are allowed, so only step one byte past the candidate
            self.current = candidate + 1;

            let tail = candidate + 1;
            if &self.haystack[tail..tail + rest.len()] == rest {
                return Some(candidate);
            }
        }

        None
    }
}
