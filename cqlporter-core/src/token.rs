//! Token ring model and range splitting
//!
//! Tokens are carried as `i128` so that both the Murmur3 partitioner
//! (64-bit signed space) and the Random partitioner (0..2^127) fit in
//! one representation. Ranges are half-open `(start, end]`; a range
//! whose end is not greater than its start wraps around the ring.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single token value in the partitioner's hash space
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Token(pub i128);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The cluster's partitioner, defining the token space bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Partitioner {
    /// 64-bit signed Murmur3 token space
    Murmur3,
    /// 127-bit unsigned MD5 token space
    Random,
}

impl Partitioner {
    /// Resolve a partitioner from its class name as reported by the driver
    pub fn from_name(name: &str) -> Result<Self> {
        if name.ends_with("Murmur3Partitioner") {
            Ok(Partitioner::Murmur3)
        } else if name.ends_with("RandomPartitioner") {
            Ok(Partitioner::Random)
        } else {
            Err(Error::token_range(format!(
                "Unsupported partitioner: {}",
                name
            )))
        }
    }

    /// Minimum token of the space
    pub fn min_token(&self) -> Token {
        match self {
            Partitioner::Murmur3 => Token(i128::from(i64::MIN)),
            Partitioner::Random => Token(-1),
        }
    }

    /// Maximum token of the space.
    ///
    /// The Random partitioner's nominal maximum of 2^127 exceeds what an
    /// `i128` can hold, so its space is clamped to `(-1, i128::MAX]`.
    pub fn max_token(&self) -> Token {
        match self {
            Partitioner::Murmur3 => Token(i128::from(i64::MAX)),
            Partitioner::Random => Token(i128::MAX),
        }
    }

    /// Number of distinct tokens in the space.
    ///
    /// Differences are taken with wrapping arithmetic: interpreted as
    /// unsigned two's complement they are exact for any span below 2^128.
    fn span(&self) -> u128 {
        self.max_token().0.wrapping_sub(self.min_token().0) as u128 + 1
    }

    /// Offset of a token from the minimum, in `0..span`
    fn offset(&self, token: Token) -> u128 {
        token.0.wrapping_sub(self.min_token().0) as u128
    }

    /// Token at the given offset from the minimum, modulo the span
    fn at_offset(&self, offset: u128) -> Token {
        let wrapped = offset % self.span();
        Token(self.min_token().0.wrapping_add(wrapped as i128))
    }
}

/// A half-open token range `(start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: Token,
    pub end: Token,
}

impl TokenRange {
    pub fn new(start: Token, end: Token) -> Self {
        Self { start, end }
    }

    /// Number of tokens covered, wraparound-aware.
    ///
    /// A range with `end <= start` wraps through the ring maximum; the
    /// degenerate `start == end` range covers the full ring.
    pub fn width(&self, partitioner: Partitioner) -> u128 {
        let start = partitioner.offset(self.start);
        let end = partitioner.offset(self.end);
        if end > start {
            end - start
        } else {
            partitioner.span() - (start - end)
        }
    }

    /// Split this range into `count` contiguous sub-ranges of even width.
    ///
    /// Widths are computed by linear interpolation; the remainder after
    /// even division is spread one token at a time over the leading
    /// sub-ranges. The sub-ranges tile this range exactly. When the
    /// range has fewer tokens than `count`, fewer sub-ranges come back.
    pub fn split(&self, count: usize, partitioner: Partitioner) -> Vec<TokenRange> {
        let width = self.width(partitioner);
        let count = (count as u128).min(width).max(1);
        let base = width / count;
        let remainder = width % count;

        let mut out = Vec::with_capacity(count as usize);
        let mut cursor = partitioner.offset(self.start);
        for i in 0..count {
            let step = if i < remainder { base + 1 } else { base };
            let next = cursor + step;
            out.push(TokenRange::new(
                partitioner.at_offset(cursor),
                partitioner.at_offset(next),
            ));
            cursor = next;
        }
        // Close the tiling exactly even under modulo arithmetic drift.
        if let Some(last) = out.last_mut() {
            last.end = self.end;
        }
        out
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.start, self.end)
    }
}

/// Splits the cluster's token ring into evenly sized sub-ranges for
/// parallel reads.
#[derive(Debug, Clone)]
pub struct TokenRangeSplitter {
    partitioner: Partitioner,
    ranges: Vec<TokenRange>,
}

impl TokenRangeSplitter {
    /// Create a splitter over the cluster's full set of token ranges
    pub fn new(partitioner: Partitioner, ranges: Vec<TokenRange>) -> Result<Self> {
        if ranges.is_empty() {
            return Err(Error::token_range(
                "Cluster metadata reported no token ranges",
            ));
        }
        Ok(Self {
            partitioner,
            ranges,
        })
    }

    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    /// Split the ring into at least `split_count` sub-ranges.
    ///
    /// Each input range contributes `ceil(split_count / range_count)`
    /// sub-ranges; the result is emitted in round-robin order across the
    /// input ranges so that consecutive statements land on different
    /// replicas. The union of the output equals the union of the input
    /// with no gaps or overlaps.
    pub fn split(&self, split_count: usize) -> Vec<TokenRange> {
        let range_count = self.ranges.len();
        let per_range = if split_count <= range_count {
            1
        } else {
            (split_count + range_count - 1) / range_count
        };

        let sublists: Vec<Vec<TokenRange>> = self
            .ranges
            .iter()
            .map(|r| r.split(per_range, self.partitioner))
            .collect();

        let mut out = Vec::with_capacity(range_count * per_range);
        for i in 0..per_range {
            for sublist in &sublists {
                if let Some(range) = sublist.get(i) {
                    out.push(*range);
                }
            }
        }
        out
    }
}
