//! Reward stream ledger
//!
//! A stream is an ordered, gap-free sequence of reward-rate segments. Segment
//! `i` pays `rate_per_block` over the half-open block range
//! `(previous_end, end_block]`, where the first segment's `previous_end` is
//! the ledger genesis block (the first segment is retroactive to genesis).
//!
//! Queries answer "total reward over `(from, to]`". State-changing callers use
//! the cursored variant: since their `from` never moves backwards, the cursor
//! skips fully consumed segments and the whole call sequence is amortized
//! O(1) per call. Read-only views use a plain scan and never touch the
//! cursor.

use crate::error::{Result, StakingError};
use kedge_core::{Amount, BlockNumber};
use serde::{Deserialize, Serialize};

/// One reward-rate segment of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSegment {
    pub rate_per_block: Amount,
    pub end_block: BlockNumber,
}

/// Memo of the most recently consumed position in a stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCursor {
    pub last_index: usize,
    pub last_block: BlockNumber,
}

/// One append-only reward stream
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardStream {
    start_block: BlockNumber,
    segments: Vec<RewardSegment>,
    cursor: StreamCursor,
}

impl RewardStream {
    fn new(start_block: BlockNumber) -> Self {
        Self {
            start_block,
            segments: Vec::new(),
            cursor: StreamCursor {
                last_index: 0,
                last_block: start_block,
            },
        }
    }

    /// Block at which segment `index` starts paying (exclusive bound)
    fn segment_start(&self, index: usize) -> BlockNumber {
        if index == 0 {
            self.start_block
        } else {
            self.segments[index - 1].end_block
        }
    }

    /// End block of the last segment, or the stream start when empty
    pub fn last_end(&self) -> BlockNumber {
        self.segments
            .last()
            .map(|segment| segment.end_block)
            .unwrap_or(self.start_block)
    }

    pub fn segments(&self) -> &[RewardSegment] {
        &self.segments
    }

    pub fn cursor(&self) -> StreamCursor {
        self.cursor
    }

    /// Total reward over `(from, to]`, scanning from `start_index`.
    /// Returns the reward and the index of the first segment not fully
    /// consumed by `to`.
    fn scan(&self, start_index: usize, from: BlockNumber, to: BlockNumber) -> (Amount, usize) {
        let mut total: Amount = 0;
        let mut next_index = start_index;

        for index in start_index..self.segments.len() {
            let segment = &self.segments[index];
            let lo = self.segment_start(index).max(from);
            let hi = segment.end_block.min(to);
            if hi > lo {
                total += segment.rate_per_block * (hi - lo) as Amount;
            }
            if segment.end_block > to {
                return (total, index);
            }
            next_index = index + 1;
        }

        (total, next_index)
    }

    /// Read-only range query; does not move the cursor
    pub fn reward_in_range(&self, from: BlockNumber, to: BlockNumber) -> Amount {
        self.scan(0, from, to).0
    }

    /// Range query that advances the cursor. Correct for any `from`; only a
    /// monotonically non-decreasing `from` keeps the amortization.
    pub fn reward_in_range_advancing(&mut self, from: BlockNumber, to: BlockNumber) -> Amount {
        let start_index = if from >= self.cursor.last_block {
            self.cursor.last_index
        } else {
            0
        };
        let (total, next_index) = self.scan(start_index, from, to);
        if to >= self.cursor.last_block {
            self.cursor = StreamCursor {
                last_index: next_index,
                last_block: to,
            };
        }
        total
    }
}

/// All reward streams of one ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamBook {
    genesis_block: BlockNumber,
    streams: Vec<RewardStream>,
}

impl StreamBook {
    pub fn new(genesis_block: BlockNumber) -> Self {
        Self {
            genesis_block,
            streams: Vec::new(),
        }
    }

    /// Validate a prospective segment and return its escrow budget
    /// (`rate × (end − previous_end)`) without mutating anything.
    ///
    /// `stream_index == stream_count` opens a new stream; a larger index is a
    /// skip and fails.
    pub fn segment_budget(
        &self,
        stream_index: usize,
        rate_per_block: Amount,
        end_block: BlockNumber,
    ) -> Result<Amount> {
        let count = self.streams.len();
        if stream_index > count {
            return Err(StakingError::SkippedStreamIndex {
                expected: count,
                got: stream_index,
            });
        }
        let previous_end = if stream_index == count {
            self.genesis_block
        } else {
            self.streams[stream_index].last_end()
        };
        if end_block <= previous_end {
            return Err(StakingError::InvalidSegmentBounds {
                end_block,
                previous_end,
            });
        }
        Ok(rate_per_block * (end_block - previous_end) as Amount)
    }

    /// Append a segment, opening the stream if `stream_index` is the next
    /// free one. Returns the escrow budget of the appended segment.
    pub fn add_segment(
        &mut self,
        stream_index: usize,
        rate_per_block: Amount,
        end_block: BlockNumber,
    ) -> Result<Amount> {
        let budget = self.segment_budget(stream_index, rate_per_block, end_block)?;
        if stream_index == self.streams.len() {
            self.streams.push(RewardStream::new(self.genesis_block));
        }
        self.streams[stream_index].segments.push(RewardSegment {
            rate_per_block,
            end_block,
        });
        Ok(budget)
    }

    /// Total reward over `(from, to]` across all streams (read-only)
    pub fn total_reward_in_range(&self, from: BlockNumber, to: BlockNumber) -> Amount {
        self.streams
            .iter()
            .map(|stream| stream.reward_in_range(from, to))
            .sum()
    }

    /// Cursor-advancing variant for state-changing operations
    pub fn total_reward_in_range_advancing(
        &mut self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Amount {
        self.streams
            .iter_mut()
            .map(|stream| stream.reward_in_range_advancing(from, to))
            .sum()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream(&self, index: usize) -> Option<&RewardStream> {
        self.streams.get(index)
    }
}
