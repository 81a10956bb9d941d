// src/utils/constants.rs

/// Street similarity (token longest common subsequence ratio) a fuzzy-street candidate must exceed.
pub const FUZZY_STREET_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Maximum distance in meters between a source point and a reference without a
/// street name for the pair to count as a fuzzy-street match.
pub const UNNAMED_STREET_MATCH_RADIUS_METERS: f64 = 50.0;

/// Records of one logical address closer than this many meters are merged by
/// centroid averaging.
pub const DUPLICATE_CLUSTER_THRESHOLD_METERS: f64 = 25.0;

/// Longest value a single tag may hold on output; longer `addr:flats` values are
/// continued in `addr:flats2`, `addr:flats3`, ...
pub const MAX_TAG_VALUE_LENGTH: usize = 255;

/// Ranges spanning more members than this are not expanded during unit encoding
/// and pass through as literal tokens.
pub const MAX_EXPANDED_RANGE: u64 = 10_000;
