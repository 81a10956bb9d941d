// src/utils/config.rs - Tunables for the conflation and reduction stages
use std::env;

use log::info;

use crate::utils::constants::{
    DUPLICATE_CLUSTER_THRESHOLD_METERS, FUZZY_STREET_SIMILARITY_THRESHOLD, MAX_TAG_VALUE_LENGTH,
    UNNAMED_STREET_MATCH_RADIUS_METERS,
};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflationConfig {
    /// A fuzzy-street candidate's street similarity must be strictly above this.
    pub fuzzy_street_threshold: f64,
    /// Radius in meters for matching references that carry no street name.
    pub unnamed_street_radius_m: f64,
}

impl Default for ConflationConfig {
    fn default() -> Self {
        Self {
            fuzzy_street_threshold: FUZZY_STREET_SIMILARITY_THRESHOLD,
            unnamed_street_radius_m: UNNAMED_STREET_MATCH_RADIUS_METERS,
        }
    }
}

impl ConflationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fuzzy_street_threshold: env_or(
                "CONFLATE_FUZZY_STREET_THRESHOLD",
                defaults.fuzzy_street_threshold,
            ),
            unnamed_street_radius_m: env_or(
                "CONFLATE_UNNAMED_STREET_RADIUS_M",
                defaults.unnamed_street_radius_m,
            ),
        }
    }

    pub fn log_config(&self) {
        info!("🧭 Conflation configuration");
        info!("   Fuzzy street similarity threshold: > {:.2}", self.fuzzy_street_threshold);
        info!("   Unnamed street match radius: {:.1} m", self.unnamed_street_radius_m);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReductionConfig {
    /// Records of one logical address closer than this are merged.
    pub duplicate_threshold_m: f64,
    /// Keep the per-cluster representatives of unresolved duplicate groups in
    /// the main output instead of only sending them to review.
    pub keep_unresolved_clusters: bool,
    /// Require odd/even parity agreement when testing range membership.
    pub match_parity: bool,
    pub max_tag_value_length: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold_m: DUPLICATE_CLUSTER_THRESHOLD_METERS,
            keep_unresolved_clusters: false,
            match_parity: false,
            max_tag_value_length: MAX_TAG_VALUE_LENGTH,
        }
    }
}

impl ReductionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            duplicate_threshold_m: env_or("REDUCE_DUPLICATE_THRESHOLD_M", defaults.duplicate_threshold_m),
            keep_unresolved_clusters: env_or(
                "REDUCE_KEEP_UNRESOLVED_CLUSTERS",
                defaults.keep_unresolved_clusters,
            ),
            match_parity: env_or("REDUCE_MATCH_PARITY", defaults.match_parity),
            max_tag_value_length: env_or("REDUCE_MAX_TAG_VALUE_LENGTH", defaults.max_tag_value_length),
        }
    }

    pub fn log_config(&self) {
        info!("🧹 Reduction configuration");
        info!("   Duplicate cluster threshold: {:.1} m", self.duplicate_threshold_m);
        if self.keep_unresolved_clusters {
            info!("   Unresolved duplicate clusters are KEPT in the output");
        } else {
            info!("   Unresolved duplicate clusters go to review only");
        }
        info!(
            "   Range parity matching {}",
            if self.match_parity { "ENABLED" } else { "DISABLED" }
        );
        info!("   Tag values split beyond {} characters", self.max_tag_value_length);
    }
}
