//! Command-line configuration.
//!
//! Flag names are camelCase rather than the kebab-case `clap` would
//! otherwise default to, matching the names operators already use in
//! deploy scripts and runbooks.

use clap::{Parser, ValueEnum};

use crate::cache::CacheOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServerType {
    Tcp,
    Http,
}

/// A distributed in-memory key/value cache node.
#[derive(Debug, Clone, Parser)]
#[command(name = "kafo", version, about)]
pub struct Config {
    /// This node's bind address.
    #[arg(long = "address", default_value = "127.0.0.1")]
    pub address: String,

    /// This node's bind port.
    #[arg(long = "port", default_value_t = 5837)]
    pub port: u16,

    /// Which wire protocol to serve: `tcp` (binary RPC) or `http` (REST).
    #[arg(long = "serverType", value_enum, default_value_t = ServerType::Tcp)]
    pub server_type: ServerType,

    /// Comma-separated seed addresses. Empty means seed a new cluster with
    /// just this node.
    #[arg(long = "cluster", default_value = "")]
    pub cluster: String,

    /// Virtual ring points per physical node.
    #[arg(long = "virtualNodeCount", default_value_t = 1024)]
    pub virtual_node_count: usize,

    /// Seconds between ring refreshes.
    #[arg(long = "updateCircleDuration", default_value_t = 3)]
    pub update_circle_duration: u64,

    /// Maximum total key+value bytes, in gigabytes.
    #[arg(long = "maxEntrySize", default_value_t = 4)]
    pub max_entry_size: i64,

    /// Max expired entries a single gc pass deletes per segment.
    #[arg(long = "maxGcCount", default_value_t = 1000)]
    pub max_gc_count: usize,

    /// Minutes between background gc sweeps.
    #[arg(long = "gcDuration", default_value_t = 60)]
    pub gc_duration: u64,

    /// Path of the snapshot file.
    #[arg(long = "dumpFile", default_value = "kafo.dump")]
    pub dump_file: String,

    /// Minutes between background snapshot writes.
    #[arg(long = "dumpDuration", default_value_t = 30)]
    pub dump_duration: u64,

    /// Initial capacity hint for each segment's entry map.
    #[arg(long = "mapSizeOfSegment", default_value_t = 256)]
    pub map_size_of_segment: usize,

    /// Number of segments; must be a power of two.
    #[arg(long = "segmentSize", default_value_t = 1024)]
    pub segment_size: usize,

    /// Microseconds to sleep between spins on the snapshot gate.
    #[arg(long = "casSleepTime", default_value_t = 100)]
    pub cas_sleep_time: u64,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn seeds(&self) -> Vec<String> {
        self.cluster
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            max_entry_bytes: self.max_entry_size * 1024 * 1024 * 1024,
            segment_count: self.segment_size,
            map_size_of_segment: self.map_size_of_segment,
            max_gc_count: self.max_gc_count,
            gc_duration_minutes: self.gc_duration,
            dump_duration_minutes: self.dump_duration,
            dump_file: self.dump_file.clone(),
            cas_sleep_micros: self.cas_sleep_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_splits_and_trims_and_drops_blanks() {
        let mut config = Config::parse_from(["kafo"]);
        config.cluster = " 10.0.0.1:5837, 10.0.0.2:5837,".to_string();
        assert_eq!(
            config.seeds(),
            vec!["10.0.0.1:5837".to_string(), "10.0.0.2:5837".to_string()]
        );
    }

    #[test]
    fn empty_cluster_flag_yields_no_seeds() {
        let config = Config::parse_from(["kafo"]);
        assert!(config.seeds().is_empty());
    }

    #[test]
    fn cache_options_converts_gb_to_true_bytes() {
        let config = Config::parse_from(["kafo", "--maxEntrySize", "2"]);
        assert_eq!(config.cache_options().max_entry_bytes, 2 * 1024 * 1024 * 1024);
    }
}
