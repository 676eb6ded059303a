//! Plain `serde`-derived settings, loaded from TOML (spec §11 ambient
//! configuration), the way `buck2_re_configuration`'s config structs are
//! plain data with no CLI flag grammar attached -- the flag grammar
//! itself is a spec.md Non-goal, so parsing one is left to whatever
//! embeds this crate.

use serde::Deserialize;
use serde::Serialize;

use bonanza_treebuilder::ChunkerParams;

/// Object-size budgets, chunker parameters, shard count, and cache
/// capacity for one embedding of the computer (spec §11).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BonanzaConfig {
    /// Target encoded size, in bytes, of one B-tree node object (spec
    /// §4.5; see `ChunkerParams::target_object_bytes`).
    pub chunker_target_object_bytes: usize,
    /// Hard ceiling on one node object's encoded size.
    pub chunker_max_object_bytes: usize,
    /// Number of storage shards a reference's hash is distributed over
    /// (`bonanza_storage::sharding`).
    pub shard_count: usize,
    /// Total decoded-size budget, in bytes, for the process-wide
    /// `bonanza_object_cache::ParsedObjectCache` (spec §4.4).
    pub parsed_object_cache_capacity_bytes: usize,
}

impl Default for BonanzaConfig {
    fn default() -> Self {
        let chunker = ChunkerParams::default();
        BonanzaConfig {
            chunker_target_object_bytes: chunker.target_object_bytes,
            chunker_max_object_bytes: chunker.max_object_bytes,
            shard_count: 16,
            parsed_object_cache_capacity_bytes: 64 << 20,
        }
    }
}

impl BonanzaConfig {
    /// Parses a config from its TOML text. Unset fields fall back to
    /// [`BonanzaConfig::default`] (`#[serde(default)]` above), so a
    /// caller only needs to mention the settings it wants to override.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn chunker_params(&self) -> ChunkerParams {
        ChunkerParams {
            target_object_bytes: self.chunker_target_object_bytes,
            max_object_bytes: self.chunker_max_object_bytes,
        }
    }
}
