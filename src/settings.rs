//! Parser limits, consulted by every state that accumulates bytes.
//!
//! `Settings` only carries the *typed destination* for these values —
//! reading them from a config file or environment is an external
//! concern this crate doesn't touch.

/// Default inline entity body limit: 8 MiB.
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 8 * 1024 * 1024;
/// Default single chunk size limit: 1 MiB.
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 1024 * 1024;

/// Limits enforced while parsing a single message.
///
/// Immutable once built and freely `Clone`/`Copy`-shared across parser
/// instances and connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    pub max_uri_len: usize,
    pub max_reason_len: usize,
    pub max_header_name_len: usize,
    pub max_header_value_len: usize,
    pub max_header_count: usize,
    pub max_content_length: u64,
    pub max_chunk_ext_len: usize,
    pub max_chunk_size: u64,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            max_uri_len: 2048,
            max_reason_len: 64,
            max_header_name_len: 64,
            max_header_value_len: 8192,
            max_header_count: 64,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_chunk_ext_len: 256,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

/// Builder for `Settings`, so callers can override a handful of limits
/// without naming every field.
#[derive(Clone, Copy, Debug, Default)]
pub struct SettingsBuilder(Settings);

impl SettingsBuilder {
    pub fn new() -> SettingsBuilder {
        SettingsBuilder(Settings::default())
    }

    pub fn max_uri_len(mut self, v: usize) -> Self { self.0.max_uri_len = v; self }
    pub fn max_reason_len(mut self, v: usize) -> Self { self.0.max_reason_len = v; self }
    pub fn max_header_name_len(mut self, v: usize) -> Self { self.0.max_header_name_len = v; self }
    pub fn max_header_value_len(mut self, v: usize) -> Self { self.0.max_header_value_len = v; self }
    pub fn max_header_count(mut self, v: usize) -> Self { self.0.max_header_count = v; self }
    pub fn max_content_length(mut self, v: u64) -> Self { self.0.max_content_length = v; self }
    pub fn max_chunk_ext_len(mut self, v: usize) -> Self { self.0.max_chunk_ext_len = v; self }
    pub fn max_chunk_size(mut self, v: u64) -> Self { self.0.max_chunk_size = v; self }

    pub fn build(self) -> Settings {
        self.0
    }
}
