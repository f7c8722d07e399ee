//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads in the plan's runtime.
    pub max_parallel_tasks: usize,

    /// Capacity of every bounded edge between plan nodes.
    pub channel_capacity: usize,

    /// Scans resume once the sink queue drains below this depth.
    pub backpressure_low: usize,

    /// Scans pause once the sink queue grows past this depth.
    pub backpressure_high: usize,

    /// Hard memory cap (in bytes) for blocking operator state.
    pub mem_cap_bytes: usize,

    /// Preferred rows per batch for generated sources. A hint only.
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: 4,
            channel_capacity: 16,
            backpressure_low: 4,
            backpressure_high: 16,
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            batch_size: 1024,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `QUIVER_MAX_PARALLEL_TASKS`: worker threads
    /// - `QUIVER_CHANNEL_CAPACITY`: edge capacity in batches
    /// - `QUIVER_BACKPRESSURE_LOW` / `QUIVER_BACKPRESSURE_HIGH`: sink watermarks
    /// - `QUIVER_MEM_CAP_BYTES`: memory cap in bytes
    /// - `QUIVER_BATCH_SIZE`: rows per generated batch
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        let read = |key: &str, slot: &mut usize| {
            if let Ok(s) = std::env::var(key) {
                if let Ok(v) = s.trim().parse::<usize>() {
                    *slot = v;
                }
            }
        };

        read("QUIVER_MAX_PARALLEL_TASKS", &mut cfg.max_parallel_tasks);
        read("QUIVER_CHANNEL_CAPACITY", &mut cfg.channel_capacity);
        read("QUIVER_BACKPRESSURE_LOW", &mut cfg.backpressure_low);
        read("QUIVER_BACKPRESSURE_HIGH", &mut cfg.backpressure_high);
        read("QUIVER_MEM_CAP_BYTES", &mut cfg.mem_cap_bytes);
        read("QUIVER_BATCH_SIZE", &mut cfg.batch_size);

        cfg
    }

    /// Parse a (possibly partial) JSON document; missing keys keep defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_tasks == 0 {
            return Err(Error::Config("max_parallel_tasks must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".into()));
        }
        self.backpressure()?;
        Ok(())
    }

    pub fn backpressure(&self) -> Result<BackpressureOptions> {
        BackpressureOptions::new(self.backpressure_low, self.backpressure_high)
    }
}

/// Hysteresis watermarks for the sink queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackpressureOptions {
    pub low_watermark: usize,
    pub high_watermark: usize,
}

impl BackpressureOptions {
    /// Requires `0 < low < high`.
    pub fn new(low_watermark: usize, high_watermark: usize) -> Result<Self> {
        if low_watermark == 0 || low_watermark >= high_watermark {
            return Err(Error::Config(format!(
                "backpressure watermarks need 0 < low < high, got low={low_watermark} high={high_watermark}"
            )));
        }
        Ok(Self {
            low_watermark,
            high_watermark,
        })
    }
}

impl Default for BackpressureOptions {
    fn default() -> Self {
        let cfg = EngineConfig::default();
        Self {
            low_watermark: cfg.backpressure_low,
            high_watermark: cfg.backpressure_high,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermarks_are_validated() {
        assert!(BackpressureOptions::new(4, 16).is_ok());
        assert!(matches!(BackpressureOptions::new(0, 16), Err(Error::Config(_))));
        assert!(matches!(BackpressureOptions::new(8, 8), Err(Error::Config(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(r#"{"channel_capacity": 2}"#).unwrap();
        assert_eq!(cfg.channel_capacity, 2);
        assert_eq!(cfg.max_parallel_tasks, 4);

        assert!(EngineConfig::from_json(r#"{"backpressure_low": 20}"#).is_err());
        assert!(matches!(EngineConfig::from_json("{"), Err(Error::Config(_))));
    }
}
