use crate::dispatch::gate::{
    BackpressureGate, DEFAULT_MAX_HELD_LOCKS, DEFAULT_MAX_IN_FLIGHT_PROCESSING,
};
use anyhow::{bail, Result};
use std::time::Duration;

/// Upper bound on ids per app access-token batch.
pub const MAX_APP_TOKEN_BATCH: usize = 200;
/// Upper bound on ids per package access-token batch.
pub const MAX_PACKAGE_TOKEN_BATCH: usize = 1_000;
/// Upper bound on ids per metadata-only product-info batch.
pub const MAX_METADATA_BATCH: usize = 10_000;

const DEFAULT_TOKEN_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_METADATA_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_ENUMERATE_APP_HEADROOM: u32 = 50_000;
const DEFAULT_ENUMERATE_PACKAGE_HEADROOM: u32 = 10_000;

/// Runtime configuration for the sync pipeline.
///
/// All instances must be constructed via [`SyncConfig::builder`] or [`SyncConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    app_token_batch_size: usize,
    package_token_batch_size: usize,
    metadata_batch_size: usize,
    token_poll_interval: Duration,
    metadata_poll_interval: Duration,
    enumerate_app_headroom: u32,
    enumerate_package_headroom: u32,
    max_in_flight_processing: usize,
    max_held_locks: usize,
}

pub struct SyncConfigParams {
    pub app_token_batch_size: usize,
    pub package_token_batch_size: usize,
    pub metadata_batch_size: usize,
    pub token_poll_interval: Duration,
    pub metadata_poll_interval: Duration,
    pub enumerate_app_headroom: u32,
    pub enumerate_package_headroom: u32,
    pub max_in_flight_processing: usize,
    pub max_held_locks: usize,
}

impl Default for SyncConfigParams {
    fn default() -> Self {
        Self {
            app_token_batch_size: MAX_APP_TOKEN_BATCH,
            package_token_batch_size: MAX_PACKAGE_TOKEN_BATCH,
            metadata_batch_size: MAX_METADATA_BATCH,
            token_poll_interval: Duration::from_millis(DEFAULT_TOKEN_POLL_INTERVAL_MS),
            metadata_poll_interval: Duration::from_millis(DEFAULT_METADATA_POLL_INTERVAL_MS),
            enumerate_app_headroom: DEFAULT_ENUMERATE_APP_HEADROOM,
            enumerate_package_headroom: DEFAULT_ENUMERATE_PACKAGE_HEADROOM,
            max_in_flight_processing: DEFAULT_MAX_IN_FLIGHT_PROCESSING,
            max_held_locks: DEFAULT_MAX_HELD_LOCKS,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        let SyncConfigParams {
            app_token_batch_size,
            package_token_batch_size,
            metadata_batch_size,
            token_poll_interval,
            metadata_poll_interval,
            enumerate_app_headroom,
            enumerate_package_headroom,
            max_in_flight_processing,
            max_held_locks,
        } = SyncConfigParams::default();

        Self {
            app_token_batch_size,
            package_token_batch_size,
            metadata_batch_size,
            token_poll_interval,
            metadata_poll_interval,
            enumerate_app_headroom,
            enumerate_package_headroom,
            max_in_flight_processing,
            max_held_locks,
        }
    }
}

impl SyncConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values, running validation.
    pub fn new(params: SyncConfigParams) -> Result<Self> {
        let SyncConfigParams {
            app_token_batch_size,
            package_token_batch_size,
            metadata_batch_size,
            token_poll_interval,
            metadata_poll_interval,
            enumerate_app_headroom,
            enumerate_package_headroom,
            max_in_flight_processing,
            max_held_locks,
        } = params;

        let config = Self {
            app_token_batch_size,
            package_token_batch_size,
            metadata_batch_size,
            token_poll_interval,
            metadata_poll_interval,
            enumerate_app_headroom,
            enumerate_package_headroom,
            max_in_flight_processing,
            max_held_locks,
        };

        config.validate()?;
        Ok(config)
    }

    /// App ids per access-token batch.
    pub fn app_token_batch_size(&self) -> usize {
        self.app_token_batch_size
    }

    /// Package ids per access-token batch.
    pub fn package_token_batch_size(&self) -> usize {
        self.package_token_batch_size
    }

    /// Ids per metadata-only product-info batch.
    pub fn metadata_batch_size(&self) -> usize {
        self.metadata_batch_size
    }

    /// Gate poll interval after each token batch.
    pub fn token_poll_interval(&self) -> Duration {
        self.token_poll_interval
    }

    /// Gate poll interval after each metadata batch.
    pub fn metadata_poll_interval(&self) -> Duration {
        self.metadata_poll_interval
    }

    /// Ids enumerated past the highest known app id.
    pub fn enumerate_app_headroom(&self) -> u32 {
        self.enumerate_app_headroom
    }

    /// Ids enumerated past the highest known package id.
    pub fn enumerate_package_headroom(&self) -> u32 {
        self.enumerate_package_headroom
    }

    pub fn gate(&self) -> BackpressureGate {
        BackpressureGate::new(self.max_in_flight_processing, self.max_held_locks)
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        ensure_batch_size(
            self.app_token_batch_size,
            MAX_APP_TOKEN_BATCH,
            "app_token_batch_size",
        )?;
        ensure_batch_size(
            self.package_token_batch_size,
            MAX_PACKAGE_TOKEN_BATCH,
            "package_token_batch_size",
        )?;
        ensure_batch_size(
            self.metadata_batch_size,
            MAX_METADATA_BATCH,
            "metadata_batch_size",
        )?;

        if self.token_poll_interval.is_zero() {
            bail!("token_poll_interval must be greater than 0");
        }

        if self.metadata_poll_interval.is_zero() {
            bail!("metadata_poll_interval must be greater than 0");
        }

        if self.enumerate_app_headroom == 0 {
            bail!("enumerate_app_headroom must be greater than 0");
        }

        if self.enumerate_package_headroom == 0 {
            bail!("enumerate_package_headroom must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SyncConfigBuilder {
    app_token_batch_size: Option<usize>,
    package_token_batch_size: Option<usize>,
    metadata_batch_size: Option<usize>,
    token_poll_interval: Option<Duration>,
    metadata_poll_interval: Option<Duration>,
    enumerate_app_headroom: Option<u32>,
    enumerate_package_headroom: Option<u32>,
    max_in_flight_processing: Option<usize>,
    max_held_locks: Option<usize>,
}

impl SyncConfigBuilder {
    pub fn app_token_batch_size(mut self, size: usize) -> Self {
        self.app_token_batch_size = Some(size);
        self
    }

    pub fn package_token_batch_size(mut self, size: usize) -> Self {
        self.package_token_batch_size = Some(size);
        self
    }

    pub fn metadata_batch_size(mut self, size: usize) -> Self {
        self.metadata_batch_size = Some(size);
        self
    }

    pub fn token_poll_interval(mut self, interval: Duration) -> Self {
        self.token_poll_interval = Some(interval);
        self
    }

    pub fn metadata_poll_interval(mut self, interval: Duration) -> Self {
        self.metadata_poll_interval = Some(interval);
        self
    }

    pub fn enumerate_app_headroom(mut self, headroom: u32) -> Self {
        self.enumerate_app_headroom = Some(headroom);
        self
    }

    pub fn enumerate_package_headroom(mut self, headroom: u32) -> Self {
        self.enumerate_package_headroom = Some(headroom);
        self
    }

    pub fn max_in_flight_processing(mut self, limit: usize) -> Self {
        self.max_in_flight_processing = Some(limit);
        self
    }

    pub fn max_held_locks(mut self, limit: usize) -> Self {
        self.max_held_locks = Some(limit);
        self
    }

    pub fn build(self) -> Result<SyncConfig> {
        let defaults = SyncConfigParams::default();
        let params = SyncConfigParams {
            app_token_batch_size: self
                .app_token_batch_size
                .unwrap_or(defaults.app_token_batch_size),
            package_token_batch_size: self
                .package_token_batch_size
                .unwrap_or(defaults.package_token_batch_size),
            metadata_batch_size: self
                .metadata_batch_size
                .unwrap_or(defaults.metadata_batch_size),
            token_poll_interval: self
                .token_poll_interval
                .unwrap_or(defaults.token_poll_interval),
            metadata_poll_interval: self
                .metadata_poll_interval
                .unwrap_or(defaults.metadata_poll_interval),
            enumerate_app_headroom: self
                .enumerate_app_headroom
                .unwrap_or(defaults.enumerate_app_headroom),
            enumerate_package_headroom: self
                .enumerate_package_headroom
                .unwrap_or(defaults.enumerate_package_headroom),
            max_in_flight_processing: self
                .max_in_flight_processing
                .unwrap_or(defaults.max_in_flight_processing),
            max_held_locks: self.max_held_locks.unwrap_or(defaults.max_held_locks),
        };

        SyncConfig::new(params)
    }
}

fn ensure_batch_size(value: usize, max: usize, field: &str) -> Result<()> {
    if value == 0 {
        bail!("{field} must be greater than 0");
    }
    if value > max {
        bail!("{field} ({value}) must not exceed {max}");
    }
    Ok(())
}
