// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration: parallelism, randomization, focus and skip patterns.
//!
//! A [`RunConfig`] is either built in code (starting from [`RunConfig::default`]) or loaded from
//! layered TOML sources with [`RunConfig::from_sources`]. Built-in defaults come first, then each
//! source in order, later sources overriding earlier ones.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, FocusFilterError},
    filter::FocusFilter,
    partition::{ParallelConfig, PartitionStrategy},
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;

/// Trait for handling configuration warnings.
///
/// The default implementation, [`DefaultConfigWarnings`], logs them; tests collect them.
pub trait ConfigWarnings {
    /// Handle unknown configuration keys found in a source.
    fn unknown_config_keys(&mut self, origin: &str, unknown: &BTreeSet<String>);
}

/// Default implementation of [`ConfigWarnings`] that logs warnings using the tracing crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, origin: &str, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.extend(unknown.iter().map(String::as_str));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                unknown_str.push_str("\n  - ");
                unknown_str.push_str(ignored_key);
            }
        }

        warn!("in config {origin}, ignoring unknown configuration {unknown_str}");
    }
}

/// A TOML source to layer on top of the built-in defaults.
#[derive(Clone, Copy, Debug)]
pub enum RunConfigSource<'a> {
    /// A file on disk. It must exist.
    File(&'a Utf8Path),

    /// TOML held in memory, with a name used in errors and warnings.
    Inline {
        /// The name to report.
        name: &'a str,

        /// The TOML contents.
        contents: &'a str,
    },
}

impl RunConfigSource<'_> {
    fn origin(&self) -> &str {
        match self {
            Self::File(path) => path.as_str(),
            Self::Inline { name, .. } => name,
        }
    }

    fn add_to(self, builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        match self {
            Self::File(path) => builder.add_source(File::new(path.as_str(), FileFormat::Toml)),
            Self::Inline { contents, .. } => {
                builder.add_source(File::from_str(contents, FileFormat::Toml))
            }
        }
    }
}

/// Configuration consumed by [`Suite::run`](crate::suite::Suite::run).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunConfig {
    /// Which parallel node this process is.
    pub parallel: ParallelConfig,

    /// How specs are split between parallel nodes.
    pub partition: PartitionStrategy,

    /// The seed for the tree shuffle and the optional full-order shuffle.
    pub random_seed: u64,

    /// Whether to shuffle the complete run order rather than only sibling order.
    pub randomize_all_specs: bool,

    /// The focus regular expression. Empty means unset.
    pub focus: String,

    /// The skip regular expression. Empty means unset.
    pub skip: String,

    /// Whether to skip measurement specs.
    pub skip_measurements: bool,

    /// The timeout the engine applies to asynchronous bodies declared without one.
    pub default_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: ParallelConfig::SERIAL,
            partition: PartitionStrategy::Chunk,
            random_seed: 0,
            randomize_all_specs: false,
            focus: String::new(),
            skip: String::new(),
            skip_measurements: false,
            default_timeout: Duration::from_secs(1),
        }
    }
}

impl RunConfig {
    /// The default configuration, as TOML.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Loads the configuration from the built-in defaults and `sources`, logging warnings.
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = RunConfigSource<'a>>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(sources, &mut DefaultConfigWarnings)
    }

    /// Loads the configuration from the built-in defaults and `sources`, reporting warnings to
    /// `warnings`.
    pub fn from_sources_with_warnings<'a>(
        sources: impl IntoIterator<Item = RunConfigSource<'a>>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigParseError> {
        let mut composite_builder = Self::make_default_config();
        let mut last_origin = "<defaults>".to_owned();

        for source in sources {
            // Deserialize each source on its own first, so that errors point at the right source.
            let this_builder = source.add_to(Self::make_default_config());
            let (_, unknown) = Self::build_and_deserialize_config(&this_builder)
                .map_err(|kind| ConfigParseError::new(source.origin(), kind))?;
            if !unknown.is_empty() {
                warnings.unknown_config_keys(source.origin(), &unknown);
            }

            composite_builder = source.add_to(composite_builder);
            last_origin = source.origin().to_owned();
        }

        let (config, _) = Self::build_and_deserialize_config(&composite_builder)
            .map_err(|kind| ConfigParseError::new(&last_origin, kind))?;
        let config = config.into_run_config();
        config
            .parallel
            .validate()
            .map_err(|err| ConfigParseError::new(last_origin, err.into()))?;
        Ok(config)
    }

    /// Compiles the focus and skip patterns.
    pub fn focus_filter(&self) -> Result<FocusFilter, FocusFilterError> {
        FocusFilter::new(&self.focus, &self.skip)
    }

    /// Sets the parallel node and total.
    pub fn with_parallel(mut self, node: u64, total: u64) -> Self {
        self.parallel = ParallelConfig::new(node, total);
        self
    }

    /// Sets the partition strategy.
    pub fn with_partition(mut self, partition: PartitionStrategy) -> Self {
        self.partition = partition;
        self
    }

    /// Sets the random seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Shuffles the complete run order.
    pub fn with_randomize_all_specs(mut self, randomize: bool) -> Self {
        self.randomize_all_specs = randomize;
        self
    }

    /// Sets the focus pattern.
    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = focus.into();
        self
    }

    /// Sets the skip pattern.
    pub fn with_skip(mut self, skip: impl Into<String>) -> Self {
        self.skip = skip.into();
        self
    }

    /// Skips measurement specs.
    pub fn with_skip_measurements(mut self, skip: bool) -> Self {
        self.skip_measurements = skip;
        self
    }

    /// Sets the timeout for asynchronous bodies declared without one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(RunConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: RunConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunConfigDeserialize {
    parallel_total: u64,
    parallel_node: u64,
    random_seed: u64,
    randomize_all_specs: bool,
    focus: String,
    skip: String,
    skip_measurements: bool,
    partition: PartitionStrategy,
    #[serde(with = "humantime_serde")]
    default_timeout: Duration,
}

impl RunConfigDeserialize {
    fn into_run_config(self) -> RunConfig {
        RunConfig {
            parallel: ParallelConfig::new(self.parallel_node, self.parallel_total),
            partition: self.partition,
            random_seed: self.random_seed,
            randomize_all_specs: self.randomize_all_specs,
            focus: self.focus,
            skip: self.skip,
            skip_measurements: self.skip_measurements,
            default_timeout: self.default_timeout,
        }
    }
}
