use std::{env, ops::Range, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_PARALLEL_NODE: &str = "KISPEC_PARALLEL_NODE";
pub const ENV_PARALLEL_TOTAL: &str = "KISPEC_PARALLEL_TOTAL";
pub const ENV_DEFAULT_TIMEOUT: &str = "KISPEC_DEFAULT_TIMEOUT";
pub const ENV_VERBOSE: &str = "KISPEC_VERBOSE";
pub const ENV_FAIL_FAST: &str = "KISPEC_FAIL_FAST";
pub const ENV_SKIP_MEASUREMENTS: &str = "KISPEC_SKIP_MEASUREMENTS";
pub const ENV_FOCUS: &str = "KISPEC_FOCUS";
pub const ENV_SKIP: &str = "KISPEC_SKIP";
pub const ENV_REMOTE_REPORTING_SERVER: &str = "KISPEC_REMOTE_REPORTING_SERVER";

/// Budget for asynchronous nodes that do not declare their own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SuiteConfig {
    pub description: String,
    pub default_timeout: Duration,
    pub partition: Partition,
    pub verbose: bool,
    pub fail_fast: bool,
    pub skip_measurements: bool,
    pub focus: Option<String>,
    pub skip: Option<String>,
    pub remote_reporting_server: Option<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            default_timeout: DEFAULT_TIMEOUT,
            partition: Partition::default(),
            verbose: false,
            fail_fast: false,
            skip_measurements: false,
            focus: None,
            skip: None,
            remote_reporting_server: None,
        }
    }
}

impl SuiteConfig {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env(description: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(description, |var| env::var(var).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<L>(description: impl Into<String>, lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(description);

        let index = parse_usize(ENV_PARALLEL_NODE, lookup(ENV_PARALLEL_NODE))?;
        let count = parse_usize(ENV_PARALLEL_TOTAL, lookup(ENV_PARALLEL_TOTAL))?;
        config.partition = Partition::new(index.unwrap_or(1), count.unwrap_or(1))?;

        if let Some(value) = lookup(ENV_DEFAULT_TIMEOUT) {
            let timeout = value
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .filter(|timeout| !timeout.is_zero());
            config.default_timeout = timeout.ok_or(ConfigError::InvalidTimeout {
                var: ENV_DEFAULT_TIMEOUT,
                value,
            })?;
        }

        config.verbose = parse_bool(ENV_VERBOSE, lookup(ENV_VERBOSE))?;
        config.fail_fast = parse_bool(ENV_FAIL_FAST, lookup(ENV_FAIL_FAST))?;
        config.skip_measurements =
            parse_bool(ENV_SKIP_MEASUREMENTS, lookup(ENV_SKIP_MEASUREMENTS))?;
        config.focus = lookup(ENV_FOCUS).filter(|s| !s.is_empty());
        config.skip = lookup(ENV_SKIP).filter(|s| !s.is_empty());
        config.remote_reporting_server =
            lookup(ENV_REMOTE_REPORTING_SERVER).filter(|s| !s.is_empty());

        Ok(config)
    }

    pub fn with_default_timeout(self, default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            ..self
        }
    }

    pub fn with_partition(self, partition: Partition) -> Self {
        Self { partition, ..self }
    }

    pub fn with_verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }

    pub fn with_fail_fast(self, fail_fast: bool) -> Self {
        Self { fail_fast, ..self }
    }

    pub fn with_skip_measurements(self, skip_measurements: bool) -> Self {
        Self {
            skip_measurements,
            ..self
        }
    }

    pub fn with_focus(self, pattern: impl Into<String>) -> Self {
        Self {
            focus: Some(pattern.into()),
            ..self
        }
    }

    pub fn with_skip(self, pattern: impl Into<String>) -> Self {
        Self {
            skip: Some(pattern.into()),
            ..self
        }
    }

    pub fn with_remote_reporting_server(self, endpoint: impl Into<String>) -> Self {
        Self {
            remote_reporting_server: Some(endpoint.into()),
            ..self
        }
    }
}

fn parse_usize(var: &'static str, value: Option<String>) -> Result<Option<usize>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidNumber { var, value, source })
        })
        .transpose()
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}

/// The slice of the run plan one process is responsible for.
///
/// `index` counts from 1 up to and including `count`. Every process builds
/// and resolves the full tree; the partition only decides which contiguous
/// chunk of the resolved plan this process executes and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPartition")]
pub struct Partition {
    index: usize,
    count: usize,
}

#[derive(Deserialize)]
struct RawPartition {
    index: usize,
    count: usize,
}

impl TryFrom<RawPartition> for Partition {
    type Error = ConfigError;

    fn try_from(raw: RawPartition) -> Result<Self, Self::Error> {
        Partition::new(raw.index, raw.count)
    }
}

impl Default for Partition {
    fn default() -> Self {
        Self { index: 1, count: 1 }
    }
}

impl Partition {
    pub fn new(index: usize, count: usize) -> Result<Self, ConfigError> {
        if !(1..=count).contains(&index) {
            return Err(ConfigError::InvalidPartition { index, count });
        }
        Ok(Self { index, count })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_parallel(&self) -> bool {
        self.count > 1
    }

    /// The positions of a plan of `total` specs that belong to this partition.
    ///
    /// Chunks are contiguous and differ in size by at most one, earlier
    /// chunks taking the remainder.
    pub fn range(&self, total: usize) -> Range<usize> {
        let chunk = total / self.count;
        let remainder = total % self.count;
        let before = self.index - 1;
        let start = before * chunk + before.min(remainder);
        let len = chunk + usize::from(before < remainder);
        start..start + len
    }
}
