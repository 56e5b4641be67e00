use anyhow::{bail, Error as AnyError};
use std::fmt;
use std::str::FromStr;

/// Operating mode for one sync invocation; fixed for its whole duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunMode {
    /// Synthesizes full id ranges past the highest known ids.
    Enumerate,
    /// Targets only ids already present in the token cache.
    TokensOnly,
    /// Targets persisted packages only.
    PackagesNormal,
    /// Forced-depot processing already holds depot credentials, so bulk
    /// package tokens are skipped.
    WithForcedDepots,
    /// Runs the metadata-only flow instead of the bulk token flow.
    NormalUsingMetadata,
    #[default]
    FullNormal,
}

impl RunMode {
    pub const ALL: [RunMode; 6] = [
        RunMode::Enumerate,
        RunMode::TokensOnly,
        RunMode::PackagesNormal,
        RunMode::WithForcedDepots,
        RunMode::NormalUsingMetadata,
        RunMode::FullNormal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Enumerate => "enumerate",
            RunMode::TokensOnly => "tokens_only",
            RunMode::PackagesNormal => "packages_normal",
            RunMode::WithForcedDepots => "with_forced_depots",
            RunMode::NormalUsingMetadata => "normal_using_metadata",
            RunMode::FullNormal => "full_normal",
        }
    }

    pub fn requests_package_tokens(&self) -> bool {
        !matches!(self, RunMode::WithForcedDepots)
    }

    pub fn uses_metadata_flow(&self) -> bool {
        matches!(self, RunMode::NormalUsingMetadata)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = AnyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match RunMode::ALL
            .iter()
            .find(|mode| mode.as_str() == normalized)
        {
            Some(mode) => Ok(*mode),
            None => bail!("unknown run mode {value:?}"),
        }
    }
}
