//! Composite distribution status parsing.
//!
//! The remote side reports per-node distribution progress as one string of
//! `+`-joined managed-object names, each carrying a `distribution` key.

use thiserror::Error;

use crate::names::{ManagedObjectId, NameParseError};
use crate::notification::{
    DISTRIBUTION_DONE, DISTRIBUTION_NOT_DONE, DISTRIBUTION_STATUS_KEY, DISTRIBUTION_UNKNOWN,
};

/// Errors raised while reading a composite distribution status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistributionParseError {
    /// A token was not a managed-object name.
    #[error("distribution token '{token}' is malformed: {source}")]
    MalformedToken {
        /// Offending token.
        token: String,
        /// Parse failure.
        #[source]
        source: NameParseError,
    },

    /// A token carried no status or a status outside done/not done/unknown.
    #[error("unrecognised distribution status in token '{token}'")]
    UnrecognisedStatus {
        /// Offending token.
        token: String,
    },
}

/// Whether every node reports the application as distributed.
///
/// Blank input is not ready. The first node reporting `false` or `unknown`
/// makes the whole composite not ready without inspecting later tokens.
///
/// # Errors
///
/// Returns [`DistributionParseError`] for a malformed token or an unexpected
/// status value encountered before any not-ready node.
///
/// # Examples
///
/// ```
/// use stagehand_lifecycle::parse_distribution_status;
///
/// let composite = "WebSphere:node=n1,distribution=true+WebSphere:node=n2,distribution=true";
/// assert_eq!(parse_distribution_status(composite), Ok(true));
/// assert_eq!(parse_distribution_status(""), Ok(false));
/// ```
pub fn parse_distribution_status(composite: &str) -> Result<bool, DistributionParseError> {
    let mut done = 0_usize;
    for token in composite.split('+').map(str::trim).filter(|t| !t.is_empty()) {
        let name: ManagedObjectId =
            token
                .parse()
                .map_err(|source| DistributionParseError::MalformedToken {
                    token: token.to_owned(),
                    source,
                })?;
        match name.key_property(DISTRIBUTION_STATUS_KEY) {
            Some(DISTRIBUTION_DONE) => done += 1,
            Some(DISTRIBUTION_NOT_DONE | DISTRIBUTION_UNKNOWN) => return Ok(false),
            _ => {
                return Err(DistributionParseError::UnrecognisedStatus {
                    token: token.to_owned(),
                });
            }
        }
    }
    Ok(done > 0)
}
