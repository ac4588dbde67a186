//! Update Negotiator.

use super::ReleaseSource;
use crate::version::Version;
use tracing::{debug, warn};

/// Result of an update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCheck {
    /// Whether `latest` is strictly newer than the installed version.
    pub needed: bool,
    /// Latest version on the server, `None` if it could not be determined.
    pub latest: Option<Version>,
}

impl UpdateCheck {
    /// The check failed; nothing is known.
    pub const UNDETERMINED: Self = Self {
        needed: false,
        latest: None,
    };
}

/// Asks `source` for the latest version of `program`.
///
/// Never fails: transport errors and missing programs are logged and reported
/// as [`UpdateCheck::UNDETERMINED`], so the caller's loop simply tries again on
/// its next cycle. An update is needed only when the latest version is
/// strictly greater than `installed`.
pub async fn check_for_update<S: ReleaseSource>(
    source: &S,
    program: &str,
    installed: &Version,
) -> UpdateCheck {
    match source.latest_version(program).await {
        Ok(latest) => {
            let needed = latest > *installed;
            debug!("{}: installed {}, latest {}, update needed: {}", program, installed, latest, needed);
            UpdateCheck {
                needed,
                latest: Some(latest),
            }
        }
        Err(e) => {
            warn!("Update check for {} failed: {}", program, e);
            UpdateCheck::UNDETERMINED
        }
    }
}
