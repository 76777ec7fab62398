//! Build metadata reported by the health check.
//!
//! The `x-service-version` header is `{channel}:{info}`:
//! - Local/Test: `main:{commit}`
//! - PR: `pr:{number}`
//! - Nightly: `nightly:{YYYY-MM-DD}`
//! - Prod: `stable:{version}`

use crate::config::Env;

pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const BUILD_COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_BRANCH: &str = env!("BUILD_BRANCH");

pub fn format_version_for_env(env: &Env) -> String {
    match env {
        Env::Local | Env::Test => format!("main:{BUILD_COMMIT}"),
        Env::Pr => format!("pr:{}", option_env!("PR_NUMBER").unwrap_or("unknown")),
        Env::Nightly => {
            // BUILD_DATE is RFC3339, keep the date part
            let date = BUILD_DATE.get(..10).unwrap_or(BUILD_DATE);
            format!("nightly:{date}")
        }
        Env::Prod => format!("stable:{}", env!("CARGO_PKG_VERSION")),
    }
}
