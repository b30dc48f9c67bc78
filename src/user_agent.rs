//! Shared User-Agent string for page fetches and link validation.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/series-harvester";

/// Default User-Agent used when the settings file does not override it.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("series-harvester/{version} (+{PROJECT_UA_URL})")
}
