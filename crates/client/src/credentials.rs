use adoption_insights_core::constants::ENV_API_TOKEN;
use adoption_insights_core::{env_string, MemoryCredentialStore};

/// In-memory store seeded from `INSIGHTS_API_TOKEN`.
///
/// Later `set`/`clear` calls only affect the process, never the environment.
#[must_use]
pub fn credentials_from_env() -> MemoryCredentialStore {
    let token = env_string(ENV_API_TOKEN);
    if token.is_none() {
        tracing::debug!(var = ENV_API_TOKEN, "no API token configured, requests are unauthenticated");
    }
    MemoryCredentialStore::new(token)
}
