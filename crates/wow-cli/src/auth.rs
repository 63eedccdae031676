//! CLI session and PKCE verifier persistence in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use wow_core::auth::{AuthResult, AuthState, SessionPersistence, SupabaseAuthClient};
pub use wow_core::auth::{AuthError, AuthSession};
use wow_core::config::BackendConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "wow-cli";

pub type CliAuthClient = SupabaseAuthClient<SessionStore>;

/// Keychain entries for one profile: the session and the pending verifier.
#[derive(Clone)]
pub struct SessionStore {
    session_key: String,
    verifier_key: String,
}

impl SessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            session_key: format!("supabase_session:{profile_name}"),
            verifier_key: format!("pkce_verifier:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(key: &str) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, key)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(not(test))]
    fn read(key: &str) -> AuthResult<Option<String>> {
        match Self::entry(key)?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn read(key: &str) -> AuthResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    #[cfg(not(test))]
    fn write(key: &str, value: &str) -> AuthResult<()> {
        Self::entry(key)?
            .set_password(value)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn write(key: &str, value: &str) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn remove(key: &str) -> AuthResult<()> {
        match Self::entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn remove(key: &str) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

impl SessionPersistence for SessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        Self::read(&self.session_key)?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(Into::into)
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        Self::write(&self.session_key, &raw)
    }

    fn clear_session(&self) -> AuthResult<()> {
        Self::remove(&self.session_key)
    }

    fn save_code_verifier(&self, verifier: &str) -> AuthResult<()> {
        Self::write(&self.verifier_key, verifier)
    }

    fn take_code_verifier(&self) -> AuthResult<Option<String>> {
        let verifier = Self::read(&self.verifier_key)?;
        if verifier.is_some() {
            Self::remove(&self.verifier_key)?;
        }
        Ok(verifier)
    }
}

pub fn auth_client(
    profile_name: &str,
    config: &BackendConfig,
    state: AuthState,
) -> AuthResult<CliAuthClient> {
    SupabaseAuthClient::new(config, SessionStore::new(profile_name), state)
}

pub fn load_stored_session(profile_name: &str) -> AuthResult<Option<AuthSession>> {
    SessionStore::new(profile_name).load_session()
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    SessionStore::new(profile_name).clear_session()
}
