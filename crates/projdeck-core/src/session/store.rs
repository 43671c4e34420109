use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::storage::CredentialStorage;
use super::token::decode_role;
use crate::api::ProfileApi;
use crate::error::{CoreError, CoreResult};
use crate::models::{Role, UserProfile};

/// Who is logged in, as seen by guards and views
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub role: Option<Role>,
    pub user: Option<UserProfile>,
}

/// Session context for one app instance.
///
/// Constructed once with [`SessionStore::init`] and shared by `Arc`. Owners
/// that must follow login/logout subscribe to [`SessionStore::subscribe`].
pub struct SessionStore {
    state: RwLock<SessionSnapshot>,
    storage: Mutex<CredentialStorage>,
    authenticated_tx: watch::Sender<bool>,
}

fn role_from_token(token: &str) -> Option<Role> {
    match decode_role(token) {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!("Failed to decode stored token: {}", e);
            None
        }
    }
}

impl SessionStore {
    /// Derive the role from the persisted token. Never fails and never
    /// touches the network.
    pub fn init(storage: CredentialStorage) -> Self {
        let role = storage.access_token().and_then(role_from_token);
        let authenticated = storage.access_token().is_some() && role.is_some();
        tracing::debug!(?role, "Session initialized");

        let (authenticated_tx, _) = watch::channel(authenticated);
        Self {
            state: RwLock::new(SessionSnapshot { role, user: None }),
            storage: Mutex::new(storage),
            authenticated_tx,
        }
    }

    // ===== Getters =====

    pub fn role(&self) -> Option<Role> {
        self.state.read().role.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.read().user.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.storage.lock().access_token().map(String::from)
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated_tx.borrow()
    }

    /// Receiver that flips whenever the session gains or loses authentication
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated_tx.subscribe()
    }

    // ===== Mutations =====

    pub fn set_role(&self, role: Option<Role>) {
        self.state.write().role = role;
        self.publish();
    }

    pub fn set_user(&self, user: Option<UserProfile>) {
        self.state.write().user = user;
    }

    /// Persist `token` and derive the role from it
    pub fn sign_in(&self, token: &str) -> CoreResult<Option<Role>> {
        let role = decode_role(token)?;
        self.storage.lock().store_access_token(token)?;
        *self.state.write() = SessionSnapshot {
            role: role.clone(),
            user: None,
        };
        self.publish();
        tracing::info!(?role, "Signed in");
        Ok(role)
    }

    /// Drop the persisted token together with role and user
    pub fn sign_out(&self) -> CoreResult<()> {
        let result = self.storage.lock().clear_access_token();
        *self.state.write() = SessionSnapshot::default();
        self.publish();
        tracing::info!("Signed out");
        result
    }

    /// Fetch the profile for the stored token.
    ///
    /// On failure the token, user and role are cleared together. A response
    /// that arrives after the token changed is discarded.
    pub async fn refresh_user<P>(&self, api: &P) -> CoreResult<UserProfile>
    where
        P: ProfileApi + ?Sized,
    {
        let token = self.token().ok_or(CoreError::NotLoggedIn)?;

        match api.fetch_current_user(&token).await {
            Ok(profile) => {
                if self.token().as_deref() != Some(token.as_str()) {
                    tracing::debug!("Session changed during profile fetch, dropping result");
                    return Err(CoreError::NotLoggedIn);
                }
                self.state.write().user = Some(profile.clone());
                Ok(profile)
            }
            Err(e) => {
                tracing::warn!("Profile fetch failed, clearing session: {}", e);
                if self.token().as_deref() == Some(token.as_str()) {
                    if let Err(clear_err) = self.sign_out() {
                        tracing::error!("Failed to delete stored token: {}", clear_err);
                    }
                }
                Err(e)
            }
        }
    }

    fn publish(&self) {
        let authenticated = {
            let state = self.state.read();
            state.role.is_some() && self.storage.lock().access_token().is_some()
        };
        self.authenticated_tx.send_if_modified(|current| {
            if *current != authenticated {
                *current = authenticated;
                true
            } else {
                false
            }
        });
    }
}
