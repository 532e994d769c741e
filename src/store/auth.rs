// SPDX-License-Identifier: MPL-2.0

//! In-process identity provider for offline sessions and tests.

use crate::remote::{AuthError, AuthProvider, Identity, ListenerRegistry, Role, Subscription};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const AUTH_TOPIC: &str = "auth";
const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    password: String,
    identity: Identity,
}

pub struct MemoryAuth {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Identity>>,
    listeners: ListenerRegistry<Option<Identity>>,
    offline: AtomicBool,
    next_uid: AtomicU64,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            listeners: ListenerRegistry::new(),
            offline: AtomicBool::new(false),
            next_uid: AtomicU64::new(1),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Network("identity provider unreachable".to_string()));
        }
        Ok(())
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.lock().expect("auth lock poisoned") = identity.clone();
        self.listeners.notify(AUTH_TOPIC, &identity);
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AuthError::InvalidEmail),
    }
}

impl AuthProvider for MemoryAuth {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> Result<Identity, AuthError> {
        self.check_online()?;
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let identity = {
            let mut accounts = self.accounts.lock().expect("auth lock poisoned");
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailAlreadyInUse);
            }

            let uid = format!("uid-{}", self.next_uid.fetch_add(1, Ordering::Relaxed));
            let identity = Identity {
                uid,
                email: email.clone(),
                display_name: display_name.map(str::to_string),
                role,
            };
            accounts.insert(
                email,
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };

        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.check_online()?;
        let email = normalize_email(email)?;

        let identity = {
            let accounts = self.accounts.lock().expect("auth lock poisoned");
            match accounts.get(&email) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(AuthError::InvalidCredential),
            }
        };

        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_current(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.lock().expect("auth lock poisoned").clone()
    }

    fn on_auth_state_change(
        &self,
        callback: impl Fn(&Option<Identity>) + Send + Sync + 'static,
    ) -> Subscription {
        self.listeners.register(AUTH_TOPIC, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let auth = MemoryAuth::new();
        let created = auth
            .sign_up("Kid@School.org", "secret1", Some("Ada"), Role::Student)
            .await
            .unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current().is_none());

        let signed_in = auth.sign_in("kid@school.org", "secret1").await.unwrap();
        assert_eq!(created, signed_in);
        assert_eq!(auth.current(), Some(signed_in));
    }

    #[tokio::test]
    async fn test_error_taxonomy() {
        let auth = MemoryAuth::new();
        assert_eq!(
            auth.sign_up("not-an-email", "secret1", None, Role::Student).await,
            Err(AuthError::InvalidEmail)
        );
        assert_eq!(
            auth.sign_up("a@b.org", "123", None, Role::Student).await,
            Err(AuthError::WeakPassword)
        );
        auth.sign_up("a@b.org", "secret1", None, Role::Teacher)
            .await
            .unwrap();
        assert_eq!(
            auth.sign_up("a@b.org", "secret1", None, Role::Student).await,
            Err(AuthError::EmailAlreadyInUse)
        );
        assert_eq!(
            auth.sign_in("a@b.org", "wrong-pass").await,
            Err(AuthError::InvalidCredential)
        );

        auth.set_offline(true);
        assert!(matches!(
            auth.sign_in("a@b.org", "secret1").await,
            Err(AuthError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_state_change_callback() {
        let auth = MemoryAuth::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = auth.on_auth_state_change(move |identity| {
            sink.lock()
                .unwrap()
                .push(identity.as_ref().map(|i| i.email.clone()));
        });

        auth.sign_up("a@b.org", "secret1", None, Role::Student)
            .await
            .unwrap();
        auth.sign_out().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("a@b.org".to_string()), None]
        );
    }
}
