// SPDX-License-Identifier: MPL-2.0

use crate::remote::listeners::Subscription;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("email already in use")]
    EmailAlreadyInUse,
    #[error("password too weak")]
    WeakPassword,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("network error: {0}")]
    Network(String),
}

impl AuthError {
    /// Message suitable for showing to a child or teacher on the login screen.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "That email or password doesn't look right. Try again!",
            AuthError::EmailAlreadyInUse => "An account with this email already exists.",
            AuthError::WeakPassword => "Please choose a password with at least 6 characters.",
            AuthError::InvalidEmail => "Please enter a valid email address.",
            AuthError::Network(_) => "We couldn't reach the server. Check your connection.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
}

/// A signed-in account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

/// The hosted identity provider. Errors are surfaced, never retried here.
pub trait AuthProvider: Send + Sync + 'static {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn current(&self) -> Option<Identity>;

    /// Called with the new identity (or `None`) after every sign-in/out.
    fn on_auth_state_change(
        &self,
        callback: impl Fn(&Option<Identity>) + Send + Sync + 'static,
    ) -> Subscription;
}
