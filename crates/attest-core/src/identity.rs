//! # Identity Provider
//!
//! The Auth Gate's credential table, behind a trait so deployments can
//! inject their own source of accounts.
//!
//! Passwords are compared as plain text, in constant time. There is no
//! hashing, lockout or rate limiting at this layer.

use crate::{Account, AttestError, Role, User};
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

/// Source of user identities and their credentials.
pub trait IdentityProvider: Send + Sync {
    /// Check a username/password pair.
    ///
    /// Returns the identity on an exact match, `AttestError::InvalidCredentials` otherwise.
    fn authenticate(&self, username: &str, password: &str) -> Result<User, AttestError>;

    /// Look up an identity by name.
    fn user(&self, username: &str) -> Option<User>;

    /// All known identities, ordered by name.
    fn users(&self) -> Vec<User>;
}

/// An identity table fixed at construction time.
#[derive(Debug, Clone)]
pub struct StaticIdentityProvider {
    accounts: BTreeMap<String, Account>,
}

impl StaticIdentityProvider {
    /// Build a provider from a list of accounts.
    ///
    /// A later account with the same name replaces an earlier one.
    #[must_use]
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.name.clone(), account))
                .collect(),
        }
    }

    /// The three built-in accounts: one per role.
    #[must_use]
    pub fn builtin_accounts() -> Vec<Account> {
        vec![
            Account::new("admin", "admin123", Role::Admin),
            Account::new("editor", "editor123", Role::Editor),
            Account::new("analyst", "analyst123", Role::Analyst),
        ]
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl Default for StaticIdentityProvider {
    fn default() -> Self {
        Self::new(Self::builtin_accounts())
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn authenticate(&self, username: &str, password: &str) -> Result<User, AttestError> {
        let account = self
            .accounts
            .get(username)
            .ok_or(AttestError::InvalidCredentials)?;
        if constant_time_eq(account.password.as_bytes(), password.as_bytes()) {
            Ok(account.user())
        } else {
            Err(AttestError::InvalidCredentials)
        }
    }

    fn user(&self, username: &str) -> Option<User> {
        self.accounts.get(username).map(Account::user)
    }

    fn users(&self) -> Vec<User> {
        self.accounts.values().map(Account::user).collect()
    }
}

/// Compare two byte strings without leaking where they differ.
///
/// Both sides are padded to the same length so the comparison always runs
/// over the same number of bytes; the lengths are checked separately.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let max_len = expected.len().max(provided.len());
    let mut padded_expected = vec![0u8; max_len];
    let mut padded_provided = vec![0u8; max_len];
    padded_expected[..expected.len()].copy_from_slice(expected);
    padded_provided[..provided.len()].copy_from_slice(provided);

    let bytes_match: bool = padded_expected.ct_eq(&padded_provided).into();
    bytes_match && expected.len() == provided.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_accounts_authenticate_with_their_role() {
        let provider = StaticIdentityProvider::default();
        for (name, password, role) in [
            ("admin", "admin123", Role::Admin),
            ("editor", "editor123", Role::Editor),
            ("analyst", "analyst123", Role::Analyst),
        ] {
            let user = provider.authenticate(name, password).expect("login");
            assert_eq!(user, User::new(name, role));
        }
    }

    #[test]
    fn wrong_password_or_user_rejected() {
        let provider = StaticIdentityProvider::default();
        assert!(matches!(
            provider.authenticate("admin", "admin"),
            Err(AttestError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.authenticate("admin", "admin1234"),
            Err(AttestError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.authenticate("root", "admin123"),
            Err(AttestError::InvalidCredentials)
        ));
        assert!(matches!(
            provider.authenticate("Admin", "admin123"),
            Err(AttestError::InvalidCredentials)
        ));
    }

    #[test]
    fn empty_password_rejected() {
        let provider = StaticIdentityProvider::default();
        assert!(provider.authenticate("analyst", "").is_err());
    }

    #[test]
    fn users_are_sorted_and_password_free() {
        let provider = StaticIdentityProvider::default();
        let names: Vec<_> = provider.users().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["admin", "analyst", "editor"]);
        assert_eq!(provider.user("editor").map(|u| u.role), Some(Role::Editor));
        assert!(provider.user("nobody").is_none());
    }

    #[test]
    fn later_account_replaces_earlier() {
        let provider = StaticIdentityProvider::new([
            Account::new("ops", "one", Role::Analyst),
            Account::new("ops", "two", Role::Editor),
        ]);
        assert_eq!(provider.len(), 1);
        assert!(provider.authenticate("ops", "one").is_err());
        assert_eq!(
            provider.authenticate("ops", "two").expect("login").role,
            Role::Editor
        );
    }
}
