use std::sync::Arc;

use async_trait::async_trait;
use model::{account::Account, WithId};

/// Resolves the account on whose behalf a marker is reported.
///
/// Resolution is best effort: implementations return `None` whenever no
/// identity can be established, be it a missing session or a broken one.
/// Reporting never fails because of this.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticated_account(&self) -> Option<WithId<Account>>;
}

/// Nobody is logged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl IdentityProvider for Anonymous {
    async fn authenticated_account(&self) -> Option<WithId<Account>> {
        None
    }
}

#[async_trait]
impl IdentityProvider for WithId<Account> {
    async fn authenticated_account(&self) -> Option<WithId<Account>> {
        Some(self.clone())
    }
}

#[async_trait]
impl<I: IdentityProvider> IdentityProvider for Option<I> {
    async fn authenticated_account(&self) -> Option<WithId<Account>> {
        match self {
            Some(identity) => identity.authenticated_account().await,
            None => None,
        }
    }
}

#[async_trait]
impl<I: IdentityProvider + ?Sized> IdentityProvider for Arc<I> {
    async fn authenticated_account(&self) -> Option<WithId<Account>> {
        (**self).authenticated_account().await
    }
}
