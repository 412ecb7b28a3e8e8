use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract, http::HeaderMap, middleware::Next, response::IntoResponse};
use markers::identity::IdentityProvider;
use model::{account::Account, WithId};
use utility::id::Id;

pub const ACCOUNT_ID_HEADER: &str = "x-account-id";
pub const ACCOUNT_NAME_HEADER: &str = "x-account-name";

/// Identity asserted by the authenticating reverse proxy in front of the api.
#[derive(Debug, Clone, Default)]
pub struct HeaderIdentity {
    account: Option<WithId<Account>>,
}

impl HeaderIdentity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let account_id = match headers.get(ACCOUNT_ID_HEADER).map(|v| v.to_str()) {
            Some(Ok(id)) if !id.trim().is_empty() => id.trim().to_owned(),
            Some(_) => {
                log::debug!("ignoring unreadable {} header.", ACCOUNT_ID_HEADER);
                return Self::default();
            }
            None => return Self::default(),
        };
        let name = headers
            .get(ACCOUNT_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Self {
            account: Some(WithId::new(Id::new(account_id), Account { name })),
        }
    }
}

#[async_trait]
impl IdentityProvider for HeaderIdentity {
    async fn authenticated_account(&self) -> Option<WithId<Account>> {
        self.account.clone()
    }
}

pub async fn identity_middleware(req: extract::Request, next: Next) -> impl IntoResponse {
    let identity = HeaderIdentity::from_headers(req.headers());

    let mut req = req;
    req.extensions_mut().insert(Arc::new(identity));

    next.run(req).await
}
