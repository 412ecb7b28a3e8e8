use crate::{
    client::Client, config::MarkerConfig, database::Database,
    identity::IdentityProvider,
};

/// Owns the database handle and hands out per caller clients.
#[derive(Debug, Clone)]
pub struct Server<D>
where
    D: Database + Send + Sync + Sized + 'static,
{
    database: D,
    config: MarkerConfig,
}

impl<D> Server<D>
where
    D: Database,
{
    pub fn new(database: D, config: MarkerConfig) -> Self {
        Self { database, config }
    }

    pub fn client<I: IdentityProvider>(&self, identity: I) -> Client<D, I> {
        Client::new(self.database.clone(), identity, self.config.clone())
    }
}
