use crate::server::database::pool::Pool;
use tokio_postgres::Client;

/// A pooled client; returns itself to the owning pool on drop.
pub(crate) struct Connection {
    client: Option<Client>,
    pool: Pool,
}

impl Connection {
    pub(super) fn new(client: Client, pool: Pool) -> Self {
        Self {
            client: Some(client),
            pool,
        }
    }

    pub fn client(&self) -> &Client {
        self.client.as_ref().expect("connection already released")
    }

    pub fn client_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("connection already released")
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}
