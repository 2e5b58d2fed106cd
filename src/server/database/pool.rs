//! FIFO connection pool over tokio-postgres clients.
//!
//! Connections are established up-front at startup; `acquire` hands one out
//! or reports exhaustion (surfaced to HTTP callers as server-busy), and the
//! connection returns itself to the pool on drop.

use crate::server::database::connection::Connection;
use anyhow::{Context, Error};
use log::{error, info};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_postgres::{Client, NoTls};

pub(crate) struct Pool(Arc<Shared>);

struct Shared {
    /// pool name, for logs only
    name: String,
    /// connections in the pool, accessed in a FIFO manner
    connections: Mutex<VecDeque<Client>>,
}

impl Clone for Pool {
    fn clone(&self) -> Pool {
        Pool(self.0.clone())
    }
}

impl Pool {
    const DEFAULT_SIZE: usize = 10;

    pub fn new(name: &str) -> Self {
        Self(Arc::new(Shared {
            name: name.to_string(),
            connections: Mutex::new(VecDeque::with_capacity(Self::DEFAULT_SIZE)),
        }))
    }

    /// establish the default number of connections concurrently
    pub async fn init(&self, conn_str: &str) -> Result<(), Error> {
        let mut set = JoinSet::new();
        for _ in 0..Self::DEFAULT_SIZE {
            let conn_str = conn_str.to_string();
            set.spawn(async move { connect(conn_str.as_str()).await });
        }
        let mut clients = VecDeque::with_capacity(Self::DEFAULT_SIZE);
        while let Some(res) = set.join_next().await {
            let client = res.context("connect task panicked")??;
            info!("pool={} connection created", self.0.name);
            clients.push_back(client);
        }
        self.0
            .connections
            .lock()
            .expect("pool lock poisoned")
            .append(&mut clients);
        Ok(())
    }

    /// hand out a pooled connection, or None when the pool is drained
    pub fn acquire(&self) -> Option<Connection> {
        let mut connections = self.0.connections.lock().expect("pool lock poisoned");
        connections
            .pop_front()
            .map(|client| Connection::new(client, self.clone()))
    }

    pub(super) fn release(&self, client: Client) {
        self.0
            .connections
            .lock()
            .expect("pool lock poisoned")
            .push_back(client);
    }
}

async fn connect(conn_str: &str) -> Result<Client, Error> {
    let (client, conn) = tokio_postgres::connect(conn_str, NoTls)
        .await
        .context("failed to create connection")?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!("connection returned error and aborted, {}", e);
        }
    });
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_on_empty_pool_is_none() {
        let pool = Pool::new("test");
        assert!(pool.acquire().is_none());
    }
}
