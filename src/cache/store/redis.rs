//! Redis Store
//!
//! Blocking Redis backend. Tag sets use native Redis sets so membership
//! updates are atomic on the server.

use std::collections::BTreeSet;
use std::time::Duration;

use ::redis::{Client, Connection, RedisError};
use tracing::debug;

use super::{ttl_secs, Store};
use crate::error::{CacheError, Result};

/// Upper bound for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// == Redis Store ==
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    /// Creates a store for `url`. No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(unavailable)?;
        debug!(url = %redact(url), "redis store configured");
        Ok(Self { client })
    }

    fn connection(&self) -> Result<Connection> {
        self.client
            .get_connection_with_timeout(CONNECT_TIMEOUT)
            .map_err(unavailable)
    }
}

fn unavailable(err: RedisError) -> CacheError {
    CacheError::unavailable("redis", err)
}

/// Hides the password part of a connection URL.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => {
            format!("{}://***@{}", &url[..scheme], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

impl Store for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        ::redis::cmd("GET")
            .arg(key)
            .query(&mut conn)
            .map_err(unavailable)
    }

    fn many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        ::redis::cmd("MGET")
            .arg(keys)
            .query(&mut conn)
            .map_err(unavailable)
    }

    fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection()?;
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        cmd.query::<()>(&mut conn).map_err(unavailable)
    }

    fn add(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        let mut conn = self.connection()?;
        let mut cmd = ::redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        let reply: Option<String> = cmd.query(&mut conn).map_err(unavailable)?;
        Ok(reply.is_some())
    }

    fn forget(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection()?;
        let removed: i64 = ::redis::cmd("DEL")
            .arg(key)
            .query(&mut conn)
            .map_err(unavailable)?;
        Ok(removed > 0)
    }

    fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection()?;
        ::redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query(&mut conn)
            .map_err(unavailable)
    }

    fn decrement(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.connection()?;
        ::redis::cmd("DECRBY")
            .arg(key)
            .arg(delta)
            .query(&mut conn)
            .map_err(unavailable)
    }

    /// PTTL replies -1 without expiry and -2 for a missing key.
    fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.connection()?;
        let millis: i64 = ::redis::cmd("PTTL")
            .arg(key)
            .query(&mut conn)
            .map_err(unavailable)?;
        Ok(match millis {
            -1 => None,
            ms if ms < 0 => Some(Duration::ZERO),
            ms => Some(Duration::from_millis(ms.unsigned_abs())),
        })
    }

    fn flush(&self) -> Result<()> {
        let mut conn = self.connection()?;
        ::redis::cmd("FLUSHDB")
            .query::<()>(&mut conn)
            .map_err(unavailable)
    }

    fn ping(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let pong: String = ::redis::cmd("PING")
            .query(&mut conn)
            .map_err(unavailable)?;
        debug!(reply = %pong, "redis ping");
        Ok(())
    }

    fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection()?;
        ::redis::cmd("SADD")
            .arg(key)
            .arg(members)
            .query::<i64>(&mut conn)
            .map_err(unavailable)?;
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        let mut conn = self.connection()?;
        ::redis::cmd("SMEMBERS")
            .arg(key)
            .query(&mut conn)
            .map_err(unavailable)
    }

    fn set_remove(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection()?;
        ::redis::cmd("SREM")
            .arg(key)
            .arg(members)
            .query::<i64>(&mut conn)
            .map_err(unavailable)?;
        Ok(())
    }

    fn set_take(&self, key: &str) -> Result<BTreeSet<String>> {
        let mut conn = self.connection()?;
        let (members,): (BTreeSet<String>,) = ::redis::pipe()
            .atomic()
            .cmd("SMEMBERS")
            .arg(key)
            .cmd("DEL")
            .arg(key)
            .ignore()
            .query(&mut conn)
            .map_err(unavailable)?;
        Ok(members)
    }
}
