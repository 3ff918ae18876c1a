//! Redis Key-Value Adapter
//!
//! One logical database per region (control, buffer 1, buffer 2) on a shared
//! Redis server. Each region owns a `ConnectionManager` bound to its DB index;
//! every call works on a cloned handle that is dropped when the call ends.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{RedisError, Value};
use tracing::{debug, info};

use crate::domain::{Command, KeyValueStore, Pipeline, Reply, ScanPage};
use crate::error::{Error, Result};

/// Redis-backed region
#[derive(Clone)]
pub struct RedisKeyValueStore {
    region: String,
    url: String,
    manager: ConnectionManager,
}

/// Expected shape of each queued reply.
enum ReplyKind {
    Ok,
    Count,
    Values,
    /// Not sent; answered locally
    Local(Reply),
}

/// URL for a DB index on the server at `base_url`.
pub fn region_url(base_url: &str, db: i64) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), db)
}

impl RedisKeyValueStore {
    /// Connect one region to database `db` on the server at `base_url`.
    pub async fn connect(region: impl Into<String>, base_url: &str, db: i64) -> Result<Self> {
        let region = region.into();
        let url = region_url(base_url, db);
        let client = redis::Client::open(url.as_str()).map_err(|e| Error::Config(format!(
            "invalid Redis URL for region {}: {}",
            region, e
        )))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::StoreUnavailable {
                region: region.clone(),
                reason: e.to_string(),
            })?;

        info!("Connected cache region {} to {}", region, url);
        Ok(Self {
            region,
            url,
            manager,
        })
    }

    fn map_err(&self, e: RedisError) -> Error {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() || e.is_io_error() {
            Error::StoreUnavailable {
                region: self.region.clone(),
                reason: e.to_string(),
            }
        } else {
            Error::Redis(e)
        }
    }

    fn decode_reply(&self, kind: ReplyKind, value: Option<Value>) -> Result<Reply> {
        let missing = || Error::Store(format!("pipeline on {} returned too few replies", self.region));
        match kind {
            ReplyKind::Local(reply) => Ok(reply),
            ReplyKind::Ok => value.map(|_| Reply::Ok).ok_or_else(missing),
            ReplyKind::Count => {
                let value = value.ok_or_else(missing)?;
                Ok(Reply::Count(redis::from_redis_value::<u64>(&value)?))
            }
            ReplyKind::Values => {
                let value = value.ok_or_else(missing)?;
                let values = redis::from_redis_value::<Vec<Option<Vec<u8>>>>(&value)?;
                Ok(Reply::Values(values.into_iter().map(|v| v.map(Bytes::from)).collect()))
            }
        }
    }
}

impl std::fmt::Debug for RedisKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKeyValueStore")
            .field("region", &self.region)
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    fn region(&self) -> &str {
        &self.region
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value.as_ref())
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let added: u64 = redis::cmd("SADD")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(added > 0)
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>> {
        let mut conn = self.manager.clone();
        redis::cmd("SMEMBERS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let mut conn = self.manager.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(ScanPage { cursor, keys })
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<Reply>> {
        let mut pipe = redis::pipe();
        let mut kinds = Vec::with_capacity(pipeline.len());

        for command in pipeline.into_commands() {
            match command {
                Command::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value.as_ref());
                    kinds.push(ReplyKind::Ok);
                }
                Command::SetAdd { key, member } => {
                    pipe.cmd("SADD").arg(key).arg(member);
                    kinds.push(ReplyKind::Count);
                }
                Command::MultiGet { keys } if keys.is_empty() => {
                    kinds.push(ReplyKind::Local(Reply::Values(Vec::new())));
                }
                Command::MultiGet { keys } => {
                    pipe.cmd("MGET").arg(keys);
                    kinds.push(ReplyKind::Values);
                }
                Command::Delete { keys } if keys.is_empty() => {
                    kinds.push(ReplyKind::Local(Reply::Count(0)));
                }
                Command::Delete { keys } => {
                    pipe.cmd("DEL").arg(keys);
                    kinds.push(ReplyKind::Count);
                }
            }
        }

        let sent = kinds
            .iter()
            .filter(|k| !matches!(k, ReplyKind::Local(_)))
            .count();
        let values: Vec<Value> = if sent == 0 {
            Vec::new()
        } else {
            let mut conn = self.manager.clone();
            pipe.query_async(&mut conn)
                .await
                .map_err(|e| self.map_err(e))?
        };
        debug!("Executed pipeline of {} commands on {}", sent, self.region);

        let mut values = values.into_iter();
        kinds
            .into_iter()
            .map(|kind| {
                let value = match kind {
                    ReplyKind::Local(_) => None,
                    _ => values.next(),
                };
                self.decode_reply(kind, value)
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_url() {
        assert_eq!(region_url("redis://localhost:6379", 0), "redis://localhost:6379/0");
        assert_eq!(region_url("redis://localhost:6379/", 2), "redis://localhost:6379/2");
    }
}
