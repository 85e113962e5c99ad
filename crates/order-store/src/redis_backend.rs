use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ExistenceCheck, RedisError, Script, SetOptions};

use crate::backend::validate_batch;
use crate::{BackendError, BackendResult, BatchOp, Cursor, KeyValueBackend, ScanPage, StoredValue};

/// Applies a batch in one server-side step.
///
/// KEYS holds one key per operation and ARGV holds an (opcode, argument)
/// pair per operation. Every guard is checked before the first write, so a
/// failing guard returns `{reason, key}` with nothing applied.
const BATCH_SCRIPT: &str = r#"
local n = #KEYS
for i = 1, n do
  local op = ARGV[2 * i - 1]
  local kind = redis.call('TYPE', KEYS[i])['ok']
  if op == 'set_nx' and kind ~= 'none' then
    return {'exists', KEYS[i]}
  elseif (op == 'set_xx' or op == 'del') and kind == 'none' then
    return {'missing', KEYS[i]}
  elseif (op == 'sadd' or op == 'srem') and kind ~= 'none' and kind ~= 'set' then
    return {'wrongtype', KEYS[i]}
  end
end
for i = 1, n do
  local op = ARGV[2 * i - 1]
  local arg = ARGV[2 * i]
  if op == 'set_nx' or op == 'set_xx' then
    redis.call('SET', KEYS[i], arg)
  elseif op == 'del' then
    redis.call('DEL', KEYS[i])
  elseif op == 'sadd' then
    redis.call('SADD', KEYS[i], arg)
  elseif op == 'srem' then
    redis.call('SREM', KEYS[i], arg)
  end
end
return {'ok', ''}
"#;

impl From<RedisError> for BackendError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped()
        {
            BackendError::Unavailable(err.to_string())
        } else if err.code() == Some("WRONGTYPE") {
            BackendError::WrongType(err.to_string())
        } else {
            BackendError::Other(err.to_string())
        }
    }
}

/// Redis-backed key-value backend.
///
/// Holds a multiplexed connection manager that reconnects on its own;
/// cloning the backend shares the connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    batch_script: Arc<Script>,
}

impl RedisBackend {
    /// Wraps an established connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            batch_script: Arc::new(Script::new(BATCH_SCRIPT)),
        }
    }

    /// Connects to the server at `url` and checks it answers.
    pub async fn connect(url: &str) -> BackendResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        let backend = Self::new(conn);
        backend.ping().await?;
        tracing::info!("connected to redis");
        Ok(backend)
    }

    /// Round-trips a PING.
    pub async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn script_args(op: &BatchOp) -> (&'static str, &[u8]) {
    match op {
        BatchOp::SetIfAbsent { value, .. } => ("set_nx", value.as_bytes()),
        BatchOp::SetIfPresent { value, .. } => ("set_xx", value.as_bytes()),
        BatchOp::Delete { .. } => ("del", &[]),
        BatchOp::AddToSet { member, .. } => ("sadd", member.as_bytes()),
        BatchOp::RemoveFromSet { member, .. } => ("srem", member.as_bytes()),
    }
}

#[async_trait]
impl KeyValueBackend for RedisBackend {
    async fn set_if_absent(&self, key: &str, value: StoredValue) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let written: bool = conn.set_nx(key, value.as_bytes()).await?;
        if written {
            Ok(())
        } else {
            Err(BackendError::KeyExists(key.to_string()))
        }
    }

    async fn set_if_present(&self, key: &str, value: StoredValue) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let options = SetOptions::default().conditional_set(ExistenceCheck::XX);
        let reply: Option<String> = conn.set_options(key, value.as_bytes(), options).await?;
        match reply {
            Some(_) => Ok(()),
            None => Err(BackendError::KeyMissing(key.to_string())),
        }
    }

    async fn get(&self, key: &str) -> BackendResult<Option<StoredValue>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value.map(StoredValue::new))
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        if removed == 0 {
            return Err(BackendError::KeyMissing(key.to_string()));
        }
        Ok(())
    }

    async fn add_to_set(&self, set: &str, member: &str) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _added: i64 = conn.sadd(set, member).await?;
        Ok(())
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> BackendResult<()> {
        let mut conn = self.conn.clone();
        let _removed: i64 = conn.srem(set, member).await?;
        Ok(())
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: Cursor,
        pattern: &str,
        count: usize,
    ) -> BackendResult<ScanPage> {
        let mut conn = self.conn.clone();
        let (next, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(cursor.as_u64())
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;

        Ok(ScanPage {
            members,
            next: Cursor::new(next),
        })
    }

    async fn multi_get(&self, keys: &[String]) -> BackendResult<Vec<Option<StoredValue>>> {
        // MGET without keys is a syntax error.
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values
            .into_iter()
            .map(|value| value.map(StoredValue::new))
            .collect())
    }

    async fn execute_atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()> {
        validate_batch(&ops)?;

        let mut invocation = self.batch_script.prepare_invoke();
        for op in &ops {
            let (opcode, arg) = script_args(op);
            invocation.key(op.key()).arg(opcode).arg(arg);
        }

        let mut conn = self.conn.clone();
        let reply: Vec<String> = invocation.invoke_async(&mut conn).await?;

        match reply.as_slice() {
            [status, _] if status == "ok" => Ok(()),
            [status, key] if status == "exists" => Err(BackendError::KeyExists(key.clone())),
            [status, key] if status == "missing" => Err(BackendError::KeyMissing(key.clone())),
            [status, key] if status == "wrongtype" => Err(BackendError::WrongType(key.clone())),
            other => Err(BackendError::Other(format!(
                "unexpected batch script reply: {other:?}"
            ))),
        }
    }
}
