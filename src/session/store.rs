//! 会话存储
//!
//! SessionStore 契约：get / replace / merge / get_key / set_key / delete_key / clear，
//! 所有写操作刷新滑动 TTL。get 对缺失会话返回默认状态而非报错。
//! 注意：get_key 后 set_key 的读改写序列不具原子性，同一会话的并发轮次可相互覆盖（已知竞态，沿袭源设计）。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

use super::state::SessionState;

/// 会话存储错误：仅存储不可用 / 状态序列化两类，作为整轮终止性失败向上传播
#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session state serialization failed: {0}")]
    Serialization(String),
}

/// 会话存储契约：按 session_id 键控，写操作刷新 TTL
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 读取整份状态；缺失或已过期时返回该会话的默认状态
    async fn get(&self, session_id: &str) -> Result<SessionState, SessionStoreError>;

    /// 整体替换并刷新 TTL
    async fn replace(&self, state: SessionState) -> Result<(), SessionStoreError>;

    /// 按键合并部分字段并刷新 TTL
    async fn merge(
        &self,
        session_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), SessionStoreError>;

    /// 读取单键；缺失时返回 default
    async fn get_key(
        &self,
        session_id: &str,
        name: &str,
        default: Value,
    ) -> Result<Value, SessionStoreError>;

    /// 写入单键并刷新 TTL
    async fn set_key(
        &self,
        session_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SessionStoreError>;

    /// 删除单键并刷新 TTL
    async fn delete_key(&self, session_id: &str, name: &str) -> Result<(), SessionStoreError>;

    /// 删除整个会话
    async fn clear(&self, session_id: &str) -> Result<(), SessionStoreError>;

    /// 当前未过期会话数
    async fn active_count(&self) -> usize;
}

fn state_to_map(state: &SessionState) -> Result<Map<String, Value>, SessionStoreError> {
    match serde_json::to_value(state) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(SessionStoreError::Serialization(
            "session state did not serialize to an object".to_string(),
        )),
        Err(e) => Err(SessionStoreError::Serialization(e.to_string())),
    }
}

fn state_from_map(map: Map<String, Value>) -> Result<SessionState, SessionStoreError> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| SessionStoreError::Serialization(e.to_string()))
}

struct SessionRecord {
    state: SessionState,
    expires_at: Instant,
    touched_at: Instant,
}

/// 内存会话存储：滑动 TTL + 容量上限
///
/// 超出 max_sessions 时先清过期记录，仍满则淘汰最久未触达的会话
/// （显式有界可淘汰，替代进程级无界全局表）。
pub struct MemorySessionStore {
    records: RwLock<HashMap<String, SessionRecord>>,
    ttl: Duration,
    max_sessions: usize,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64, max_sessions: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
            max_sessions,
        }
    }

    /// 清理已过期会话，返回清理条数
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        before - records.len()
    }

    /// 写锁内完成读改写：取当前（或默认）状态，应用 f，刷新 TTL 后写回
    async fn mutate<F>(&self, session_id: &str, f: F) -> Result<(), SessionStoreError>
    where
        F: FnOnce(&mut SessionState) -> Result<(), SessionStoreError>,
    {
        let now = Instant::now();
        let mut records = self.records.write().await;

        let mut state = match records.get(session_id) {
            Some(r) if r.expires_at > now => r.state.clone(),
            _ => SessionState::new(session_id),
        };
        f(&mut state)?;
        state.updated_at = Utc::now();

        if !records.contains_key(session_id) && records.len() >= self.max_sessions {
            evict_one(&mut records, now);
        }
        records.insert(
            session_id.to_string(),
            SessionRecord {
                state,
                expires_at: now + self.ttl,
                touched_at: now,
            },
        );
        Ok(())
    }
}

/// 先清过期；没有过期记录时淘汰最久未触达的一条
fn evict_one(records: &mut HashMap<String, SessionRecord>, now: Instant) {
    let before = records.len();
    records.retain(|_, r| r.expires_at > now);
    if records.len() < before {
        return;
    }
    if let Some(oldest) = records
        .iter()
        .min_by_key(|(_, r)| r.touched_at)
        .map(|(id, _)| id.clone())
    {
        tracing::debug!("Session capacity reached, evicting {}", oldest);
        records.remove(&oldest);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionState, SessionStoreError> {
        let now = Instant::now();
        let records = self.records.read().await;
        Ok(match records.get(session_id) {
            Some(r) if r.expires_at > now => r.state.clone(),
            _ => SessionState::new(session_id),
        })
    }

    async fn replace(&self, state: SessionState) -> Result<(), SessionStoreError> {
        let session_id = state.session_id.clone();
        self.mutate(&session_id, move |s| {
            *s = state;
            Ok(())
        })
        .await
    }

    async fn merge(
        &self,
        session_id: &str,
        patch: Map<String, Value>,
    ) -> Result<(), SessionStoreError> {
        self.mutate(session_id, move |s| {
            let mut map = state_to_map(s)?;
            for (k, v) in patch {
                map.insert(k, v);
            }
            *s = state_from_map(map)?;
            Ok(())
        })
        .await
    }

    async fn get_key(
        &self,
        session_id: &str,
        name: &str,
        default: Value,
    ) -> Result<Value, SessionStoreError> {
        let state = self.get(session_id).await?;
        let map = state_to_map(&state)?;
        Ok(map.get(name).cloned().unwrap_or(default))
    }

    async fn set_key(
        &self,
        session_id: &str,
        name: &str,
        value: Value,
    ) -> Result<(), SessionStoreError> {
        let name = name.to_string();
        self.mutate(session_id, move |s| {
            let mut map = state_to_map(s)?;
            map.insert(name, value);
            *s = state_from_map(map)?;
            Ok(())
        })
        .await
    }

    async fn delete_key(&self, session_id: &str, name: &str) -> Result<(), SessionStoreError> {
        let name = name.to_string();
        self.mutate(session_id, move |s| {
            let mut map = state_to_map(s)?;
            map.remove(&name);
            *s = state_from_map(map)?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionStoreError> {
        self.records.write().await.remove(session_id);
        Ok(())
    }

    async fn active_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.expires_at > now)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;

    #[tokio::test]
    async fn test_absent_session_returns_default() {
        let store = MemorySessionStore::new(60, 100);
        let state = store.get("nobody").await.unwrap();
        assert_eq!(state.session_id, "nobody");
        assert_eq!(state.cart_items_count, 0);
    }

    #[tokio::test]
    async fn test_replace_then_get() {
        let store = MemorySessionStore::new(60, 100);
        let mut state = SessionState::new("s1");
        state.cart_items_count = 3;
        state.agent_history.push(AgentKind::Router);
        store.replace(state).await.unwrap();

        let back = store.get("s1").await.unwrap();
        assert_eq!(back.cart_items_count, 3);
        assert_eq!(back.agent_history, vec![AgentKind::Router]);
    }

    #[tokio::test]
    async fn test_key_access_known_and_unknown() {
        let store = MemorySessionStore::new(60, 100);
        store
            .set_key("s1", "cart_items_count", Value::from(2))
            .await
            .unwrap();
        store
            .set_key("s1", "viewed_product", Value::from("p-1"))
            .await
            .unwrap();

        let state = store.get("s1").await.unwrap();
        assert_eq!(state.cart_items_count, 2);
        assert_eq!(state.extra["viewed_product"], "p-1");

        let missing = store
            .get_key("s1", "no_such_key", Value::from("fallback"))
            .await
            .unwrap();
        assert_eq!(missing, "fallback");

        store.delete_key("s1", "viewed_product").await.unwrap();
        let state = store.get("s1").await.unwrap();
        assert!(state.extra.get("viewed_product").is_none());
    }

    #[tokio::test]
    async fn test_merge_partial() {
        let store = MemorySessionStore::new(60, 100);
        let mut patch = Map::new();
        patch.insert("cart_items_count".to_string(), Value::from(5));
        patch.insert("last_intent".to_string(), Value::from("cart"));
        store.merge("s1", patch).await.unwrap();

        let state = store.get("s1").await.unwrap();
        assert_eq!(state.cart_items_count, 5);
        assert_eq!(state.last_intent.as_deref(), Some("cart"));
    }

    #[tokio::test]
    async fn test_ttl_expiry_and_sliding_refresh() {
        let store = MemorySessionStore::new(0, 100);
        let mut state = SessionState::new("s1");
        state.cart_items_count = 1;
        store.replace(state).await.unwrap();

        // TTL 为 0：写入即过期，读到默认状态
        let back = store.get("s1").await.unwrap();
        assert_eq!(back.cart_items_count, 0);
        assert_eq!(store.cleanup_expired().await, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_session() {
        let store = MemorySessionStore::new(60, 100);
        store
            .set_key("s1", "cart_items_count", Value::from(4))
            .await
            .unwrap();
        store.clear("s1").await.unwrap();
        let state = store.get("s1").await.unwrap();
        assert_eq!(state.cart_items_count, 0);
    }

    #[tokio::test]
    async fn test_capacity_eviction_oldest_touched() {
        let store = MemorySessionStore::new(60, 2);
        store.set_key("a", "last_intent", Value::from("x")).await.unwrap();
        store.set_key("b", "last_intent", Value::from("y")).await.unwrap();
        // 触达 a，让 b 成为最旧
        store.set_key("a", "last_intent", Value::from("x2")).await.unwrap();
        store.set_key("c", "last_intent", Value::from("z")).await.unwrap();

        assert_eq!(store.active_count().await, 2);
        let b = store.get("b").await.unwrap();
        assert!(b.last_intent.is_none());
        let a = store.get("a").await.unwrap();
        assert_eq!(a.last_intent.as_deref(), Some("x2"));
    }

    /// 读改写不原子：两个「先 get 再 replace」的交错序列，后写者覆盖前写者。
    /// 这是从源设计继承的已知竞态，此处固化其语义而非修复。
    #[tokio::test]
    async fn test_read_modify_write_lost_update() {
        let store = MemorySessionStore::new(60, 100);
        let mut base = SessionState::new("s1");
        base.cart_items_count = 1;
        store.replace(base).await.unwrap();

        let mut turn_a = store.get("s1").await.unwrap();
        let mut turn_b = store.get("s1").await.unwrap();
        turn_a.cart_items_count += 1;
        turn_b.cart_items_count += 2;
        store.replace(turn_a).await.unwrap();
        store.replace(turn_b).await.unwrap();

        // 期望 4（1+1+2），实际 3：A 的增量丢失
        let final_state = store.get("s1").await.unwrap();
        assert_eq!(final_state.cart_items_count, 3);
    }
}
