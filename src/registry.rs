//! Session Registry
//!
//! 进程级会话表，供 C-ABI 层以 `u64` 句柄访问会话。
//! 表本身由 RwLock 保护，每个会话各自持有一把 Mutex，
//! 因此不同会话的记账互不阻塞。
//!
//! 宿主回调从不在会话锁内执行：会话只向自己的 [`HostOutbox`] 登记调用，
//! 本模块在释放会话锁之后统一派发。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::NaiveDate;
use lazy_static::lazy_static;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::RewardSession;
use crate::host::HostOutbox;

/// 会话数达到该阈值才切换到并行 tick
const PARALLEL_THRESHOLD: usize = 64;

pub struct SessionEntry {
    session: Mutex<RewardSession>,
    outbox: Arc<HostOutbox>,
}

impl SessionEntry {
    pub fn new(session: RewardSession, outbox: Arc<HostOutbox>) -> Self {
        Self { session: Mutex::new(session), outbox }
    }

    /// 持锁执行闭包，释放锁后派发期间登记的宿主调用
    pub fn call<R>(&self, f: impl FnOnce(&mut RewardSession) -> R) -> Option<R> {
        let result = {
            let mut guard = self.session.lock().ok()?;
            f(&mut guard)
        };
        self.outbox.dispatch();
        Some(result)
    }
}

pub type SharedSession = Arc<SessionEntry>;

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<u64, SharedSession>> = RwLock::new(HashMap::new());
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// 注册会话并返回句柄；句柄从 1 开始单调递增，0 永远无效
///
/// `outbox` 必须是该会话 `Host` 所用的同一个发件箱。
pub fn register(session: RewardSession, outbox: Arc<HostOutbox>) -> Option<u64> {
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::SeqCst);
    let user = session.user_id().to_string();
    let mut map = SESSIONS.write().ok()?;
    map.insert(handle, Arc::new(SessionEntry::new(session, outbox)));
    log::info!("session {} registered for {}", handle, user);
    Some(handle)
}

pub fn remove(handle: u64) -> bool {
    let removed = match SESSIONS.write() {
        Ok(mut map) => map.remove(&handle).is_some(),
        Err(_) => false,
    };
    if removed {
        log::info!("session {} destroyed", handle);
    }
    removed
}

pub fn get(handle: u64) -> Option<SharedSession> {
    SESSIONS.read().ok()?.get(&handle).cloned()
}

/// 在会话锁内执行闭包；句柄不存在或锁中毒时返回 None
pub fn with_session<R>(handle: u64, f: impl FnOnce(&mut RewardSession) -> R) -> Option<R> {
    get(handle)?.call(f)
}

/// 对全部已注册会话执行一次 tick，返回成功 tick 的会话数
pub fn tick_all(today: Option<NaiveDate>) -> usize {
    let sessions: Vec<SharedSession> = match SESSIONS.read() {
        Ok(map) => map.values().cloned().collect(),
        Err(_) => return 0,
    };
    tick_sessions(&sessions, today)
}

fn tick_one(entry: &SessionEntry, today: Option<NaiveDate>) -> bool {
    entry
        .call(|s| {
            if let Some(day) = today {
                s.roll_day(day);
            }
            s.tick();
        })
        .is_some()
}

pub(crate) fn tick_sessions(sessions: &[SharedSession], today: Option<NaiveDate>) -> usize {
    if sessions.len() >= PARALLEL_THRESHOLD {
        #[cfg(feature = "parallel")]
        {
            return sessions.par_iter().filter(|s| tick_one(s, today)).count();
        }
    }
    sessions.iter().filter(|s| tick_one(s, today)).count()
}
