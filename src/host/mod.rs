//! Host Collaborator Module
//!
//! # 职责描述
//! 1. 定义引擎依赖的宿主能力：广告展示、外链导航、奖励上报、统计拉取。
//! 2. 引擎只通过这些 trait 与外界交互，自身不做任何 I/O。
//! 3. 所有协作方调用都是 best-effort：失败只记录，不回滚记账。

pub mod callbacks;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use crate::error::CollaboratorError;
use crate::models::{RewardDelta, RewardKind, StatsRecord};

pub use callbacks::{register_callbacks, HostOutbox, OpenUrlCallback, RegisteredHost, ShowAdCallback};

/// 广告 SDK
pub trait AdDisplay: Send + Sync {
    fn show_ad(&self) -> Result<(), CollaboratorError>;
}

/// 外链导航
pub trait Navigator: Send + Sync {
    fn open_url(&self, url: &str) -> Result<(), CollaboratorError>;
}

/// 一次已记账奖励的上报内容
#[derive(Debug, Clone, Copy)]
pub struct RewardEvent<'a> {
    pub user_id: &'a str,
    pub symbol: &'a str,
    pub kind: RewardKind,
    pub delta: RewardDelta,
}

/// 奖励流水上报 (fire-and-forget)
pub trait RewardSink: Send + Sync {
    fn post_reward(&self, event: &RewardEvent<'_>) -> Result<(), CollaboratorError>;
}

/// 远端统计拉取
pub trait StatsSource: Send + Sync {
    fn fetch_stats(&self, user_id: &str) -> Result<StatsRecord, CollaboratorError>;
}

/// 会话持有的协作方集合
#[derive(Clone)]
pub struct Host {
    pub ads: Arc<dyn AdDisplay>,
    pub navigator: Arc<dyn Navigator>,
    pub sink: Option<Arc<dyn RewardSink>>,
}

impl Host {
    pub fn new(ads: Arc<dyn AdDisplay>, navigator: Arc<dyn Navigator>) -> Self {
        Self { ads, navigator, sink: None }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RewardSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 经由发件箱调用全局注册的 C 回调，由持锁方在释放会话锁后派发
    pub fn deferred(outbox: Arc<HostOutbox>) -> Self {
        Self::new(outbox.clone(), outbox)
    }
}
