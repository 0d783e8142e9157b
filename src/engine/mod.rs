pub mod auto_ads;
pub mod clock;
pub mod offers;
pub mod session;
pub mod stats;
pub mod watch;

use crate::host::{RewardEvent, RewardSink};
use crate::models::{RewardDelta, RewardKind, StatsRecord};

// 重新导出数据模型
pub use crate::models::{AdWatchState, AutoAdsState, RewardConfig};

pub use auto_ads::AutoAdsController;
pub use clock::CooldownSet;
pub use offers::OfferDispatcher;
pub use session::{RewardSession, DEFAULT_REWARD_SYMBOL};
pub use stats::{ReconcilePolicy, StatsStore};
pub use watch::AdWatchController;

// -----------------------------------------------------------------------------
// 记账入口
// -----------------------------------------------------------------------------

/// 控制器共用的记账句柄：先本地入账，再尽力上报
///
/// 上报失败只记录日志，本地状态以入账结果为准。
pub struct Rewarder<'a> {
    stats: &'a mut StatsStore,
    sink: Option<&'a dyn RewardSink>,
    user_id: &'a str,
    symbol: &'a str,
}

impl<'a> Rewarder<'a> {
    pub fn new(
        stats: &'a mut StatsStore,
        sink: Option<&'a dyn RewardSink>,
        user_id: &'a str,
        symbol: &'a str,
    ) -> Self {
        Self { stats, sink, user_id, symbol }
    }

    /// 不上报的记账句柄
    pub fn detached(stats: &'a mut StatsStore) -> Self {
        Self { stats, sink: None, user_id: "", symbol: DEFAULT_REWARD_SYMBOL }
    }

    pub fn credit(&mut self, delta: RewardDelta, kind: RewardKind) -> Option<StatsRecord> {
        let record = match self.stats.credit(delta) {
            Ok(r) => r,
            Err(e) => {
                log::error!("{} credit rejected: {}", kind.as_str(), e);
                return None;
            }
        };

        if let Some(sink) = self.sink {
            let event = RewardEvent { user_id: self.user_id, symbol: self.symbol, kind, delta };
            if let Err(e) = sink.post_reward(&event) {
                log::warn!("reward post for {} failed, local credit kept: {}", self.user_id, e);
            }
        }
        Some(record)
    }
}
