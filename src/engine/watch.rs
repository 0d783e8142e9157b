//! Ad Watch Controller
//!
//! 单次观看广告的状态机：`Idle -> Watching -> Crediting -> Idle`。
//! 观看倒计时由 CooldownClock 递减，本控制器只在每个 tick 之后观察它。

use crate::engine::clock::CooldownSet;
use crate::engine::Rewarder;
use crate::host::AdDisplay;
use crate::models::{AdWatchState, RewardConfig, RewardDelta, RewardKind, StatsRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Watching,
    Crediting { grace_left: u32 },
}

#[derive(Debug, Clone)]
pub struct AdWatchController {
    phase: Phase,
}

impl Default for AdWatchController {
    fn default() -> Self {
        Self { phase: Phase::Idle }
    }
}

impl AdWatchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AdWatchState {
        match self.phase {
            Phase::Idle => AdWatchState::Idle,
            Phase::Watching => AdWatchState::Watching,
            Phase::Crediting { .. } => AdWatchState::Crediting,
        }
    }

    /// 开始一次观看；非 Idle 或倒计时未归零时拒绝 (返回 false)
    pub fn start_watch(&mut self, cfg: &RewardConfig, cooldowns: &mut CooldownSet, ads: &dyn AdDisplay) -> bool {
        if self.phase != Phase::Idle || cooldowns.watch() > 0 {
            return false;
        }

        self.phase = Phase::Watching;
        cooldowns.arm_watch(cfg.watch_seconds);

        // 广告展示失败不影响奖励
        if let Err(e) = ads.show_ad() {
            log::warn!("ad display failed, watch continues: {}", e);
        }
        log::debug!("watch started ({}s)", cfg.watch_seconds);
        true
    }

    /// 在 CooldownClock 完成本轮 tick 之后调用
    ///
    /// 一个 tick 内至多推进一步，因此倒计时归零与入账之间至少隔一个宽限 tick。
    pub fn on_tick(
        &mut self,
        cfg: &RewardConfig,
        cooldowns: &CooldownSet,
        rewarder: &mut Rewarder<'_>,
    ) -> Option<StatsRecord> {
        match self.phase {
            Phase::Idle => None,
            Phase::Watching => {
                if cooldowns.watch() == 0 {
                    self.phase = Phase::Crediting { grace_left: cfg.grace_seconds.max(1) };
                }
                None
            }
            Phase::Crediting { grace_left } => {
                let left = grace_left.saturating_sub(1);
                if left > 0 {
                    self.phase = Phase::Crediting { grace_left: left };
                    return None;
                }
                self.phase = Phase::Idle;
                let credited = rewarder.credit(RewardDelta::ad_watch(cfg.reward_micros), RewardKind::AdWatch);
                log::debug!("watch credited: {}", credited.is_some());
                credited
            }
        }
    }

    /// 视图重新挂载：放弃进行中的观看
    pub fn reset(&mut self, cooldowns: &mut CooldownSet) {
        self.phase = Phase::Idle;
        cooldowns.clear_watch();
    }
}
