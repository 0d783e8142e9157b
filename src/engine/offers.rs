//! Offer Dispatcher
//!
//! 打开外链 -> 入账 -> 该优惠位进入冷却。各优惠位互不影响。

use crate::engine::clock::CooldownSet;
use crate::engine::Rewarder;
use crate::error::RewardResult;
use crate::host::Navigator;
use crate::models::{RewardConfig, RewardDelta, RewardKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct OfferDispatcher;

impl OfferDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// 返回 `Ok(false)` 表示该位仍在冷却，调用被忽略；越界槽位返回错误且不改变任何状态
    pub fn dispatch(
        &self,
        cfg: &RewardConfig,
        slot: usize,
        url: &str,
        cooldowns: &mut CooldownSet,
        navigator: &dyn Navigator,
        rewarder: &mut Rewarder<'_>,
    ) -> RewardResult<bool> {
        if cooldowns.offer(slot)? > 0 {
            return Ok(false);
        }

        if let Err(e) = navigator.open_url(url) {
            log::warn!("offer {} navigation failed: {}", slot, e);
        }
        rewarder.credit(RewardDelta::offer_visit(cfg.reward_micros), RewardKind::Offer);
        cooldowns.arm_offer(slot, cfg.offer_cooldown_seconds)?;

        log::debug!("offer {} dispatched, cooling {}s", slot, cfg.offer_cooldown_seconds);
        Ok(true)
    }
}
