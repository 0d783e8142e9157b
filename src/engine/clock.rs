//! Cooldown Clock
//!
//! 三组倒计时共用同一个 1 秒节拍：优惠位、动作位与观看广告专用倒计时。
//! 引擎不持有任何定时器线程，宿主每秒调用一次 `tick()`。

use crate::error::{RewardError, RewardResult};
use crate::models::{ActionSlot, CooldownSnapshot, ACTION_SLOTS, OFFER_SLOTS};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownSet {
    offers: [u32; OFFER_SLOTS],
    actions: [u32; ACTION_SLOTS],
    watch: u32,
}

impl CooldownSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有大于 0 的倒计时减 1，已为 0 的保持 0
    pub fn tick(&mut self) {
        for c in self.offers.iter_mut().chain(self.actions.iter_mut()) {
            *c = c.saturating_sub(1);
        }
        self.watch = self.watch.saturating_sub(1);
    }

    pub fn is_idle(&self) -> bool {
        self.watch == 0 && self.offers.iter().chain(self.actions.iter()).all(|&c| c == 0)
    }

    // ---- 优惠位 ----

    pub fn offer(&self, slot: usize) -> RewardResult<u32> {
        self.offers.get(slot).copied().ok_or(RewardError::InvalidSlot(slot))
    }

    pub fn arm_offer(&mut self, slot: usize, seconds: u32) -> RewardResult<()> {
        let c = self.offers.get_mut(slot).ok_or(RewardError::InvalidSlot(slot))?;
        *c = seconds;
        Ok(())
    }

    // ---- 动作位 ----

    #[inline]
    pub fn action(&self, slot: ActionSlot) -> u32 {
        self.actions[slot.index()]
    }

    #[inline]
    pub fn arm_action(&mut self, slot: ActionSlot, seconds: u32) {
        self.actions[slot.index()] = seconds;
    }

    // ---- 观看倒计时 ----

    #[inline]
    pub fn watch(&self) -> u32 {
        self.watch
    }

    #[inline]
    pub fn arm_watch(&mut self, seconds: u32) {
        self.watch = seconds;
    }

    pub fn clear_watch(&mut self) {
        self.watch = 0;
    }

    pub fn snapshot(&self, auto_wait: u32) -> CooldownSnapshot {
        CooldownSnapshot {
            offers: self.offers,
            actions: self.actions,
            watch: self.watch,
            auto_wait,
        }
    }
}
