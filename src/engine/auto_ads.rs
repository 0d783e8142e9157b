//! Auto Ads Controller
//!
//! 可取消的循环：展示广告 -> 入账 -> 等待 -> 检查开关 -> 下一轮。
//! `stop()` 只清除开关，进行中的等待会自然走完，之后循环才退出。

use crate::engine::Rewarder;
use crate::host::AdDisplay;
use crate::models::{AutoAdsState, RewardConfig, RewardDelta, RewardKind};

#[derive(Debug, Clone, Default)]
pub struct AutoAdsController {
    running: bool,
    /// Some 表示循环实例仍在飞行中 (处于轮间等待)
    wait_left: Option<u32>,
    iterations: u64,
}

impl AutoAdsController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AutoAdsState {
        match (self.running, self.wait_left.is_some()) {
            (true, _) => AutoAdsState::Running,
            (false, true) => AutoAdsState::Stopping,
            (false, false) => AutoAdsState::Stopped,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 本轮等待剩余秒数，循环未在飞行时为 0
    pub fn remaining_wait(&self) -> u32 {
        self.wait_left.unwrap_or(0)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// 打开开关；已运行时为 no-op
    ///
    /// 若上一个循环还在等待中，只重新打开开关，由同一个循环继续执行。
    pub fn start(&mut self, cfg: &RewardConfig, ads: &dyn AdDisplay, rewarder: &mut Rewarder<'_>) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        if self.wait_left.is_none() {
            log::debug!("auto ads loop started");
            self.run_iteration(cfg, ads, rewarder);
        } else {
            log::debug!("auto ads re-armed while draining");
        }
        true
    }

    /// 关闭开关；进行中的等待不会被打断
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        log::debug!("auto ads stop requested, {}s left in current wait", self.remaining_wait());
        true
    }

    pub fn on_tick(&mut self, cfg: &RewardConfig, ads: &dyn AdDisplay, rewarder: &mut Rewarder<'_>) {
        let Some(left) = self.wait_left else {
            return;
        };
        let left = left.saturating_sub(1);
        if left > 0 {
            self.wait_left = Some(left);
        } else if self.running {
            self.run_iteration(cfg, ads, rewarder);
        } else {
            self.wait_left = None;
            log::debug!("auto ads loop exited after {} iterations", self.iterations);
        }
    }

    fn run_iteration(&mut self, cfg: &RewardConfig, ads: &dyn AdDisplay, rewarder: &mut Rewarder<'_>) {
        // 展示失败照常入账
        if let Err(e) = ads.show_ad() {
            log::warn!("auto ad display failed: {}", e);
        }
        rewarder.credit(RewardDelta::ad_watch(cfg.reward_micros), RewardKind::AutoAd);
        self.iterations += 1;
        self.wait_left = Some(cfg.auto_interval_seconds.max(1));
    }
}
