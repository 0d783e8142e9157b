//! Reward Session (v0.3.0)
//!
//! 一个用户视图对应一个会话：持有统计、倒计时与三个奖励控制器，
//! 并把宿主协作方以引用的形式注入给它们。会话内部完全单线程，
//! 所有变更都经由 `&mut self`。

use chrono::NaiveDate;

use crate::engine::auto_ads::AutoAdsController;
use crate::engine::clock::CooldownSet;
use crate::engine::offers::OfferDispatcher;
use crate::engine::stats::{ReconcilePolicy, StatsStore};
use crate::engine::watch::AdWatchController;
use crate::engine::Rewarder;
use crate::error::{RewardError, RewardResult};
use crate::host::{Host, StatsSource};
use crate::models::{
    validate_config, ActionSlot, AdWatchState, AutoAdsState, CooldownSnapshot, RewardConfig, StatsRecord,
};

pub const DEFAULT_REWARD_SYMBOL: &str = "USDT";

pub struct RewardSession {
    user_id: String,
    symbol: String,
    config: RewardConfig,
    stats: StatsStore,
    cooldowns: CooldownSet,
    watch: AdWatchController,
    auto_ads: AutoAdsController,
    offers: OfferDispatcher,
    host: Host,
}

impl RewardSession {
    pub fn new(user_id: impl Into<String>, config: RewardConfig, host: Host) -> RewardResult<Self> {
        if !validate_config(&config) {
            return Err(RewardError::InvalidConfig);
        }
        Ok(Self {
            user_id: user_id.into(),
            symbol: DEFAULT_REWARD_SYMBOL.to_string(),
            config,
            stats: StatsStore::new(),
            cooldowns: CooldownSet::new(),
            watch: AdWatchController::new(),
            auto_ads: AutoAdsController::new(),
            offers: OfferDispatcher::new(),
            host,
        })
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // -------------------------------------------------------------------------
    // 统计装填与对账
    // -------------------------------------------------------------------------

    pub fn seed(&mut self, record: StatsRecord) {
        self.stats.reconcile(record, ReconcilePolicy::Overwrite);
    }

    pub fn reconcile(&mut self, remote: StatsRecord, policy: ReconcilePolicy) {
        self.stats.reconcile(remote, policy);
    }

    /// 拉取远端统计并对账；拉取失败保留本地状态
    pub fn sync_from(&mut self, source: &dyn StatsSource, policy: ReconcilePolicy) -> bool {
        match source.fetch_stats(&self.user_id) {
            Ok(remote) => {
                self.stats.reconcile(remote, policy);
                true
            }
            Err(e) => {
                log::warn!("stats fetch for {} failed, keeping local state: {}", self.user_id, e);
                false
            }
        }
    }

    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        let rolled = self.stats.roll_day(today);
        if rolled {
            log::info!("daily counters reset for {} ({})", self.user_id, today);
        }
        rolled
    }

    // -------------------------------------------------------------------------
    // 节拍
    // -------------------------------------------------------------------------

    /// 每秒调用一次：先推进全部倒计时，再让控制器观察结果
    pub fn tick(&mut self) {
        self.cooldowns.tick();
        let mut rewarder = Rewarder::new(&mut self.stats, self.host.sink.as_deref(), &self.user_id, &self.symbol);
        self.watch.on_tick(&self.config, &self.cooldowns, &mut rewarder);
        self.auto_ads.on_tick(&self.config, self.host.ads.as_ref(), &mut rewarder);
    }

    // -------------------------------------------------------------------------
    // 奖励动作
    // -------------------------------------------------------------------------

    pub fn start_watch(&mut self) -> bool {
        let started = self.watch.start_watch(&self.config, &mut self.cooldowns, self.host.ads.as_ref());
        if started {
            self.cooldowns.arm_action(ActionSlot::Watch, self.config.action_cooldown_seconds);
        }
        started
    }

    pub fn start_auto_ads(&mut self) -> bool {
        let mut rewarder = Rewarder::new(&mut self.stats, self.host.sink.as_deref(), &self.user_id, &self.symbol);
        self.auto_ads.start(&self.config, self.host.ads.as_ref(), &mut rewarder)
    }

    pub fn stop_auto_ads(&mut self) -> bool {
        self.auto_ads.stop()
    }

    /// 界面开关入口，受 AutoToggle 动作位去抖
    pub fn toggle_auto_ads(&mut self) -> bool {
        if !self.try_action(ActionSlot::AutoToggle) {
            return false;
        }
        if self.auto_ads.is_running() {
            self.stop_auto_ads();
        } else {
            self.start_auto_ads();
        }
        true
    }

    /// 动作位仍在冷却时返回 false；否则占用该位并返回 true
    pub fn try_action(&mut self, slot: ActionSlot) -> bool {
        if self.cooldowns.action(slot) > 0 {
            return false;
        }
        self.cooldowns.arm_action(slot, self.config.action_cooldown_seconds);
        true
    }

    pub fn dispatch_offer(&mut self, slot: usize, url: &str) -> RewardResult<bool> {
        let mut rewarder = Rewarder::new(&mut self.stats, self.host.sink.as_deref(), &self.user_id, &self.symbol);
        self.offers.dispatch(
            &self.config,
            slot,
            url,
            &mut self.cooldowns,
            self.host.navigator.as_ref(),
            &mut rewarder,
        )
    }

    /// 视图重新挂载：放弃进行中的观看，其余状态保留
    pub fn reset_view(&mut self) {
        self.watch.reset(&mut self.cooldowns);
    }

    // -------------------------------------------------------------------------
    // 只读视图
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> StatsRecord {
        self.stats.snapshot()
    }

    pub fn cooldowns(&self) -> CooldownSnapshot {
        self.cooldowns.snapshot(self.auto_ads.remaining_wait())
    }

    pub fn watch_state(&self) -> AdWatchState {
        self.watch.state()
    }

    /// 开关去抖期间对外报告过渡态
    pub fn auto_ads_state(&self) -> AutoAdsState {
        let base = self.auto_ads.state();
        if self.cooldowns.action(ActionSlot::AutoToggle) == 0 {
            return base;
        }
        match base {
            AutoAdsState::Running | AutoAdsState::Starting => AutoAdsState::Starting,
            AutoAdsState::Stopping | AutoAdsState::Stopped => AutoAdsState::Stopping,
        }
    }

    pub fn daily_cap_reached(&self) -> bool {
        self.stats.daily_cap_reached(self.config.daily_ad_soft_cap)
    }
}
