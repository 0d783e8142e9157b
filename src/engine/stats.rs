//! Stats Store (v0.3.0)
//!
//! 会话内唯一的奖励计数容器。所有记账先在局部算出完整的新记录，
//! 校验通过后一次性替换，外部永远观察不到半更新状态。

use chrono::NaiveDate;

use crate::error::{RewardError, RewardResult};
use crate::models::{RewardDelta, StatsRecord};

/// 远端统计与本地统计的合并策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePolicy {
    /// 以远端为准整体覆盖
    Overwrite,
    /// 逐字段取较大值，本地计数不会被调低
    Merge,
}

#[derive(Debug, Clone, Default)]
pub struct StatsStore {
    record: StatsRecord,
    day: Option<NaiveDate>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(record: StatsRecord) -> Self {
        Self { record, day: None }
    }

    #[inline]
    pub fn snapshot(&self) -> StatsRecord {
        self.record
    }

    /// 当前每日计数所属的自然日
    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    /// 记账：金额同时计入累计、当日与可提现余额
    pub fn credit(&mut self, delta: RewardDelta) -> RewardResult<StatsRecord> {
        let amount = delta.amount_micros;
        if amount < 0 {
            return Err(RewardError::NegativeAmount(amount));
        }

        let cur = &self.record;
        let mut next = *cur;

        next.total_earned_micros = cur.total_earned_micros.checked_add(amount).ok_or(RewardError::Overflow)?;
        next.daily_earnings_micros = cur.daily_earnings_micros.checked_add(amount).ok_or(RewardError::Overflow)?;
        next.payable_balance_micros = cur.payable_balance_micros.checked_add(amount).ok_or(RewardError::Overflow)?;

        if delta.is_ad_watch {
            next.ads_watched = cur.ads_watched.checked_add(1).ok_or(RewardError::Overflow)?;
            next.daily_ads_watched = cur.daily_ads_watched.checked_add(1).ok_or(RewardError::Overflow)?;
        }
        if delta.is_visit {
            next.site_visits = cur.site_visits.checked_add(1).ok_or(RewardError::Overflow)?;
        }

        self.record = next;
        Ok(next)
    }

    /// 跨日翻转：进入更晚的自然日时清零当日计数，返回是否发生翻转
    ///
    /// 首次观测只记录日期；时间回拨 (更早的日期) 不做任何处理。
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        match self.day {
            None => {
                self.day = Some(today);
                false
            }
            Some(day) if today > day => {
                self.record.daily_ads_watched = 0;
                self.record.daily_earnings_micros = 0;
                self.day = Some(today);
                true
            }
            Some(_) => false,
        }
    }

    /// 软上限查询，记账本身从不拦截
    pub fn daily_cap_reached(&self, cap: u32) -> bool {
        cap > 0 && self.record.daily_ads_watched >= cap
    }

    pub fn reconcile(&mut self, remote: StatsRecord, policy: ReconcilePolicy) {
        self.record = match policy {
            ReconcilePolicy::Overwrite => StatsRecord { _padding: 0, ..remote },
            ReconcilePolicy::Merge => {
                let cur = &self.record;
                StatsRecord {
                    ads_watched: cur.ads_watched.max(remote.ads_watched),
                    total_earned_micros: cur.total_earned_micros.max(remote.total_earned_micros),
                    daily_ads_watched: cur.daily_ads_watched.max(remote.daily_ads_watched),
                    _padding: 0,
                    daily_earnings_micros: cur.daily_earnings_micros.max(remote.daily_earnings_micros),
                    payable_balance_micros: cur.payable_balance_micros.max(remote.payable_balance_micros),
                    site_visits: cur.site_visits.max(remote.site_visits),
                }
            }
        };
    }
}
