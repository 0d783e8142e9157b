//! RewardBridge - Integrated Data Models (v0.3.0)
//!
//! # 核心准则
//! 1. **i64 Micros**: 所有金额字段统一为 `c_longlong` (i64)，单位为 10^-6，0.001 = 1_000 Micros。
//! 2. **C 布局**: 所有跨 FFI 的结构体均为 `#[repr(C)]`，偏移量由底部的布局测试锁定。
//! 3. **计数字段**: 次数类字段使用无符号整数，天然满足 `>= 0` 约束。

use libc::{c_int, c_longlong, c_uint, c_ulonglong};

/// 精度缩放常量 (1.0 = 1,000,000 Micros)
pub const MICROS_SCALE: f64 = 1_000_000.0;

/// 优惠位数量
pub const OFFER_SLOTS: usize = 4;
/// 动作位数量 (watch / auto-toggle / rewards)
pub const ACTION_SLOTS: usize = 3;

#[inline]
pub fn micros_to_units(micros: i64) -> f64 {
    (micros as f64) / MICROS_SCALE
}


// ==================== 1. 统计记录 (Stats) ====================

/// 用户会话统计快照 (48 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRecord {
    pub ads_watched: c_ulonglong,           // Offset 0
    pub total_earned_micros: c_longlong,    // Offset 8
    pub daily_ads_watched: c_uint,          // Offset 16: 软上限 500，由宿主策略决定是否拦截
    pub _padding: c_uint,                   // Offset 20
    pub daily_earnings_micros: c_longlong,  // Offset 24
    pub payable_balance_micros: c_longlong, // Offset 32: 可提现余额
    pub site_visits: c_ulonglong,           // Offset 40
}

impl StatsRecord {
    pub fn total_earned(&self) -> f64 {
        micros_to_units(self.total_earned_micros)
    }

    pub fn daily_earnings(&self) -> f64 {
        micros_to_units(self.daily_earnings_micros)
    }

    pub fn payable_balance(&self) -> f64 {
        micros_to_units(self.payable_balance_micros)
    }
}

/// 单次奖励增量 (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardDelta {
    pub amount_micros: c_longlong, // Offset 0
    pub is_ad_watch: bool,         // Offset 8
    pub is_visit: bool,            // Offset 9
}

impl RewardDelta {
    pub fn ad_watch(amount_micros: i64) -> Self {
        Self { amount_micros, is_ad_watch: true, is_visit: false }
    }

    /// 优惠访问同时计入广告次数与访问次数
    pub fn offer_visit(amount_micros: i64) -> Self {
        Self { amount_micros, is_ad_watch: true, is_visit: true }
    }
}

// ==================== 2. 状态机枚举 (States) ====================

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdWatchState {
    Idle = 0,
    Watching = 1,
    Crediting = 2,
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAdsState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

/// 动作冷却位
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSlot {
    Watch = 0,
    AutoToggle = 1,
    Rewards = 2,
}

impl ActionSlot {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(ActionSlot::Watch),
            1 => Some(ActionSlot::AutoToggle),
            2 => Some(ActionSlot::Rewards),
            _ => None,
        }
    }
}

/// 奖励来源，写入流水的 `kind` 列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardKind {
    AdWatch,
    AutoAd,
    Offer,
}

impl RewardKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RewardKind::AdWatch => "ad_watch",
            RewardKind::AutoAd => "auto_ad",
            RewardKind::Offer => "offer",
        }
    }
}

// ==================== 3. 冷却快照 (Snapshots) ====================

/// 全部倒计时的只读快照 (36 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownSnapshot {
    pub offers: [c_uint; OFFER_SLOTS],   // Offset 0
    pub actions: [c_uint; ACTION_SLOTS], // Offset 16
    pub watch: c_uint,                   // Offset 28
    pub auto_wait: c_uint,               // Offset 32: 自动广告循环剩余等待秒数
}

// ==================== 4. 引擎配置 (Configs) ====================

/// 奖励引擎配置 (32 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardConfig {
    pub reward_micros: c_longlong,        // 0: 单次奖励额
    pub watch_seconds: c_uint,            // 8
    pub grace_seconds: c_uint,            // 12
    pub auto_interval_seconds: c_uint,    // 16
    pub offer_cooldown_seconds: c_uint,   // 20
    pub action_cooldown_seconds: c_uint,  // 24
    pub daily_ad_soft_cap: c_uint,        // 28: 仅用于展示，不参与记账
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            reward_micros: 1_000, // 0.001
            watch_seconds: 15,
            grace_seconds: 1,
            auto_interval_seconds: 5,
            offer_cooldown_seconds: 30,
            action_cooldown_seconds: 1,
            daily_ad_soft_cap: 500,
        }
    }
}

/// 验证配置合法性：所有时长必须为正，奖励额必须为正
pub fn validate_config(cfg: &RewardConfig) -> bool {
    cfg.reward_micros > 0
        && cfg.watch_seconds > 0
        && cfg.grace_seconds > 0
        && cfg.auto_interval_seconds > 0
        && cfg.offer_cooldown_seconds > 0
        && cfg.action_cooldown_seconds > 0
}

// ==================== 5. 存储健康度 ====================

/// 流水写入健康度 (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerHealth {
    pub total: c_ulonglong,
    pub dropped: c_ulonglong,
}

// ==================== 6. 静态布局一致性测试 ====================
