// ==================================================
// FILE: rewardbridge-rust/src/lib.rs
// ==================================================

use libc::{c_char, c_int, c_longlong, c_ulonglong};
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr;

// -----------------------------------------------------------------------------
// 模块声明
// -----------------------------------------------------------------------------
pub mod engine;
pub mod error;
pub mod host;
pub mod models;
pub mod registry;
pub mod storage;

use crate::engine::{ReconcilePolicy, RewardSession};
use crate::error::RewardError;
use crate::host::{Host, HostOutbox, OpenUrlCallback, ShowAdCallback};
use crate::models::*;
use crate::storage::GlobalLedgerSink;

// -----------------------------------------------------------------------------
// 0. 错误通讯协议 (The Protocol)
// -----------------------------------------------------------------------------

#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RewardStatus {
    Ok = 0,
    NullPointer = 1,
    InvalidValue = 3,
    UnknownSession = 5,
    NumericOverflow = 10,
    StorageError = 20,
    InternalError = 100,
    Panic = 101,
    Fatal = 255,
}

impl From<&RewardError> for RewardStatus {
    fn from(e: &RewardError) -> Self {
        match e {
            RewardError::NegativeAmount(_) | RewardError::InvalidSlot(_) | RewardError::InvalidConfig => {
                RewardStatus::InvalidValue
            }
            RewardError::Overflow => RewardStatus::NumericOverflow,
            RewardError::LedgerClosed | RewardError::Storage(_) | RewardError::Io(_) => RewardStatus::StorageError,
        }
    }
}

// -----------------------------------------------------------------------------
// FFI 安全屏障 (The Firewall)
// -----------------------------------------------------------------------------

macro_rules! ffi_guard {
    ($body:expr) => {{
        let result = panic::catch_unwind(AssertUnwindSafe($body));
        match result {
            Ok(status) => status as c_int,
            Err(e) => {
                let msg = if let Some(s) = e.downcast_ref::<&str>() {
                    *s
                } else if let Some(s) = e.downcast_ref::<String>() {
                    s.as_str()
                } else {
                    "Unknown panic"
                };
                log::error!("PANIC INTERCEPTED: {}", msg);
                RewardStatus::Panic as c_int
            }
        }
    }};
}

/// 在会话锁内执行，句柄无效时返回 UnknownSession
fn session_call(handle: c_ulonglong, f: impl FnOnce(&mut RewardSession) -> RewardStatus) -> RewardStatus {
    registry::with_session(handle, f).unwrap_or(RewardStatus::UnknownSession)
}

fn today_from_millis(now_ms: c_longlong) -> Option<chrono::NaiveDate> {
    if now_ms <= 0 {
        return None;
    }
    chrono::DateTime::from_timestamp_millis(now_ms).map(|dt| dt.date_naive())
}

fn policy_from_raw(merge: c_int) -> ReconcilePolicy {
    if merge != 0 {
        ReconcilePolicy::Merge
    } else {
        ReconcilePolicy::Overwrite
    }
}

// -----------------------------------------------------------------------------
// 1. 系统基础与并发控制
// -----------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn rewardbridge_abi_version() -> c_int {
    0x0003_0000
}

#[no_mangle]
pub extern "C" fn rewardbridge_version() -> *const c_char {
    static VERSION: &[u8] = b"RewardBridge Native Core v0.3.0\0";
    VERSION.as_ptr() as *const c_char
}

#[no_mangle]
pub extern "C" fn rewardbridge_init_threading(num_threads: c_int) -> c_int {
    if num_threads <= 0 {
        return RewardStatus::InvalidValue as c_int;
    }
    let config = rayon::ThreadPoolBuilder::new().num_threads(num_threads as usize);
    match config.build_global() {
        Ok(_) => RewardStatus::Ok as c_int,
        Err(_) => RewardStatus::InternalError as c_int,
    }
}

#[no_mangle]
pub extern "C" fn rewardbridge_register_host(
    show_ad: Option<ShowAdCallback>,
    open_url: Option<OpenUrlCallback>,
) -> c_int {
    ffi_guard!(|| {
        host::register_callbacks(show_ad, open_url);
        RewardStatus::Ok
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_default_config(out_cfg: *mut RewardConfig) -> c_int {
    ffi_guard!(|| {
        if out_cfg.is_null() {
            return RewardStatus::NullPointer;
        }
        ptr::write(out_cfg, RewardConfig::default());
        RewardStatus::Ok
    })
}

// -----------------------------------------------------------------------------
// 2. 流水存储与监控
// -----------------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn rewardbridge_init_ledger(path_ptr: *const c_char) -> c_int {
    ffi_guard!(|| {
        if path_ptr.is_null() {
            return RewardStatus::NullPointer;
        }
        let path_result = unsafe { CStr::from_ptr(path_ptr).to_str() };

        match path_result {
            Ok(path_str) => match storage::init_global_ledger(Path::new(path_str)) {
                Ok(_) => RewardStatus::Ok,
                Err(e) => {
                    log::error!("ledger init failed: {}", e);
                    RewardStatus::Fatal
                }
            },
            Err(_) => RewardStatus::InvalidValue,
        }
    })
}

#[no_mangle]
pub extern "C" fn rewardbridge_shutdown_ledger() -> c_int {
    ffi_guard!(|| {
        match storage::shutdown_global_ledger() {
            Ok(()) => RewardStatus::Ok,
            Err(e) => RewardStatus::from(&e),
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_get_ledger_health(out_health: *mut LedgerHealth) -> c_int {
    ffi_guard!(|| {
        if out_health.is_null() {
            return RewardStatus::NullPointer;
        }
        let health = storage::global_ledger().map(|l| l.health()).unwrap_or_default();
        ptr::write(out_health, health);
        RewardStatus::Ok
    })
}

// -----------------------------------------------------------------------------
// 3. 会话生命周期
// -----------------------------------------------------------------------------

/// `cfg_ptr` 可为空，此时使用默认配置
#[no_mangle]
pub unsafe extern "C" fn rewardbridge_session_create(
    user_ptr: *const c_char,
    cfg_ptr: *const RewardConfig,
    out_handle: *mut c_ulonglong,
) -> c_int {
    ffi_guard!(|| {
        if user_ptr.is_null() || out_handle.is_null() {
            return RewardStatus::NullPointer;
        }
        let user_id = match CStr::from_ptr(user_ptr).to_str() {
            Ok(s) if !s.is_empty() => s.to_owned(),
            _ => return RewardStatus::InvalidValue,
        };
        let config = if cfg_ptr.is_null() { RewardConfig::default() } else { *cfg_ptr };

        let outbox = std::sync::Arc::new(HostOutbox::default());
        let mut host = Host::deferred(outbox.clone());
        if storage::global_ledger().is_some() {
            host = host.with_sink(std::sync::Arc::new(GlobalLedgerSink));
        }

        let session = match RewardSession::new(user_id, config, host) {
            Ok(s) => s,
            Err(e) => return RewardStatus::from(&e),
        };
        match registry::register(session, outbox) {
            Some(handle) => {
                *out_handle = handle;
                RewardStatus::Ok
            }
            None => RewardStatus::InternalError,
        }
    })
}

#[no_mangle]
pub extern "C" fn rewardbridge_session_destroy(handle: c_ulonglong) -> c_int {
    ffi_guard!(|| {
        if registry::remove(handle) {
            RewardStatus::Ok
        } else {
            RewardStatus::UnknownSession
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_session_seed(handle: c_ulonglong, stats_ptr: *const StatsRecord) -> c_int {
    ffi_guard!(|| {
        if stats_ptr.is_null() {
            return RewardStatus::NullPointer;
        }
        let record = *stats_ptr;
        session_call(handle, |s| {
            s.seed(record);
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_session_reconcile(
    handle: c_ulonglong,
    stats_ptr: *const StatsRecord,
    merge: c_int,
) -> c_int {
    ffi_guard!(|| {
        if stats_ptr.is_null() {
            return RewardStatus::NullPointer;
        }
        let record = *stats_ptr;
        session_call(handle, |s| {
            s.reconcile(record, policy_from_raw(merge));
            RewardStatus::Ok
        })
    })
}

/// 以全局账本回放的统计对账
#[no_mangle]
pub extern "C" fn rewardbridge_session_sync_ledger(handle: c_ulonglong, merge: c_int) -> c_int {
    ffi_guard!(|| {
        let Some(ledger) = storage::global_ledger() else {
            return RewardStatus::StorageError;
        };
        session_call(handle, |s| {
            if s.sync_from(ledger.as_ref(), policy_from_raw(merge)) {
                RewardStatus::Ok
            } else {
                RewardStatus::StorageError
            }
        })
    })
}

// -----------------------------------------------------------------------------
// 4. 节拍驱动
// -----------------------------------------------------------------------------

/// `now_ms <= 0` 时跳过跨日检查
#[no_mangle]
pub extern "C" fn rewardbridge_session_tick(handle: c_ulonglong, now_ms: c_longlong) -> c_int {
    ffi_guard!(|| {
        let today = today_from_millis(now_ms);
        session_call(handle, |s| {
            if let Some(day) = today {
                s.roll_day(day);
            }
            s.tick();
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_tick_all(now_ms: c_longlong, out_count: *mut c_ulonglong) -> c_int {
    ffi_guard!(|| {
        let ticked = registry::tick_all(today_from_millis(now_ms));
        if !out_count.is_null() {
            *out_count = ticked as c_ulonglong;
        }
        RewardStatus::Ok
    })
}

// -----------------------------------------------------------------------------
// 5. 奖励动作
// -----------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_start_watch(handle: c_ulonglong, out_started: *mut c_int) -> c_int {
    ffi_guard!(|| {
        if out_started.is_null() {
            return RewardStatus::NullPointer;
        }
        session_call(handle, |s| {
            *out_started = s.start_watch() as c_int;
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_toggle_auto_ads(handle: c_ulonglong, out_accepted: *mut c_int) -> c_int {
    ffi_guard!(|| {
        if out_accepted.is_null() {
            return RewardStatus::NullPointer;
        }
        session_call(handle, |s| {
            *out_accepted = s.toggle_auto_ads() as c_int;
            RewardStatus::Ok
        })
    })
}

/// 直接开关自动广告 (不经过去抖)，`enabled != 0` 为开启
#[no_mangle]
pub unsafe extern "C" fn rewardbridge_set_auto_ads(
    handle: c_ulonglong,
    enabled: c_int,
    out_changed: *mut c_int,
) -> c_int {
    ffi_guard!(|| {
        if out_changed.is_null() {
            return RewardStatus::NullPointer;
        }
        session_call(handle, |s| {
            let changed = if enabled != 0 { s.start_auto_ads() } else { s.stop_auto_ads() };
            *out_changed = changed as c_int;
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_try_action(
    handle: c_ulonglong,
    slot: c_int,
    out_accepted: *mut c_int,
) -> c_int {
    ffi_guard!(|| {
        if out_accepted.is_null() {
            return RewardStatus::NullPointer;
        }
        // AutoToggle 位只由 rewardbridge_toggle_auto_ads 占用
        let action = match ActionSlot::from_raw(slot) {
            Some(ActionSlot::AutoToggle) | None => return RewardStatus::InvalidValue,
            Some(action) => action,
        };
        session_call(handle, |s| {
            *out_accepted = s.try_action(action) as c_int;
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_dispatch_offer(
    handle: c_ulonglong,
    slot: c_int,
    url_ptr: *const c_char,
    out_dispatched: *mut c_int,
) -> c_int {
    ffi_guard!(|| {
        if url_ptr.is_null() || out_dispatched.is_null() {
            return RewardStatus::NullPointer;
        }
        if slot < 0 {
            return RewardStatus::InvalidValue;
        }
        let url = match CStr::from_ptr(url_ptr).to_str() {
            Ok(u) => u,
            Err(_) => return RewardStatus::InvalidValue,
        };
        session_call(handle, |s| match s.dispatch_offer(slot as usize, url) {
            Ok(dispatched) => {
                *out_dispatched = dispatched as c_int;
                RewardStatus::Ok
            }
            Err(e) => RewardStatus::from(&e),
        })
    })
}

#[no_mangle]
pub extern "C" fn rewardbridge_reset_view(handle: c_ulonglong) -> c_int {
    ffi_guard!(|| {
        session_call(handle, |s| {
            s.reset_view();
            RewardStatus::Ok
        })
    })
}

// -----------------------------------------------------------------------------
// 6. 只读快照
// -----------------------------------------------------------------------------

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_get_stats(handle: c_ulonglong, out_stats: *mut StatsRecord) -> c_int {
    ffi_guard!(|| {
        if out_stats.is_null() {
            return RewardStatus::NullPointer;
        }
        session_call(handle, |s| {
            ptr::write(out_stats, s.stats());
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_get_cooldowns(
    handle: c_ulonglong,
    out_cooldowns: *mut CooldownSnapshot,
) -> c_int {
    ffi_guard!(|| {
        if out_cooldowns.is_null() {
            return RewardStatus::NullPointer;
        }
        session_call(handle, |s| {
            ptr::write(out_cooldowns, s.cooldowns());
            RewardStatus::Ok
        })
    })
}

#[no_mangle]
pub unsafe extern "C" fn rewardbridge_get_states(
    handle: c_ulonglong,
    out_watch: *mut c_int,
    out_auto: *mut c_int,
    out_cap_reached: *mut c_int,
) -> c_int {
    ffi_guard!(|| {
        if out_watch.is_null() || out_auto.is_null() || out_cap_reached.is_null() {
            return RewardStatus::NullPointer;
        }
        session_call(handle, |s| {
            *out_watch = s.watch_state() as c_int;
            *out_auto = s.auto_ads_state() as c_int;
            *out_cap_reached = s.daily_cap_reached() as c_int;
            RewardStatus::Ok
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::callbacks::callback_test_lock;
    use std::ffi::CString;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    const OK: c_int = RewardStatus::Ok as c_int;

    unsafe fn create(user: &str) -> c_ulonglong {
        let user = CString::new(user).unwrap();
        let mut handle: c_ulonglong = 0;
        assert_eq!(rewardbridge_session_create(user.as_ptr(), ptr::null(), &mut handle), OK);
        handle
    }

    #[test]
    fn test_ffi_watch_cycle() {
        let _guard = callback_test_lock();
        unsafe {
            let handle = create("ffi-watch");
            let mut started: c_int = 0;
            assert_eq!(rewardbridge_start_watch(handle, &mut started), OK);
            assert_eq!(started, 1);
            assert_eq!(rewardbridge_start_watch(handle, &mut started), OK);
            assert_eq!(started, 0);

            for _ in 0..16 {
                assert_eq!(rewardbridge_session_tick(handle, 0), OK);
            }

            let mut stats = StatsRecord::default();
            assert_eq!(rewardbridge_get_stats(handle, &mut stats), OK);
            assert_eq!(stats.ads_watched, 1);
            assert_eq!(stats.payable_balance_micros, 1_000);

            let (mut w, mut a, mut cap) = (-1, -1, -1);
            assert_eq!(rewardbridge_get_states(handle, &mut w, &mut a, &mut cap), OK);
            assert_eq!(w, AdWatchState::Idle as c_int);
            assert_eq!(a, AutoAdsState::Stopped as c_int);
            assert_eq!(cap, 0);

            assert_eq!(rewardbridge_session_destroy(handle), OK);
        }
    }

    #[test]
    fn test_ffi_offer_dispatch() {
        let _guard = callback_test_lock();
        unsafe {
            let handle = create("ffi-offer");
            let url = CString::new("https://example.com").unwrap();
            let mut dispatched: c_int = 0;

            assert_eq!(rewardbridge_dispatch_offer(handle, 2, url.as_ptr(), &mut dispatched), OK);
            assert_eq!(dispatched, 1);
            assert_eq!(rewardbridge_dispatch_offer(handle, 2, url.as_ptr(), &mut dispatched), OK);
            assert_eq!(dispatched, 0);

            assert_eq!(
                rewardbridge_dispatch_offer(handle, 9, url.as_ptr(), &mut dispatched),
                RewardStatus::InvalidValue as c_int
            );

            let mut snap = CooldownSnapshot::default();
            assert_eq!(rewardbridge_get_cooldowns(handle, &mut snap), OK);
            assert_eq!(snap.offers, [0, 0, 30, 0]);

            rewardbridge_session_destroy(handle);
        }
    }

    #[test]
    fn test_ffi_seed_and_rollover() {
        let _guard = callback_test_lock();
        unsafe {
            let handle = create("ffi-seed");
            let seed = StatsRecord { ads_watched: 10, daily_ads_watched: 10, ..Default::default() };
            assert_eq!(rewardbridge_session_seed(handle, &seed), OK);

            // 2026-10-16 12:00 UTC -> 次日 12:00 UTC
            let day1: c_longlong = 1_792_152_000_000;
            let day2 = day1 + 86_400_000;
            rewardbridge_session_tick(handle, day1);
            rewardbridge_session_tick(handle, day2);

            let mut stats = StatsRecord::default();
            rewardbridge_get_stats(handle, &mut stats);
            assert_eq!(stats.ads_watched, 10);
            assert_eq!(stats.daily_ads_watched, 0);

            let remote = StatsRecord { ads_watched: 4, site_visits: 9, ..Default::default() };
            assert_eq!(rewardbridge_session_reconcile(handle, &remote, 1), OK);
            rewardbridge_get_stats(handle, &mut stats);
            assert_eq!((stats.ads_watched, stats.site_visits), (10, 9));

            rewardbridge_session_destroy(handle);
        }
    }

    #[test]
    fn test_ffi_auto_ads_and_actions() {
        let _guard = callback_test_lock();
        unsafe {
            let handle = create("ffi-auto");
            let mut flag: c_int = 0;
            assert_eq!(rewardbridge_toggle_auto_ads(handle, &mut flag), OK);
            assert_eq!(flag, 1);
            assert_eq!(rewardbridge_toggle_auto_ads(handle, &mut flag), OK);
            assert_eq!(flag, 0, "去抖期间拒绝");

            assert_eq!(rewardbridge_set_auto_ads(handle, 0, &mut flag), OK);
            assert_eq!(flag, 1);
            for _ in 0..5 {
                rewardbridge_session_tick(handle, 0);
            }
            let mut snap = CooldownSnapshot::default();
            rewardbridge_get_cooldowns(handle, &mut snap);
            assert_eq!(snap.auto_wait, 0);

            assert_eq!(rewardbridge_try_action(handle, 2, &mut flag), OK);
            assert_eq!(flag, 1);
            assert_eq!(rewardbridge_try_action(handle, 7, &mut flag), RewardStatus::InvalidValue as c_int);

            rewardbridge_session_destroy(handle);
        }
    }

    #[test]
    fn test_ffi_guards() {
        let _guard = callback_test_lock();
        unsafe {
            let mut handle: c_ulonglong = 0;
            assert_eq!(
                rewardbridge_session_create(ptr::null(), ptr::null(), &mut handle),
                RewardStatus::NullPointer as c_int
            );

            let bad_cfg = RewardConfig { watch_seconds: 0, ..Default::default() };
            let user = CString::new("ffi-bad").unwrap();
            assert_eq!(
                rewardbridge_session_create(user.as_ptr(), &bad_cfg, &mut handle),
                RewardStatus::InvalidValue as c_int
            );

            let mut started: c_int = 0;
            assert_eq!(
                rewardbridge_start_watch(u64::MAX, &mut started),
                RewardStatus::UnknownSession as c_int
            );
            assert_eq!(rewardbridge_session_destroy(u64::MAX), RewardStatus::UnknownSession as c_int);

            let mut cfg = RewardConfig { watch_seconds: 0, ..Default::default() };
            assert_eq!(rewardbridge_default_config(&mut cfg), OK);
            assert_eq!(cfg, RewardConfig::default());
        }
    }

    static REENTRANT_HANDLE: AtomicU64 = AtomicU64::new(0);
    static REENTRANT_READS: AtomicU64 = AtomicU64::new(0);

    /// 在广告回调内回读同一会话的统计
    extern "C" fn reentrant_show_ad() -> c_int {
        let mut stats = StatsRecord::default();
        let status = unsafe { rewardbridge_get_stats(REENTRANT_HANDLE.load(Ordering::SeqCst), &mut stats) };
        if status == OK {
            REENTRANT_READS.fetch_add(1, Ordering::SeqCst);
        }
        0
    }

    extern "C" fn rejecting_open_url(_url: *const c_char) -> c_int {
        -1
    }

    #[test]
    fn test_ffi_reentrant_callback_does_not_deadlock() {
        let _guard = callback_test_lock();
        rewardbridge_register_host(Some(reentrant_show_ad), None);
        let handle = unsafe { create("ffi-reentrant") };
        REENTRANT_HANDLE.store(handle, Ordering::SeqCst);
        let reads = REENTRANT_READS.load(Ordering::SeqCst);

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut started: c_int = 0;
            let status = unsafe { rewardbridge_start_watch(handle, &mut started) };
            let auto = unsafe { rewardbridge_set_auto_ads(handle, 1, &mut started) };
            let tick = rewardbridge_session_tick(handle, 0);
            let _ = tx.send((status, auto, tick));
        });

        let (status, auto, tick) = rx.recv_timeout(Duration::from_secs(5)).expect("回调重入导致会话锁死");
        assert_eq!((status, auto, tick), (OK, OK, OK));
        // start_watch 与自动广告首轮各展示一次
        assert!(REENTRANT_READS.load(Ordering::SeqCst) >= reads + 2);

        rewardbridge_register_host(None, None);
        rewardbridge_session_destroy(handle);
    }

    #[test]
    fn test_ffi_failing_navigation_still_credits() {
        let _guard = callback_test_lock();
        rewardbridge_register_host(None, Some(rejecting_open_url));
        unsafe {
            let handle = create("ffi-nav-fail");
            let url = CString::new("https://example.com").unwrap();
            let mut dispatched: c_int = 0;
            assert_eq!(rewardbridge_dispatch_offer(handle, 1, url.as_ptr(), &mut dispatched), OK);
            assert_eq!(dispatched, 1);

            let mut stats = StatsRecord::default();
            rewardbridge_get_stats(handle, &mut stats);
            assert_eq!((stats.site_visits, stats.payable_balance_micros), (1, 1_000));
            rewardbridge_session_destroy(handle);
        }
        rewardbridge_register_host(None, None);
    }

    #[test]
    fn test_ffi_auto_toggle_slot_reserved() {
        let _guard = callback_test_lock();
        unsafe {
            let handle = create("ffi-reserved");
            let mut flag: c_int = 0;
            assert_eq!(rewardbridge_try_action(handle, 1, &mut flag), RewardStatus::InvalidValue as c_int);

            let (mut w, mut a, mut cap) = (-1, -1, -1);
            rewardbridge_get_states(handle, &mut w, &mut a, &mut cap);
            assert_eq!(a, AutoAdsState::Stopped as c_int);
            rewardbridge_session_destroy(handle);
        }
    }

    #[test]
    fn test_ffi_ledger_reopens_after_shutdown() {
        let _guard = callback_test_lock();
        let dir = tempfile::tempdir().unwrap();
        let path = CString::new(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(rewardbridge_init_ledger(path.as_ptr()), OK);
        unsafe {
            let handle = create("ffi-ledger");
            let url = CString::new("https://example.com").unwrap();
            let mut dispatched: c_int = 0;
            rewardbridge_dispatch_offer(handle, 0, url.as_ptr(), &mut dispatched);

            assert_eq!(rewardbridge_shutdown_ledger(), OK);
            assert_eq!(rewardbridge_shutdown_ledger(), RewardStatus::StorageError as c_int);
            assert!(storage::global_ledger().is_none());

            assert_eq!(rewardbridge_init_ledger(path.as_ptr()), OK);
            let ledger = storage::global_ledger().unwrap();
            assert!(ledger.is_running());

            // 已有会话的上报自动接入新账本
            rewardbridge_dispatch_offer(handle, 1, url.as_ptr(), &mut dispatched);
            ledger.sync().unwrap();
            let mut health = LedgerHealth::default();
            rewardbridge_get_ledger_health(&mut health);
            assert_eq!(health, LedgerHealth { total: 1, dropped: 0 });

            use crate::host::StatsSource;
            let replay = ledger.fetch_stats("ffi-ledger").unwrap();
            assert_eq!(replay.site_visits, 2, "关闭前后的流水都应可回放");

            rewardbridge_session_destroy(handle);
        }
        assert_eq!(rewardbridge_shutdown_ledger(), OK);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(RewardStatus::from(&RewardError::InvalidSlot(4)), RewardStatus::InvalidValue);
        assert_eq!(RewardStatus::from(&RewardError::Overflow), RewardStatus::NumericOverflow);
        assert_eq!(RewardStatus::from(&RewardError::LedgerClosed), RewardStatus::StorageError);
    }
}
