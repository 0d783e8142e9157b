use std::ffi::CString;
use std::sync::{Mutex, RwLock};

use lazy_static::lazy_static;
use libc::{c_char, c_int};

use super::{AdDisplay, Navigator};
use crate::error::CollaboratorError;

/// 宿主广告回调：返回 0 表示展示成功
pub type ShowAdCallback = extern "C" fn() -> c_int;

/// 宿主导航回调：参数为以 NUL 结尾的 UTF-8 URL，返回 0 表示成功
pub type OpenUrlCallback = extern "C" fn(url: *const c_char) -> c_int;

#[derive(Debug, Clone, Copy, Default)]
struct CallbackTable {
    show_ad: Option<ShowAdCallback>,
    open_url: Option<OpenUrlCallback>,
}

lazy_static! {
    static ref CALLBACKS: RwLock<CallbackTable> = RwLock::new(CallbackTable::default());
}

/// 注册 (或替换) 全局宿主回调，传入 None 即注销
pub fn register_callbacks(show_ad: Option<ShowAdCallback>, open_url: Option<OpenUrlCallback>) {
    match CALLBACKS.write() {
        Ok(mut table) => {
            *table = CallbackTable { show_ad, open_url };
            log::info!(
                "host callbacks registered (show_ad={}, open_url={})",
                show_ad.is_some(),
                open_url.is_some()
            );
        }
        Err(_) => log::error!("host callback table poisoned, registration ignored"),
    }
}

fn current() -> CallbackTable {
    CALLBACKS.read().map(|t| *t).unwrap_or_default()
}

// -----------------------------------------------------------------------------
// 直接调用
// -----------------------------------------------------------------------------

/// 立即调用已注册的 C 回调；调用时才读取回调表
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisteredHost;

impl AdDisplay for RegisteredHost {
    fn show_ad(&self) -> Result<(), CollaboratorError> {
        let cb = current().show_ad.ok_or(CollaboratorError::Unavailable)?;
        match cb() {
            0 => Ok(()),
            code => Err(CollaboratorError::Host(code)),
        }
    }
}

impl Navigator for RegisteredHost {
    fn open_url(&self, url: &str) -> Result<(), CollaboratorError> {
        let cb = current().open_url.ok_or(CollaboratorError::Unavailable)?;
        let c_url = CString::new(url).map_err(|_| CollaboratorError::InvalidUrl)?;
        match cb(c_url.as_ptr()) {
            0 => Ok(()),
            code => Err(CollaboratorError::Host(code)),
        }
    }
}

// -----------------------------------------------------------------------------
// 延迟调用
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostCall {
    ShowAd,
    OpenUrl(String),
}

/// 会话侧的回调发件箱
///
/// 会话在锁内只登记要做的宿主调用，调用方释放会话锁后再 `dispatch`。
/// 回调因此可以重入任意 `rewardbridge_*` 入口 (包括同一句柄)。
#[derive(Debug, Default)]
pub struct HostOutbox {
    pending: Mutex<Vec<HostCall>>,
}

impl HostOutbox {
    fn push(&self, call: HostCall) -> Result<(), CollaboratorError> {
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.push(call);
                Ok(())
            }
            Err(_) => Err(CollaboratorError::Unavailable),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 取出全部待发调用并逐个执行，返回执行的数量；失败只记录
    pub fn dispatch(&self) -> usize {
        let calls = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return 0,
        };

        let host = RegisteredHost;
        for call in &calls {
            let result = match call {
                HostCall::ShowAd => host.show_ad(),
                HostCall::OpenUrl(url) => host.open_url(url),
            };
            if let Err(e) = result {
                log::warn!("deferred host call {:?} failed: {}", call, e);
            }
        }
        calls.len()
    }
}

impl AdDisplay for HostOutbox {
    fn show_ad(&self) -> Result<(), CollaboratorError> {
        self.push(HostCall::ShowAd)
    }
}

impl Navigator for HostOutbox {
    fn open_url(&self, url: &str) -> Result<(), CollaboratorError> {
        // 无法转成 C 字符串的 URL 在登记时就拒绝
        if url.contains('\0') {
            return Err(CollaboratorError::InvalidUrl);
        }
        self.push(HostCall::OpenUrl(url.to_string()))
    }
}

/// 注册全局回调的测试共用此锁，避免并行测试互相替换回调表
#[cfg(test)]
pub(crate) fn callback_test_lock() -> std::sync::MutexGuard<'static, ()> {
    lazy_static! {
        static ref LOCK: Mutex<()> = Mutex::new(());
    }
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static SHOWN: AtomicUsize = AtomicUsize::new(0);
    static OPENED: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn counting_show_ad() -> c_int {
        SHOWN.fetch_add(1, Ordering::SeqCst);
        0
    }

    extern "C" fn rejecting_show_ad() -> c_int {
        7
    }

    extern "C" fn checking_open_url(url: *const c_char) -> c_int {
        let url = unsafe { CStr::from_ptr(url) };
        if url.to_bytes().starts_with(b"https://") {
            OPENED.fetch_add(1, Ordering::SeqCst);
            0
        } else {
            3
        }
    }

    #[test]
    fn test_unregistered_callbacks_are_unavailable() {
        let _guard = callback_test_lock();
        register_callbacks(None, None);

        assert!(matches!(RegisteredHost.show_ad(), Err(CollaboratorError::Unavailable)));
        assert!(matches!(RegisteredHost.open_url("https://example.com"), Err(CollaboratorError::Unavailable)));
    }

    #[test]
    fn test_callback_return_codes() {
        let _guard = callback_test_lock();
        register_callbacks(Some(rejecting_show_ad), Some(checking_open_url));

        assert!(matches!(RegisteredHost.show_ad(), Err(CollaboratorError::Host(7))));
        assert!(RegisteredHost.open_url("https://example.com").is_ok());
        assert!(matches!(RegisteredHost.open_url("ftp://example.com"), Err(CollaboratorError::Host(3))));
        assert!(matches!(RegisteredHost.open_url("https://a\0b"), Err(CollaboratorError::InvalidUrl)));

        register_callbacks(None, None);
    }

    #[test]
    fn test_outbox_defers_until_dispatch() {
        let _guard = callback_test_lock();
        register_callbacks(Some(counting_show_ad), Some(checking_open_url));
        let shown = SHOWN.load(Ordering::SeqCst);
        let opened = OPENED.load(Ordering::SeqCst);

        let outbox = HostOutbox::default();
        outbox.show_ad().unwrap();
        outbox.open_url("https://example.com").unwrap();
        assert!(matches!(outbox.open_url("https://a\0b"), Err(CollaboratorError::InvalidUrl)));
        assert_eq!(outbox.pending(), 2);
        assert_eq!(SHOWN.load(Ordering::SeqCst), shown, "登记阶段不触发回调");

        assert_eq!(outbox.dispatch(), 2);
        assert_eq!(SHOWN.load(Ordering::SeqCst), shown + 1);
        assert_eq!(OPENED.load(Ordering::SeqCst), opened + 1);
        assert_eq!(outbox.pending(), 0);
        assert_eq!(outbox.dispatch(), 0);

        register_callbacks(None, None);
    }

    #[test]
    fn test_outbox_swallows_failures() {
        let _guard = callback_test_lock();
        register_callbacks(Some(rejecting_show_ad), None);

        let outbox = HostOutbox::default();
        outbox.show_ad().unwrap();
        outbox.open_url("https://example.com").unwrap();
        assert_eq!(outbox.dispatch(), 2);

        register_callbacks(None, None);
    }
}
