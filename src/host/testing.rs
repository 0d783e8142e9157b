//! 测试用协作方：记录每一次调用，可配置为失败

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{AdDisplay, Host, Navigator, RewardEvent, RewardSink, StatsSource};
use crate::error::CollaboratorError;
use crate::models::{RewardKind, StatsRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedReward {
    pub user_id: String,
    pub symbol: String,
    pub kind: RewardKind,
    pub amount_micros: i64,
}

#[derive(Default)]
pub struct RecordingHost {
    pub fail_ads: bool,
    pub fail_navigation: bool,
    pub fail_posts: bool,
    pub remote: Option<StatsRecord>,
    ads_shown: AtomicUsize,
    opened: Mutex<Vec<String>>,
    posted: Mutex<Vec<PostedReward>>,
}

impl RecordingHost {
    pub fn failing() -> Self {
        Self { fail_ads: true, fail_navigation: true, fail_posts: true, ..Default::default() }
    }

    pub fn with_remote(remote: StatsRecord) -> Self {
        Self { remote: Some(remote), ..Default::default() }
    }

    pub fn ads_shown(&self) -> usize {
        self.ads_shown.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<PostedReward> {
        self.posted.lock().unwrap().clone()
    }
}

impl AdDisplay for RecordingHost {
    fn show_ad(&self) -> Result<(), CollaboratorError> {
        self.ads_shown.fetch_add(1, Ordering::SeqCst);
        if self.fail_ads {
            return Err(CollaboratorError::Host(-1));
        }
        Ok(())
    }
}

impl Navigator for RecordingHost {
    fn open_url(&self, url: &str) -> Result<(), CollaboratorError> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail_navigation {
            return Err(CollaboratorError::Host(-2));
        }
        Ok(())
    }
}

impl RewardSink for RecordingHost {
    fn post_reward(&self, event: &RewardEvent<'_>) -> Result<(), CollaboratorError> {
        self.posted.lock().unwrap().push(PostedReward {
            user_id: event.user_id.to_string(),
            symbol: event.symbol.to_string(),
            kind: event.kind,
            amount_micros: event.delta.amount_micros,
        });
        if self.fail_posts {
            return Err(CollaboratorError::Remote("503".into()));
        }
        Ok(())
    }
}

impl StatsSource for RecordingHost {
    fn fetch_stats(&self, _user_id: &str) -> Result<StatsRecord, CollaboratorError> {
        self.remote.ok_or(CollaboratorError::Remote("no stats".into()))
    }
}

/// 以同一个记录器充当全部协作方
pub fn host_for(recorder: &Arc<RecordingHost>) -> Host {
    Host::new(recorder.clone(), recorder.clone()).with_sink(recorder.clone())
}
