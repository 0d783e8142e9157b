use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use duckdb::{params, Connection};
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{CollaboratorError, RewardError, RewardResult};
use crate::host::{RewardEvent, RewardSink, StatsSource};
use crate::models::{LedgerHealth, StatsRecord};

// -----------------------------------------------------------------------------
// 常量
// -----------------------------------------------------------------------------

const DB_FILE_NAME: &str = "rewardbridge_ledger.db";
const CHANNEL_CAPACITY: usize = 50_000;
const BATCH_SIZE: usize = 1024;
const READ_POOL_SIZE: usize = 4;
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

lazy_static! {
    /// 关闭后清空，允许重新初始化
    static ref GLOBAL_LEDGER: RwLock<Option<Arc<RewardLedger>>> = RwLock::new(None);
}

// -----------------------------------------------------------------------------
// 数据结构定义
// -----------------------------------------------------------------------------

struct RewardRow {
    ts: i64,
    user_id: String,
    amount_micros: i64,
    symbol: String,
    kind: &'static str,
    is_ad_watch: bool,
    is_visit: bool,
}

enum LedgerCommand {
    Append(RewardRow),
    /// 写屏障：之前的所有行落盘后回执
    Sync(Sender<()>),
    Shutdown,
}

struct ConnectionPool {
    available: Receiver<Connection>,
    recycle: Sender<Connection>,
}

/// 借出的读连接，离开作用域自动归还
struct PooledConnection {
    conn: Option<Connection>,
    recycle: Sender<Connection>,
}

impl PooledConnection {
    fn get(&self) -> RewardResult<&Connection> {
        self.conn.as_ref().ok_or(RewardError::LedgerClosed)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = self.recycle.send(conn);
        }
    }
}

/// 奖励流水账本：异步批量写入 + 连接池读取
pub struct RewardLedger {
    sender: Sender<LedgerCommand>,
    pool: ConnectionPool,
    writer: Mutex<Option<JoinHandle<()>>>,
    total: AtomicU64,
    dropped: Arc<AtomicU64>,
}

// -----------------------------------------------------------------------------
// 初始化与关闭
// -----------------------------------------------------------------------------

impl RewardLedger {
    pub fn open(dir: &Path) -> RewardResult<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join(DB_FILE_NAME);

        let write_conn = Connection::open(&db_path)?;
        write_conn.execute_batch(
            "SET threads=2;
             CREATE TABLE IF NOT EXISTS reward_log (
                 ts BIGINT,
                 user_id VARCHAR,
                 amount_micros BIGINT,
                 symbol VARCHAR,
                 kind VARCHAR,
                 is_ad_watch BOOLEAN,
                 is_visit BOOLEAN
             );
             CREATE INDEX IF NOT EXISTS idx_reward_user ON reward_log (user_id);",
        )?;

        let (pool_tx, pool_rx) = bounded(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            let _ = pool_tx.send(write_conn.try_clone()?);
        }

        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let dropped = Arc::new(AtomicU64::new(0));
        let writer_dropped = dropped.clone();

        let handle = thread::Builder::new()
            .name("rewardbridge-ledger-writer".into())
            .spawn(move || writer_loop(write_conn, rx, writer_dropped))?;

        log::info!("reward ledger opened at {}", db_path.display());

        Ok(Self {
            sender: tx,
            pool: ConnectionPool { available: pool_rx, recycle: pool_tx },
            writer: Mutex::new(Some(handle)),
            total: AtomicU64::new(0),
            dropped,
        })
    }

    /// 排空队列并等待写线程退出；重复调用是安全的
    pub fn shutdown(&self) -> RewardResult<()> {
        let handle = match self.writer.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => return Err(RewardError::LedgerClosed),
        };
        let Some(handle) = handle else {
            return Ok(());
        };

        let _ = self.sender.send(LedgerCommand::Shutdown);
        if handle.join().is_err() {
            log::error!("ledger writer thread panicked during shutdown");
        }
        // 释放池中的读连接，数据库文件随之关闭
        while self.pool.available.try_recv().is_ok() {}
        log::info!("reward ledger shut down ({} events, {} dropped)", self.total(), self.dropped());
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.writer.lock().map(|w| w.is_some()).unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // 写入
    // -------------------------------------------------------------------------

    /// 非阻塞入队；队列满时丢弃并计数，绝不阻塞引擎
    pub fn append(&self, event: &RewardEvent<'_>) -> RewardResult<()> {
        self.total.fetch_add(1, Ordering::Relaxed);
        let row = RewardRow {
            ts: chrono::Utc::now().timestamp_millis(),
            user_id: event.user_id.to_string(),
            amount_micros: event.delta.amount_micros,
            symbol: event.symbol.to_string(),
            kind: event.kind.as_str(),
            is_ad_watch: event.delta.is_ad_watch,
            is_visit: event.delta.is_visit,
        };

        match self.sender.try_send(LedgerCommand::Append(row)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("ledger queue full, reward event dropped");
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(RewardError::LedgerClosed)
            }
        }
    }

    /// 阻塞直到此前入队的流水全部提交
    pub fn sync(&self) -> RewardResult<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.sender
            .send(LedgerCommand::Sync(ack_tx))
            .map_err(|_| RewardError::LedgerClosed)?;
        ack_rx.recv().map_err(|_| RewardError::LedgerClosed)
    }

    // -------------------------------------------------------------------------
    // 读取
    // -------------------------------------------------------------------------

    fn checkout(&self) -> RewardResult<PooledConnection> {
        if !self.is_running() {
            return Err(RewardError::LedgerClosed);
        }
        // 关闭过程中连接池会被清空，不能无限等待
        let conn = self
            .pool
            .available
            .recv_timeout(CHECKOUT_TIMEOUT)
            .map_err(|_| RewardError::LedgerClosed)?;
        Ok(PooledConnection { conn: Some(conn), recycle: self.pool.recycle.clone() })
    }

    /// 由流水回放出用户统计；`today` 决定哪些行计入当日字段 (UTC)
    pub fn load_stats(&self, user_id: &str, today: chrono::NaiveDate) -> RewardResult<StatsRecord> {
        let day_start = today
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .unwrap_or(0);

        let guard = self.checkout()?;
        let conn = guard.get()?;

        let query = "SELECT
                CAST(COALESCE(SUM(CASE WHEN is_ad_watch THEN 1 ELSE 0 END), 0) AS BIGINT),
                CAST(COALESCE(SUM(amount_micros), 0) AS BIGINT),
                CAST(COALESCE(SUM(CASE WHEN is_ad_watch AND ts >= $2 THEN 1 ELSE 0 END), 0) AS BIGINT),
                CAST(COALESCE(SUM(CASE WHEN ts >= $2 THEN amount_micros ELSE 0 END), 0) AS BIGINT),
                CAST(COALESCE(SUM(CASE WHEN is_visit THEN 1 ELSE 0 END), 0) AS BIGINT)
             FROM reward_log WHERE user_id = $1";

        let (ads, total, daily_ads, daily, visits): (i64, i64, i64, i64, i64) =
            conn.query_row(query, params![user_id, day_start], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;

        Ok(StatsRecord {
            ads_watched: ads.max(0) as u64,
            total_earned_micros: total,
            daily_ads_watched: daily_ads.clamp(0, u32::MAX as i64) as u32,
            _padding: 0,
            daily_earnings_micros: daily,
            // 账本不记录提现，可提现余额即累计收益
            payable_balance_micros: total,
            site_visits: visits.max(0) as u64,
        })
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> LedgerHealth {
        LedgerHealth { total: self.total(), dropped: self.dropped() }
    }
}

impl RewardSink for RewardLedger {
    fn post_reward(&self, event: &RewardEvent<'_>) -> Result<(), CollaboratorError> {
        self.append(event).map_err(|e| CollaboratorError::Remote(e.to_string()))
    }
}

impl StatsSource for RewardLedger {
    fn fetch_stats(&self, user_id: &str) -> Result<StatsRecord, CollaboratorError> {
        self.load_stats(user_id, chrono::Utc::now().date_naive())
            .map_err(|e| CollaboratorError::Remote(e.to_string()))
    }
}

// -----------------------------------------------------------------------------
// 写线程
// -----------------------------------------------------------------------------

fn writer_loop(mut conn: Connection, rx: Receiver<LedgerCommand>, dropped: Arc<AtomicU64>) {
    let mut buffer: Vec<RewardRow> = Vec::with_capacity(BATCH_SIZE);

    while let Ok(cmd) = rx.recv() {
        let mut pending = Some(cmd);
        while let Some(cmd) = pending.take() {
            match cmd {
                LedgerCommand::Append(row) => {
                    buffer.push(row);
                    if buffer.len() < BATCH_SIZE {
                        pending = rx.try_recv().ok();
                    }
                }
                LedgerCommand::Sync(ack) => {
                    flush_buffer_to_db(&mut conn, &mut buffer, &dropped);
                    let _ = ack.send(());
                }
                LedgerCommand::Shutdown => {
                    flush_buffer_to_db(&mut conn, &mut buffer, &dropped);
                    return;
                }
            }
        }
        flush_buffer_to_db(&mut conn, &mut buffer, &dropped);
    }
    flush_buffer_to_db(&mut conn, &mut buffer, &dropped);
}

/// 单事务 + appender 批量提交
fn flush_buffer_to_db(conn: &mut Connection, buffer: &mut Vec<RewardRow>, dropped: &AtomicU64) {
    if buffer.is_empty() {
        return;
    }
    let count = buffer.len() as u64;

    let tx = match conn.transaction() {
        Ok(t) => t,
        Err(e) => {
            log::error!("ledger transaction failed, {} rows lost: {}", count, e);
            dropped.fetch_add(count, Ordering::Relaxed);
            buffer.clear();
            return;
        }
    };

    {
        match tx.appender("reward_log") {
            Ok(mut appender) => {
                for row in buffer.drain(..) {
                    if let Err(e) = appender.append_row(params![
                        row.ts,
                        row.user_id,
                        row.amount_micros,
                        row.symbol,
                        row.kind,
                        row.is_ad_watch,
                        row.is_visit
                    ]) {
                        log::warn!("ledger row rejected: {}", e);
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Err(e) => {
                log::error!("ledger appender failed, {} rows lost: {}", count, e);
                dropped.fetch_add(count, Ordering::Relaxed);
                buffer.clear();
                return;
            }
        }
    }

    if let Err(e) = tx.commit() {
        log::error!("ledger commit failed, {} rows lost: {}", count, e);
        dropped.fetch_add(count, Ordering::Relaxed);
    }
}

// -----------------------------------------------------------------------------
// 全局账本 (FFI 使用)
// -----------------------------------------------------------------------------

/// 打开全局账本；已有运行中的账本时直接复用
pub fn init_global_ledger(dir: &Path) -> RewardResult<Arc<RewardLedger>> {
    let mut slot = GLOBAL_LEDGER.write().map_err(|_| RewardError::LedgerClosed)?;
    if let Some(ledger) = slot.as_ref().filter(|l| l.is_running()) {
        return Ok(ledger.clone());
    }
    let ledger = Arc::new(RewardLedger::open(dir)?);
    *slot = Some(ledger.clone());
    Ok(ledger)
}

pub fn global_ledger() -> Option<Arc<RewardLedger>> {
    GLOBAL_LEDGER.read().ok()?.clone()
}

/// 关闭并移除全局账本；未初始化时返回 `LedgerClosed`
pub fn shutdown_global_ledger() -> RewardResult<()> {
    let ledger = match GLOBAL_LEDGER.write() {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };
    match ledger {
        Some(ledger) => ledger.shutdown(),
        None => Err(RewardError::LedgerClosed),
    }
}

/// 每次上报时才解析当前的全局账本，账本重开后已有会话自动接入
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalLedgerSink;

impl RewardSink for GlobalLedgerSink {
    fn post_reward(&self, event: &RewardEvent<'_>) -> Result<(), CollaboratorError> {
        global_ledger().ok_or(CollaboratorError::Unavailable)?.post_reward(event)
    }
}
