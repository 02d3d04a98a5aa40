//! 追踪、请求 ID 生成与连接指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 连接指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub connects_accepted: u64,
    pub connects_denied: u64,
    pub connects_failed: u64,
    pub disconnects: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub reservation_conflicts: u64,
    pub optimistic_lock_retries: u64,
    pub connect_latency_ms_total: u64,
    pub connect_latency_ms_count: u64,
}

/// 连接指标。
pub struct TelemetryMetrics {
    connects_accepted: AtomicU64,
    connects_denied: AtomicU64,
    connects_failed: AtomicU64,
    disconnects: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    reservation_conflicts: AtomicU64,
    optimistic_lock_retries: AtomicU64,
    connect_latency_ms_total: AtomicU64,
    connect_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            connects_accepted: AtomicU64::new(0),
            connects_denied: AtomicU64::new(0),
            connects_failed: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            reservation_conflicts: AtomicU64::new(0),
            optimistic_lock_retries: AtomicU64::new(0),
            connect_latency_ms_total: AtomicU64::new(0),
            connect_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects_accepted: self.connects_accepted.load(Ordering::Relaxed),
            connects_denied: self.connects_denied.load(Ordering::Relaxed),
            connects_failed: self.connects_failed.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            reservation_conflicts: self.reservation_conflicts.load(Ordering::Relaxed),
            optimistic_lock_retries: self.optimistic_lock_retries.load(Ordering::Relaxed),
            connect_latency_ms_total: self.connect_latency_ms_total.load(Ordering::Relaxed),
            connect_latency_ms_count: self.connect_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录连接放行次数。
pub fn record_connect_accepted() {
    metrics().connects_accepted.fetch_add(1, Ordering::Relaxed);
}

/// 记录业务拒绝次数（用户不匹配、协议不支持等）。
pub fn record_connect_denied() {
    metrics().connects_denied.fetch_add(1, Ordering::Relaxed);
}

/// 记录基础设施失败导致的拒绝次数。
pub fn record_connect_failed() {
    metrics().connects_failed.fetch_add(1, Ordering::Relaxed);
}

/// 记录断开事件次数。
pub fn record_disconnect() {
    metrics().disconnects.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接缓存命中。
pub fn record_cache_hit() {
    metrics().cache_hits.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接缓存未命中。
pub fn record_cache_miss() {
    metrics().cache_misses.fetch_add(1, Ordering::Relaxed);
}

/// 记录预留用户冲突次数。
pub fn record_reservation_conflict() {
    metrics()
        .reservation_conflicts
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录乐观锁冲突后的重试次数。
pub fn record_optimistic_lock_retry() {
    metrics()
        .optimistic_lock_retries
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录连接处理耗时（毫秒）。
pub fn record_connect_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .connect_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .connect_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
