//! 订单实时推送
//!
//! # 架构
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                   OrderFeed                     │
//! │  ┌───────────────────────────────────────────┐  │
//! │  │ broadcast::Sender<FeedMessage>  (全局)    │  │
//! │  └───────────────────────────────────────────┘  │
//! │  ┌───────────────────────────────────────────┐  │
//! │  │ DashMap<order_id, Sender>  (按订单)       │  │
//! │  └───────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Every published message goes to the global channel (admin dashboard)
//! and to the order's own channel (customer tracking page). Delivery is
//! at-least-once relative to the tracking log: a subscriber that misses
//! messages re-reads the log after its last-seen event and resumes.

use std::sync::Arc;

use dashmap::DashMap;
use shared::message::FeedMessage;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

const DEFAULT_CAPACITY: usize = 1024;

/// 订单消息推送服务
#[derive(Debug, Clone)]
pub struct OrderFeed {
    /// 全局广播通道 (所有订单)
    global_tx: broadcast::Sender<FeedMessage>,
    /// 按订单的广播通道, 首次订阅或发布时惰性创建
    order_channels: Arc<DashMap<i64, broadcast::Sender<FeedMessage>>>,
    /// 按订单的写锁, 持有期间覆盖日志提交与推送
    write_locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    capacity: usize,
    /// 关闭信号令牌
    shutdown_token: CancellationToken,
}

impl OrderFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// 创建指定通道容量的推送服务
    pub fn with_capacity(capacity: usize) -> Self {
        let (global_tx, _) = broadcast::channel(capacity);
        Self {
            global_tx,
            order_channels: Arc::new(DashMap::new()),
            write_locks: Arc::new(DashMap::new()),
            capacity,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 发布消息 (全局通道 + 对应订单通道)
    ///
    /// Lagging or absent receivers are not an error: the tracking log is
    /// the source of truth and viewers resync from it.
    pub fn publish(&self, msg: FeedMessage) {
        // send 仅在无接收者时失败, 此处可忽略
        let _ = self.global_tx.send(msg.clone());
        if let Some(tx) = self.order_channels.get(&msg.order_id) {
            let _ = tx.send(msg);
        }
    }

    /// 获取订单写锁
    ///
    /// Writers hold this across the log commit and the publish that
    /// follows it, so the feed delivers events in log order. Readers
    /// never take it.
    pub fn write_lock(&self, order_id: i64) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 订阅单个订单的消息
    pub fn subscribe(&self, order_id: i64) -> broadcast::Receiver<FeedMessage> {
        self.order_channels
            .entry(order_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// 订阅所有订单的消息 (管理端)
    pub fn subscribe_all(&self) -> broadcast::Receiver<FeedMessage> {
        self.global_tx.subscribe()
    }

    /// 获取关闭令牌 (SSE 连接监听此信号断开)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 优雅关闭推送服务
    pub fn shutdown(&self) {
        tracing::info!("Shutting down order feed");
        self.shutdown_token.cancel();
    }
}

impl Default for OrderFeed {
    fn default() -> Self {
        Self::new()
    }
}
