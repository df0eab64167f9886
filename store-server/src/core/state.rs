use sqlx::SqlitePool;

use crate::core::Config;
use crate::db::DbService;
use crate::message::OrderFeed;
use crate::utils::AppError;

/// 服务器状态 - 持有所有服务的共享引用
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | pool | SqlitePool | SQLite 连接池 |
/// | feed | OrderFeed | 订单实时推送 |
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// SQLite 连接池
    pub pool: SqlitePool,
    /// 订单实时推送
    pub feed: OrderFeed,
}

impl ServerState {
    /// 手动构造服务器状态
    ///
    /// 通常使用 [`ServerState::initialize`] 代替
    pub fn new(config: Config, pool: SqlitePool, feed: OrderFeed) -> Self {
        Self { config, pool, feed }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/store.db)
    /// 3. 实时推送服务
    pub async fn initialize(config: &Config) -> Result<Self, AppError> {
        config
            .ensure_work_dir_structure()
            .map_err(|e| AppError::internal(format!("Failed to create work directory: {e}")))?;

        let db_path = config.database_dir().join("store.db");
        let db_service = DbService::new(&db_path.to_string_lossy()).await?;

        let feed = OrderFeed::with_capacity(config.feed_capacity);

        Ok(Self::new(config.clone(), db_service.pool, feed))
    }

    /// 获取数据库连接池
    pub fn db(&self) -> &SqlitePool {
        &self.pool
    }

    /// 获取实时推送服务
    pub fn feed(&self) -> &OrderFeed {
        &self.feed
    }
}
