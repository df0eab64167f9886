//! Store Server - storefront order core
//!
//! # 架构概述
//!
//! 本模块是 Store Server 的主入口，提供以下核心功能：
//!
//! - **数据库** (`db`): SQLite 存储与仓储层（库存账本、购物车、订单、跟踪日志）
//! - **订单** (`orders`): 结算事务与订单生命周期状态机
//! - **实时推送** (`message`): 订单/配送状态的实时广播
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! store-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── db/            # 数据库层（含库存账本）
//! ├── orders/        # 结算 + 生命周期状态机
//! ├── message/       # 实时订单推送
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志等工具
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod message;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use message::OrderFeed;
pub use orders::{OrderError, OrderResult};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logger();
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
   _____ __
  / ___// /_____  ________
  \__ \/ __/ __ \/ ___/ _ \
 ___/ / /_/ /_/ / /  /  __/
/____/\__/\____/_/   \___/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
