// Library exports for testing
pub mod account_fetcher;    // 🔥 RPC 拉取 voter / registrar 账户
pub mod aggregator;         // 钱包投票权聚合
pub mod config;
pub mod deserializers;      // 反序列化器
pub mod layout;             // Voter 账户布局（偏移表）
pub mod multiplier;         // 锁仓乘数策略
pub mod report;             // JSON 报告 + 汇总表
pub mod snapshot;           // 时间点快照
pub mod utils;              // 工具模块（布局探测、十六进制转储）
pub mod vsr_interface;      // 公共 trait 与错误类型
