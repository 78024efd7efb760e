//! 接続レジストリの実装
//!
//! 単一プロセス・インメモリです。複数ノード間の配信は扱いません。

pub mod connection;

pub use connection::{
    ConnectionRegistry, DEFAULT_KEEP_ALIVE_INTERVAL, EventSink, RegistryConfig, RegistryStats,
};
