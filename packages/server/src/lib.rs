//! hiroba real-time core.
//!
//! SSE で購読者にイベントを配信する接続レジストリと、
//! 上流 AI プロバイダへの呼び出しをプロバイダ単位で直列化するキューを提供します。

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
