//! Infrastructure 層
//!
//! - `registry`: インメモリの接続レジストリ
//! - `provider`: 上流 AI プロバイダへの HTTP クライアント

pub mod provider;
pub mod registry;
