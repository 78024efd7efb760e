//! 上流 AI プロバイダのクライアント実装

pub mod openai;

pub use openai::OpenAiCompatibleExecutor;
