//! linebot core library: config, LINE channel, generation client, and the webhook gateway
//! used by the CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
pub mod prompt;
