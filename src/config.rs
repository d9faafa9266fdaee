use crate::engine::DEFAULT_TOP_K;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime settings shared by the CLI and the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// sled database directory
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    /// Documents retrieved per question when the request does not say.
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("kbrank.db"),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl Config {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}
