// aurs-net/src/lib.rs
pub mod http;
pub mod rpc;
pub mod validation;

pub use aurs_common::error::{AursError, Result};
pub use rpc::{RpcClient, RpcPackage, RpcResponse, SearchField};
pub use validation::validate_url;
