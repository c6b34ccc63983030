//! ハンドラーの実装（分割モジュール）

pub mod core;
pub mod builders;

pub use core::{IntoResponse, RouteHandler};
pub use builders::{get, post, put, delete};
