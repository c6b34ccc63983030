//! 共通の抽象化レイヤーとトレイト定義

pub mod cookie;
pub mod http;
pub mod traits;
pub mod utils;

pub use self::cookie::{Cookie, SameSite, EXPIRES_FORMAT};
pub use self::http::{Method, Request, Response};
pub use self::traits::{Handler, Middleware, Next};
