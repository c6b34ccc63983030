use std::future::Future;

use crate::common::{Method, Request};
use crate::error::Error;

use super::core::{IntoResponse, RouteHandler};

/// GETハンドラーを作成
pub fn get<F, R, Fut>(path: impl Into<String>, handler: F) -> RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    RouteHandler::new(Method::GET, path, handler)
}

/// POSTハンドラーを作成
pub fn post<F, R, Fut>(path: impl Into<String>, handler: F) -> RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    RouteHandler::new(Method::POST, path, handler)
}

/// PUTハンドラーを作成
pub fn put<F, R, Fut>(path: impl Into<String>, handler: F) -> RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    RouteHandler::new(Method::PUT, path, handler)
}

/// DELETEハンドラーを作成
pub fn delete<F, R, Fut>(path: impl Into<String>, handler: F) -> RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    RouteHandler::new(Method::DELETE, path, handler)
}
