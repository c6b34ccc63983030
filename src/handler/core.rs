use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use log::debug;
use serde::Serialize;

use crate::common::{Handler, Method, Request, Response};
use crate::error::Error;

/// ハンドラー関数の戻り値を `Response` に変換する
///
/// `Response` はそのまま通し、それ以外のシリアライズ可能な値はJSONの200にする。
pub trait IntoResponse {
    fn into_response(self) -> Result<Response, Error>;
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response, Error> {
        Ok(self)
    }
}

impl<T: Serialize> IntoResponse for T {
    fn into_response(self) -> Result<Response, Error> {
        Response::ok().json(&self)
    }
}

/// 非同期ルートハンドラー（パスは完全一致）
pub struct RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    /// ルートパス
    pub path: String,
    /// HTTPメソッド
    pub method: Method,
    /// ハンドラー関数
    pub handler_fn: F,
    _marker: PhantomData<fn() -> (R, Fut)>,
}

impl<F, R, Fut> RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    /// 新しいRouteHandlerを作成
    pub fn new(method: Method, path: impl Into<String>, handler_fn: F) -> Self {
        let path = path.into();
        debug!("Registering handler for {} {}", method, path);
        Self {
            path,
            method,
            handler_fn,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, R, Fut> Handler for RouteHandler<F, R, Fut>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    R: IntoResponse + Send + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    fn matches(&self, path: &str, method: &Method) -> bool {
        method == &self.method && path == self.path
    }

    fn path_pattern(&self) -> &str {
        &self.path
    }

    async fn handle(&self, req: Request) -> Result<Response, Error> {
        let result = (self.handler_fn)(req).await?;
        result.into_response()
    }
}
