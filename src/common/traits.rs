//! コアトレイト定義（Handler、Middleware）

use async_trait::async_trait;
use crate::error::Error;
use super::http::{Request, Response, Method};

/// ハンドラーの特性
#[async_trait]
pub trait Handler: Send + Sync {
    /// パスとメソッドがこのハンドラにマッチするかどうかを判定
    fn matches(&self, path: &str, method: &Method) -> bool;

    /// ハンドラに関連付けられたパスパターン文字列を取得
    fn path_pattern(&self) -> &str;

    /// リクエストを処理
    async fn handle(&self, req: Request) -> Result<Response, Error>;
}

/// ミドルウェアの特性
///
/// `next.run(req)` を呼ぶことで後続のミドルウェアとハンドラーに処理を委譲する。
/// 呼ばなければ後続は実行されない。
#[async_trait]
pub trait Middleware: Send + Sync {
    /// リクエストを処理してレスポンスを返す
    async fn process(&self, req: Request, next: Next<'_>) -> Result<Response, Error>;
}

/// 残りのミドルウェアチェーンと最終ハンドラー
pub struct Next<'a> {
    middlewares: &'a [Box<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    /// 新しいチェーンを作成
    pub fn new(middlewares: &'a [Box<dyn Middleware>], handler: &'a dyn Handler) -> Self {
        Self { middlewares, handler }
    }

    /// 後続の処理を実行
    pub async fn run(self, req: Request) -> Result<Response, Error> {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                let next = Next::new(rest, self.handler);
                current.process(req, next).await
            }
            None => self.handler.handle(req).await,
        }
    }
}
