//! runbridge-session: RunBridge のリクエスト/レスポンスパイプライン向けセッションクッキーミドルウェア
//!
//! ホストのセッションエンジン（アンビエントなセッション状態）をリクエスト単位で開始・フラッシュし、
//! 最終的なセッションIDを `Set-Cookie` としてレスポンスに付与する。

pub mod common;
pub mod error;
pub mod handler;
pub mod session;

pub use common::{Cookie, Handler, Method, Middleware, Next, Request, Response, SameSite};
pub use error::Error;
pub use session::{
    CookieOptions, CookieOverrides, MemorySessionEngine, SessionCookieMiddleware, SessionEngine,
    SessionStatus, StartOptions,
};

/// パイプラインを構築するためのビルダー
#[derive(Default)]
pub struct PipelineBuilder {
    handlers: Vec<Box<dyn Handler>>,
    middlewares: Vec<Box<dyn Middleware>>,
}

impl PipelineBuilder {
    /// 新しいPipelineBuilderインスタンスを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// ハンドラを追加
    pub fn handler<H>(mut self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// ミドルウェアを追加（登録順に外側から実行される）
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// パイプラインをビルドして返却
    pub fn build(self) -> Pipeline {
        Pipeline {
            handlers: self.handlers,
            middlewares: self.middlewares,
        }
    }
}

/// リクエストを処理するパイプライン
pub struct Pipeline {
    handlers: Vec<Box<dyn Handler>>,
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    /// 新しいPipelineBuilderインスタンスを作成
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// 指定されたパスにマッチするハンドラを取得
    pub fn find_handler(&self, path: &str, method: &Method) -> Option<&dyn Handler> {
        self.handlers
            .iter()
            .find(|handler| handler.matches(path, method))
            .map(|handler| &**handler)
    }

    /// ミドルウェアのリストを取得
    pub fn middlewares(&self) -> &[Box<dyn Middleware>] {
        &self.middlewares
    }

    /// ルーティングしてミドルウェアチェーンとハンドラーを実行
    pub async fn dispatch(&self, req: Request) -> Result<Response, Error> {
        let handler = self.find_handler(&req.path, &req.method).ok_or_else(|| {
            log::debug!("No handler for {} {}", req.method, req.path);
            Error::RouteNotFound(format!("{} {}", req.method, req.path))
        })?;

        Next::new(&self.middlewares, handler).run(req).await
    }

    /// `dispatch` の結果をエラーも含めてレスポンスに変換
    pub async fn respond(&self, req: Request) -> Response {
        match self.dispatch(req).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_session_lifecycle() {
                    log::error!("Session pipeline misconfigured: {}", e);
                } else {
                    log::warn!("Request failed: {}", e);
                }
                Response::from_error(&e)
            }
        }
    }
}
