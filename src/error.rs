//! エラー型の定義

use thiserror::Error;

/// アプリケーションのエラー型
#[derive(Error, Debug)]
pub enum Error {
    /// セッション機構が無効化されている
    #[error("Sessions are disabled by the host session engine")]
    SessionsDisabled,

    /// セッションが既に開始されている（ミドルウェアの二重登録など）
    #[error("Session has already been started")]
    SessionAlreadyStarted,

    /// 後続ハンドラーがセッションを先に閉じた
    #[error("Session was closed before the session middleware could flush it")]
    SessionAlreadyClosed,

    /// セッションエンジン側のエラー
    #[error("Session engine error: {0}")]
    SessionEngine(String),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 無効なクッキー
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// 無効なヘッダー
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// 無効なリクエストボディ
    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    /// レスポンスのシリアライズエラー
    #[error("Failed to serialize response: {0}")]
    ResponseSerializationError(String),

    /// リクエストのルーティングエラー
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// 内部サーバーエラー
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl Error {
    /// エラーからHTTPステータスコードを取得
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::InvalidRequestBody(_) => 400,
            Error::InvalidHeader(_) => 400,
            Error::SessionsDisabled
            | Error::SessionAlreadyStarted
            | Error::SessionAlreadyClosed
            | Error::SessionEngine(_)
            | Error::ConfigurationError(_)
            | Error::InvalidCookie(_)
            | Error::ResponseSerializationError(_)
            | Error::InternalServerError(_) => 500,
        }
    }

    /// セッションのライフサイクル違反（パイプライン構成ミス）かどうか
    pub fn is_session_lifecycle(&self) -> bool {
        matches!(
            self,
            Error::SessionsDisabled | Error::SessionAlreadyStarted | Error::SessionAlreadyClosed
        )
    }
}
