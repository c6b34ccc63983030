//! セッション関連の実装
//!
//! ホスト側のセッションエンジン（プロセス全体で1つのアンビエントなセッション状態）を
//! `SessionEngine` トレイトとして注入し、`SessionCookieMiddleware` がリクエスト毎に
//! 開始・フラッシュ・Set-Cookie付与を行う。

pub mod memory;
pub mod middleware;
pub mod options;

pub use memory::MemorySessionEngine;
pub use middleware::SessionCookieMiddleware;
pub use options::{CookieOptions, CookieOverrides};

use crate::error::Error;

/// セッションコンテキストの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// セッション機構が管理者設定で無効
    Disabled,
    /// 有効だが開始されていない
    None,
    /// 開始済み
    Active,
}

/// セッション開始時のオプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOptions {
    /// 既存セッションを再開する場合のID
    pub id: Option<String>,
    /// エンジン自身によるクッキー送出を行うか
    pub use_cookies: bool,
    /// クッキー以外（URLなど）からのID受け入れを禁止するか
    pub use_only_cookies: bool,
}

impl StartOptions {
    /// エンジンのクッキー処理を無効にした開始オプション
    ///
    /// クッキーはミドルウェアが明示的に送出するため、エンジン側の送出経路は止める。
    pub fn without_engine_cookies(id: Option<String>) -> Self {
        Self {
            id,
            use_cookies: false,
            use_only_cookies: true,
        }
    }
}

/// ホストのセッションエンジン
///
/// セッションデータの保存・ロック・ID生成はすべてエンジン側の責務。
/// 実装はリクエスト単位で1つのコンテキストを保証すること。
#[cfg_attr(test, mockall::automock)]
pub trait SessionEngine: Send + Sync {
    /// 現在の状態
    fn status(&self) -> SessionStatus;

    /// ホスト既定のクッキーパラメータ
    fn cookie_params(&self) -> CookieOptions;

    /// セッション名（クッキー名）を設定
    fn set_name(&self, name: &str);

    /// セッションを開始
    fn start(&self, options: StartOptions) -> Result<(), Error>;

    /// 現在のセッションID（未開始なら空文字列）
    fn id(&self) -> String;

    /// セッションデータを書き込んで閉じる
    fn write_close(&self) -> Result<(), Error>;
}
