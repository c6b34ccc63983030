//! セッションクッキーミドルウェア
//!
//! 1リクエストにつき、セッション開始 → 後続処理 → フラッシュ → Set-Cookie付与 を行う。
//! 開始とフラッシュはこのミドルウェアだけが行う前提で、違反は型付きエラーで返す。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::common::utils::{is_cookie_name_valid, redact_id};
use crate::common::{Cookie, Middleware, Next, Request, Response};
use crate::error::Error;

use super::options::{CookieOptions, CookieOverrides, MAX_COOKIE_LIFETIME};
use super::{SessionEngine, SessionStatus, StartOptions};

/// 現在時刻を返す関数
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// セッションの開始/フラッシュとSet-Cookie付与を行うミドルウェア
pub struct SessionCookieMiddleware {
    engine: Arc<dyn SessionEngine>,
    options: CookieOptions,
    clock: Clock,
}

impl fmt::Debug for SessionCookieMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookieMiddleware")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SessionCookieMiddleware {
    /// ホスト既定値のままでミドルウェアを作成
    pub fn new(engine: Arc<dyn SessionEngine>) -> Result<Self, Error> {
        Self::with_overrides(engine, CookieOverrides::default())
    }

    /// ホスト既定値に上書き設定をマージしてミドルウェアを作成
    pub fn with_overrides(engine: Arc<dyn SessionEngine>, overrides: CookieOverrides) -> Result<Self, Error> {
        let options = overrides.apply(engine.cookie_params());
        if !is_cookie_name_valid(&options.name) {
            return Err(Error::ConfigurationError(format!(
                "session cookie name {:?} is not a valid cookie token",
                options.name
            )));
        }
        if options.lifetime > MAX_COOKIE_LIFETIME {
            return Err(Error::ConfigurationError(format!(
                "session cookie lifetime {} exceeds {} seconds",
                options.lifetime, MAX_COOKIE_LIFETIME
            )));
        }
        debug!("Session cookie options resolved: {:?}", options);

        Ok(Self {
            engine,
            options,
            clock: Arc::new(Utc::now),
        })
    }

    /// Expires計算に使う時計を差し替える
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// 実効クッキーオプション
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    /// リクエストからセッションIDを取り出す（無ければ空文字列）
    pub fn session_id_from(&self, req: &Request) -> String {
        req.cookie(&self.options.name).unwrap_or_default().to_string()
    }

    /// ガードを確認してセッションを開始
    fn start_session(&self, id: &str) -> Result<(), Error> {
        match self.engine.status() {
            SessionStatus::Disabled => {
                error!("Session middleware invoked while sessions are disabled");
                return Err(Error::SessionsDisabled);
            }
            SessionStatus::Active => {
                error!("Session already active before the session middleware ran");
                return Err(Error::SessionAlreadyStarted);
            }
            SessionStatus::None => {}
        }

        self.engine.set_name(&self.options.name);
        let seed = if id.is_empty() { None } else { Some(id.to_string()) };
        debug!("Starting session {} as {:?}", redact_id(id), self.options.name);
        self.engine.start(StartOptions::without_engine_cookies(seed))
    }

    /// ガードを確認して書き込み・クローズし、最終的なセッションIDを返す
    fn close_session(&self) -> Result<String, Error> {
        if self.engine.status() != SessionStatus::Active {
            error!("Session was closed by downstream code before the middleware flushed it");
            return Err(Error::SessionAlreadyClosed);
        }

        let id = self.engine.id();
        if id.is_empty() {
            return Err(Error::SessionEngine("engine reported an empty session id".to_string()));
        }
        self.engine.write_close()?;
        debug!("Flushed session {}", redact_id(&id));
        Ok(id)
    }

    /// 実効オプションとセッションIDからSet-Cookieを構築
    pub fn build_cookie(&self, id: &str) -> Result<Cookie, Error> {
        let lifetime = self.options.effective_lifetime();

        let mut cookie = Cookie::try_new(self.options.name.as_str(), id)?
            .with_max_age(Duration::from_secs(lifetime as u64))
            .with_path(self.options.path.as_str())
            .with_domain(self.options.domain.as_str())
            .secure(self.options.secure)
            .http_only(self.options.httponly)
            .with_same_site(self.options.samesite);

        if lifetime > 0 {
            let expires = chrono::Duration::try_seconds(lifetime)
                .and_then(|ttl| (self.clock)().checked_add_signed(ttl))
                .ok_or_else(|| {
                    Error::ConfigurationError(format!("session cookie lifetime {} is out of range", lifetime))
                })?;
            cookie = cookie.with_expires(expires);
        }
        Ok(cookie)
    }
}

/// レスポンスにクッキーを追加した新しい値を返す（元の値は変更しない）
pub fn attach_cookie(response: &Response, cookie: Cookie) -> Response {
    response.clone().with_cookie(cookie)
}

#[async_trait]
impl Middleware for SessionCookieMiddleware {
    async fn process(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
        let id = self.session_id_from(&req);
        self.start_session(&id)?;

        // ハンドラーのエラーはそのまま返す（セッションは開いたまま）
        let response = next.run(req).await?;

        let id = self.close_session()?;
        let cookie = self.build_cookie(&id)?;
        debug!("Attaching session cookie {}", self.options.name);
        Ok(attach_cookie(&response, cookie))
    }
}
