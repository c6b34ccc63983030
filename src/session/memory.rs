//! プロセス内メモリのセッションエンジン
//!
//! エンジン1つにつきアンビエントなセッションコンテキストは常に1つだけ。
//! 後続ハンドラーはこのエンジンを共有してセッションデータを読み書きする。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::common::utils::redact_id;
use crate::error::Error;

use super::options::CookieOptions;
use super::{SessionEngine, SessionStatus, StartOptions};

/// セッションIDとして受け入れる最大長
pub const MAX_SESSION_ID_LEN: usize = 256;

type SessionData = HashMap<String, Value>;

#[derive(Debug)]
struct EngineState {
    name: String,
    active: Option<ActiveSession>,
    store: HashMap<String, SessionData>,
    use_cookies: bool,
    use_only_cookies: bool,
}

#[derive(Debug)]
struct ActiveSession {
    id: String,
    data: SessionData,
}

/// メモリ上にセッションを保持するエンジン
#[derive(Debug)]
pub struct MemorySessionEngine {
    enabled: bool,
    strict_mode: bool,
    cookie_params: CookieOptions,
    state: Mutex<EngineState>,
}

impl Default for MemorySessionEngine {
    fn default() -> Self {
        Self::with_cookie_params(CookieOptions::from_env())
    }
}

impl MemorySessionEngine {
    /// 環境変数由来の既定値でエンジンを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定したホスト既定値でエンジンを作成
    pub fn with_cookie_params(cookie_params: CookieOptions) -> Self {
        let name = cookie_params.name.clone();
        Self {
            enabled: true,
            strict_mode: false,
            cookie_params,
            state: Mutex::new(EngineState {
                name,
                active: None,
                store: HashMap::new(),
                use_cookies: true,
                use_only_cookies: true,
            }),
        }
    }

    /// セッション機構が無効化されたエンジン
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::with_cookie_params(CookieOptions::default())
        }
    }

    /// 厳格モード: 未知のセッションIDは受け入れず新しいIDを発行する
    pub fn strict(mut self, strict_mode: bool) -> Self {
        self.strict_mode = strict_mode;
        self
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // 保持中にパニックしても状態自体は整合しているため継続する
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Session engine lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    fn with_active<T>(&self, f: impl FnOnce(&mut ActiveSession) -> T) -> Result<T, Error> {
        let mut state = self.state();
        match state.active.as_mut() {
            Some(active) => Ok(f(active)),
            None => Err(Error::SessionEngine("no active session".to_string())),
        }
    }

    /// 現在のセッション名
    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    /// 直近の開始時に指定されたクッキー処理フラグ `(use_cookies, use_only_cookies)`
    pub fn cookie_mode(&self) -> (bool, bool) {
        let state = self.state();
        (state.use_cookies, state.use_only_cookies)
    }

    /// 値を取得
    pub fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        self.with_active(|active| active.data.get(key).cloned())
    }

    /// 値を型付きで取得
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        match self.get(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::SessionEngine(format!("session value {:?}: {}", key, e))),
            None => Ok(None),
        }
    }

    /// 値を設定
    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), Error> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::SessionEngine(format!("session value {:?}: {}", key, e)))?;
        self.with_active(|active| {
            active.data.insert(key.to_string(), value);
        })
    }

    /// 値を削除して返却
    pub fn remove(&self, key: &str) -> Result<Option<Value>, Error> {
        self.with_active(|active| active.data.remove(key))
    }

    /// セッションデータを空にする
    pub fn clear(&self) -> Result<(), Error> {
        self.with_active(|active| active.data.clear())
    }

    /// 現在のキー一覧（ソート済み）
    pub fn keys(&self) -> Result<Vec<String>, Error> {
        self.with_active(|active| {
            let mut keys: Vec<String> = active.data.keys().cloned().collect();
            keys.sort();
            keys
        })
    }

    /// セッションIDを更新する（データは引き継ぐ）
    pub fn regenerate_id(&self, delete_old: bool) -> Result<String, Error> {
        let mut state = self.state();
        let old_id = match state.active.as_ref() {
            Some(active) => active.id.clone(),
            None => return Err(Error::SessionEngine("cannot regenerate id without an active session".to_string())),
        };
        let new_id = generate_id();

        if delete_old {
            state.store.remove(&old_id);
        }
        if let Some(active) = state.active.as_mut() {
            active.id = new_id.clone();
        }
        debug!("Regenerated session id {} -> {}", redact_id(&old_id), redact_id(&new_id));
        Ok(new_id)
    }

    /// セッションを破棄して閉じる（保存済みデータも削除）
    pub fn destroy(&self) -> Result<(), Error> {
        let mut state = self.state();
        let active = state
            .active
            .take()
            .ok_or_else(|| Error::SessionEngine("no active session to destroy".to_string()))?;
        state.store.remove(&active.id);
        debug!("Destroyed session {}", redact_id(&active.id));
        Ok(())
    }

    /// 変更を破棄して閉じる（ハンドラー失敗後の後始末用）
    ///
    /// 未開始の場合は何もせず `false` を返す。
    pub fn abort(&self) -> bool {
        match self.state().active.take() {
            Some(active) => {
                debug!("Aborted session {}", redact_id(&active.id));
                true
            }
            None => false,
        }
    }

    /// 保存済みセッション数
    pub fn stored_sessions(&self) -> usize {
        self.state().store.len()
    }

    /// 保存済みセッションのデータを取得（非アクティブ時も参照可能）
    pub fn stored(&self, id: &str) -> Option<HashMap<String, Value>> {
        self.state().store.get(id).cloned()
    }
}

impl SessionEngine for MemorySessionEngine {
    fn status(&self) -> SessionStatus {
        if !self.enabled {
            return SessionStatus::Disabled;
        }
        if self.state().active.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::None
        }
    }

    fn cookie_params(&self) -> CookieOptions {
        let mut params = self.cookie_params.clone();
        params.name = self.name();
        params
    }

    fn set_name(&self, name: &str) {
        self.state().name = name.to_string();
    }

    fn start(&self, options: StartOptions) -> Result<(), Error> {
        if !self.enabled {
            return Err(Error::SessionsDisabled);
        }

        let mut state = self.state();
        if state.active.is_some() {
            return Err(Error::SessionAlreadyStarted);
        }

        let id = match options.id {
            Some(id) if !is_session_id_valid(&id) => {
                warn!("Rejected malformed session id; issuing a new one");
                generate_id()
            }
            Some(id) if self.strict_mode && !state.store.contains_key(&id) => {
                warn!("Rejected unknown session id {} (strict mode)", redact_id(&id));
                generate_id()
            }
            Some(id) => id,
            None => generate_id(),
        };

        let data = state.store.get(&id).cloned().unwrap_or_default();
        debug!("Started session {} ({} keys)", redact_id(&id), data.len());

        state.use_cookies = options.use_cookies;
        state.use_only_cookies = options.use_only_cookies;
        state.active = Some(ActiveSession { id, data });
        Ok(())
    }

    fn id(&self) -> String {
        self.state()
            .active
            .as_ref()
            .map(|active| active.id.clone())
            .unwrap_or_default()
    }

    fn write_close(&self) -> Result<(), Error> {
        let mut state = self.state();
        let active = state
            .active
            .take()
            .ok_or_else(|| Error::SessionEngine("no active session to write".to_string()))?;
        debug!("Wrote session {} ({} keys)", redact_id(&active.id), active.data.len());
        state.store.insert(active.id, active.data);
        Ok(())
    }
}

/// セッションIDとして受け入れ可能か（英数字と '-'、そのままクッキー値になる）
pub fn is_session_id_valid(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
