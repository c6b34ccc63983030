//! セッションクッキーのオプション（ホスト既定値と上書き設定のマージ）

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use log::warn;

use crate::common::utils::{env_bool, env_i64, env_string, parse_bool};
use crate::common::SameSite;
use crate::error::Error;

/// 既定のセッションクッキー名
pub const DEFAULT_SESSION_NAME: &str = "SESSIONID";

/// 設定可能な有効期間の上限（100年、秒）
pub const MAX_COOKIE_LIFETIME: i64 = 36_525 * 24 * 60 * 60;

/// ホスト既定値を与える環境変数
pub const ENV_SESSION_NAME: &str = "RUNBRIDGE_SESSION_NAME";
pub const ENV_COOKIE_PATH: &str = "RUNBRIDGE_SESSION_COOKIE_PATH";
pub const ENV_COOKIE_DOMAIN: &str = "RUNBRIDGE_SESSION_COOKIE_DOMAIN";
pub const ENV_COOKIE_LIFETIME: &str = "RUNBRIDGE_SESSION_COOKIE_LIFETIME";
pub const ENV_COOKIE_SECURE: &str = "RUNBRIDGE_SESSION_COOKIE_SECURE";
pub const ENV_COOKIE_HTTPONLY: &str = "RUNBRIDGE_SESSION_COOKIE_HTTPONLY";
pub const ENV_COOKIE_SAMESITE: &str = "RUNBRIDGE_SESSION_COOKIE_SAMESITE";

/// 実効クッキーオプション（マージ後は全キーが揃っている）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieOptions {
    /// クッキー名（= セッション名）
    pub name: String,
    pub path: String,
    pub domain: String,
    /// 有効期間（秒）。0以下はブラウザセッション限りのクッキー
    pub lifetime: i64,
    pub secure: bool,
    pub httponly: bool,
    pub samesite: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_SESSION_NAME.to_string(),
            path: "/".to_string(),
            domain: String::new(),
            lifetime: 0,
            secure: false,
            httponly: false,
            samesite: None,
        }
    }
}

impl CookieOptions {
    /// 環境変数からホスト既定値を構築
    ///
    /// 未設定・解釈不能な値は `Default` の値を使う。
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let samesite = env_string(ENV_COOKIE_SAMESITE).and_then(|raw| {
            raw.parse::<SameSite>()
                .map_err(|e| warn!("Ignoring {}: {}", ENV_COOKIE_SAMESITE, e))
                .ok()
        });

        Self {
            name: env_string(ENV_SESSION_NAME).unwrap_or(defaults.name),
            path: env_string(ENV_COOKIE_PATH).unwrap_or(defaults.path),
            domain: env_string(ENV_COOKIE_DOMAIN).unwrap_or(defaults.domain),
            lifetime: env_i64(ENV_COOKIE_LIFETIME, defaults.lifetime),
            secure: env_bool(ENV_COOKIE_SECURE, defaults.secure),
            httponly: env_bool(ENV_COOKIE_HTTPONLY, defaults.httponly),
            samesite,
        }
    }

    /// 負の有効期間を0に丸めた値
    pub fn effective_lifetime(&self) -> i64 {
        self.lifetime.max(0)
    }
}

/// 呼び出し側が指定する上書き設定（未指定のキーはホスト既定値のまま）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOverrides {
    pub name: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub lifetime: Option<i64>,
    pub secure: Option<bool>,
    pub httponly: Option<bool>,
    pub samesite: Option<SameSite>,
}

impl CookieOverrides {
    /// 空の上書き設定
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn lifetime(mut self, seconds: i64) -> Self {
        self.lifetime = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn httponly(mut self, httponly: bool) -> Self {
        self.httponly = Some(httponly);
        self
    }

    pub fn samesite(mut self, samesite: SameSite) -> Self {
        self.samesite = Some(samesite);
        self
    }

    /// キー/値の組から構築（キーは大文字小文字を区別しない）
    ///
    /// 同じキーが大文字小文字違いで複数ある場合は後勝ち。`null` は未指定として扱う。
    pub fn from_map<I, K>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut overrides = Self::new();

        for (key, value) in entries {
            let key = key.as_ref().to_ascii_lowercase();
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "name" => overrides.name = Some(expect_string(&key, value)?),
                "path" => overrides.path = Some(expect_string(&key, value)?),
                "domain" => overrides.domain = Some(expect_string(&key, value)?),
                "lifetime" => overrides.lifetime = Some(expect_i64(&key, &value)?),
                "secure" => overrides.secure = Some(expect_bool(&key, &value)?),
                "httponly" => overrides.httponly = Some(expect_bool(&key, &value)?),
                "samesite" => {
                    let raw = expect_string(&key, value)?;
                    overrides.samesite = Some(raw.parse::<SameSite>()?);
                }
                _ => {
                    return Err(Error::ConfigurationError(format!(
                        "unknown session cookie option: {:?}",
                        key
                    )))
                }
            }
        }

        Ok(overrides)
    }

    /// ホスト既定値に上書き設定を適用（上書き側が優先）
    pub fn apply(&self, defaults: CookieOptions) -> CookieOptions {
        CookieOptions {
            name: self.name.clone().unwrap_or(defaults.name),
            path: self.path.clone().unwrap_or(defaults.path),
            domain: self.domain.clone().unwrap_or(defaults.domain),
            lifetime: self.lifetime.unwrap_or(defaults.lifetime),
            secure: self.secure.unwrap_or(defaults.secure),
            httponly: self.httponly.unwrap_or(defaults.httponly),
            samesite: self.samesite.or(defaults.samesite),
        }
    }
}

impl<'de> Deserialize<'de> for CookieOverrides {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        CookieOverrides::from_map(raw).map_err(serde::de::Error::custom)
    }
}

fn type_error(key: &str, expected: &str, value: &Value) -> Error {
    Error::ConfigurationError(format!(
        "session cookie option {:?} must be {}, got {}",
        key, expected, value
    ))
}

fn expect_string(key: &str, value: Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(type_error(key, "a string", &other)),
    }
}

fn expect_i64(key: &str, value: &Value) -> Result<i64, Error> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| type_error(key, "an integer", value)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| type_error(key, "an integer", value)),
        _ => Err(type_error(key, "an integer", value)),
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(type_error(key, "a boolean", value)),
        },
        Value::String(s) => parse_bool(s).ok_or_else(|| type_error(key, "a boolean", value)),
        _ => Err(type_error(key, "a boolean", value)),
    }
}
