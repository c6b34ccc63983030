//! HTTPクッキー関連の実装

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::error::Error;
use super::utils::{validate_cookie_name_value, is_header_value_valid};

/// `Expires` 属性の日付書式（IMF-fixdate）
pub const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// SameSite属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => write!(f, "Strict"),
            SameSite::Lax => write!(f, "Lax"),
            SameSite::None => write!(f, "None"),
        }
    }
}

impl FromStr for SameSite {
    type Err = Error;

    /// 大文字小文字を区別せずに解釈
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            other => Err(Error::ConfigurationError(format!("unknown SameSite value: {:?}", other))),
        }
    }
}

/// HTTPクッキー
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// 新しいクッキーをResultで作成（無効な名前/値は拒否）
    pub fn try_new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, Error> {
        let n = name.into();
        let v = value.into();
        validate_cookie_name_value(&n, &v)?;
        Ok(Self {
            name: n,
            value: v,
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        })
    }

    /// パスを設定
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// ドメインを設定
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// 有効期限を設定
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// 最大年齢を設定
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// セキュアフラグを設定
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// HttpOnlyフラグを設定
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// SameSite属性を設定
    pub fn with_same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set-Cookieヘッダー値を生成
    ///
    /// 属性順: Max-Age, Path, Domain, Expires, Secure, HttpOnly, SameSite
    pub fn to_header_value(&self) -> String {
        let mut cookie_str = format!("{}={}", self.name, self.value);

        if let Some(max_age) = &self.max_age {
            cookie_str.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }

        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            if is_header_value_valid(path) && !path.contains(';') {
                cookie_str.push_str(&format!("; Path={}", path));
            } else {
                log::warn!("Cookie::to_header_value skipped invalid Path value: {:?}", path);
            }
        }

        // 空のDomainはUA側で無視されるため出力しない
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            if is_header_value_valid(domain) && !domain.contains(';') {
                cookie_str.push_str(&format!("; Domain={}", domain));
            } else {
                log::warn!("Cookie::to_header_value skipped invalid Domain value: {:?}", domain);
            }
        }

        if let Some(expires) = &self.expires {
            cookie_str.push_str(&format!("; Expires={}", expires.format(EXPIRES_FORMAT)));
        }

        if self.secure {
            cookie_str.push_str("; Secure");
        }

        if self.http_only {
            cookie_str.push_str("; HttpOnly");
        }

        if let Some(same_site) = &self.same_site {
            cookie_str.push_str(&format!("; SameSite={}", same_site));
        }

        cookie_str
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cookie_basic() {
        let cookie = Cookie::try_new("session_id", "abc123").unwrap();

        assert_eq!(cookie.name, "session_id");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.path, None);
        assert_eq!(cookie.domain, None);
        assert!(!cookie.secure);
        assert!(!cookie.http_only);
        assert_eq!(cookie.same_site, None);
        assert_eq!(cookie.to_header_value(), "session_id=abc123");
    }

    #[test]
    fn test_cookie_header_attribute_order() {
        let expires = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let cookie = Cookie::try_new("sid", "v1")
            .unwrap()
            .with_max_age(Duration::from_secs(3600))
            .with_path("/app")
            .with_domain("test.com")
            .with_expires(expires)
            .secure(true)
            .http_only(true)
            .with_same_site(Some(SameSite::Lax));

        assert_eq!(
            cookie.to_header_value(),
            "sid=v1; Max-Age=3600; Path=/app; Domain=test.com; \
             Expires=Tue, 31 Dec 2024 23:59:59 GMT; Secure; HttpOnly; SameSite=Lax"
        );
        assert_eq!(cookie.to_string(), cookie.to_header_value());
    }

    #[test]
    fn test_cookie_empty_domain_is_omitted() {
        let cookie = Cookie::try_new("sid", "v")
            .unwrap()
            .with_max_age(Duration::from_secs(0))
            .with_path("/")
            .with_domain("");

        assert_eq!(cookie.to_header_value(), "sid=v; Max-Age=0; Path=/");
    }

    #[test]
    fn test_same_site_display_and_parse() {
        assert_eq!(SameSite::Strict.to_string(), "Strict");
        assert_eq!(SameSite::Lax.to_string(), "Lax");
        assert_eq!(SameSite::None.to_string(), "None");

        assert_eq!("strict".parse::<SameSite>().unwrap(), SameSite::Strict);
        assert_eq!(" LAX ".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert!("sometimes".parse::<SameSite>().is_err());
    }

    #[test]
    fn test_cookie_try_new_validation() {
        let ok = Cookie::try_new("SID", "abcDEF123-_.:~").unwrap();
        assert_eq!(ok.value, "abcDEF123-_.:~");

        // 値に禁止記号（; , \n など）
        assert!(Cookie::try_new("SID", "bad;value").is_err());
        assert!(Cookie::try_new("SID", "bad,value").is_err());
        assert!(Cookie::try_new("SID", "bad\nvalue").is_err());

        // 名前に禁止文字（空白・セパレータ）
        assert!(Cookie::try_new("bad name", "v").is_err());
        assert!(Cookie::try_new("", "v").is_err());
    }

    #[test]
    fn test_cookie_to_header_skips_invalid_attrs() {
        let mut c = Cookie::try_new("A", "B").unwrap();
        // 無効なPath/DomainはCRLF拒否によりスキップされる
        c.path = Some("/ok".into());
        c.domain = Some("bad\r\ndomain".into());
        let hv = c.to_header_value();
        assert!(hv.contains("A=B"));
        assert!(hv.contains("Path=/ok"));
        assert!(!hv.contains("Domain=bad"));
    }
}
