//! HTTP関連の基本型とユーティリティ

use std::collections::HashMap;
use std::fmt;
use log::warn;
use serde::{Serialize, Deserialize};
use crate::error::Error;
use super::cookie::Cookie;
use super::utils::{is_header_value_valid, parse_cookie_header, parse_query_string};

/// HTTPメソッド
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::GET => write!(f, "GET"),
            Method::POST => write!(f, "POST"),
            Method::PUT => write!(f, "PUT"),
            Method::DELETE => write!(f, "DELETE"),
            Method::PATCH => write!(f, "PATCH"),
            Method::HEAD => write!(f, "HEAD"),
            Method::OPTIONS => write!(f, "OPTIONS"),
        }
    }
}

impl Method {
    /// 文字列からMethodに変換
    pub fn from_str(method: &str) -> Option<Self> {
        match method.to_uppercase().as_str() {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "PATCH" => Some(Method::PATCH),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            _ => None,
        }
    }
}

/// HTTPリクエスト
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTPメソッド
    pub method: Method,
    /// リクエストパス
    pub path: String,
    /// クエリパラメータ
    pub query_params: HashMap<String, String>,
    /// HTTPヘッダー
    pub headers: HashMap<String, String>,
    /// リクエストクッキー（name→value）
    pub cookies: HashMap<String, String>,
    /// リクエストボディ
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// 新しいリクエストを作成
    pub fn new(method: Method, path: String) -> Self {
        Self {
            method,
            path,
            query_params: HashMap::new(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            body: None,
        }
    }

    /// `http::Request` から変換
    pub fn from_http(req: http::Request<Vec<u8>>) -> Result<Self, Error> {
        let (parts, body) = req.into_parts();
        let method = Method::from_str(parts.method.as_str()).ok_or_else(|| {
            Error::InvalidHeader(format!("unsupported method: {}", parts.method))
        })?;

        let mut request = Request::new(method, parts.uri.path().to_string());
        if let Some(query) = parts.uri.query() {
            request.query_params = parse_query_string(query);
        }

        for (name, value) in parts.headers.iter() {
            let value = value
                .to_str()
                .map_err(|_| Error::InvalidHeader(format!("non-ASCII value in header {}", name)))?;
            // 複数のCookieヘッダーはそれぞれ取り込む
            if name == http::header::COOKIE {
                request.merge_cookie_header(value);
            }
            if is_header_value_valid(value) {
                request.headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        if !body.is_empty() {
            request.body = Some(body);
        }
        Ok(request)
    }

    /// クエリパラメータを追加
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// ヘッダーを追加
    ///
    /// キーは小文字化して保持する。CRLF・制御文字を含む値は拒否（未設定）。
    /// `Cookie` ヘッダーはクッキーとしても取り込む。
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if !is_header_value_valid(&value) {
            warn!("Request::with_header rejected invalid value for {}", key);
            return self;
        }
        if key == http::header::COOKIE.as_str() {
            self.merge_cookie_header(&value);
        }
        self.headers.insert(key, value);
        self
    }

    /// クッキーを追加
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// ヘッダーを大文字小文字を区別せずに取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// 指定名のクッキー値を取得
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// ボディをJSONとしてパース
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, Error> {
        if let Some(body) = &self.body {
            serde_json::from_slice(body)
                .map_err(|e| Error::InvalidRequestBody(e.to_string()))
        } else {
            Err(Error::InvalidRequestBody("No request body".to_string()))
        }
    }

    fn merge_cookie_header(&mut self, raw: &str) {
        for (name, value) in parse_cookie_header(raw) {
            self.cookies.entry(name).or_insert(value);
        }
    }
}

/// HTTPレスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTPステータスコード
    pub status: u16,
    /// HTTPヘッダー
    pub headers: HashMap<String, String>,
    /// 送出するクッキー（Set-Cookieヘッダー1つにつき1件）
    pub cookies: Vec<Cookie>,
    /// レスポンスボディ
    pub body: Option<Vec<u8>>,
}

impl Response {
    /// 新しいレスポンスを作成
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            cookies: Vec::new(),
            body: None,
        }
    }

    /// ヘッダーを追加（CRLF・制御文字を含む値は拒否）
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if !is_header_value_valid(&value) {
            warn!("Response::with_header rejected invalid value for {}", key);
            return self;
        }
        self.headers.insert(key, value);
        self
    }

    /// クッキーを末尾に追加
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// ボディを追加
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// テキストボディを設定
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.headers.insert("Content-Type".to_string(), "text/plain; charset=utf-8".to_string());
        self.body = Some(text.into().into_bytes());
        self
    }

    /// JSONをボディとして設定
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        let json = serde_json::to_vec(value)
            .map_err(|e| Error::ResponseSerializationError(e.to_string()))?;

        self.headers.insert("Content-Type".to_string(), "application/json".to_string());
        self.body = Some(json);
        Ok(self)
    }

    /// 200 OKレスポンスを作成
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Set-Cookieヘッダー値の一覧
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies.iter().map(Cookie::to_header_value).collect()
    }

    /// Error型から固定メッセージのレスポンスを生成
    pub fn from_error(error: &Error) -> Self {
        let status = error.status_code();
        let message = match status {
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Error",
        };
        Response::new(status).text(message)
    }

    /// `http::Response` に変換（クッキー毎に Set-Cookie ヘッダーを出力）
    pub fn into_http(self) -> Result<http::Response<Vec<u8>>, Error> {
        let mut builder = http::Response::builder().status(self.status);

        for (key, value) in &self.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        for value in self.set_cookie_headers() {
            builder = builder.header(http::header::SET_COOKIE, value);
        }

        builder
            .body(self.body.unwrap_or_default())
            .map_err(|e| Error::InvalidHeader(e.to_string()))
    }
}
