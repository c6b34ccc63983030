//! 共通ユーティリティ関数群（URLデコード、クエリ/クッキー解析、環境設定 等）

use std::collections::HashMap;
use std::env;
use log::warn;
use crate::error::Error;

/// URLエンコーディングのデコード関数
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (from_hex(bytes[i + 1]), from_hex(bytes[i + 2])) {
                result.push(h * 16 + l);
                i += 3;
                continue;
            }
        } else if bytes[i] == b'+' {
            result.push(b' ');
            i += 1;
            continue;
        }
        result.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}

/// 16進数文字をバイト値に変換するヘルパー関数
fn from_hex(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// クエリ文字列をパースしてURLデコードを行う共通関数
pub fn parse_query_string(query_string: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if query_string.is_empty() {
        return params;
    }

    for pair in query_string.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let Some(key) = parts.next() {
            let value = parts.next().unwrap_or("");
            params.insert(percent_decode(key), percent_decode(value));
        }
    }

    params
}

/// `Cookie` ヘッダーを name→value のマップに分解する
///
/// 値はデコードも検証もしない。同名のクッキーが複数ある場合は先勝ち。
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for cookie_pair in header.split(';') {
        let parts: Vec<&str> = cookie_pair.trim().splitn(2, '=').collect();
        if parts.len() == 2 && !parts[0].is_empty() {
            cookies
                .entry(parts[0].to_string())
                .or_insert_with(|| parts[1].to_string());
        }
    }

    cookies
}

/// 環境変数を取得（空文字列は未設定扱い）
pub fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// 真偽値文字列を解釈する（1/true/on/yes, 0/false/off/no）
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// 真偽値の環境変数を取得。解釈できない値は警告してデフォルトを返す
pub fn env_bool(key: &str, default: bool) -> bool {
    match env_string(key) {
        Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
            warn!("Ignoring invalid boolean in {}: {:?}", key, raw);
            default
        }),
        None => default,
    }
}

/// 整数の環境変数を取得。解釈できない値は警告してデフォルトを返す
pub fn env_i64(key: &str, default: i64) -> i64 {
    match env_string(key) {
        Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
            warn!("Ignoring invalid integer in {}: {:?}", key, raw);
            default
        }),
        None => default,
    }
}

/// ヘッダー値に使用可能な文字かを判定（CRLF・制御文字を拒否）
pub fn is_header_value_valid(value: &str) -> bool {
    // US-ASCII可視範囲に限定し、制御文字(0x00-0x1F, 0x7F)およびCR/LFを拒否する
    if value.is_empty() {
        return true;
    }
    value.chars().all(|c| {
        let code = c as u32;
        code >= 0x20 && code != 0x7F && c != '\r' && c != '\n'
    })
}

/// Cookie名が安全なトークンか（RFC6265準拠の簡易版）
pub fn is_cookie_name_valid(name: &str) -> bool {
    if name.is_empty() { return false; }
    const FORBIDDEN: &[char] = &['(',')','<','>','@',',',';',':','\\','"','/','[',']','?','{','}','=',' ','\t','\r','\n'];
    name.chars().all(|c| c.is_ascii() && !c.is_ascii_control() && !FORBIDDEN.contains(&c))
}

/// Cookie値が安全か（RFC6265 cookie-octetの簡易版）
/// 許容: 0x21, 0x23-0x2B, 0x2D-0x3A, 0x3C-0x5B, 0x5D-0x7E
pub fn is_cookie_value_valid(value: &str) -> bool {
    value.chars().all(|c| {
        let b = c as u32;
        matches!(b,
            0x21 |
            0x23..=0x2B |
            0x2D..=0x3A |
            0x3C..=0x5B |
            0x5D..=0x7E
        )
    })
}

/// ヘルパー: 無効なCookie名/値ならErrorを返す
pub fn validate_cookie_name_value(name: &str, value: &str) -> Result<(), Error> {
    if !is_cookie_name_valid(name) {
        return Err(Error::InvalidCookie(format!("cookie name {:?} contains invalid characters", name)));
    }
    if !is_cookie_value_valid(value) {
        return Err(Error::InvalidCookie("cookie value contains invalid characters".into()));
    }
    Ok(())
}

/// ログ出力用にセッションIDを短縮する
pub fn redact_id(id: &str) -> String {
    if id.is_empty() {
        return "<none>".to_string();
    }
    let prefix: String = id.chars().take(6).collect();
    format!("{}…", prefix)
}
