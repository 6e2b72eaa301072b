// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! - HTTP 状态码的原因短语与默认描述。
//! - HTTP 方法、版本的强类型枚举。
//! - 静态挂载点的默认参数。

use lazy_static::lazy_static;
use std::collections::HashMap;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "shaneyale-webserver";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 文件流式传输的默认分块大小（256KB）
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// 请求头允许的最大字节数，超出后返回 431
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// 保持连接时最多读取并丢弃的请求体字节数，超出则在响应后关闭连接
pub const MAX_DISCARDED_BODY: u64 = 64 * 1024;

/// 静态资源只接受的方法
pub const STATIC_METHODS: &[&str] = &["GET", "HEAD"];

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");

        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(431, "Request Header Fields Too Large");

        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };

    /// 状态码的默认长描述，错误页在没有更具体的信息时使用。
    pub static ref STATUS_DESCRIPTIONS: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(400, "Bad request syntax or unsupported method");
        map.insert(403, "Request forbidden -- authorization will not succeed");
        map.insert(404, "Nothing matches the given URI");
        map.insert(405, "Specified method is invalid for this resource");
        map.insert(431, "Request header fields are too large");
        map.insert(500, "Server got itself in trouble");
        map.insert(505, "Cannot fulfill request");
        map
    };
}

/// 状态码的原因短语，未登记的状态码返回 `"Unknown"`。
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("Unknown")
}

/// 状态码的默认描述，未登记时退回原因短语。
pub fn status_description(code: u16) -> &'static str {
    STATUS_DESCRIPTIONS
        .get(&code)
        .copied()
        .unwrap_or_else(|| reason_phrase(code))
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

impl HttpVersion {
    /// 该版本在没有 `Connection` 头时是否默认保持连接
    pub fn keep_alive_by_default(&self) -> bool {
        matches!(self, HttpVersion::V1_1)
    }
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpRequestMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(HttpRequestMethod::Get),
            "HEAD" => Some(HttpRequestMethod::Head),
            "OPTIONS" => Some(HttpRequestMethod::Options),
            "POST" => Some(HttpRequestMethod::Post),
            "PUT" => Some(HttpRequestMethod::Put),
            "PATCH" => Some(HttpRequestMethod::Patch),
            "DELETE" => Some(HttpRequestMethod::Delete),
            _ => None,
        }
    }

    /// 能否访问静态资源（只读）
    pub fn is_read_only(&self) -> bool {
        matches!(self, HttpRequestMethod::Get | HttpRequestMethod::Head)
    }
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本号
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "1.0"),
            HttpVersion::V1_1 => write!(f, "1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            HttpRequestMethod::Get => "GET",
            HttpRequestMethod::Head => "HEAD",
            HttpRequestMethod::Options => "OPTIONS",
            HttpRequestMethod::Post => "POST",
            HttpRequestMethod::Put => "PUT",
            HttpRequestMethod::Patch => "PATCH",
            HttpRequestMethod::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}
