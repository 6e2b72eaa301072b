// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 将连接上读取到的请求头字节解析为强类型的 `Request`：
//! 1. 请求行（方法、路径、版本）。
//! 2. 路由与日志需要的几个标头（`Host`、`User-Agent`、`Accept`、`Connection`）。
//! 3. 路径只做一次百分号解码，原始路径（含查询串）保留给访问日志。

use crate::{exception::Exception, param::*};
use log::error;
use percent_encoding::percent_decode_str;

/// 表示一个 HTTP 请求的元数据。请求体不被读取。
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// 解码后的路径，不含查询串
    path: String,
    /// 请求行中的原始目标（路径 + 查询串）
    raw_path: String,
    version: HttpVersion,
    host: Option<String>,
    user_agent: String,
    accept: Option<String>,
    connection: Option<String>,
    /// 请求体长度，来自 `Content-Length`
    content_length: Option<u64>,
    /// 是否带有 `Transfer-Encoding`（无法按长度定界）
    transfer_encoded: bool,
}

impl Request {
    /// 从请求头字节（以空行结尾，或不含结尾空行）构建 `Request`。
    ///
    /// # 参数
    /// * `buffer` - 从连接读取的请求头。
    /// * `id` - 请求 ID，用于日志追踪。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);
        let first_line = request_lines.next().unwrap_or_default();

        // 请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();
        if first_line_parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest(first_line.to_string()));
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match HttpRequestMethod::parse(&method_str) {
            Some(m) => m,
            None => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[2].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        let raw_path = first_line_parts[1].to_string();
        if !raw_path.starts_with('/') {
            error!("[ID{}]请求目标不是绝对路径：{}", id, &raw_path);
            return Err(Exception::MalformedRequest(raw_path));
        }
        let path = decode_path(&raw_path)?;

        let mut host = None;
        let mut user_agent = "-".to_string();
        let mut accept = None;
        let mut connection = None;
        let mut content_length: Option<u64> = None;
        let mut transfer_encoded = false;
        for line in request_lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim(), v.trim()),
                None => {
                    error!("[ID{}]无法解析的请求头：{}", id, line);
                    return Err(Exception::MalformedRequest(line.to_string()));
                }
            };
            if name.eq_ignore_ascii_case("host") {
                host = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("user-agent") {
                user_agent = value.to_string();
            } else if name.eq_ignore_ascii_case("accept") {
                accept = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("connection") {
                connection = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-length") {
                let length = match value.parse::<u64>() {
                    Ok(l) if value.bytes().all(|b| b.is_ascii_digit()) => l,
                    _ => {
                        error!("[ID{}]非法的Content-Length：{}", id, value);
                        return Err(Exception::MalformedRequest(line.to_string()));
                    }
                };
                // 多个取值不一致时无法确定请求体边界
                if content_length.map_or(false, |l| l != length) {
                    error!("[ID{}]Content-Length重复且不一致", id);
                    return Err(Exception::MalformedRequest(line.to_string()));
                }
                content_length = Some(length);
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                transfer_encoded = true;
            }
        }

        Ok(Self {
            method,
            path,
            raw_path,
            version,
            host,
            user_agent,
            accept,
            connection,
            content_length,
            transfer_encoded,
        })
    }
}

/// 去掉查询串并百分号解码一次。解码结果不是 UTF-8 时视为非法路径。
fn decode_path(raw: &str) -> Result<String, Exception> {
    let without_query = raw.split(['?', '#']).next().unwrap_or_default();
    percent_decode_str(without_query)
        .decode_utf8()
        .map(|p| p.into_owned())
        .map_err(|_| Exception::InvalidPath)
}

impl Request {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 解码后的路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 原始请求目标（含查询参数）
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// 客户端是否声明接受 HTML
    pub fn accepts_html(&self) -> bool {
        self.accept.as_deref().map_or(false, |a| a.contains("text/html"))
    }

    /// `Content-Length` 声明的请求体长度
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// 请求体是否以 `Transfer-Encoding` 传输
    pub fn is_transfer_encoded(&self) -> bool {
        self.transfer_encoded
    }

    /// 响应后是否保持连接
    pub fn keep_alive(&self) -> bool {
        match self.connection.as_deref() {
            Some(c) if c.eq_ignore_ascii_case("close") => false,
            Some(c) if c.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version.keep_alive_by_default(),
        }
    }
}
