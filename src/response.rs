// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::*;

use bytes::Bytes;
use chrono::prelude::*;
use log::debug;
use std::path::Path;
use tokio::fs::File;

/// 响应体
#[derive(Debug)]
pub enum Body {
    Empty,
    /// 已缓冲在内存中的内容（错误页、目录列表、固定路由）
    Bytes(Bytes),
    /// 已打开的文件，发送时按块读取。文件句柄随响应一起释放。
    File { file: File, chunk_size: usize },
}

#[derive(Debug)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    server_name: String,
    allow: Option<Vec<&'static str>>,
    location: Option<String>,
    force_close: bool,
    body: Body,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            allow: None,
            location: None,
            force_close: false,
            body: Body::Empty,
        }
    }

    /// 带显式 Content-Type 的内存响应
    pub fn from_bytes(code: u16, content_type: &str, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let mut response = Self::new();
        response.set_code(code);
        response.content_type = Some(content_type.to_string());
        response.content_length = content.len() as u64;
        response.body = Body::Bytes(content);
        response
    }

    pub fn from_html(code: u16, html: impl Into<String>) -> Self {
        Self::from_bytes(code, "text/html; charset=utf-8", html.into())
    }

    pub fn from_text(code: u16, text: impl Into<String>) -> Self {
        Self::from_bytes(code, "text/plain; charset=utf-8", text.into())
    }

    /// 文件流响应。`path` 仅用于按扩展名推断 MIME。
    pub fn from_file(path: &Path, file: File, length: u64, chunk_size: usize) -> Self {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        debug!("文件{}的MIME类型: {}", path.display(), mime);
        let mut response = Self::new();
        response.content_type = Some(mime.to_string());
        response.content_length = length;
        response.body = Body::File { file, chunk_size };
        response
    }

    pub fn redirect(code: u16, location: &str) -> Self {
        let mut response = Self::from_text(code, format!("{}: {}", code, reason_phrase(code)));
        response.location = Some(location.to_string());
        response
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = reason_phrase(code).to_string();
        self
    }

    pub fn set_allow(&mut self, methods: &[&'static str]) -> &mut Self {
        self.allow = Some(methods.to_vec());
        self
    }

    /// 发送后强制关闭连接
    pub fn force_close(&mut self) -> &mut Self {
        self.force_close = true;
        self
    }

    /// 序列化状态行与响应头（不含响应体）
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut header = format!(
            "HTTP/{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content_length, CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        if let Some(a) = &self.allow {
            header.push_str(&format!("Allow: {}{}", a.join(", "), CRLF));
        }
        if let Some(l) = &self.location {
            header.push_str(&format!("Location: {}{}", l, CRLF));
        }
        if self.force_close {
            header.push_str(&format!("Connection: close{}", CRLF));
        }
        header.push_str(CRLF);
        header.into_bytes()
    }

    /// 取出响应体，原位置留下 `Body::Empty`
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::Empty)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_force_close(&self) -> bool {
        self.force_close
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::File { .. })
    }

    /// 内存响应体；流式响应返回 `None`
    pub fn content(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// RFC 9110 的 IMF-fixdate 格式
fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
