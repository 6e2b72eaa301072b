// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 静态资源处理器
//!
//! 每个请求独立运行一次状态机，不在请求之间保留任何状态：
//!
//! ```text
//! Resolving ──> Inspecting ──> Streaming
//!     │             │      └─> Listing
//!     └─────────────┴────────> Forbidden / NotFound（交给错误响应器）
//! ```
//!
//! 普通文件先打开、再对已打开的句柄重新取元数据，发送的一定是被分类的那个对象。
//! 规范化与打开之间仍存在时间窗口（符号链接被替换），视为可接受的风险。

use std::{fs::Metadata, io::ErrorKind};

use log::{debug, error, warn};
use tokio::fs::{self, File};

use crate::{
    exception::Exception,
    listing::{self, ListingAssets},
    resolver::{resolve, ResolvedPath, StaticRoot},
    response::Response,
};

/// 状态机的状态
#[derive(Debug)]
pub enum State {
    Resolving,
    Inspecting(ResolvedPath),
    Listing(ResolvedPath),
    Streaming(ResolvedPath, File, u64),
}

/// 文件系统对象的分类
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Directory,
    File,
    Other,
}

impl Kind {
    fn of(metadata: &Metadata) -> Self {
        if metadata.is_dir() {
            Kind::Directory
        } else if metadata.is_file() {
            Kind::File
        } else {
            Kind::Other
        }
    }
}

/// 处理一次静态资源请求。
///
/// # 参数
/// * `root` - 命中的挂载点。
/// * `segment` - 路由捕获到的、已解码的尾部路径片段。
/// * `request_path` - 请求的虚拟路径，用于生成目录列表。
/// * `assets` - 目录列表引用的样式表与字体。
pub async fn handle(
    root: &StaticRoot,
    segment: &str,
    request_path: &str,
    assets: &ListingAssets,
) -> Result<Response, Exception> {
    let mut state = State::Resolving;
    loop {
        debug!("静态资源状态: {:?}", state);
        state = match state {
            State::Resolving => State::Inspecting(resolve(root, segment).await?),
            State::Inspecting(resolved) => inspect(root, resolved).await?,
            State::Listing(resolved) => {
                return list(resolved, request_path, assets).await;
            }
            State::Streaming(resolved, file, length) => {
                return Ok(Response::from_file(
                    resolved.as_path(),
                    file,
                    length,
                    root.stream_chunk_size(),
                ));
            }
        };
    }
}

async fn inspect(root: &StaticRoot, resolved: ResolvedPath) -> Result<State, Exception> {
    let metadata = match fs::metadata(resolved.as_path()).await {
        Ok(m) => m,
        Err(e) => {
            debug!("{}在检查时已不存在：{}", resolved.as_path().display(), e);
            return Err(Exception::NotFound);
        }
    };

    match Kind::of(&metadata) {
        Kind::Directory if root.listing_enabled() => Ok(State::Listing(resolved)),
        Kind::Directory => {
            debug!("挂载点{}未开启目录列表", root.prefix());
            Err(Exception::Forbidden)
        }
        Kind::File => {
            let file = open(&resolved).await?;
            let metadata = file.metadata().await?;
            if Kind::of(&metadata) != Kind::File {
                warn!("{}在打开前被替换", resolved.as_path().display());
                return Err(Exception::NotFound);
            }
            Ok(State::Streaming(resolved, file, metadata.len()))
        }
        Kind::Other => {
            debug!("{}不是普通文件或目录", resolved.as_path().display());
            Err(Exception::NotFound)
        }
    }
}

async fn open(resolved: &ResolvedPath) -> Result<File, Exception> {
    File::open(resolved.as_path())
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Exception::NotFound,
            ErrorKind::PermissionDenied => Exception::Forbidden,
            _ => {
                error!("无法打开文件{}：{}", resolved.as_path().display(), e);
                Exception::from(e)
            }
        })
}

async fn list(
    resolved: ResolvedPath,
    request_path: &str,
    assets: &ListingAssets,
) -> Result<Response, Exception> {
    match listing::render_directory(resolved.as_path(), request_path, assets).await {
        Ok(html) => Ok(Response::from_html(200, html)),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            debug!("无权读取目录{}", resolved.as_path().display());
            Err(Exception::Forbidden)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(Exception::NotFound),
        Err(e) => {
            error!("读取目录{}失败：{}", resolved.as_path().display(), e);
            Err(Exception::from(e))
        }
    }
}
