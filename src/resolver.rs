// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析器
//!
//! 把路由捕获到的不可信路径片段解析为挂载目录下的绝对路径。
//!
//! ## 策略
//! 1. 片段自带根锚点（以 `/` 或 `\` 开头、盘符、UNC/设备前缀）时直接拒绝，返回 `Forbidden`。
//! 2. 拼接到挂载目录后做完整规范化（`.`、`..` 与符号链接）。
//! 3. 不跟随符号链接时，规范化结果必须仍位于规范化后的挂载目录内，否则返回 `NotFound`，
//!    避免泄露目录外文件是否存在。
//! 4. 规范化失败一律折叠为 `NotFound`；非"不存在"类的失败额外记录错误日志。

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use log::{debug, error};

use crate::{config::MountConfig, exception::Exception, param::DEFAULT_CHUNK_SIZE};

/// 以只读方式暴露在某个 URL 前缀下的目录。注册后不可变。
#[derive(Debug, Clone)]
pub struct StaticRoot {
    prefix: String,
    directory: PathBuf,
    show_index: bool,
    follow_symlinks: bool,
    chunk_size: usize,
}

impl StaticRoot {
    /// 注册挂载点。前缀必须以 `/` 开头，末尾的 `/` 会被去掉；目录会被规范化，必须存在。
    pub fn new(prefix: &str, directory: impl AsRef<Path>) -> Result<Self, Exception> {
        if !prefix.starts_with('/') {
            return Err(Exception::InvalidConfig(format!(
                "挂载前缀必须以'/'开头：{}",
                prefix
            )));
        }
        let prefix = prefix.strip_suffix('/').unwrap_or(prefix).to_string();

        let directory = directory.as_ref();
        let canonical = directory.canonicalize().map_err(|e| {
            Exception::InvalidConfig(format!("无法解析挂载目录{}：{}", directory.display(), e))
        })?;
        if !canonical.is_dir() {
            return Err(Exception::InvalidConfig(format!(
                "挂载目标不是目录：{}",
                canonical.display()
            )));
        }

        Ok(Self {
            prefix,
            directory: canonical,
            show_index: false,
            follow_symlinks: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn from_config(mount: &MountConfig) -> Result<Self, Exception> {
        Ok(Self::new(&mount.prefix, &mount.root)?
            .show_index(mount.show_index)
            .follow_symlinks(mount.follow_symlinks)
            .chunk_size(mount.chunk_size))
    }

    pub fn show_index(mut self, show_index: bool) -> Self {
        self.show_index = show_index;
        self
    }

    pub fn follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// 为 0 时保持原值
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }
}

impl StaticRoot {
    /// 不含末尾 `/` 的 URL 前缀；根挂载为空串
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 规范化后的挂载目录
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn listing_enabled(&self) -> bool {
        self.show_index
    }

    pub fn follows_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    pub fn stream_chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// 单个请求内有效的已校验路径，可以直接用于 stat/open。
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

/// 片段是否自带根锚点。与运行平台无关：POSIX 上也拒绝 Windows 风格的盘符与 UNC 路径。
pub fn has_anchor(segment: &str) -> bool {
    if segment.starts_with('/') || segment.starts_with('\\') {
        return true;
    }
    let bytes = segment.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }
    matches!(
        Path::new(segment).components().next(),
        Some(Component::Prefix(_)) | Some(Component::RootDir)
    )
}

/// 解析路径片段。只会以 `Forbidden` 或 `NotFound` 失败。
pub async fn resolve(root: &StaticRoot, raw_segment: &str) -> Result<ResolvedPath, Exception> {
    if has_anchor(raw_segment) {
        debug!("路径片段{:?}带有根锚点，拒绝访问", raw_segment);
        return Err(Exception::Forbidden);
    }

    let joined = root.directory().join(raw_segment);
    let canonical = match tokio::fs::canonicalize(&joined).await {
        Ok(p) => p,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("路径{}不存在", joined.display());
            return Err(Exception::NotFound);
        }
        Err(e) => {
            // 权限错误等同样按不存在处理
            error!("规范化路径{}失败：{}", joined.display(), e);
            return Err(Exception::NotFound);
        }
    };

    if !root.follows_symlinks() && !canonical.starts_with(root.directory()) {
        debug!(
            "路径{}解析到挂载目录之外：{}",
            joined.display(),
            canonical.display()
        );
        return Err(Exception::NotFound);
    }

    Ok(ResolvedPath(canonical))
}
