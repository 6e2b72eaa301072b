// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 目录列表
//!
//! 为已校验的目录生成 HTML 索引页。
//!
//! 条目由三块按顺序合并而成：上级目录 `../`、子目录（显示名与 URL 末尾带 `/`）、文件。
//! 显示名相同时后插入者覆盖先插入者的 URL，但保留先插入者的位置。
//! 显示名做 HTML 转义，`href` 单独做百分号编码，两者不能混用。

use std::{collections::HashMap, io, path::Path};

use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// 除 RFC 3986 非保留字符与 `/` 之外全部编码
const HREF_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// 索引页引用的外部资源，来自全局配置。
#[derive(Debug, Clone)]
pub struct ListingAssets {
    pub stylesheet: String,
    pub font_url: String,
}

/// 列表中的一项：显示名与相对 URL
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub display_name: String,
    pub url: String,
}

/// 保留首次插入位置、后插入覆盖值的有序表
#[derive(Debug, Default)]
struct OrderedEntries {
    entries: Vec<ListingEntry>,
    index: HashMap<String, usize>,
}

impl OrderedEntries {
    fn insert(&mut self, display_name: String, url: String) {
        match self.index.get(&display_name) {
            Some(&i) => self.entries[i].url = url,
            None => {
                self.index.insert(display_name.clone(), self.entries.len());
                self.entries.push(ListingEntry { display_name, url });
            }
        }
    }
}

/// 按 `../`、目录、文件的顺序合并条目。
///
/// `directories` 与 `files` 只给出子项名，目录的显示名与 URL 会追加 `/`。
pub fn merge_entries(
    virtual_path: &str,
    directories: &[String],
    files: &[String],
) -> Vec<ListingEntry> {
    let mut merged = OrderedEntries::default();
    merged.insert("../".to_string(), join_virtual(virtual_path, ".."));
    for name in directories {
        merged.insert(
            format!("{}/", name),
            format!("{}/", join_virtual(virtual_path, name)),
        );
    }
    for name in files {
        merged.insert(name.clone(), join_virtual(virtual_path, name));
    }
    merged.entries
}

/// 拼接虚拟路径。多余的 `/` 会被折叠，基路径末尾的 `/` 被去掉。
fn join_virtual(base: &str, name: &str) -> String {
    let mut joined = String::with_capacity(base.len() + name.len() + 1);
    for part in base.split('/').filter(|p| !p.is_empty()) {
        joined.push('/');
        joined.push_str(part);
    }
    joined.push('/');
    joined.push_str(name);
    joined
}

/// 列出目录的直接子项，分为（目录名，文件名）两组并各自按名称排序。
///
/// 符号链接按目标分类；断开的链接、特殊文件以及非 UTF-8 的文件名不出现在列表中。
pub async fn read_children(dir: &Path) -> io::Result<(Vec<String>, Vec<String>)> {
    let mut directories = Vec::new();
    let mut files = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                // 无法还原为 URL 路径，链接只会指向 404
                debug!("跳过非UTF-8文件名：{:?}", raw);
                continue;
            }
        };
        let metadata = match tokio::fs::metadata(entry.path()).await {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.is_dir() {
            directories.push(name);
        } else if metadata.is_file() {
            files.push(name);
        }
    }
    directories.sort();
    files.sort();
    Ok((directories, files))
}

/// 生成完整的索引页 HTML
pub fn render(virtual_path: &str, entries: &[ListingEntry], assets: &ListingAssets) -> String {
    const TAB: &str = "    ";
    let title = escape_html(virtual_path);
    let stylesheet = escape_html(&assets.stylesheet);
    let font_url = escape_html(&assets.font_url);

    let mut lines = vec![
        "<!DOCTYPE html>".to_string(),
        "<html>".to_string(),
        format!("{TAB}<head>"),
        format!("{TAB}{TAB}<meta charset=\"utf-8\" />"),
        format!(
            "{TAB}{TAB}<link rel=\"preload\" href=\"{stylesheet}\" as=\"style\" type=\"text/css\">"
        ),
        format!(
            "{TAB}{TAB}<link rel=\"preload\" href=\"{font_url}\" as=\"font\" type=\"font/ttf\" crossorigin />"
        ),
        format!("{TAB}{TAB}<title>Index of {title}</title>"),
        format!("{TAB}{TAB}<link rel=\"stylesheet\" href=\"{stylesheet}\" />"),
        format!("{TAB}</head>"),
        format!("{TAB}<body>"),
        format!("{TAB}{TAB}<h1>Index of <wbr>{title}</h1>"),
        format!("{TAB}{TAB}<ul>"),
    ];
    for entry in entries {
        lines.push(format!(
            "{TAB}{TAB}{TAB}<li><a href=\"{}\">{}</a></li>",
            utf8_percent_encode(&entry.url, HREF_ENCODE_SET),
            escape_html(&entry.display_name)
        ));
    }
    lines.push(format!("{TAB}{TAB}</ul>"));
    lines.push(format!("{TAB}</body>"));
    lines.push("</html>".to_string());
    lines.join("\n")
}

/// 读取目录并生成索引页
pub async fn render_directory(
    dir: &Path,
    virtual_path: &str,
    assets: &ListingAssets,
) -> io::Result<String> {
    let (directories, files) = read_children(dir).await?;
    let entries = merge_entries(virtual_path, &directories, &files);
    Ok(render(virtual_path, &entries, assets))
}

/// HTML 文本转义
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
