// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接
//!
//! 对任意 `AsyncRead + AsyncWrite` 流的一层薄封装：
//! - 读取一个请求头（以空行结束，上限 `MAX_HEADER_SIZE`），多读到的字节留给下一个请求。
//! - 写出一个响应。文件响应体按块读取、逐块写出，每次写入都是一个 await 点。
//! - 记录当前请求已写出的字节数。一旦写出过字节，同一请求的第二个响应会被拒绝。

use bytes::{Buf, Bytes, BytesMut};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    exception::Exception,
    param::MAX_HEADER_SIZE,
    response::{Body, Response},
};

const HEADER_END: &[u8] = b"\r\n\r\n";

pub struct Connection<S> {
    stream: S,
    peer: String,
    buffer: BytesMut,
    output_size: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            buffer: BytesMut::with_capacity(1024),
            output_size: 0,
        }
    }

    /// 开始处理下一个请求，清零输出计数
    pub fn begin_request(&mut self) {
        self.output_size = 0;
    }

    /// 读取一个完整的请求头（含结尾空行）。
    ///
    /// 对端在请求之间关闭连接时返回 `Ok(None)`。
    pub async fn read_head(&mut self, id: u128) -> Result<Option<Bytes>, Exception> {
        loop {
            if let Some(pos) = find_header_end(&self.buffer) {
                let head = self.buffer.split_to(pos + HEADER_END.len()).freeze();
                debug!("[ID{}]HTTP请求头接收完毕，长度{}", id, head.len());
                return Ok(Some(head));
            }
            if self.buffer.len() >= MAX_HEADER_SIZE {
                return Err(Exception::HeaderTooLarge);
            }
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                if !self.buffer.is_empty() {
                    debug!("[ID{}]请求头不完整时连接已关闭", id);
                }
                return Ok(None);
            }
        }
    }

    /// 读取并丢弃 `length` 字节的请求体，先消耗缓冲区中已读到的部分。
    ///
    /// 对端在请求体读完之前关闭连接时返回 `MalformedRequest`。
    pub async fn discard_body(&mut self, length: u64) -> Result<(), Exception> {
        let buffered = self.buffer.len().min(length as usize);
        self.buffer.advance(buffered);
        let mut remaining = length - buffered as u64;

        let mut scratch = [0u8; 8192];
        while remaining > 0 {
            let want = scratch.len().min(remaining as usize);
            let n = self.stream.read(&mut scratch[..want]).await?;
            if n == 0 {
                return Err(Exception::MalformedRequest(format!(
                    "请求体不完整，尚缺{}字节",
                    remaining
                )));
            }
            remaining -= n as u64;
        }
        Ok(())
    }

    /// 发送响应，返回本请求累计写出的字节数。
    ///
    /// `head_only` 为真时（HEAD 请求）只写状态行与响应头。
    pub async fn send(&mut self, response: &mut Response, head_only: bool) -> Result<u64, Exception> {
        if self.output_size > 0 {
            return Err(Exception::ResponseAlreadySent);
        }

        let head = response.head_bytes();
        self.write_tracked(&head).await?;

        match response.take_body() {
            _ if head_only => {}
            Body::Empty => {}
            Body::Bytes(content) => self.write_tracked(&content).await?,
            Body::File {
                mut file,
                chunk_size,
            } => {
                let mut remaining = response.content_length();
                let mut chunk = vec![0u8; chunk_size.max(1)];
                while remaining > 0 {
                    let want = chunk.len().min(remaining as usize);
                    let n = file.read(&mut chunk[..want]).await?;
                    if n == 0 {
                        return Err(Exception::internal(format!(
                            "文件在发送过程中被截断，尚余{}字节",
                            remaining
                        )));
                    }
                    self.write_tracked(&chunk[..n]).await?;
                    remaining -= n as u64;
                }
            }
        }

        self.stream.flush().await?;
        Ok(self.output_size)
    }

    /// 逐次写入并累计已写出的字节
    async fn write_tracked(&mut self, mut buf: &[u8]) -> Result<(), Exception> {
        while !buf.is_empty() {
            let n = self.stream.write(buf).await?;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            self.output_size += n as u64;
            buf = &buf[n..];
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("关闭连接{}时出错：{}", self.peer, e);
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Connection<S> {
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// 当前请求已写出的字节数
    pub fn output_size(&self) -> u64 {
        self.output_size
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_END.len())
        .position(|w| w == HEADER_END)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        pin::Pin,
        task::{Context, Poll},
    };
    use tokio::{fs::File, io::duplex};

    /// 记录每次写入长度的写端
    #[derive(Default)]
    struct RecordingStream {
        writes: Vec<usize>,
        data: Vec<u8>,
    }

    impl AsyncRead for RecordingStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for RecordingStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.writes.push(buf.len());
            self.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_find_header_end() {
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\n"), Some(14));
        assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n"), None);
    }

    #[tokio::test]
    async fn test_read_head_keeps_pipelined_bytes() {
        let (mut client, server) = duplex(1024);
        client
            .write_all(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        drop(client);

        let mut conn = Connection::new(server, "peer");
        let first = conn.read_head(0).await.unwrap().unwrap();
        assert_eq!(&first[..], b"GET /a HTTP/1.1\r\n\r\n");
        let second = conn.read_head(0).await.unwrap().unwrap();
        assert_eq!(&second[..], b"GET /b HTTP/1.1\r\n\r\n");
        assert!(conn.read_head(0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_head_too_large() {
        let (mut client, server) = duplex(64 * 1024);
        let mut request = b"GET / HTTP/1.1\r\nX-Long: ".to_vec();
        request.extend(std::iter::repeat(b'a').take(MAX_HEADER_SIZE + 10));
        client.write_all(&request).await.unwrap();

        let mut conn = Connection::new(server, "peer");
        assert!(matches!(
            conn.read_head(0).await,
            Err(Exception::HeaderTooLarge)
        ));
    }

    #[tokio::test]
    async fn test_discard_body_consumes_buffered_and_streamed_bytes() {
        let (mut client, server) = duplex(1024);
        client
            .write_all(b"POST /a HTTP/1.1\r\nContent-Length: 10\r\n\r\n01234")
            .await
            .unwrap();

        let mut conn = Connection::new(server, "peer");
        conn.read_head(0).await.unwrap().unwrap();

        client
            .write_all(b"56789GET /b HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        drop(client);
        conn.discard_body(10).await.unwrap();

        let next = conn.read_head(0).await.unwrap().unwrap();
        assert_eq!(&next[..], b"GET /b HTTP/1.1\r\n\r\n");
    }

    #[tokio::test]
    async fn test_discard_body_truncated() {
        let (mut client, server) = duplex(1024);
        client
            .write_all(b"POST /a HTTP/1.1\r\n\r\nabc")
            .await
            .unwrap();
        drop(client);

        let mut conn = Connection::new(server, "peer");
        conn.read_head(0).await.unwrap().unwrap();
        assert!(matches!(
            conn.discard_body(10).await,
            Err(Exception::MalformedRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_second_send_is_refused() {
        let mut conn = Connection::new(RecordingStream::default(), "peer");
        conn.begin_request();
        let mut first = Response::from_text(200, "ok");
        let sent = conn.send(&mut first, false).await.unwrap();
        assert!(sent > 0);
        assert_eq!(conn.output_size(), sent);

        let mut second = Response::from_text(500, "again");
        assert!(matches!(
            conn.send(&mut second, false).await,
            Err(Exception::ResponseAlreadySent)
        ));

        conn.begin_request();
        let mut third = Response::from_text(200, "next");
        assert!(conn.send(&mut third, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_head_only_skips_body() {
        let mut conn = Connection::new(RecordingStream::default(), "peer");
        let mut response = Response::from_text(200, "body text");
        conn.send(&mut response, true).await.unwrap();

        let stream = conn.into_inner();
        let text = String::from_utf8(stream.data).unwrap();
        assert!(text.contains("Content-Length: 9\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.contains("body text"));
    }

    #[tokio::test]
    async fn test_file_streamed_in_bounded_chunks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();
        let file = File::open(&path).await.unwrap();

        let mut response = Response::from_file(&path, file, content.len() as u64, 64);
        let head_len = response.head_bytes().len();
        let mut conn = Connection::new(RecordingStream::default(), "peer");
        let sent = conn.send(&mut response, false).await.unwrap();
        assert_eq!(sent, (head_len + content.len()) as u64);

        let stream = conn.into_inner();
        let body_writes = &stream.writes[1..];
        assert!(body_writes.iter().all(|&n| n <= 64));
        assert_eq!(body_writes.iter().sum::<usize>(), content.len());
        assert_eq!(&stream.data[stream.data.len() - content.len()..], &content[..]);
    }
}
