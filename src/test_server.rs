//! A very small HTTP responder for exercising the prober against real sockets.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};

/// How the server answers every request it receives
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// `200 OK` with this body
    Body(&'static str),
    /// This status with a short body
    Status(u16),
    /// `200 OK` with an empty body
    Empty,
    /// Accepts the connection and never answers
    Hang,
}

pub struct TestServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    user_agent: Arc<Mutex<Option<String>>>,
}

impl TestServer {
    /// Binds to a free local port and answers every connection with `reply`
    pub async fn spawn(reply: Reply) -> Result<Self> {
        let socket = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Launching test HTTP server")?;
        let url = format!("http://{}/stream", socket.local_addr()?);

        let hits = Arc::new(AtomicUsize::new(0));
        let user_agent = Arc::new(Mutex::new(None));

        let (task_hits, task_user_agent) = (hits.clone(), user_agent.clone());
        tokio::spawn(async move {
            while let Ok((stream, _addr)) = socket.accept().await {
                task_hits.fetch_add(1, Ordering::SeqCst);
                let user_agent = task_user_agent.clone();
                tokio::spawn(async move {
                    answer(stream, reply, user_agent).await.ok();
                });
            }
        });

        Ok(Self {
            url,
            hits,
            user_agent,
        })
    }

    /// Number of connections accepted so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// `User-Agent` of the most recent request
    pub fn last_user_agent(&self) -> Option<String> {
        self.user_agent.lock().unwrap().clone()
    }
}

async fn answer(
    mut stream: tokio::net::TcpStream,
    reply: Reply,
    user_agent: Arc<Mutex<Option<String>>>,
) -> Result<()> {
    let mut reader = BufReader::new(&mut stream);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("user-agent") {
                *user_agent.lock().unwrap() = Some(value.trim().to_string());
            }
        }
    }

    let response = match reply {
        Reply::Body(body) => format!(
            "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        ),
        Reply::Status(status) => format!(
            "HTTP/1.1 {status} Whatever\r\ncontent-length: 4\r\nconnection: close\r\n\r\nnope"
        ),
        Reply::Empty => {
            "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string()
        }
        Reply::Hang => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return Ok(());
        }
    };

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await.ok();
    Ok(())
}
