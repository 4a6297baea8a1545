use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    futures::StreamExt,
    secrecy::{ExposeSecret, Secret},
    teloxide::prelude::*,
    tokio::io::AsyncWriteExt,
    tracing::{debug, warn},
};

use {
    mergebot_common::FileHandle,
    mergebot_merge::ReferenceResolver,
    mergebot_sessions::MediaItem,
};

use crate::{Error, Result};

/// Downloads queued attachments from the Bot API file endpoint.
pub struct TelegramResolver {
    bot: Bot,
    token: Secret<String>,
    client: reqwest::Client,
}

impl TelegramResolver {
    pub fn new(bot: Bot) -> Self {
        let token = Secret::new(bot.token().to_string());
        Self {
            bot,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// `<api>/file/bot<token>/<file_path>`
    fn file_url(&self, file_path: &str) -> Result<reqwest::Url> {
        self.bot
            .api_url()
            .join(&format!(
                "file/bot{}/{}",
                self.token.expose_secret(),
                file_path.trim_start_matches('/')
            ))
            .map_err(|e| Error::message(format!("invalid file url: {e}")))
    }

    async fn download(&self, item: &MediaItem, dest_dir: &Path) -> Result<PathBuf> {
        let file = self.bot.get_file(item.source_ref.as_str()).await?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(local_file_name(item));

        // A `--local` Bot API server answers with where it stored the file.
        let stored = Path::new(&file.path);
        if stored.is_absolute() {
            let bytes = tokio::fs::copy(stored, &dest).await?;
            debug!(
                user_id = %item.owner,
                file = %dest.display(),
                bytes,
                "copied file from local bot api server"
            );
            return Ok(dest);
        }

        let url = self.file_url(&file.path)?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::message(format!(
                "failed to download file: HTTP {}",
                response.status()
            )));
        }

        let mut out = tokio::fs::File::create(&dest).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        debug!(
            user_id = %item.owner,
            file = %dest.display(),
            bytes = written,
            "downloaded telegram file"
        );
        Ok(dest)
    }
}

/// Name on disk: the uploaded name with path separators replaced, prefixed
/// with the tail of the file id so equal names do not collide.
fn local_file_name(item: &MediaItem) -> String {
    let base: String = item
        .file_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let base = base.trim_start_matches('.');
    let id: Vec<char> = item
        .source_ref
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let tail: String = id[id.len().saturating_sub(8)..].iter().collect();
    format!("{tail}_{base}")
}

#[async_trait]
impl ReferenceResolver for TelegramResolver {
    async fn resolve(
        &self,
        item: &MediaItem,
        dest_dir: &Path,
    ) -> mergebot_merge::Result<FileHandle> {
        match self.download(item, dest_dir).await {
            Ok(path) => Ok(FileHandle::new(path)),
            Err(e) => {
                warn!(
                    user_id = %item.owner,
                    file_name = %item.file_name,
                    error = %e,
                    "telegram file download failed"
                );
                Err(mergebot_merge::Error::external(
                    format!("download {}", item.file_name),
                    e,
                ))
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{
            Json, Router,
            extract::{Path as AxumPath, State},
            routing::post,
        },
        mergebot_common::{MediaKind, SourceRef, UserId},
        serde_json::{Value, json},
        tokio::{sync::oneshot, task::JoinHandle},
    };

    fn item(name: &str, file_id: &str) -> MediaItem {
        MediaItem::new(UserId(7), SourceRef::new(file_id), Some(name), MediaKind::Video).unwrap()
    }

    #[test]
    fn local_name_strips_separators() {
        let name = local_file_name(&item("../../etc/passwd.mp4", "AgAD-1234abcd"));
        assert!(!name.contains('/'), "{name}");
        assert!(name.ends_with("_.._etc_passwd.mp4"), "{name}");
    }

    #[test]
    fn local_name_differs_per_source() {
        let a = local_file_name(&item("clip.mp4", "file-aaaa1111"));
        let b = local_file_name(&item("clip.mp4", "file-bbbb2222"));
        assert_ne!(a, b);
    }

    async fn api_handler(
        State(file_path): State<String>,
        AxumPath(_path): AxumPath<String>,
    ) -> Json<Value> {
        Json(json!({
            "ok": true,
            "result": {
                "file_id": "vid-1",
                "file_unique_id": "uniq-1",
                "file_size": 5,
                "file_path": file_path
            }
        }))
    }

    async fn file_handler(AxumPath(path): AxumPath<String>) -> Vec<u8> {
        format!("bytes:{path}").into_bytes()
    }

    /// Mock Bot API whose `getFile` reports `file_path`.
    async fn mock_api(file_path: String) -> (Bot, oneshot::Sender<()>, JoinHandle<()>) {
        let app = Router::new()
            .route("/{*path}", post(api_handler).get(file_handler))
            .with_state(file_path);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).unwrap();
        (Bot::new("test-token").set_api_url(api_url), shutdown_tx, server)
    }

    #[tokio::test]
    async fn downloads_into_job_directory() {
        let (bot, shutdown_tx, server) = mock_api("videos/file_0.mp4".into()).await;
        let resolver = TelegramResolver::new(bot);
        let dir = tempfile::tempdir().unwrap();

        let handle = resolver
            .resolve(&item("a.mp4", "vid-1"), dir.path())
            .await
            .unwrap();
        assert!(handle.path().starts_with(dir.path()));
        assert!(handle.file_name().unwrap().ends_with("_a.mp4"));
        let body = std::fs::read_to_string(handle.path()).unwrap();
        assert_eq!(body, "bytes:file/bottest-token/videos/file_0.mp4");

        let _ = shutdown_tx.send(());
        server.await.expect("server join");
    }

    #[tokio::test]
    async fn local_server_path_is_copied() {
        let store = tempfile::tempdir().unwrap();
        let stored = store.path().join("file_9.mp4");
        std::fs::write(&stored, "local bytes").unwrap();

        let (bot, shutdown_tx, server) = mock_api(stored.display().to_string()).await;
        let resolver = TelegramResolver::new(bot);
        let dir = tempfile::tempdir().unwrap();

        let handle = resolver
            .resolve(&item("big.mp4", "vid-9"), dir.path())
            .await
            .unwrap();
        assert!(handle.path().starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(handle.path()).unwrap(), "local bytes");
        assert!(stored.exists());

        let _ = shutdown_tx.send(());
        server.await.expect("server join");
    }
}
