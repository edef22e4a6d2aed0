use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use common::chat::{event_channel, SessionEvent};
use common::identity::{KeyOrigin, KeyStoreError};
use common::peer::{BootstrapError, Chat as ChatNode, ChatContext, Node};

use crate::cli::ops::identity::render_forms;
use crate::config::ConfigError;
use crate::input::spawn_line_reader;
use crate::process::{init_logging, utils};
use crate::render::Renderer;

/// How long the console gets to draw the last events
const RENDER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Start chatting: wait for peers, or dial the configured ones
#[derive(Args, Debug, Clone)]
pub struct Chat {
    /// Log level for console and file output
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Also write daily-rotated logs into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Stay off relays and discovery; only direct addresses are used
    #[arg(long)]
    pub local_only: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat: {0}")]
    Config(#[from] ConfigError),
    #[error("chat: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error("chat: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("chat: {0}")]
    Io(#[from] io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Chat {
    type Error = ChatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = ctx.load_config()?;
        let _guards = init_logging(self.log_level, self.log_dir.as_deref());
        let (signal_waiter, _shutdown_tx, shutdown_rx) = utils::graceful_shutdown_blocker()?;

        let key_store = config.key_store()?;
        let (identity, origin) = key_store.load_or_generate()?;
        match origin {
            KeyOrigin::Loaded => {
                tracing::info!(path = %key_store.path().display(), "loaded private key")
            }
            KeyOrigin::Generated => {
                tracing::info!(path = %key_store.path().display(), "generated new private key")
            }
        }
        tracing::info!("{}", render_forms(&identity.forms()));

        let node = Node::builder()
            .identity(identity)
            .listen_addrs(config.listen_addrs()?)
            .local_only(self.local_only)
            .build()
            .await?;
        tracing::info!("Listening on addresses: {:?}", node.dial_addrs());

        let (events_tx, events_rx) = event_channel();
        let renderer =
            tokio::spawn(Renderer::new(io::stdout(), config.name.clone()).run(events_rx));
        // detached: a blocked stdin read must not hold up exit
        let (input, _reader) =
            spawn_line_reader(io::BufReader::new(io::stdin()), events_tx.clone());

        let context = ChatContext::new(
            config.name.clone(),
            config.protocol(),
            input,
            events_tx.clone(),
            shutdown_rx,
        );
        let chat = ChatNode::start(node, &config.directory(), context).await;
        tracing::info!(role = %chat.role(), "chat started");

        if let Err(e) = signal_waiter.await {
            tracing::error!("signal listener failed: {}", e);
        }

        let _ = events_tx.send(SessionEvent::Farewell {
            name: config.name.clone(),
        });
        chat.shutdown().await;

        // the stdin thread still holds a sender, so the renderer never sees
        //  the channel close on its own
        drop(events_tx);
        if tokio::time::timeout(RENDER_DRAIN_TIMEOUT, renderer)
            .await
            .is_err()
        {
            tracing::debug!("renderer still waiting on input, leaving it behind");
        }

        Ok("chat ended".to_string())
    }
}
