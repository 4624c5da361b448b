use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{
    copy_with_abort, open_data_connection, require_argument, resolve_path,
};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::StoreTarget;
use crate::core_transfer::TransferStatus;

/// Receives the data-connection bytes into a store target. Shared by STOR,
/// STOU and APPE. When the backend defers the upload, the staged transfer
/// is enqueued on the background worker and tracked in the session.
pub(crate) async fn receive_into_target(
    ctx: &Arc<CommandContext>,
    target: StoreTarget,
    token: &CancellationToken,
) -> Result<u64, CommandError> {
    let mut data = open_data_connection(ctx).await?;
    match target {
        StoreTarget::Stream(mut sink) => {
            let written = copy_with_abort(
                &mut data,
                &mut *sink,
                ctx.config.upload_buffer_size(),
                token,
            )
            .await?;
            use tokio::io::AsyncWriteExt;
            sink.shutdown().await?;
            Ok(written)
        }
        StoreTarget::Background { mut sink, transfer } => {
            let written = copy_with_abort(
                &mut data,
                &mut *sink,
                ctx.config.upload_buffer_size(),
                token,
            )
            .await?;
            use tokio::io::AsyncWriteExt;
            sink.shutdown().await?;
            let id = ctx.transfers.enqueue(transfer)?;
            info!("Deferred upload {} enqueued", id);
            ctx.session
                .lock()
                .await
                .background_uploads
                .insert(id, TransferStatus::Enqueued);
            Ok(written)
        }
    }
}

/// Handles the STOR (Store File) FTP command.
pub struct StorHandler;

#[async_trait]
impl CommandHandler for StorHandler {
    fn names(&self) -> &'static [&'static str] {
        &["STOR"]
    }

    fn is_abortable(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: Arc<CommandContext>,
        command: Command,
        token: CancellationToken,
    ) -> Result<Option<Reply>, CommandError> {
        let arg = require_argument(&command)?;
        let (path, storage) = resolve_path(&ctx, arg).await?;
        let offset = ctx.session.lock().await.restart_offset.take().unwrap_or(0);

        let target = storage.create(&path, offset).await?;
        let written = receive_into_target(&ctx, target, &token).await?;

        info!("Stored {} bytes to {}", written, path);
        Ok(Some(Reply::new(226, "File transfer complete.")))
    }
}
