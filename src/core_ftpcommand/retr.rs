use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::core_ftpcommand::utils::{
    copy_with_abort, open_data_connection, require_argument, resolve_path,
};
use crate::core_ftpcommand::{CommandContext, CommandError, CommandHandler, Reply};
use crate::core_parser::Command;
use crate::core_storage::ResolvedPath;

/// Handles the RETR (Retrieve) FTP command.
///
/// Streams the file to the data connection, honouring a pending REST
/// offset. Abortable; the coordinator turns a cancellation into the 426
/// reply.
pub struct RetrHandler;

#[async_trait]
impl CommandHandler for RetrHandler {
    fn names(&self) -> &'static [&'static str] {
        &["RETR"]
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

        match storage.resolve(&path).await? {
            ResolvedPath::File(_) => {}
            _ => return Err(CommandError::NotFound(path)),
        }
        let mut file = storage.open_read(&path, offset).await?;

        let mut data = open_data_connection(&ctx).await?;
        let copied = copy_with_abort(
            &mut *file,
            &mut data,
            ctx.config.download_buffer_size(),
            &token,
        )
        .await?;
        data.shutdown().await?;

        info!("Sent {} bytes of {}", copied, path);
        Ok(Some(Reply::new(226, "Transfer complete.")))
    }
}
