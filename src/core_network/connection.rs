//! Per-connection wiring and the command dispatch loop.
//!
//! Bytes flow socket -> socket movers -> socket pipe -> connection adapter
//! -> connection pipe -> parser -> dispatch; replies take the reverse path.
//! The dispatch loop processes commands strictly in arrival order, except
//! that an abortable command's completion is asynchronous so the loop can
//! still read an ABOR while a transfer runs.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{trace, warn};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::constants::PIPE_SEGMENTS;
use crate::core_auth::Authenticator;
use crate::core_ftpcommand::handlers::initialize_command_handlers;
use crate::core_ftpcommand::{CommandContext, ControlWriter, Reply};
use crate::core_network::coordinator::BackgroundCommandCoordinator;
use crate::core_network::network::ConnectionObserver;
use crate::core_parser::{shared_encoding, Command, CommandParser, TextEncoding};
use crate::core_pipeline::{
    byte_pipe, AdapterEndpoints, PausableService, PipeReader, ReceiverService,
    SecureConnectionAdapter, SenderService, TlsWrapper,
};
use crate::core_session::FtpSession;
use crate::core_storage::StorageFactory;
use crate::core_transfer::TransferQueue;

/// Everything a connection needs from its server.
pub struct ConnectionDeps {
    pub config: Arc<Config>,
    pub authenticator: Arc<dyn Authenticator>,
    pub storage_factory: Arc<dyn StorageFactory>,
    pub transfers: TransferQueue,
    pub tls: Option<Arc<dyn TlsWrapper>>,
    pub observers: Arc<Vec<Arc<dyn ConnectionObserver>>>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    Continue,
    Quit,
}

/// Serves one control connection until the peer disconnects, QUIT is
/// processed, or the token fires.
pub async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    deps: ConnectionDeps,
    token: CancellationToken,
) -> io::Result<()> {
    let (socket_read, socket_write) = socket.into_split();

    let (socket_in_w, socket_in_r) = byte_pipe(PIPE_SEGMENTS);
    let (socket_out_w, socket_out_r) = byte_pipe(PIPE_SEGMENTS);
    let (conn_in_w, conn_in_r) = byte_pipe(PIPE_SEGMENTS);
    let (conn_out_w, conn_out_r) = byte_pipe(PIPE_SEGMENTS);

    // socket movers own their pipe ends and close them on stop
    let mut socket_receiver = PausableService::new(
        "socket-receiver",
        ReceiverService::new(socket_read, socket_in_w),
        token.clone(),
    );
    let mut socket_sender = PausableService::new(
        "socket-sender",
        SenderService::new(socket_out_r, socket_write),
        token.clone(),
    );
    socket_receiver.start().await?;
    socket_sender.start().await?;

    let endpoints = AdapterEndpoints {
        socket_in: socket_in_r,
        socket_out: socket_out_w,
        conn_in: conn_in_w,
        conn_out: conn_out_r,
    };
    let mut secure = SecureConnectionAdapter::new(endpoints, deps.tls.clone(), token.clone());
    secure.start().await?;
    let adapter = Arc::new(Mutex::new(secure));

    let encoding = shared_encoding(TextEncoding::Utf8);
    let session = Arc::new(Mutex::new(FtpSession::new(encoding.clone())));
    let mut control = ControlWriter::new(conn_out_w, encoding.clone());
    let coordinator = Arc::new(BackgroundCommandCoordinator::new(token.clone()));

    let ctx = Arc::new(CommandContext {
        config: Arc::clone(&deps.config),
        session: Arc::clone(&session),
        authenticator: Arc::clone(&deps.authenticator),
        storage_factory: Arc::clone(&deps.storage_factory),
        control: control.clone(),
        transfers: deps.transfers.clone(),
        adapter: Arc::clone(&adapter),
        coordinator: Arc::clone(&coordinator),
        handlers: Arc::new(initialize_command_handlers()),
        token: token.clone(),
    });

    // configure observers run before the first command is read
    for observer in deps.observers.iter() {
        observer.on_configured(peer);
    }

    control
        .send(&Reply::new(220, deps.config.server.greeting.clone()))
        .await?;

    let mut parser = CommandParser::new(encoding);
    let result = run_dispatch_loop(&ctx, &conn_in_r, &mut parser, &token).await;

    // teardown: abort any background command, drain the outbound path, then
    // cut the movers loose
    coordinator.cancel();
    {
        let mut adapter = adapter.lock().await;
        let _ = adapter.stop().await;
    }
    let _ = socket_sender.stop().await;
    token.cancel();
    let _ = socket_receiver.stop().await;
    session.lock().await.close();
    for observer in deps.observers.iter() {
        observer.on_closed(peer);
    }
    result
}

async fn run_dispatch_loop(
    ctx: &Arc<CommandContext>,
    reader: &PipeReader,
    parser: &mut CommandParser,
    token: &CancellationToken,
) -> io::Result<()> {
    loop {
        let segment = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            segment = reader.read_segment() => segment?,
        };
        let Some(segment) = segment else {
            return Ok(());
        };
        for command in parser.collect(&segment) {
            match dispatch_command(ctx, command).await? {
                DispatchOutcome::Continue => {}
                DispatchOutcome::Quit => return Ok(()),
            }
        }
    }
}

/// One command through the dispatch algorithm: look up by case-insensitive
/// name, gate on login, route abortable handlers through the coordinator,
/// run everything else inline. Handler errors become replies here; this
/// function only fails when the control channel itself is gone.
pub(crate) async fn dispatch_command(
    ctx: &Arc<CommandContext>,
    command: Command,
) -> io::Result<DispatchOutcome> {
    let name = command.name.to_ascii_uppercase();
    trace!("Received command: {} {}", name, command.argument);
    let mut control = ctx.control.clone();

    let handler = match ctx.handlers.get(name.as_str()) {
        Some(handler) => Arc::clone(handler),
        None => {
            control
                .send(&Reply::new(500, "Syntax error, command unrecognized."))
                .await?;
            return Ok(DispatchOutcome::Continue);
        }
    };

    if handler.requires_login() && !ctx.session.lock().await.is_authenticated {
        control.send(&Reply::new(530, "Not logged in.")).await?;
        return Ok(DispatchOutcome::Continue);
    }

    if handler.is_abortable() {
        if !ctx.coordinator.execute(handler, Arc::clone(ctx), command) {
            control
                .send(&Reply::new(503, "Parallel commands aren't allowed."))
                .await?;
        }
        return Ok(DispatchOutcome::Continue);
    }

    match handler.process(Arc::clone(ctx), command, ctx.token.clone()).await {
        Ok(Some(reply)) => {
            let quit = reply.closes_connection();
            control.send(&reply).await?;
            if quit {
                return Ok(DispatchOutcome::Quit);
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!("Error handling command {}: {}", name, err);
            control.send(&err.to_reply()).await?;
        }
    }
    Ok(DispatchOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_auth::PasswdAuthenticator;
    use crate::core_ftpcommand::{CommandError, CommandHandler};
    use crate::core_storage::LocalStorageFactory;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_context(
        extra: Vec<Arc<dyn CommandHandler>>,
    ) -> (Arc<CommandContext>, PipeReader) {
        let token = CancellationToken::new();
        let (socket_in_w, socket_in_r) = byte_pipe(4);
        let (socket_out_w, _socket_out_r) = byte_pipe(4);
        let (conn_in_w, _conn_in_r) = byte_pipe(4);
        let (conn_out_w, conn_out_r) = byte_pipe(4);
        drop(socket_in_w);
        let endpoints = AdapterEndpoints {
            socket_in: socket_in_r,
            socket_out: socket_out_w,
            conn_in: conn_in_w,
            conn_out: conn_out_r.clone(),
        };
        let adapter = SecureConnectionAdapter::new(endpoints, None, token.clone());

        let encoding = shared_encoding(TextEncoding::Utf8);
        let session = Arc::new(Mutex::new(FtpSession::new(encoding.clone())));
        let (reply_w, reply_r) = byte_pipe(64);
        let control = ControlWriter::new(reply_w, encoding);

        let mut handlers = initialize_command_handlers();
        for handler in extra {
            for name in handler.names() {
                handlers.insert(*name, Arc::clone(&handler));
            }
        }

        let ctx = Arc::new(CommandContext {
            config: Arc::new(Config::default()),
            session,
            authenticator: Arc::new(PasswdAuthenticator::new(true, PathBuf::from("/tmp"))),
            storage_factory: Arc::new(LocalStorageFactory),
            control,
            transfers: TransferQueue::start(token.child_token()),
            adapter: Arc::new(Mutex::new(adapter)),
            coordinator: Arc::new(BackgroundCommandCoordinator::new(token.clone())),
            handlers: Arc::new(handlers),
            token,
        });
        (ctx, reply_r)
    }

    async fn read_reply(replies: &PipeReader) -> String {
        let segment = tokio::time::timeout(Duration::from_secs(2), replies.read_segment())
            .await
            .expect("timed out waiting for reply")
            .unwrap()
            .expect("reply channel closed");
        String::from_utf8(segment.to_vec()).unwrap()
    }

    /// Counts invocations; registered as a login-gated command.
    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CommandHandler for CountingHandler {
        fn names(&self) -> &'static [&'static str] {
            &["FAKE"]
        }

        async fn process(
            &self,
            _ctx: Arc<CommandContext>,
            _command: Command,
            _token: CancellationToken,
        ) -> Result<Option<Reply>, CommandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Reply::new(200, "Fake okay.")))
        }
    }

    /// Parks until aborted; registered as an abortable command.
    struct ParkingHandler;

    #[async_trait]
    impl CommandHandler for ParkingHandler {
        fn names(&self) -> &'static [&'static str] {
            &["PARK"]
        }

        fn requires_login(&self) -> bool {
            false
        }

        fn is_abortable(&self) -> bool {
            true
        }

        async fn process(
            &self,
            _ctx: Arc<CommandContext>,
            _command: Command,
            token: CancellationToken,
        ) -> Result<Option<Reply>, CommandError> {
            token.cancelled().await;
            Err(CommandError::Aborted)
        }
    }

    #[tokio::test]
    async fn login_gate_returns_530_without_invoking_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn CommandHandler> = Arc::new(CountingHandler {
            calls: Arc::clone(&calls),
        });
        let (ctx, replies) = test_context(vec![handler]);

        let outcome = dispatch_command(&ctx, Command::new("FAKE", "")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Continue);
        assert!(read_reply(&replies).await.starts_with("530 "));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        ctx.session.lock().await.is_authenticated = true;
        dispatch_command(&ctx, Command::new("fake", "")).await.unwrap();
        assert!(read_reply(&replies).await.starts_with("200 "));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_command_yields_500() {
        let (ctx, replies) = test_context(Vec::new());
        dispatch_command(&ctx, Command::new("BOGUS", "x")).await.unwrap();
        assert!(read_reply(&replies).await.starts_with("500 "));
    }

    #[tokio::test]
    async fn quit_reports_close_outcome() {
        let (ctx, replies) = test_context(Vec::new());
        let outcome = dispatch_command(&ctx, Command::new("QUIT", "")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Quit);
        assert!(read_reply(&replies).await.starts_with("221 "));
    }

    #[tokio::test]
    async fn coordinator_is_single_flight() {
        let parking: Arc<dyn CommandHandler> = Arc::new(ParkingHandler);
        let (ctx, replies) = test_context(vec![parking]);
        let handler = Arc::clone(&ctx.handlers["PARK"]);

        assert!(ctx
            .coordinator
            .execute(Arc::clone(&handler), Arc::clone(&ctx), Command::new("PARK", "")));
        // second command is rejected while the first is outstanding
        assert!(!ctx
            .coordinator
            .execute(Arc::clone(&handler), Arc::clone(&ctx), Command::new("PARK", "")));

        assert!(ctx.coordinator.cancel());
        assert!(read_reply(&replies).await.starts_with("426 "));

        // slot cleared once the deferred reply went out
        assert!(ctx
            .coordinator
            .execute(handler, Arc::clone(&ctx), Command::new("PARK", "")));
        ctx.coordinator.cancel();
    }

    #[tokio::test]
    async fn rejected_parallel_command_gets_503() {
        let parking: Arc<dyn CommandHandler> = Arc::new(ParkingHandler);
        let (ctx, replies) = test_context(vec![parking]);
        dispatch_command(&ctx, Command::new("PARK", "")).await.unwrap();
        dispatch_command(&ctx, Command::new("PARK", "")).await.unwrap();
        assert!(read_reply(&replies).await.starts_with("503 "));
        ctx.coordinator.cancel();
        assert!(read_reply(&replies).await.starts_with("426 "));
    }
}
