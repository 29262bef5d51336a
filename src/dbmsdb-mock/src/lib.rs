//! In-process mock of the DbmsDB HTTP API.
//!
//! Serves the endpoints the driver uses, including `/_api/batch`, from an
//! in-memory store. [`MockServer`] runs it on a background thread for
//! integration tests and demos.

use actix_web::dev::{Server, ServerHandle};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc;
use std::thread;
use tracing_actix_web::TracingLogger;

pub mod api;
pub mod batch;
pub mod config;
pub mod query;
pub mod store;

pub use api::AppState;
pub use config::MockConfig;
pub use store::{Call, MockResponse, Store};

/// Build the HTTP server on an already bound listener
pub fn http_server(listener: TcpListener, state: web::Data<AppState>, workers: usize) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .configure(api::configure)
    })
    .workers(workers)
    .listen(listener)?
    .run();
    Ok(server)
}

/// Mock server running on its own thread. Stopped on drop.
pub struct MockServer {
    addr: SocketAddr,
    state: web::Data<AppState>,
    handle: ServerHandle,
    thread: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    pub fn start(config: MockConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .with_context(|| format!("binding {}:{}", config.host, config.port))?;
        let addr = listener.local_addr()?;
        let state = web::Data::new(AppState::new(config));

        let (tx, rx) = mpsc::channel();
        let server_state = state.clone();
        let thread = thread::Builder::new()
            .name("dbmsdb-mock".to_string())
            .spawn(move || {
                let system = actix_web::rt::System::new();
                let outcome = system.block_on(async move {
                    let server = match http_server(listener, server_state, 1) {
                        Ok(server) => server,
                        Err(err) => {
                            let _ = tx.send(Err(err));
                            return Ok(());
                        }
                    };
                    let _ = tx.send(Ok(server.handle()));
                    server.await
                });
                if let Err(err) = outcome {
                    tracing::error!(error = %err, "Mock server stopped with an error");
                }
            })?;

        let handle = rx
            .recv()
            .context("mock server thread exited before starting")??;
        tracing::info!(%addr, "Mock server listening");

        Ok(Self {
            addr,
            state,
            handle,
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to hand to a client
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> &MockConfig {
        &self.state.config
    }

    /// Inspect the store directly, bypassing HTTP
    pub fn with_store<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        f(&*self.state.store.lock())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            // The stop command is sent on call; the future only awaits completion
            drop(self.handle.stop(false));
            let _ = thread.join();
        }
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
