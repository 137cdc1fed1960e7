//! Asynchronous and blocking access to device key operations
//!
//! Every operation runs on the tokio blocking pool, which grows on demand and
//! reaps idle threads. Callers choose between a future ([`AsyncTaskGateway::spawn`]),
//! a callback ([`AsyncTaskGateway::submit`]) and a bounded blocking wait
//! ([`AsyncTaskGateway::call_blocking`]).

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::OnceCell;
use oauth_shr::ShrRequest;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::PopError;
use crate::keys::KeyIdentity;
use crate::pop::DevicePop;

/// Default wait for blocking callers
pub const DEFAULT_BLOCKING_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide runtime used when the caller does not bring one
static SHARED_RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn shared_handle() -> Result<Handle, PopError> {
    SHARED_RUNTIME
        .get_or_try_init(|| {
            Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("device-pop-worker")
                .enable_all()
                .build()
        })
        .map(|runtime| runtime.handle().clone())
        .map_err(|e| PopError::InterruptedWait(format!("worker pool unavailable: {e}")))
}

/// Owned parameters of a signed request, for handing to a worker thread
#[derive(Debug, Clone, Default)]
pub struct MintRequest {
    pub url: String,
    pub access_token: String,
    /// Seconds since Unix epoch; `None` means now
    pub timestamp: Option<i64>,
    pub method: Option<String>,
    pub nonce: Option<String>,
}

impl MintRequest {
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    fn as_request(&self) -> ShrRequest<'_> {
        ShrRequest {
            url: &self.url,
            access_token: &self.access_token,
            timestamp: self.timestamp.unwrap_or_else(|| Utc::now().timestamp()),
            method: self.method.as_deref(),
            nonce: self.nonce.as_deref(),
        }
    }
}

/// Runs [`DevicePop`] operations off the caller's thread
#[derive(Clone)]
pub struct AsyncTaskGateway {
    pop: Arc<DevicePop>,
    handle: Handle,
    timeout: Duration,
}

impl AsyncTaskGateway {
    /// Gateway on the shared process-wide pool
    pub fn new(pop: Arc<DevicePop>) -> Result<Self, PopError> {
        Ok(Self::with_handle(pop, shared_handle()?))
    }

    /// Gateway on the caller's runtime
    pub fn with_handle(pop: Arc<DevicePop>, handle: Handle) -> Self {
        Self {
            pop,
            handle,
            timeout: DEFAULT_BLOCKING_TIMEOUT,
        }
    }

    /// Set how long blocking calls wait
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pop(&self) -> &Arc<DevicePop> {
        &self.pop
    }

    /// Run `op` in the background and hand its result to `callback` exactly once
    ///
    /// A panicking operation is reported as [`PopError::InterruptedWait`].
    pub fn submit<T, F, C>(&self, op: F, callback: C)
    where
        T: Send + 'static,
        F: FnOnce(&DevicePop) -> Result<T, PopError> + Send + 'static,
        C: FnOnce(Result<T, PopError>) + Send + 'static,
    {
        let pop = Arc::clone(&self.pop);
        self.handle.spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| op(pop.as_ref())))
                .unwrap_or_else(|_| {
                    error!("Device key operation panicked");
                    Err(PopError::InterruptedWait("operation panicked".to_string()))
                });
            if let Err(e) = &result {
                debug!(code = e.code(), error = %e, "Device key operation failed");
            }
            callback(result);
        });
    }

    /// Run `op` in the background and await its result
    pub fn spawn<T, F>(&self, op: F) -> impl Future<Output = Result<T, PopError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(&DevicePop) -> Result<T, PopError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(op, move |result| {
            let _ = tx.send(result);
        });

        async move {
            rx.await.unwrap_or_else(|_| {
                Err(PopError::InterruptedWait("result channel closed".to_string()))
            })
        }
    }

    /// Run `op` in the background and block until it finishes or the timeout passes
    ///
    /// Must not be called from inside an async task.
    pub fn call_blocking<T, F>(&self, op: F) -> Result<T, PopError>
    where
        T: Send + 'static,
        F: FnOnce(&DevicePop) -> Result<T, PopError> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.submit(op, move |result| {
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let err = PopError::InterruptedWait(format!("no result after {:?}", self.timeout));
                error!(code = err.code(), "{}", err);
                Err(err)
            }
            Err(RecvTimeoutError::Disconnected) => Err(PopError::InterruptedWait(
                "worker dropped the result".to_string(),
            )),
        }
    }

    pub fn generate(
        &self,
    ) -> impl Future<Output = Result<KeyIdentity, PopError>> + Send + 'static {
        self.spawn(|pop| pop.keys().generate())
    }

    pub fn thumbprint(&self) -> impl Future<Output = Result<String, PopError>> + Send + 'static {
        self.spawn(|pop| pop.keys().thumbprint())
    }

    pub fn request_confirmation(
        &self,
    ) -> impl Future<Output = Result<String, PopError>> + Send + 'static {
        self.spawn(|pop| pop.minter().request_confirmation())
    }

    pub fn mint(
        &self,
        request: MintRequest,
    ) -> impl Future<Output = Result<String, PopError>> + Send + 'static {
        self.spawn(move |pop| pop.minter().mint(&request.as_request()))
    }

    pub fn sign(
        &self,
        algorithm: &str,
        input: &str,
    ) -> impl Future<Output = Result<String, PopError>> + Send + 'static {
        let (algorithm, input) = (algorithm.to_string(), input.to_string());
        self.spawn(move |pop| pop.signatures().sign(&algorithm, &input))
    }

    /// Resolves to `false` for anything but a valid signature
    pub fn verify(
        &self,
        algorithm: &str,
        input: &str,
        signature: &str,
    ) -> impl Future<Output = Result<bool, PopError>> + Send + 'static {
        let (algorithm, input, signature) =
            (algorithm.to_string(), input.to_string(), signature.to_string());
        self.spawn(move |pop| Ok(pop.signatures().verify(&algorithm, &input, &signature)))
    }

    pub fn generate_blocking(&self) -> Result<KeyIdentity, PopError> {
        self.call_blocking(|pop| pop.keys().generate())
    }

    pub fn thumbprint_blocking(&self) -> Result<String, PopError> {
        self.call_blocking(|pop| pop.keys().thumbprint())
    }

    pub fn request_confirmation_blocking(&self) -> Result<String, PopError> {
        self.call_blocking(|pop| pop.minter().request_confirmation())
    }

    pub fn mint_blocking(&self, request: MintRequest) -> Result<String, PopError> {
        self.call_blocking(move |pop| pop.minter().mint(&request.as_request()))
    }

    pub fn sign_blocking(&self, algorithm: &str, input: &str) -> Result<String, PopError> {
        let (algorithm, input) = (algorithm.to_string(), input.to_string());
        self.call_blocking(move |pop| pop.signatures().sign(&algorithm, &input))
    }

    pub fn verify_blocking(
        &self,
        algorithm: &str,
        input: &str,
        signature: &str,
    ) -> Result<bool, PopError> {
        let (algorithm, input, signature) =
            (algorithm.to_string(), input.to_string(), signature.to_string());
        self.call_blocking(move |pop| Ok(pop.signatures().verify(&algorithm, &input, &signature)))
    }
}
