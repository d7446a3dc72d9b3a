//! Request dispatcher: defaults, interception hooks, timeouts, cancellation,
//! and fail-fast batch joins over a pluggable transport.
//!
//! # Design
//! - `Dispatcher` holds only immutable shared state behind an `Arc`; clones
//!   are cheap and batch dispatches run on spawned tasks.
//! - Hooks and response transforms are ordered lists owned by the instance.
//!   There is no process-global configuration; defaults live in the builder.
//! - Exactly one terminal outcome per dispatch: the `Result` return carries
//!   either the envelope or the failure, never both.
//! - Cancellation races the transport inside a biased `select!`, so a token
//!   signalled before completion always wins and the in-flight round-trip is
//!   dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::descriptor::{RequestDescriptor, ResponseEnvelope};
use crate::error::FailureReason;
use crate::transport::{RawResponse, Transport};

/// Interception hook run on every descriptor before transmission. Returning
/// an error fails the dispatch without any network I/O.
pub type BeforeSendHook =
    Arc<dyn Fn(RequestDescriptor) -> Result<RequestDescriptor, FailureReason> + Send + Sync>;

/// Transform applied to the body of every successful response.
pub type ResponseTransform = Arc<dyn Fn(String) -> String + Send + Sync>;

struct Inner {
    transport: Arc<dyn Transport>,
    default_headers: Vec<(String, String)>,
    default_timeout: Option<Duration>,
    before_send: Vec<BeforeSendHook>,
    transforms: Vec<ResponseTransform>,
}

/// Submits descriptors to a transport and routes each to exactly one
/// terminal outcome.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/// Explicit client factory; replaces any notion of process-wide defaults.
pub struct DispatcherBuilder {
    transport: Arc<dyn Transport>,
    default_headers: Vec<(String, String)>,
    default_timeout: Option<Duration>,
    before_send: Vec<BeforeSendHook>,
    transforms: Vec<ResponseTransform>,
}

impl DispatcherBuilder {
    /// Header applied to every descriptor that does not already carry one
    /// with the same name. Per-request headers win.
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    /// Deadline applied when a descriptor carries none.
    pub fn default_timeout(mut self, limit: Duration) -> Self {
        self.default_timeout = Some(limit);
        self
    }

    /// Append an interception hook; hooks run in registration order.
    pub fn before_send<F>(mut self, hook: F) -> Self
    where
        F: Fn(RequestDescriptor) -> Result<RequestDescriptor, FailureReason>
            + Send
            + Sync
            + 'static,
    {
        self.before_send.push(Arc::new(hook));
        self
    }

    /// Append a response-body transform; transforms run in registration
    /// order on successful responses only.
    pub fn transform_response<F>(mut self, transform: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            inner: Arc::new(Inner {
                transport: self.transport,
                default_headers: self.default_headers,
                default_timeout: self.default_timeout,
                before_send: self.before_send,
                transforms: self.transforms,
            }),
        }
    }
}

impl Dispatcher {
    pub fn builder(transport: impl Transport + 'static) -> DispatcherBuilder {
        DispatcherBuilder {
            transport: Arc::new(transport),
            default_headers: Vec::new(),
            default_timeout: None,
            before_send: Vec::new(),
            transforms: Vec::new(),
        }
    }

    /// Submit one descriptor: apply defaults, run hooks, await the transport
    /// under the descriptor's deadline while racing its cancellation token,
    /// then classify the status and apply response transforms.
    pub async fn dispatch(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<ResponseEnvelope, FailureReason> {
        let mut descriptor = self.apply_defaults(descriptor);
        for hook in &self.inner.before_send {
            descriptor = hook(descriptor)?;
        }
        debug!(method = %descriptor.method, url = %descriptor.url, "dispatching request");

        match self.execute(&descriptor).await {
            Ok(raw) => {
                let mut body = raw.body;
                for transform in &self.inner.transforms {
                    body = transform(body);
                }
                debug!(status = raw.status, "request succeeded");
                Ok(ResponseEnvelope {
                    status: raw.status,
                    headers: raw.headers,
                    body,
                    request: descriptor,
                })
            }
            Err(reason) => {
                warn!(method = %descriptor.method, url = %descriptor.url, %reason, "request failed");
                Err(reason)
            }
        }
    }

    /// Dispatch every descriptor concurrently. On success the envelopes come
    /// back in input order; the first failure to complete aborts the
    /// remaining dispatches and becomes the batch outcome (fail-fast join).
    pub async fn dispatch_all(
        &self,
        descriptors: Vec<RequestDescriptor>,
    ) -> Result<Vec<ResponseEnvelope>, FailureReason> {
        let total = descriptors.len();
        let mut pending = JoinSet::new();
        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let dispatcher = self.clone();
            pending.spawn(async move { (index, dispatcher.dispatch(descriptor).await) });
        }

        let mut envelopes: Vec<Option<ResponseEnvelope>> = (0..total).map(|_| None).collect();
        while let Some(joined) = pending.join_next().await {
            // Dropping `pending` on the error paths aborts the still-running
            // dispatches.
            let (index, result) = joined.map_err(|e| FailureReason::Unknown(e.to_string()))?;
            envelopes[index] = Some(result?);
        }

        envelopes
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FailureReason::Unknown("batch result missing".to_string()))
    }

    fn apply_defaults(&self, mut descriptor: RequestDescriptor) -> RequestDescriptor {
        for (name, value) in &self.inner.default_headers {
            if descriptor.header_value(name).is_none() {
                descriptor.headers.push((name.clone(), value.clone()));
            }
        }
        if descriptor.timeout.is_none() {
            descriptor.timeout = self.inner.default_timeout;
        }
        descriptor
    }

    async fn execute(&self, descriptor: &RequestDescriptor) -> Result<RawResponse, FailureReason> {
        let round_trip = async {
            let send = self.inner.transport.send(descriptor);
            match descriptor.timeout {
                Some(limit) => match tokio::time::timeout(limit, send).await {
                    Ok(result) => result.map_err(|e| FailureReason::NetworkFailure(e.to_string())),
                    Err(_) => Err(FailureReason::Timeout),
                },
                None => send
                    .await
                    .map_err(|e| FailureReason::NetworkFailure(e.to_string())),
            }
        };

        let raw = match &descriptor.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    reason = token.cancelled() => return Err(FailureReason::Cancelled(reason)),
                    result = round_trip => result?,
                }
            }
            None => round_trip.await?,
        };

        if (200..300).contains(&raw.status) {
            Ok(raw)
        } else {
            Err(FailureReason::ServerError {
                status: raw.status,
                body: raw.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cancel;
    use crate::descriptor::Method;
    use crate::transport::TransportError;

    /// Scripted transport: fixed status/body/delay, records every descriptor
    /// it sees so tests can assert on call counts and transmitted headers.
    #[derive(Clone)]
    struct MockTransport {
        status: u16,
        body: String,
        delay: Option<Duration>,
        fail_with: Option<String>,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<RequestDescriptor>>>,
    }

    impl MockTransport {
        fn ok(body: &str) -> Self {
            Self {
                status: 200,
                body: body.to_string(),
                delay: None,
                fail_with: None,
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn status(mut self, status: u16) -> Self {
            self.status = status;
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn failing(mut self, message: &str) -> Self {
            self.fail_with = Some(message.to_string());
            self
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_seen(&self) -> RequestDescriptor {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(
            &self,
            descriptor: &RequestDescriptor,
        ) -> Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(descriptor.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.fail_with {
                return Err(TransportError(message.clone()));
            }
            Ok(RawResponse {
                status: self.status,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body: self.body.clone(),
            })
        }
    }

    /// Transport driven by request URL query params: `delay=<ms>` adds
    /// latency, `status=<code>` overrides the status. The body echoes the
    /// URL, which makes input-order assertions trivial.
    struct UrlScriptedTransport;

    fn url_param(url: &str, key: &str) -> Option<u64> {
        url.split(&format!("{key}="))
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .and_then(|v| v.parse().ok())
    }

    #[async_trait]
    impl Transport for UrlScriptedTransport {
        async fn send(
            &self,
            descriptor: &RequestDescriptor,
        ) -> Result<RawResponse, TransportError> {
            if let Some(ms) = url_param(&descriptor.url, "delay") {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            let status = url_param(&descriptor.url, "status").unwrap_or(200) as u16;
            Ok(RawResponse {
                status,
                headers: Vec::new(),
                body: descriptor.url.clone(),
            })
        }
    }

    fn get(url: &str) -> RequestDescriptor {
        RequestDescriptor::new(Method::Get, url)
    }

    #[tokio::test]
    async fn dispatch_produces_envelope_with_sent_descriptor() {
        let transport = MockTransport::ok(r#"[{"id":1,"title":"Test","completed":false}]"#);
        let dispatcher = Dispatcher::builder(transport.clone()).build();

        let envelope = dispatcher
            .dispatch(get("http://localhost:3000/todos?_limit=5"))
            .await
            .unwrap();

        assert_eq!(envelope.status, 200);
        assert_eq!(envelope.request.url, "http://localhost:3000/todos?_limit=5");
        assert_eq!(envelope.header("content-type"), Some("application/json"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn before_send_rejection_skips_transport() {
        let transport = MockTransport::ok("[]");
        let dispatcher = Dispatcher::builder(transport.clone())
            .before_send(|_| Err(FailureReason::Unknown("rejected by hook".to_string())))
            .build();

        let err = dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap_err();

        assert!(matches!(err, FailureReason::Unknown(ref m) if m == "rejected by hook"));
        assert_eq!(transport.call_count(), 0, "no network I/O after rejection");
    }

    #[tokio::test]
    async fn before_send_hooks_run_in_registration_order() {
        let transport = MockTransport::ok("[]");
        let dispatcher = Dispatcher::builder(transport.clone())
            .before_send(|d| Ok(d.header("x-first", "1")))
            .before_send(|d| {
                // The second hook must observe the first hook's edit.
                assert_eq!(d.header_value("x-first"), Some("1"));
                Ok(d.header("x-second", "2"))
            })
            .build();

        dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap();

        let sent = transport.last_seen();
        assert_eq!(sent.header_value("x-first"), Some("1"));
        assert_eq!(sent.header_value("x-second"), Some("2"));
    }

    #[tokio::test]
    async fn default_headers_yield_to_per_request_headers() {
        let transport = MockTransport::ok("[]");
        let dispatcher = Dispatcher::builder(transport.clone())
            .default_header("X-Auth-Token", "default-token")
            .default_header("Accept", "application/json")
            .build();

        let descriptor =
            get("http://localhost:3000/todos").header("x-auth-token", "request-token");
        dispatcher.dispatch(descriptor).await.unwrap();

        let sent = transport.last_seen();
        assert_eq!(sent.header_value("x-auth-token"), Some("request-token"));
        assert_eq!(sent.header_value("accept"), Some("application/json"));
        let token_headers = sent
            .headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("x-auth-token"))
            .count();
        assert_eq!(token_headers, 1, "default must not duplicate the header");
    }

    #[tokio::test]
    async fn non_2xx_maps_to_server_error() {
        let transport = MockTransport::ok("internal error").status(500);
        let dispatcher = Dispatcher::builder(transport).build();

        let err = dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FailureReason::ServerError { status: 500, ref body } if body == "internal error"
        ));
    }

    #[tokio::test]
    async fn missing_resource_is_distinguishable() {
        let transport = MockTransport::ok("").status(404);
        let dispatcher = Dispatcher::builder(transport).build();

        let err = dispatcher
            .dispatch(get("http://localhost:3000/todo?_limit=5"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn transport_failure_maps_to_network_failure() {
        let transport = MockTransport::ok("").failing("connection refused");
        let dispatcher = Dispatcher::builder(transport).build();

        let err = dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap_err();

        assert!(matches!(err, FailureReason::NetworkFailure(ref m) if m.contains("connection refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_deadline_yields_timeout_not_network_failure() {
        let transport = MockTransport::ok("[]").delay(Duration::from_secs(10));
        let dispatcher = Dispatcher::builder(transport).build();

        let descriptor =
            get("http://localhost:3000/todos").timeout(Duration::from_secs(5));
        let err = dispatcher.dispatch(descriptor).await.unwrap_err();

        assert!(matches!(err, FailureReason::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_applies_when_descriptor_has_none() {
        let transport = MockTransport::ok("[]").delay(Duration::from_secs(10));
        let dispatcher = Dispatcher::builder(transport)
            .default_timeout(Duration::from_secs(2))
            .build();

        let err = dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap_err();

        assert!(matches!(err, FailureReason::Timeout));
    }

    #[tokio::test]
    async fn pre_signalled_token_wins_even_against_instant_response() {
        let transport = MockTransport::ok("[]");
        let dispatcher = Dispatcher::builder(transport).build();

        let (source, token) = cancel::channel();
        source.cancel("cancelled before send");
        let descriptor = get("http://localhost:3000/todos").cancel_token(token);

        let err = dispatcher.dispatch(descriptor).await.unwrap_err();
        assert!(matches!(err, FailureReason::Cancelled(ref m) if m == "cancelled before send"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_in_flight_request_yields_cancelled() {
        let transport = MockTransport::ok("[]").delay(Duration::from_secs(30));
        let dispatcher = Dispatcher::builder(transport).build();

        let (source, token) = cancel::channel();
        let descriptor = get("http://localhost:3000/todos").cancel_token(token);
        let pending = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(descriptor).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        source.cancel("user aborted");

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, FailureReason::Cancelled(ref m) if m == "user aborted"));
    }

    #[tokio::test]
    async fn transforms_apply_in_registration_order() {
        let transport = MockTransport::ok("base");
        let dispatcher = Dispatcher::builder(transport)
            .transform_response(|body| format!("{body}-first"))
            .transform_response(|body| format!("{body}-second"))
            .build();

        let envelope = dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap();

        assert_eq!(envelope.body, "base-first-second");
    }

    #[tokio::test]
    async fn transforms_do_not_run_on_failures() {
        let transport = MockTransport::ok("missing").status(404);
        let dispatcher = Dispatcher::builder(transport)
            .transform_response(|_| "transformed".to_string())
            .build();

        let err = dispatcher
            .dispatch(get("http://localhost:3000/todos"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FailureReason::ServerError { ref body, .. } if body == "missing"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_all_preserves_input_order() {
        let dispatcher = Dispatcher::builder(UrlScriptedTransport).build();

        // The first request finishes last; order must still match the input.
        let slow = get("http://localhost:3000/todos?delay=500");
        let fast = get("http://localhost:3000/posts?delay=10");
        let envelopes = dispatcher.dispatch_all(vec![slow, fast]).await.unwrap();

        assert_eq!(envelopes.len(), 2);
        assert!(envelopes[0].body.contains("/todos"));
        assert!(envelopes[1].body.contains("/posts"));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_all_fails_fast_with_the_failing_reason() {
        let dispatcher = Dispatcher::builder(UrlScriptedTransport).build();

        // The healthy request is much slower than the failing one; the batch
        // must resolve with the 404 without waiting for it.
        let slow_ok = get("http://localhost:3000/todos?delay=60000");
        let failing = get("http://localhost:3000/todo?status=404");
        let err = dispatcher
            .dispatch_all(vec![slow_ok, failing])
            .await
            .unwrap_err();

        assert!(matches!(err, FailureReason::ServerError { status: 404, .. }));
    }

    #[tokio::test]
    async fn dispatch_all_of_nothing_is_empty() {
        let dispatcher = Dispatcher::builder(MockTransport::ok("[]")).build();
        let envelopes = dispatcher.dispatch_all(Vec::new()).await.unwrap();
        assert!(envelopes.is_empty());
    }
}
