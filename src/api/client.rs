use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::models::fetch_models;
use crate::api::sse::{SseDecoder, SseEvent};
use crate::api::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ModelSubType, ModelType,
    ModelsResponse, UserResponse,
};
use crate::core::config::{ConfigDefaults, ConfigStore, Credentials};
use crate::core::retry::{retry, RetryOptions};
use crate::core::throttle::Throttle;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;


pub const MODELS_THROTTLE_WINDOW: Duration = Duration::from_millis(5000);
pub const MODELS_MAX_ATTEMPTS: u32 = 2;
pub const MODELS_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// `code` value of a successful user-info envelope.
pub const USER_INFO_SUCCESS_CODE: i64 = 20000;

const JSON_ACCEPT: &str = "application/json";
const EVENT_STREAM_ACCEPT: &str = "text/event-stream";

/// Client for an OpenAI-compatible endpoint.
///
/// Credentials are re-read from the [`ConfigStore`] on every call, so a key
/// changed in settings takes effect on the next request.
pub struct ChatApiClient {
    http: reqwest::Client,
    config: Arc<ConfigStore>,
    defaults: ConfigDefaults,
    models_throttle: Throttle<Result<ModelsResponse, ApiError>>,
}

impl ChatApiClient {
    pub fn new(http: reqwest::Client, config: Arc<ConfigStore>, defaults: ConfigDefaults) -> Self {
        Self {
            http,
            config,
            defaults,
            models_throttle: Throttle::new(MODELS_THROTTLE_WINDOW),
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    fn credentials(&self) -> Result<Credentials, ApiError> {
        match self.config.resolve_credentials(&self.defaults) {
            Ok(Some(credentials)) => Ok(credentials),
            Ok(None) => Err(ApiError::unconfigured()),
            Err(err) => Err(ApiError::Configuration(format!(
                "Failed to read API configuration: {err}"
            ))),
        }
    }

    pub async fn create_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiError> {
        let credentials = self.credentials()?;
        let mut request = request.clone();
        request.stream = false;

        let url = construct_api_url(&credentials.api_url, "v1/chat/completions");
        debug!(%url, model = %request.model, "Sending chat completion request");
        let response = add_auth_headers(self.http.post(url), &credentials.api_key, JSON_ACCEPT)
            .json(&request)
            .send()
            .await
            .map_err(|err| ApiError::transport(&err))?;
        read_json(response).await
    }

    /// Start a streamed completion.
    ///
    /// A non-2xx answer fails here, before any stream exists. The returned
    /// stream yields the cumulative assistant text after every delta.
    pub async fn stream_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<CompletionStream, ApiError> {
        let credentials = self.credentials()?;
        let mut request = request.clone();
        request.stream = true;

        let url = construct_api_url(&credentials.api_url, "v1/chat/completions");
        debug!(%url, model = %request.model, "Starting streamed chat completion");
        let response =
            add_auth_headers(self.http.post(url), &credentials.api_key, EVENT_STREAM_ACCEPT)
                .json(&request)
                .send()
                .await
                .map_err(|err| ApiError::transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ApiError::protocol(status.as_u16(), &body));
        }

        Ok(CompletionStream::new(
            response.bytes_stream(),
            CancellationToken::new(),
        ))
    }

    /// Callback form of [`stream_completion`](Self::stream_completion).
    ///
    /// Every failure goes to `on_error` and yields `None`; success returns
    /// the final text.
    pub async fn stream_completion_with<D, E>(
        &self,
        request: &ChatCompletionRequest,
        mut on_delta: D,
        mut on_error: E,
    ) -> Option<String>
    where
        D: FnMut(&str),
        E: FnMut(ApiError),
    {
        let mut stream = match self.stream_completion(request).await {
            Ok(stream) => stream,
            Err(err) => {
                on_error(err);
                return None;
            }
        };

        let mut text = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(cumulative) => {
                    on_delta(&cumulative);
                    text = cumulative;
                }
                Err(err) => {
                    on_error(err);
                    return None;
                }
            }
        }
        Some(text)
    }

    /// List models, throttled to one request per window per client with a
    /// single retry on server errors and rate limiting.
    ///
    /// Calls that land inside an open window share its result, whatever
    /// filters they passed.
    pub async fn get_models(
        &self,
        model_type: Option<ModelType>,
        sub_type: Option<ModelSubType>,
    ) -> Result<ModelsResponse, ApiError> {
        let credentials = self.credentials()?;
        let http = self.http.clone();

        self.models_throttle
            .run(move || async move {
                let options = RetryOptions::new()
                    .max_attempts(MODELS_MAX_ATTEMPTS)
                    .delay(MODELS_RETRY_DELAY)
                    .on_retry(|err: &ApiError, attempt| {
                        let again = err.should_retry();
                        if again {
                            debug!(attempt, "Retrying model list after: {err}");
                        }
                        again
                    });
                retry(
                    || fetch_models(&http, &credentials, model_type, sub_type),
                    &options,
                )
                .await
            })
            .await
    }

    pub async fn get_user_info(&self) -> Result<UserResponse, ApiError> {
        let credentials = self.credentials()?;
        let url = construct_api_url(&credentials.api_url, "v1/user/info");
        debug!(%url, "Fetching user info");

        let response = add_auth_headers(self.http.get(url), &credentials.api_key, JSON_ACCEPT)
            .send()
            .await
            .map_err(|err| ApiError::transport(&err))?;
        let envelope: UserResponse = read_json(response).await?;

        if !envelope.status || envelope.code != USER_INFO_SUCCESS_CODE {
            let message = if envelope.message.trim().is_empty() {
                format!("User info request failed (code {})", envelope.code)
            } else {
                envelope.message
            };
            return Err(ApiError::Application {
                code: Some(envelope.code),
                message,
            });
        }
        Ok(envelope)
    }
}

/// Read a response body and decode it as `T`, mapping non-2xx statuses to
/// [`ApiError::Protocol`].
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ApiError::transport(&err))?;
    if !status.is_success() {
        return Err(ApiError::protocol(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|err| ApiError::Parse {
        message: err.to_string(),
        payload: body,
    })
}

/// Cumulative assistant text of one streamed completion.
///
/// Each item is the full text received so far. The stream ends after
/// `[DONE]`, at the end of the body, after the first error, or as soon as
/// it is cancelled; once cancelled nothing further is yielded.
pub struct CompletionStream {
    inner: BoxStream<'static, Result<String, ApiError>>,
    cancel: CancellationToken,
}

struct StreamState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    text: String,
    cancel: CancellationToken,
    body_done: bool,
}

impl CompletionStream {
    /// Decode an event-stream body. Body errors end the stream with a
    /// single [`ApiError::Transport`].
    pub fn new<S, B, E>(body: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let state = StreamState {
            body: Box::pin(body),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            text: String::new(),
            cancel: cancel.clone(),
            body_done: false,
        };
        let inner = stream::unfold(state, next_item).boxed();
        Self { inner, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A handle that cancels this stream from elsewhere, such as a Ctrl+C
    /// handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for CompletionStream {
    type Item = Result<String, ApiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

async fn next_item<S, B, E>(
    mut state: StreamState<S>,
) -> Option<(Result<String, ApiError>, StreamState<S>)>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: fmt::Display + Send,
{
    loop {
        if state.cancel.is_cancelled() {
            return None;
        }

        if let Some(event) = state.pending.pop_front() {
            match event {
                SseEvent::Delta(delta) => {
                    state.text.push_str(&delta);
                    let cumulative = state.text.clone();
                    return Some((Ok(cumulative), state));
                }
                SseEvent::Done => return None,
                SseEvent::Error(err) => {
                    state.pending.clear();
                    state.body_done = true;
                    return Some((Err(err), state));
                }
            }
        }

        if state.body_done {
            return None;
        }

        let next = tokio::select! {
            biased;
            _ = state.cancel.cancelled() => {
                debug!("Completion stream cancelled");
                return None;
            }
            next = state.body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                let events = state.decoder.feed(chunk.as_ref());
                state.pending.extend(events);
            }
            Some(Err(err)) => {
                state.body_done = true;
                return Some((Err(ApiError::Transport(err.to_string())), state));
            }
            None => {
                state.body_done = true;
                let events = state.decoder.finish();
                state.pending.extend(events);
            }
        }
    }
}
