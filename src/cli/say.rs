//! One-shot "say" command and the streamed reply printer shared with chat.

use std::error::Error;
use std::io::{self, Write};

use futures_util::StreamExt;
use tracing::debug;

use crate::api::{ChatApiClient, ChatCompletionRequest, ChatMessage, DEFAULT_MODEL};
use crate::cli::CliContext;

pub async fn run_say(
    context: &CliContext,
    prompt: Vec<String>,
    model: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: ichat say <prompt>");
        std::process::exit(1);
    }

    let client = context.client()?;
    let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let request = ChatCompletionRequest::new(model, vec![ChatMessage::user(prompt)]);

    let reply = print_streamed_reply(&client, &request, &mut io::stdout()).await?;
    if reply.cancelled {
        eprintln!("⏹️  Cancelled");
    }
    Ok(())
}

pub(crate) struct StreamedReply {
    pub text: String,
    pub cancelled: bool,
}

/// Stream a completion to `out`. Ctrl+C cancels the stream and keeps
/// whatever text arrived before it. API failures come back as
/// [`ApiError`](crate::api::ApiError) inside the box.
pub(crate) async fn print_streamed_reply<W: Write>(
    client: &ChatApiClient,
    request: &ChatCompletionRequest,
    out: &mut W,
) -> Result<StreamedReply, Box<dyn Error>> {
    let mut stream = client.stream_completion(request).await?;
    let cancel = stream.cancellation_token();
    let mut text = String::new();

    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = tokio::signal::ctrl_c() => {
                debug!("Ctrl+C received, cancelling stream");
                cancel.cancel();
                None
            }
        };
        match item {
            Some(Ok(cumulative)) => {
                write!(out, "{}", unprinted(&cumulative, text.len()))?;
                out.flush()?;
                text = cumulative;
            }
            Some(Err(err)) => {
                if !text.is_empty() {
                    writeln!(out)?;
                }
                return Err(Box::new(err));
            }
            None => break,
        }
    }
    writeln!(out)?;

    Ok(StreamedReply {
        text,
        cancelled: cancel.is_cancelled(),
    })
}

/// The part of a cumulative reply that has not been printed yet.
fn unprinted(cumulative: &str, printed: usize) -> &str {
    cumulative.get(printed..).unwrap_or_default()
}
