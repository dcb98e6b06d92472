//! Terminal consumer for the relay's event stream.
//!
//! Posts a prompt to `/stream-debug` and prints text fragments as they
//! arrive, exercising the same pull loop a browser client would run.

use std::io::Write;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;

use llm_relay::client::{Accumulator, StreamConsumer};
use llm_relay::sse::StreamEvent;

#[derive(Parser, Debug)]
#[command(name = "stream-client", about = "Consume a relayed generation stream")]
struct Args {
    /// Prompt to send.
    prompt: String,

    /// Base URL of the relay.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    relay: String,

    /// Model identifier (relay default when omitted).
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_client=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut body = json!({ "prompt": args.prompt });
    if let Some(model) = &args.model {
        body["model"] = json!(model);
    }

    let url = format!("{}/stream-debug", args.relay.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        bail!("relay returned {status}: {text}");
    }

    let mut consumer = StreamConsumer::new(response.bytes_stream());
    let mut acc = Accumulator::new();
    let mut stdout = std::io::stdout();

    while let Some(result) = consumer.next_event().await {
        let event = result?;
        if let StreamEvent::Text { content, .. } = &event {
            write!(stdout, "{content}")?;
            stdout.flush()?;
        }
        if acc.apply(event) {
            break;
        }
    }

    writeln!(stdout)?;

    let result = acc.finish();
    match result.outcome {
        llm_relay::client::StreamOutcome::Complete => Ok(()),
        llm_relay::client::StreamOutcome::Failed(message) => bail!("stream failed: {message}"),
    }
}
