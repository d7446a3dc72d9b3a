//! Demo surface for the dispatcher: one subcommand per trigger from the
//! original browser demo, rendered to stdout instead of the DOM.
//!
//! Run the mock server first (`cargo run -p mock-server`), then e.g.
//! `dispatch get` or `dispatch error`.

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dispatch_core::{
    cancel, CreateTodo, Dispatcher, FailureReason, HttpTransport, Method, RequestDescriptor,
    ResponseEnvelope, TodoApi, UpdateTodo,
};

#[derive(Parser)]
#[command(name = "dispatch", about = "HTTP request dispatcher demo against a todo test API")]
struct Cli {
    /// Base URL of the todo API.
    #[arg(long, default_value = "http://localhost:3000")]
    base_url: String,

    /// Milliseconds to wait before signalling cancellation (cancel trigger
    /// only). 0 cancels immediately after the request is in flight.
    #[arg(long, default_value_t = 0)]
    cancel_after_ms: u64,

    #[command(subcommand)]
    trigger: Trigger,
}

#[derive(Subcommand)]
enum Trigger {
    /// GET /todos?_limit=5 with a five second deadline.
    Get,
    /// POST a new todo.
    Post,
    /// PATCH todo 1.
    Update,
    /// DELETE todo 1.
    Delete,
    /// Two list requests dispatched concurrently and joined fail-fast.
    Simultaneous,
    /// POST with an explicit Authorization header.
    Headers,
    /// GET with a response transform that uppercases todo titles.
    Transform,
    /// GET a mistyped route to exercise the 404 notification path.
    Error,
    /// Cancel an in-flight request.
    Cancel,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(reason) = run_trigger(&cli).await {
        report_failure(&reason);
        std::process::exit(1);
    }
}

async fn run_trigger(cli: &Cli) -> Result<(), FailureReason> {
    let api = TodoApi::new(&cli.base_url);
    let dispatcher = build_dispatcher(matches!(cli.trigger, Trigger::Transform))?;

    match cli.trigger {
        Trigger::Get => {
            let descriptor = api.list(Some(5)).timeout(Duration::from_secs(5));
            render(&dispatcher.dispatch(descriptor).await?);
        }
        Trigger::Post => {
            let input = CreateTodo {
                title: "New Todo".to_string(),
                completed: false,
            };
            render(&dispatcher.dispatch(api.create(&input)?).await?);
        }
        Trigger::Update => {
            let input = UpdateTodo {
                title: Some("Updated Todo".to_string()),
                completed: Some(true),
            };
            render(&dispatcher.dispatch(api.update(1, &input)?).await?);
        }
        Trigger::Delete => {
            render(&dispatcher.dispatch(api.delete(1)).await?);
        }
        Trigger::Simultaneous => {
            let envelopes = dispatcher
                .dispatch_all(vec![api.list(Some(5)), api.list(Some(3))])
                .await?;
            for envelope in &envelopes {
                render(envelope);
            }
        }
        Trigger::Headers => {
            let input = CreateTodo {
                title: "New Todo".to_string(),
                completed: false,
            };
            let descriptor = api.create(&input)?.header("Authorization", "sometoken");
            render(&dispatcher.dispatch(descriptor).await?);
        }
        Trigger::Transform => {
            render(&dispatcher.dispatch(api.list(Some(5))).await?);
        }
        Trigger::Error => {
            // Deliberate singular/plural typo so the server has no route.
            let url = format!("{}/todo?_limit=5", cli.base_url.trim_end_matches('/'));
            render(&dispatcher.dispatch(RequestDescriptor::new(Method::Get, url)).await?);
        }
        Trigger::Cancel => {
            let (source, token) = cancel::channel();
            let descriptor = api.list(Some(5)).cancel_token(token);
            let pending = tokio::spawn({
                let dispatcher = dispatcher.clone();
                async move { dispatcher.dispatch(descriptor).await }
            });
            tokio::time::sleep(Duration::from_millis(cli.cancel_after_ms)).await;
            source.cancel("Request cancelled!");
            match pending.await {
                Ok(result) => render(&result?),
                Err(e) => return Err(FailureReason::Unknown(e.to_string())),
            }
        }
    }
    Ok(())
}

fn build_dispatcher(with_transform: bool) -> Result<Dispatcher, FailureReason> {
    let transport =
        HttpTransport::new().map_err(|e| FailureReason::NetworkFailure(e.to_string()))?;
    let mut builder = Dispatcher::builder(transport)
        .default_header("X-Auth-Token", "sometoken")
        .before_send(|descriptor| {
            tracing::info!(method = %descriptor.method, url = %descriptor.url, "request sent");
            Ok(descriptor)
        });
    if with_transform {
        builder = builder.transform_response(uppercase_titles);
    }
    Ok(builder.build())
}

/// Uppercase every `title` field in the response JSON; non-JSON bodies pass
/// through untouched.
fn uppercase_titles(body: String) -> String {
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&body) else {
        return body;
    };
    fn visit(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Array(items) => items.iter_mut().for_each(visit),
            serde_json::Value::Object(map) => {
                if let Some(serde_json::Value::String(title)) = map.get_mut("title") {
                    *title = title.to_uppercase();
                }
            }
            _ => {}
        }
    }
    visit(&mut value);
    serde_json::to_string(&value).unwrap_or(body)
}

/// The rendering callback: status, headers, pretty-printed body.
fn render(envelope: &ResponseEnvelope) {
    println!("Status: {}", envelope.status);
    println!("Headers:");
    for (name, value) in &envelope.headers {
        println!("  {name}: {value}");
    }
    let body = serde_json::from_str::<serde_json::Value>(&envelope.body)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| envelope.body.clone());
    println!("Body:\n{body}");
}

/// The error callback: 404 gets the demo's dedicated notification, every
/// other failure a generic report.
fn report_failure(reason: &FailureReason) {
    if reason.is_not_found() {
        eprintln!("Error: Page Not Found");
    } else {
        eprintln!("Request failed: {reason}");
    }
}
