//! Loupe CLI
//!
//! Command-line inspector for captured LLM API bodies. Feed it a request or
//! response body (raw or base64-encoded, from a file or stdin) and it prints
//! the normalized view the same way the GUI panel would render it.

use clap::Parser;
use std::io::Read;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use loupe_core::{capture, filter_messages, normalize, reconstruct, stats, QueryFilter};
use loupe_core::{NormalizedRequest, ReconstructedResponse, ToolArguments, UsageMetadata};

/// Loupe - inspect captured LLM API traffic
///
/// Reconstructs a normalized view of a captured request or response body:
/// messages with token stats, reconstructed tool calls, and usage metadata.
#[derive(Parser, Debug)]
#[command(name = "loupe")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the captured body file, or "-" for stdin
    input: String,

    /// Which side of the capture the body is
    #[arg(short, long, value_enum, default_value = "request")]
    side: Side,

    /// Treat the input as base64-encoded (as delivered by the capture host)
    #[arg(long)]
    base64: bool,

    /// Output format: text or json
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Filter request messages (e.g. "role:user content:hello" or a fuzzy term)
    #[arg(short, long)]
    query: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
enum Side {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    tracing::info!(
        "Inspecting {} body from {}",
        match args.side {
            Side::Request => "request",
            Side::Response => "response",
        },
        if args.input == "-" { "stdin" } else { args.input.as_str() }
    );

    let raw = match read_body(&args) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.side {
        Side::Request => inspect_request(&raw, &args),
        Side::Response => inspect_response(&raw, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            // Best-effort raw view so the user still sees what was captured
            if let Some(raw_json) = capture::diagnostic_value(&raw) {
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(&raw_json).unwrap_or_default()
                );
            }
            ExitCode::FAILURE
        }
    }
}

fn read_body(args: &Args) -> Result<Vec<u8>, String> {
    let bytes = if args.input == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        buf
    } else {
        std::fs::read(&args.input).map_err(|e| format!("failed to read {}: {e}", args.input))?
    };

    if args.base64 {
        let text = String::from_utf8(bytes).map_err(|e| format!("input is not text: {e}"))?;
        capture::decode_body(&text).map_err(String::from)
    } else {
        Ok(bytes)
    }
}

fn inspect_request(raw: &[u8], args: &Args) -> Result<(), String> {
    let mut req = normalize(raw).map_err(String::from)?;

    if let Some(query) = &args.query {
        let filter = QueryFilter::parse(query);
        req.messages = filter_messages(&req.messages, &filter);
    }

    match args.format {
        OutputFormat::Json => print_json(&req),
        OutputFormat::Text => print_request_text(&req),
    }
    Ok(())
}

fn inspect_response(raw: &[u8], args: &Args) -> Result<(), String> {
    let res = reconstruct(raw).map_err(String::from)?;
    match args.format {
        OutputFormat::Json => print_json(&res),
        OutputFormat::Text => print_response_text(&res),
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn print_request_text(req: &NormalizedRequest) {
    if let Some(model) = req.extra.get("model").and_then(|m| m.as_str()) {
        println!("model: {model}");
    }
    let total = stats::total_stats(req);
    println!(
        "{} messages, {} tools, ~{} chars / ~{} tokens\n",
        req.messages.len(),
        req.tools.len(),
        total.chars,
        total.tokens
    );

    for message in &req.messages {
        let s = stats::message_stats(message);
        println!(
            "[{}] {} ({} chars, ~{} tokens)",
            message.original_index, message.role, s.chars, s.tokens
        );
        let text = message.content.extract_text();
        if !text.trim().is_empty() {
            println!("  {}", preview(&text));
        }
        for call in &message.tool_calls {
            println!("  -> {}({})", call.name, preview(&call.raw_arguments));
        }
    }

    if !req.tools.is_empty() {
        println!();
        for tool in &req.tools {
            let s = stats::tool_stats(tool);
            println!("tool {} (~{} tokens): {}", tool.name, s.tokens, tool.description);
        }
    }
}

fn print_response_text(res: &ReconstructedResponse) {
    println!("format: {}", res.format);

    if let Some(usage) = res.metadata.as_ref().and_then(|m| UsageMetadata::from_metadata(m)) {
        println!(
            "usage: {} prompt / {} completion / {} cached, cost ${:.6}",
            usage.prompt_tokens, usage.completion_tokens, usage.cached_tokens, usage.cost
        );
    }

    if !res.content.trim().is_empty() {
        println!("\n{}", res.content);
    }

    for call in &res.tool_calls {
        let arguments = match &call.arguments {
            ToolArguments::Parsed(value) => {
                serde_json::to_string_pretty(value).unwrap_or_default()
            }
            ToolArguments::Raw(raw) => raw.clone(),
        };
        println!("\ntool call {} [{}]\n{}", call.name, call.id, arguments);
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 200;
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
