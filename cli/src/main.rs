use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use typograf_core::{typogrify, TypografClient, UreqTransport, DEFAULT_ENCODING, SERVICE_URL};

/// Prepare a text for the web with the typograph service.
#[derive(Debug, Parser)]
#[command(name = "typograf")]
struct Args {
    /// Input text, in double quotes.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    #[arg(long = "service-url", env = "TYPOGRAF_URL", default_value = SERVICE_URL)]
    service_url: String,

    #[arg(long = "timeout-ms", env = "TYPOGRAF_TIMEOUT_MS", default_value_t = 500)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let input = match args.input.as_deref() {
        Some(text) if !text.is_empty() => text,
        _ => {
            println!("input text required");
            return Ok(());
        }
    };

    let transport = UreqTransport::with_timeout(Duration::from_millis(args.timeout_ms));
    let client = TypografClient::new(&args.service_url);
    let out = typogrify(&transport, &client, input, DEFAULT_ENCODING)
        .await
        .with_context(|| format!("typographing via {}", args.service_url))?;

    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_flag() {
        let args = Args::try_parse_from(["typograf", "-i", "- Это \"Типограф\"?"]).unwrap();
        assert_eq!(args.input.as_deref(), Some("- Это \"Типограф\"?"));
    }

    #[test]
    fn input_is_optional() {
        let args = Args::try_parse_from(["typograf", "--timeout-ms", "250"]).unwrap();
        assert!(args.input.is_none());
        assert_eq!(args.timeout_ms, 250);
    }
}
