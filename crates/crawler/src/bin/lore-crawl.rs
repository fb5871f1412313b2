// ABOUTME: CLI binary that runs the crawl pipeline on urls or a saved HTML file.
// ABOUTME: Prints the derived content and tags without touching a knowledge store.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;
use lore_crawler::{
    derive, CrawlerOptions, DerivedEntry, ExtractorRegistry, FetcherKind, PageFetcher, RenderedPage,
};

#[derive(Parser, Debug)]
#[command(name = "lore-crawl")]
#[command(about = "Derive knowledge-base content and tags from web pages")]
struct Args {
    /// Fetcher backend: browser (default) or http
    #[arg(long = "fetcher", default_value = "browser")]
    fetcher: String,

    /// Output file path (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output the full derived entry as JSON
    #[arg(long = "json")]
    json_output: bool,

    /// HTML file to process (requires --url)
    #[arg(long = "html")]
    html: Option<PathBuf>,

    /// URL context for HTML file processing (required with --html)
    #[arg(long = "url")]
    url: Option<String>,

    /// Navigation timeout in seconds
    #[arg(long = "nav-timeout-secs", default_value_t = 25)]
    nav_timeout_secs: u64,

    /// Chromium executable for the browser fetcher
    #[arg(long = "chromium")]
    chromium: Option<PathBuf>,

    /// Print elapsed time in ms to stderr
    #[arg(long = "timing")]
    timing: bool,

    /// Allow fetching from private/local networks
    #[arg(long = "allow-private-networks")]
    allow_private_networks: bool,

    /// Log extractor selection and fetch details to stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// URLs to crawl (fetch mode)
    #[arg()]
    urls: Vec<String>,
}

fn format_output(entries: &[DerivedEntry], json_output: bool) -> Result<String, serde_json::Error> {
    if json_output {
        if entries.len() == 1 {
            serde_json::to_string_pretty(&entries[0])
        } else {
            serde_json::to_string_pretty(entries)
        }
    } else {
        Ok(entries
            .iter()
            .map(|e| format!("{}\n{}\ntags: {}", e.url, e.content, e.tags.join(", ")))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "lore=debug" } else { "lore=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.html.is_some() && args.url.is_none() {
        eprintln!("error: --url is required when using --html");
        return ExitCode::from(1);
    }

    if args.html.is_none() && args.urls.is_empty() {
        eprintln!("error: at least one URL is required, or use --html with --url");
        return ExitCode::from(1);
    }

    if args.html.is_some() && !args.urls.is_empty() {
        eprintln!("error: cannot use both --html and positional URLs");
        return ExitCode::from(1);
    }

    let opts = CrawlerOptions {
        nav_timeout: Duration::from_secs(args.nav_timeout_secs),
        allow_private_networks: args.allow_private_networks,
        chromium_path: args.chromium.clone(),
        fetcher: FetcherKind::from(args.fetcher.as_str()),
        ..Default::default()
    };
    let registry = ExtractorRegistry::builtin();

    let start = Instant::now();
    let mut entries: Vec<DerivedEntry> = Vec::new();
    let mut had_error = false;

    if let (Some(html_path), Some(url)) = (&args.html, &args.url) {
        match fs::read_to_string(html_path) {
            Ok(html) => entries.push(derive(&registry, &RenderedPage::from_html(url, html))),
            Err(e) => {
                eprintln!("error reading file {:?}: {}", html_path, e);
                had_error = true;
            }
        }
    } else {
        match opts.build_fetcher() {
            Ok(fetcher) => {
                for url in &args.urls {
                    match fetcher.fetch(url).await {
                        Ok(page) => entries.push(derive(&registry, &page)),
                        Err(e) => {
                            eprintln!("error crawling {}: {}", url, e);
                            had_error = true;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("error: {}", e);
                had_error = true;
            }
        }
    }

    let elapsed = start.elapsed();

    if !entries.is_empty() {
        match format_output(&entries, args.json_output) {
            Ok(output_str) => {
                if let Some(output_path) = &args.output {
                    if let Err(e) = fs::write(output_path, &output_str) {
                        eprintln!("error writing to {:?}: {}", output_path, e);
                        had_error = true;
                    }
                } else {
                    println!("{}", output_str);
                }
            }
            Err(e) => {
                eprintln!("error serializing output: {}", e);
                had_error = true;
            }
        }
    }

    if args.timing {
        let _ = writeln!(io::stderr(), "elapsed: {}ms", elapsed.as_millis());
    }

    if had_error {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
