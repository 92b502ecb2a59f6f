use anyhow::{Context, Result, bail};
use clap::Parser;
use docqa::{
    config::Config,
    logging,
    processing::{QueryRequest, QueryResponse, QueryService},
};
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "docqa-cli",
    about = "Answer questions about a remote PDF document"
)]
struct Cli {
    /// URL of the PDF to answer from.
    #[arg(long)]
    document: String,
    /// Question to answer; repeat for several.
    #[arg(long = "question", short = 'q', required = true)]
    questions: Vec<String>,
    /// Print per-question audit records and enable logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    if cli.verbose {
        logging::init_tracing();
    }

    let config = Config::from_env().context("failed to load configuration")?;
    let service = QueryService::from_config(&config)?;

    let request = QueryRequest {
        documents: cli.document,
        questions: cli.questions,
    };
    let report = match service.run(request).await {
        Ok(report) => report,
        Err(err) if err.is_client_error() => bail!("request rejected: {err}"),
        Err(err) => return Err(err).context("query failed"),
    };

    let output = if cli.verbose {
        json!({
            "partition": report.partition.as_str(),
            "cache_hit": report.cache_hit,
            "chunk_count": report.chunk_count,
            "elapsed_ms": report.elapsed_ms,
            "records": report.records,
        })
    } else {
        serde_json::to_value(QueryResponse::from(report))?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
