use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::json;

#[derive(Parser)]
#[command(name = "complaint-intel-cli")]
#[command(about = "Complaint intelligence service CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "COMPLAINT_INTEL_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Show artifact load status
    Status,

    /// Classify complaint text
    Classify {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Find similar resolved complaints
    Similar {
        #[arg(value_name = "TEXT")]
        text: String,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Estimate resolution time
    Sla {
        #[arg(short, long)]
        category: String,

        #[arg(short, long, default_value = "")]
        department: String,

        /// Show the intermediate values behind the estimate
        #[arg(short, long)]
        explain: bool,
    },

    /// Score a resolution record for anomalous handling
    Anomaly {
        #[arg(short = 't', long)]
        resolution_days: f64,

        #[arg(short, long)]
        program: String,

        #[arg(short, long)]
        department: String,
    },

    /// Run the full analysis pipeline on a complaint
    Analyze {
        #[arg(value_name = "TEXT")]
        text: String,

        #[arg(short, long)]
        department: Option<String>,
    },

    /// Reload model artifacts on the server
    Reload,
}

async fn print_response(request: RequestBuilder) -> Result<()> {
    let response = request
        .send()
        .await
        .context("failed to reach the complaint intelligence server")?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("server returned a non-JSON response")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("server returned {}", status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = |path: &str| format!("{}{}", cli.endpoint.trim_end_matches('/'), path);

    let request = match cli.command {
        Commands::Health => client.get(url("/health")),

        Commands::Status => client.get(url("/v1/status")),

        Commands::Classify { text } => client
            .post(url("/v1/classify"))
            .json(&json!({ "text": text })),

        Commands::Similar { text, top_k } => client
            .post(url("/v1/similar"))
            .json(&json!({ "text": text, "top_k": top_k })),

        Commands::Sla {
            category,
            department,
            explain,
        } => client.post(url("/v1/sla")).json(&json!({
            "category": category,
            "department": department,
            "explain": explain,
        })),

        Commands::Anomaly {
            resolution_days,
            program,
            department,
        } => client.post(url("/v1/anomaly")).json(&json!({
            "resolution_time_days": resolution_days,
            "student_program": program,
            "faculty_department": department,
        })),

        Commands::Analyze { text, department } => client
            .post(url("/v1/analyze"))
            .json(&json!({ "text": text, "department": department })),

        Commands::Reload => client.post(url("/v1/admin/reload")),
    };

    print_response(request).await
}
