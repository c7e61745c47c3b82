//! Chain Verification CLI Tool
//!
//! Command-line tool for verifying audit chain integrity against a
//! deployed database. Exits non-zero when violations are found so it can
//! run from cron or CI.

use clap::Parser;

use audit_ledger::store::AuditStore;
use audit_ledger::verify::IntegrityVerifier;

#[derive(Parser)]
#[command(name = "verify-chain")]
#[command(about = "Audit ledger chain verification tool")]
#[command(version = "0.1.0")]
struct Cli {
    /// Database URL
    #[arg(long, default_value = "sqlite://audit_ledger.db")]
    database_url: String,

    /// Tenant to verify; omit to verify every tenant
    #[arg(short, long)]
    tenant: Option<String>,

    /// Records fetched per page while streaming the chain
    #[arg(long, default_value_t = 256)]
    page_size: i64,

    /// Print each violation as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = AuditStore::new(&cli.database_url).await?;
    store.run_migrations().await?;

    let verifier = IntegrityVerifier::with_page_size(store, cli.page_size);
    let report = verifier.verify(cli.tenant.as_deref()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        for violation in &report.violations {
            println!(
                "  tenant={} sequence={} kind={:?} expected={} actual={}",
                violation.tenant_id,
                violation.sequence_id,
                violation.kind,
                violation.expected,
                violation.actual
            );
        }
    }

    if !report.verified {
        std::process::exit(1);
    }
    Ok(())
}
