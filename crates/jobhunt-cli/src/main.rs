use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobhunt_pipeline::report::{
    apply_listing, generate_report, match_report, matches_table, scrape_report,
};
use jobhunt_pipeline::{
    maybe_build_scheduler, ApplyOutcome, Pipeline, PipelineConfig, ScoreThresholds,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "jobhunt")]
#[command(about = "Scrape job boards, score postings against a CV profile and draft cover letters")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch postings from every source and store new ones.
    Scrape {
        /// Only run this source (reliefweb, ethiojobs, unjobs, devex, developmentaid).
        #[arg(long)]
        source: Option<String>,
    },
    /// Score stored postings and save the ranked matches.
    Match,
    /// Draft cover letters for high matches.
    Generate,
    /// E-mail the digest of current matches.
    Notify,
    /// Scrape, match, generate and notify in one go.
    Run,
    /// Send a digest with a placeholder job to check e-mail settings.
    TestEmail,
    /// Draft a letter for one match, chosen by number or search term.
    Apply { selector: Option<String> },
    /// Show all stored matches.
    List,
    /// Run the full pipeline on the configured cron schedule until Ctrl-C.
    Schedule,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    PipelineConfig::load_dotenv();
    init_tracing();
    let config = PipelineConfig::from_env();

    let pipeline = Pipeline::new(config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Scrape { source } => {
            let pipeline = match source {
                Some(source_id) => pipeline.only_source(&source_id)?,
                None => pipeline,
            };
            print!("{}", scrape_report(&pipeline.scrape().await?));
        }
        Commands::Match => {
            let summary = pipeline.match_jobs().await?;
            let thresholds = score_thresholds(&pipeline)?;
            print!("{}", match_report(&summary, thresholds.low, thresholds.high));
        }
        Commands::Generate => print!("{}", generate_report(&pipeline.generate().await?)),
        Commands::Notify => report_sent(pipeline.notify().await?),
        Commands::TestEmail => report_sent(pipeline.test_email().await?),
        Commands::Run => {
            let summary = pipeline.run().await?;
            let thresholds = score_thresholds(&pipeline)?;
            print!("{}", scrape_report(&summary.scrape));
            print!(
                "{}",
                match_report(&summary.matched, thresholds.low, thresholds.high)
            );
            print!("{}", generate_report(&summary.generate));
            match summary.notified {
                Some(sent) => report_sent(sent),
                None => println!("No matches; digest not sent."),
            }
        }
        Commands::Apply { selector } => match pipeline.apply(selector.as_deref()).await? {
            ApplyOutcome::NoMatches => println!("No matches found. Run 'match' first."),
            ApplyOutcome::Listing(jobs) => print!("{}", apply_listing(&jobs)),
            ApplyOutcome::NotFound(term) => println!("No job found matching: {term}"),
            ApplyOutcome::Generated { job, path } => {
                println!("Generating cover letter for: {}", job.title);
                println!("Organization: {}", job.organization);
                println!("Saved to: {}", path.display());
                println!("Apply at: {}", job.url);
            }
            ApplyOutcome::Failed { job, reason } => {
                println!("Failed to generate cover letter for {}: {reason}", job.title);
            }
        },
        Commands::List => {
            let matches = pipeline.list().await?;
            if matches.is_empty() {
                println!("No matches found. Run 'match' first.");
            } else {
                print!("{}", matches_table(&matches));
            }
        }
        Commands::Schedule => schedule(pipeline.config()).await?,
    }

    Ok(())
}

fn score_thresholds(pipeline: &Pipeline) -> Result<ScoreThresholds> {
    Ok(pipeline
        .config()
        .load_match_config()
        .context("loading matching configuration")?
        .thresholds)
}

fn report_sent(sent: bool) {
    if sent {
        println!("Digest sent.");
    } else {
        println!("Digest not sent; check SENDGRID_API_KEY and EMAIL_TO.");
    }
}

async fn schedule(config: &PipelineConfig) -> Result<()> {
    let Some(mut sched) = maybe_build_scheduler(config).await? else {
        warn!("scheduler disabled; set JOBHUNT_SCHEDULER_ENABLED=true to enable it");
        return Ok(());
    };
    sched.start().await.context("starting scheduler")?;
    info!(cron = %config.cron, "scheduler started; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    sched.shutdown().await.context("stopping scheduler")?;
    info!("scheduler stopped");
    Ok(())
}
