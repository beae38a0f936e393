//! news-enricher command line entrypoint.
//! Runs the enrichment pipeline over a JSON snapshot store.
//!
//! See `README.md` for a quickstart.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};

use news_enricher::analyze::rules::RuleId;
use news_enricher::listing::{ListQuery, SortBy, DEFAULT_PAGE_SIZE};
use news_enricher::logging::{init_tracing, LogFormat};
use news_enricher::metrics::install_prometheus;
use news_enricher::recommend::DEFAULT_RECOMMEND_LIMIT;
use news_enricher::similarity::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_SIMILAR_LIMIT};
use news_enricher::{
    ArticleId, MemoryStore, Pipeline, PipelineError, PreferenceUpdate, RawArticle, Rule, Settings,
    StoreError, UserId,
};

#[derive(Parser)]
#[clap(name = "news-enricher", about = "Enrich, cluster and rank news articles")]
struct Cli {
    /// JSON snapshot holding articles, preferences and rules
    #[clap(long, default_value = "data/news.json", global = true)]
    data: PathBuf,

    /// User whose data the command works on
    #[clap(short, long, default_value = "1", global = true)]
    user: UserId,

    /// Settings file (overrides NEWS_ENRICHER_CONFIG)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Log output: compact or json
    #[clap(long, default_value = "compact", global = true)]
    log_format: LogFormat,

    /// Print Prometheus metrics to stderr when done
    #[clap(long, global = true)]
    metrics: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest raw articles from a JSON file (one record or an array)
    Ingest { file: PathBuf },

    /// Enrich one article, or every missing/stale one
    Process {
        #[clap(short, long)]
        id: Option<ArticleId>,
    },

    /// Recompute clusters
    Cluster,

    /// Articles similar to the given one
    Similar {
        id: ArticleId,
        #[clap(short, long, default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: f32,
        #[clap(short, long, default_value_t = DEFAULT_SIMILAR_LIMIT)]
        limit: usize,
    },

    /// Ranked recommendations
    Recommend {
        #[clap(short, long, default_value_t = DEFAULT_RECOMMEND_LIMIT)]
        limit: usize,
    },

    /// Structured insights for one article
    Insights { id: ArticleId },

    /// Filtered article listing
    List {
        #[clap(long)]
        unread_only: bool,
        #[clap(long)]
        bookmarked_only: bool,
        #[clap(long)]
        topic: Option<String>,
        #[clap(long)]
        min_sentiment: Option<f64>,
        #[clap(long)]
        max_sentiment: Option<f64>,
        #[clap(long, value_enum, default_value = "date")]
        sort_by: SortArg,
        #[clap(long, default_value = "0")]
        skip: usize,
        #[clap(short, long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,
    },

    /// Mark an article as read
    Read { id: ArticleId },

    /// Toggle the bookmark flag
    Bookmark { id: ArticleId },

    /// Rate an article (0.0 - 5.0)
    Rate { id: ArticleId, rating: f32 },

    /// Manage and run rules
    Rules {
        #[clap(subcommand)]
        command: RulesCommand,
    },

    /// Show preferences, or update the given fields
    Prefs {
        /// Comma separated
        #[clap(long, value_delimiter = ',')]
        preferred: Option<Vec<String>>,
        #[clap(long, value_delimiter = ',')]
        excluded: Option<Vec<String>>,
        #[clap(long, value_delimiter = ',')]
        excluded_words: Option<Vec<String>>,
        #[clap(long)]
        threshold: Option<f32>,
        #[clap(long)]
        recommendations: Option<bool>,
    },

    /// Topic, sentiment and cluster aggregates
    Analytics,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// List the user's rules
    List,
    /// Add or replace rules from a JSON file (one rule or an array)
    Add { file: PathBuf },
    /// Delete a rule
    Delete { id: RuleId },
    /// Run all active rules over every article
    Apply,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Date,
    Sentiment,
}

impl From<SortArg> for SortBy {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Date => SortBy::Date,
            SortArg::Sentiment => SortBy::Sentiment,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; API keys usually live there.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let metrics = if cli.metrics {
        Some(install_prometheus()?)
    } else {
        None
    };

    let settings = match &cli.config {
        Some(p) => Settings::load_from(p),
        None => Settings::load(),
    }
    .context("loading settings")?;

    let store = MemoryStore::load(&cli.data)
        .with_context(|| format!("loading snapshot {}", cli.data.display()))?;
    let pipeline = Pipeline::new(&settings, store).context("building pipeline")?;

    let dirty = run(&pipeline, cli.user, cli.command).await?;
    if dirty {
        pipeline
            .store()
            .save(&cli.data)
            .with_context(|| format!("saving snapshot {}", cli.data.display()))?;
    }

    if let Some(handle) = metrics {
        eprintln!("{}", handle.render());
    }
    Ok(())
}

/// Executes one command. Returns whether the store changed.
async fn run(p: &Pipeline<MemoryStore>, user: UserId, command: Commands) -> Result<bool> {
    match command {
        Commands::Ingest { file } => {
            let records: Vec<RawArticle> = read_one_or_many(&file)?;
            let mut ingested = Vec::new();
            for raw in records {
                let link = raw.link.clone();
                match p.ingest(user, raw) {
                    Ok(got) => ingested.push(got),
                    Err(PipelineError::Store(StoreError::DuplicateLink(_))) => {
                        tracing::warn!(link = %link, "skipping duplicate link");
                    }
                    Err(e) => return Err(e).with_context(|| format!("ingesting {link}")),
                }
            }
            print_json(&ingested)?;
            Ok(true)
        }
        Commands::Process { id: Some(id) } => {
            print_json(&p.process_article(user, id)?)?;
            Ok(true)
        }
        Commands::Process { id: None } => {
            print_json(&p.process_all(user)?)?;
            Ok(true)
        }
        Commands::Cluster => {
            let run = p.cluster(user)?;
            print_json(&serde_json::json!({ "clusters": run.clusters }))?;
            Ok(true)
        }
        Commands::Similar {
            id,
            threshold,
            limit,
        } => {
            let hits: Vec<_> = p
                .similar(user, id, threshold, limit)?
                .into_iter()
                .map(|(a, score)| serde_json::json!({ "id": a.id, "title": a.title, "score": score }))
                .collect();
            print_json(&hits)?;
            Ok(false)
        }
        Commands::Recommend { limit } => {
            print_json(&p.recommend(user, limit).await?)?;
            Ok(false)
        }
        Commands::Insights { id } => {
            print_json(&p.insights(user, id).await?)?;
            Ok(false)
        }
        Commands::List {
            unread_only,
            bookmarked_only,
            topic,
            min_sentiment,
            max_sentiment,
            sort_by,
            skip,
            limit,
        } => {
            let query = ListQuery {
                unread_only,
                bookmarked_only,
                topic,
                min_sentiment,
                max_sentiment,
                sort_by: sort_by.into(),
                skip,
                limit,
            };
            print_json(&p.list_articles(user, &query)?)?;
            Ok(false)
        }
        Commands::Read { id } => {
            print_json(&p.mark_read(user, id)?)?;
            Ok(true)
        }
        Commands::Bookmark { id } => {
            print_json(&p.toggle_bookmark(user, id)?)?;
            Ok(true)
        }
        Commands::Rate { id, rating } => {
            print_json(&p.rate(user, id, rating)?)?;
            Ok(true)
        }
        Commands::Rules { command } => run_rules(p, user, command),
        Commands::Prefs {
            preferred,
            excluded,
            excluded_words,
            threshold,
            recommendations,
        } => {
            let update = PreferenceUpdate {
                preferred_topics: preferred,
                excluded_topics: excluded,
                excluded_words,
                relevance_threshold: threshold,
                recommendations_enabled: recommendations,
            };
            // first access creates the record, so this always writes
            print_json(&p.update_preferences(user, update)?)?;
            Ok(true)
        }
        Commands::Analytics => {
            print_json(&p.analytics(user)?)?;
            Ok(false)
        }
    }
}

fn run_rules(p: &Pipeline<MemoryStore>, user: UserId, command: RulesCommand) -> Result<bool> {
    match command {
        RulesCommand::List => {
            print_json(&p.rules(user)?)?;
            Ok(false)
        }
        RulesCommand::Add { file } => {
            let rules: Vec<Rule> = read_one_or_many(&file)?;
            let mut stored = Vec::with_capacity(rules.len());
            for mut rule in rules {
                rule.user_id = user;
                let name = rule.name.clone();
                stored.push(p.put_rule(rule).with_context(|| format!("rule `{name}`"))?);
            }
            print_json(&stored)?;
            Ok(true)
        }
        RulesCommand::Delete { id } => {
            let deleted = p.delete_rule(user, id)?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
            Ok(deleted)
        }
        RulesCommand::Apply => {
            print_json(&p.apply_rules_all(user)?)?;
            Ok(true)
        }
    }
}

fn read_one_or_many<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).with_context(|| format!("decoding {}", path.display())))
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
