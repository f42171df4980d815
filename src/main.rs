//! Binary entrypoint for the StudyQuest admin CLI.
//!
//! Commands:
//! - `init` - create a starter `config.toml`
//! - `seed [--file <path>]` - load quests into the catalog (bundled set by default)
//! - `register <username>` - create a user account
//! - `stats <username>` - print a user's progression snapshot
//! - `leaderboard [--limit <n>]` - print the experience ranking
//!
//! The engine itself is a library; see the crate docs under `studyquest::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use studyquest::config::Config;
use studyquest::engine::Engine;
use studyquest::storage::seed;

#[derive(Parser)]
#[command(name = "studyquest")]
#[command(about = "Gamified study-tracking backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter configuration file
    Init,
    /// Load quest definitions into the catalog
    Seed {
        /// JSON file of quest definitions (defaults to the bundled set)
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Create a user account
    Register {
        /// Username for the new account
        username: String,
    },
    /// Show a user's progression snapshot
    Stats {
        /// Username to look up
        username: String,
    },
    /// Show the experience ranking
    Leaderboard {
        /// Number of rows to print
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn init_logging(verbose: u8, config_level: &str) {
    let level = match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(cli.verbose, "info");
        Config::create_default(&cli.config).await?;
        println!("wrote default configuration to {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(cli.verbose, &config.logging.level);
    let engine = Engine::open(&config.storage.data_dir)?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Seed { file } => {
            let count = match file {
                Some(path) => seed::seed_catalog_from_file(engine.store(), &path)?,
                None => {
                    let quests = seed::bundled_quests()?;
                    for quest in &quests {
                        engine.store().put_quest(quest)?;
                    }
                    quests.len()
                }
            };
            info!("seeded {} quests", count);
            println!("seeded {} quests", count);
        }
        Commands::Register { username } => {
            let user = engine.register_user(&username).await?;
            println!(
                "registered '{}' (id {}) with {} gold",
                user.username, user.id, user.gold
            );
        }
        Commands::Stats { username } => {
            let user = engine.store().get_user_by_name(&username)?;
            let stats = engine.reward_stats(user.id).await?;
            println!("{}", username);
            println!("  level:       {}", stats.level);
            println!(
                "  experience:  {} ({} to next level)",
                stats.experience, stats.experience_to_next_level
            );
            println!("  gold:        {}", stats.gold);
            println!("  today:       +{} xp, +{} gold", stats.today_experience, stats.today_gold);
        }
        Commands::Leaderboard { limit } => {
            let limit = limit.unwrap_or(config.limits.leaderboard);
            for row in engine.leaderboard(None, limit).await? {
                println!(
                    "{:>3}. {:<20} lvl {:<3} {} xp, {} gold",
                    row.rank, row.username, row.level, row.experience, row.gold
                );
            }
        }
    }

    Ok(())
}
