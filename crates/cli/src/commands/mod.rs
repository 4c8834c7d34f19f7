use clap::Subcommand;
use eyre::{bail, Result};
use std::time::Duration;
use tiercache_cache::{CacheExt, FileCache};

#[derive(Subcommand)]
pub enum Commands {
    /// Print the value stored under a key
    Get {
        key: String,
    },

    /// Store a value under a key
    Set {
        key: String,

        value: String,

        /// Time to live in seconds
        #[arg(long, default_value = "3600")]
        ttl: u64,
    },

    /// Report whether a key has a live entry
    Has {
        key: String,
    },

    /// Remove a key and print how many entries were removed
    #[command(visible_alias = "rm")]
    Delete {
        key: String,
    },

    /// Remove every entry file under the cache directory
    Reset,

    /// Sweep the cache directory for expired files now
    Gc,

    /// Print the file that stores a key
    Path {
        key: String,
    },
}

impl Commands {
    pub async fn execute(self, cache: &FileCache<String>) -> Result<()> {
        match self {
            Commands::Get { key } => match cache.get_value(&key).await? {
                Some(value) => println!("{value}"),
                None => bail!("no entry for key '{key}'"),
            },
            Commands::Set { key, value, ttl } => {
                cache
                    .set_value(&key, &value, Duration::from_secs(ttl))
                    .await?;
                tracing::debug!(%key, ttl, "stored entry");
            }
            Commands::Has { key } => {
                println!("{}", cache.contains(&key).await?);
            }
            Commands::Delete { key } => {
                println!("{}", cache.remove(&key).await?);
            }
            Commands::Reset => {
                tiercache_cache::Reset::reset(cache).await?;
                tracing::info!(dir = %cache.dir().display(), "cache reset");
            }
            Commands::Gc => match cache.sweep().await? {
                Some(stats) => println!(
                    "scanned {} files, removed {}",
                    stats.scanned, stats.removed
                ),
                None => println!("a sweep is already running"),
            },
            Commands::Path { key } => {
                println!("{}", cache.path_for(&key).display());
            }
        }
        Ok(())
    }
}

