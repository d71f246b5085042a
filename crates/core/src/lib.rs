pub mod analytics;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod numeric;
pub mod partition;
pub mod pipeline;
pub mod storage;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_DATA_ROOT: &str = "gmc_data";
    const DEFAULT_CATEGORIES_PATH: &str = "public/categories.json";
    const DEFAULT_CONCURRENCY: usize = 4;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub data_root: PathBuf,
        pub categories_path: PathBuf,
        pub concurrency: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let concurrency = match std::env::var("RANKSCOPE_CONCURRENCY") {
                Ok(s) => s
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("RANKSCOPE_CONCURRENCY must be an integer (got {s:?})"))?,
                Err(_) => DEFAULT_CONCURRENCY,
            };
            anyhow::ensure!(concurrency >= 1, "RANKSCOPE_CONCURRENCY must be >= 1");

            Ok(Self {
                data_root: std::env::var("RANKSCOPE_DATA_ROOT")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT)),
                categories_path: std::env::var("RANKSCOPE_CATEGORIES_PATH")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CATEGORIES_PATH)),
                concurrency,
                sentry_dsn: std::env::var("SENTRY_DSN").ok().filter(|s| !s.trim().is_empty()),
            })
        }

        /// Per-country inputs and partition outputs live under `<data_root>/output`.
        pub fn output_root(&self) -> PathBuf {
            self.data_root.join("output")
        }

        pub fn require_categories_file(&self) -> anyhow::Result<&std::path::Path> {
            anyhow::ensure!(
                self.categories_path.is_file(),
                "category tree file not found at {} (set RANKSCOPE_CATEGORIES_PATH)",
                self.categories_path.display()
            );
            Ok(&self.categories_path)
        }

        pub fn require_data_root(&self) -> anyhow::Result<&std::path::Path> {
            anyhow::ensure!(
                self.data_root.is_dir(),
                "data root {} does not exist (set RANKSCOPE_DATA_ROOT)",
                self.data_root.display()
            );
            Ok(&self.data_root)
        }
    }
}
