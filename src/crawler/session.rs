//! Session directory of a crawl run

use crate::config::Config;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One crawl run's output folder, `<output-dir>/<timestamp>_<site>/`
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct SessionMeta<'a> {
    session_id: &'a str,
    started_at: String,
    config_hash: Option<&'a str>,
    config: &'a Config,
}

/// One line of `<output-dir>/index.jsonl`
#[derive(Serialize)]
struct IndexEntry<'a> {
    session_id: &'a str,
    site: &'a str,
    started_at: String,
    config_hash: Option<&'a str>,
    dir: String,
}

impl Session {
    /// Creates the session folder and writes `meta.json` into it
    ///
    /// The run is also appended to `index.jsonl` in the output directory.
    /// Fails if a session with the same id already exists.
    pub fn create(output_dir: &Path, config: &Config, config_hash: Option<&str>) -> Result<Self, CrawlError> {
        let started_at = Utc::now();
        let id = format!("{}_{}", started_at.format("%Y-%m-%dT%H-%M-%S"), config.site);
        let dir = output_dir.join(&id);

        std::fs::create_dir_all(output_dir)?;
        std::fs::create_dir(&dir)?;

        let meta = SessionMeta {
            session_id: &id,
            started_at: started_at.to_rfc3339(),
            config_hash,
            config,
        };
        std::fs::write(dir.join("meta.json"), serde_json::to_string_pretty(&meta)?)?;

        let entry = IndexEntry {
            session_id: &id,
            site: &config.site,
            started_at: started_at.to_rfc3339(),
            config_hash,
            dir: dir.display().to_string(),
        };
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_dir.join("index.jsonl"))?;
        writeln!(index, "{}", serde_json::to_string(&entry)?)?;

        tracing::info!("Session {} created in {}", id, dir.display());
        Ok(Self { id, dir, started_at })
    }

    /// Where the session's structured events are appended
    pub fn events_path(&self) -> PathBuf {
        self.dir.join("events.jsonl")
    }
}
