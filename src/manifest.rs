use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::{fs, fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::filter::FilterHit;
use crate::{Result, MANIFEST_FILE};

/// Matched hits of one run, mirrored to `<output_dir>/MANIFEST_FILE`.
#[derive(Debug)]
pub struct RunManifest {
    output_dir: PathBuf,
    hits: Vec<FilterHit>,
}

impl RunManifest {
    /// Creates a fresh `<root>/<run_id>` directory for this run. When another
    /// run already owns that directory, `<run_id>_1`, `<run_id>_2`, ... are
    /// tried instead, so two runs never share output.
    pub async fn create(root: &Path, run_id: i64) -> Result<Self> {
        fs::create_dir_all(root).await?;

        let mut suffix = 0u32;
        loop {
            let name = match suffix {
                0 => run_id.to_string(),
                n => format!("{run_id}_{n}"),
            };
            let output_dir = root.join(name);
            match fs::create_dir(&output_dir).await {
                Ok(()) => {
                    if suffix > 0 {
                        warn!(
                            "output dir for run {run_id} already taken, using {}",
                            output_dir.display()
                        );
                    }
                    return Ok(Self {
                        output_dir,
                        hits: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(MANIFEST_FILE)
    }

    pub fn hits(&self) -> &[FilterHit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Adds a hit and rewrites the manifest, so a crashed run still leaves
    /// the matches found so far. Unmatched hits are ignored.
    pub async fn record(&mut self, hit: FilterHit) -> Result<()> {
        if !hit.matched {
            return Ok(());
        }
        self.hits.push(hit);
        self.write().await
    }

    /// One `title\nlink\n\n` record per match.
    pub fn render(&self) -> String {
        self.hits
            .iter()
            .map(|h| format!("{}\n{}\n\n", h.title(), h.link()))
            .collect()
    }

    pub async fn write(&self) -> Result<()> {
        let mut file = File::create(self.path()).await?;
        file.write_all(self.render().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Leaves the output directory in its final state. A run without matches
    /// leaves neither manifest nor directory behind.
    ///
    /// Returns the output directory if it was kept.
    pub async fn finish(self) -> Result<Option<PathBuf>> {
        if !self.is_empty() {
            self.write().await?;
            return Ok(Some(self.output_dir));
        }

        let path = self.path();
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
        }
        fs::remove_dir(&self.output_dir).await?;
        debug!("removed empty output dir {}", self.output_dir.display());
        Ok(None)
    }
}
