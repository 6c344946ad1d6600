//! Synthesizer that writes the evidence bundle as pretty JSON.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SynthesisBundle, SynthesisReceipt};
use crate::domain::ports::Synthesizer;

pub const DEFAULT_OUTPUT: &str = "report.json";

#[derive(Debug, Clone)]
pub struct BundleSynthesizer {
    output: PathBuf,
}

impl Default for BundleSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT)
    }
}

impl BundleSynthesizer {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

#[async_trait]
impl Synthesizer for BundleSynthesizer {
    #[instrument(skip(self, bundle), fields(output = %self.output.display()))]
    async fn synthesize(&self, bundle: &SynthesisBundle) -> DomainResult<SynthesisReceipt> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(bundle)?;
        tokio::fs::write(&self.output, &bytes).await?;

        // Output must exist for synthesis to count as done.
        if !tokio::fs::try_exists(&self.output).await? {
            return Err(DomainError::Unrecoverable {
                context: format!("synthesis output {} was not written", self.output.display()),
            });
        }
        info!(
            facts = bundle.facts.len(),
            sources = bundle.sources.len(),
            conflicts = bundle.conflicts.len(),
            bytes = bytes.len(),
            "synthesis bundle written"
        );
        Ok(SynthesisReceipt {
            output: self.output.clone(),
            facts_used: bundle.facts.len(),
        })
    }
}
