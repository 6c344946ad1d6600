//! Material exposed to the synthesis collaborator.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::conflict::Conflict;
use super::evidence::{Fact, Source};
use super::plan::Dimension;

/// Citation-valid evidence handed to prose generation. Every fact in the
/// bundle cites only sources that are also in the bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisBundle {
    pub topic: String,
    pub facts: Vec<Fact>,
    pub sources: Vec<Source>,
    pub conflicts: Vec<Conflict>,
    pub caveats: Vec<String>,
    pub uncovered_dimensions: Vec<Dimension>,
}

/// Confirmation that synthesis produced its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisReceipt {
    pub output: PathBuf,
    pub facts_used: usize,
}
