//! Synthesis port - turns accepted evidence into the final output.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SynthesisBundle, SynthesisReceipt};

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Produce the output. Returning `Ok` confirms the output exists.
    async fn synthesize(&self, bundle: &SynthesisBundle) -> DomainResult<SynthesisReceipt>;
}
