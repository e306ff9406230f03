//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use crate::config::RunConfig;
use crate::error::{BenchError, BenchResult};
use crate::inputs::InputSet;
use crate::traits::{NullProbe, PipelineTransport, UtilizationProbe};

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .config(RunConfig::new(5, 4).with_pipeline_repeats(2))
///     .transport(transport)
///     .probe(probe)
///     .inputs(InputSet::discover("/data/run1")?)
///     .primary_config(primary)
///     .additional_config(additional)
///     .build()?;
/// ```
pub struct OrchestratorBuilder {
    config: RunConfig,
    transport: Option<Arc<dyn PipelineTransport>>,
    probe: Option<Arc<dyn UtilizationProbe>>,
    inputs: Option<InputSet>,
    primary_config: Option<Arc<str>>,
    additional_config: Option<Arc<str>>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RunConfig::default(),
            transport: None,
            probe: None,
            inputs: None,
            primary_config: None,
            additional_config: None,
        }
    }

    /// Set the full run configuration
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the session transport
    pub fn transport(mut self, transport: Arc<dyn PipelineTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the utilization probe (defaults to [`NullProbe`])
    pub fn probe(mut self, probe: Arc<dyn UtilizationProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Set the base input set
    pub fn inputs(mut self, inputs: InputSet) -> Self {
        self.inputs = Some(inputs);
        self
    }

    /// Set the configuration payload for primary workers
    pub fn primary_config(mut self, payload: impl Into<Arc<str>>) -> Self {
        self.primary_config = Some(payload.into());
        self
    }

    /// Set the configuration payload for remainder workers
    pub fn additional_config(mut self, payload: impl Into<Arc<str>>) -> Self {
        self.additional_config = Some(payload.into());
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is not set, or if configuration
    /// validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let transport = self
            .transport
            .ok_or_else(|| BenchError::missing_config("transport"))?;

        let inputs = self
            .inputs
            .ok_or_else(|| BenchError::missing_config("inputs"))?;

        let primary_config = self
            .primary_config
            .ok_or_else(|| BenchError::missing_config("primary_config"))?;

        let additional_config = self
            .additional_config
            .ok_or_else(|| BenchError::missing_config("additional_config"))?;

        self.config.validate()?;

        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(NullProbe) as Arc<dyn UtilizationProbe>);

        Ok(Orchestrator::new(
            self.config,
            transport,
            probe,
            inputs,
            primary_config,
            additional_config,
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
