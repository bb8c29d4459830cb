use crate::transport::Connector;
use crate::{PerfError, Runner};
use perfgate_core::{request_count_for_size, DataLoadConfig, LoadTestResult, StepLoad};
use time::OffsetDateTime;
use tokio::time::{sleep, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

impl<C: Connector> Runner<C> {
    /// Ramp the simulated data volume, running the worker pool once per size.
    ///
    /// Larger sizes get fewer requests per task, see
    /// [`request_count_for_size`](perfgate_core::request_count_for_size).
    pub async fn run_data_load(
        &self,
        config: &DataLoadConfig,
    ) -> Result<Vec<LoadTestResult>, PerfError> {
        self.data_ramp(config).instrument(self.span.clone()).await
    }

    #[instrument(name = "data_load", skip_all, fields(initial = config.initial_data_size, max = config.max_data_size, multiplier = config.data_size_multiplier))]
    async fn data_ramp(&self, config: &DataLoadConfig) -> Result<Vec<LoadTestResult>, PerfError> {
        config.validate()?;

        let sizes = config.sizes();
        if sizes.is_empty() {
            warn!(
                "Initial data size {} exceeds max data size {}, nothing to run",
                config.initial_data_size, config.max_data_size
            );
        }

        let mut steps = Vec::with_capacity(sizes.len());
        for (index, &size) in sizes.iter().enumerate() {
            let step_number = index + 1;
            let count = request_count_for_size(size);
            info!("Step {step_number}: {size} records, {count} requests per task");

            let started = Instant::now();
            let results = self.run_with_count(count).await?;

            steps.push(LoadTestResult {
                load: StepLoad::DataSize(size),
                results,
                timestamp: OffsetDateTime::now_utc(),
                step_number,
                elapsed: started.elapsed(),
                dropped: 0,
            });

            if step_number < sizes.len() {
                debug!("Cooling down for {:?}", config.cool_down);
                sleep(config.cool_down).await;
            }
        }

        info!("Data load test complete");
        Ok(steps)
    }
}
