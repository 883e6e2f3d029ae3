// Startup job registration from configuration

use common::config::JobSeed;
use common::errors::SchedulerError;
use common::JobMonitors;
use tracing::{info, warn};

/// Register configured jobs through `add_job`.
///
/// Jobs whose class is unknown are skipped with a warning. Engine errors,
/// including invalid cron expressions, abort seeding.
pub async fn seed_jobs(monitors: &JobMonitors, seeds: &[JobSeed]) -> Result<usize, SchedulerError> {
    let mut added = 0;
    for seed in seeds {
        let registered = monitors
            .add_job(
                &seed.group,
                &seed.name,
                &seed.class,
                &seed.description,
                &seed.cron,
                seed.replace,
            )
            .await?;
        if registered {
            added += 1;
        } else {
            warn!(job_key = %seed.key(), class = %seed.class, "Skipping job with unknown class");
        }
    }
    info!(added = added, configured = seeds.len(), "Configured jobs registered");
    Ok(added)
}
