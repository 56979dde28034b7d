use super::DBClient;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

// sec min hour day month weekday: top of every hour
const EXPIRY_SCHEDULE: &str = "0 0 * * * *";

impl DBClient {
    /// Starts the hourly expiry job. Returns once the scheduler is running;
    /// the job itself runs in the background.
    pub async fn start_expiry_task(&self) -> Result<JobScheduler, JobSchedulerError> {
        let sched = JobScheduler::new().await?;
        let pool = self.pool.clone();

        let job = Job::new_async(EXPIRY_SCHEDULE, move |uuid, _l| {
            let pool = pool.clone();
            Box::pin(async move {
                tracing::debug!("Running expiry job {:?}", uuid);

                match clear_expired_flags(&pool).await {
                    Ok((promotions, features)) => {
                        tracing::info!(
                            "Expiry job {:?} finished, cleared {} promotions and {} features",
                            uuid,
                            promotions,
                            features
                        );
                    }
                    Err(e) => {
                        tracing::error!("Expiry job {:?} failed: {:?}", uuid, e);
                    }
                }
            })
        })?;

        sched.add(job).await?;
        //It doesn't block.
        sched.start().await?;

        Ok(sched)
    }
}

/// Clears `is_promoted` / `is_featured` on posts whose expiry has passed.
async fn clear_expired_flags(pool: &sqlx::PgPool) -> Result<(u64, u64), sqlx::Error> {
    let promotions = sqlx::query(
        r#"
        UPDATE posts SET is_promoted = FALSE, updated_at = NOW()
        WHERE is_promoted = TRUE AND promotion_expiry IS NOT NULL AND promotion_expiry < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    let features = sqlx::query(
        r#"
        UPDATE posts SET is_featured = FALSE, updated_at = NOW()
        WHERE is_featured = TRUE AND featured_expiry IS NOT NULL AND featured_expiry < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    Ok((promotions.rows_affected(), features.rows_affected()))
}
