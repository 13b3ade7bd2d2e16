//! Database metrics collection.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Records the duration of one named query.
pub fn record_query_duration(query_name: &'static str, duration_secs: f64) {
    counter!("database_queries_total", "query" => query_name).increment(1);
    histogram!("database_query_duration_seconds", "query" => query_name).record(duration_secs);
}

/// Publishes connection pool gauges; called when metrics are scraped.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times a repository query.
///
/// ```ignore
/// let timer = QueryTimer::new("find_form_by_id");
/// let result = sqlx::query_as::<_, FormEntity>(...).fetch_optional(&pool).await;
/// timer.record();
/// result
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn record(self) {
        record_query_duration(self.query_name, self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("count_entries");
        assert_eq!(timer.query_name, "count_entries");
        timer.record();
    }
}
