//! Drops expired weather reports so the store stays bounded.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::state::WeatherStore;

pub async fn run_weather_prune_loop(
    weather: Arc<WeatherStore>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period.max(Duration::from_secs(1)));

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Weather prune loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = weather.prune(Instant::now());
                if removed > 0 {
                    tracing::debug!("Pruned {} weather cells, {} remain", removed, weather.len());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WeatherReport;
    use harbor_core::WeatherSafetyLevel;

    #[tokio::test(start_paused = true)]
    async fn loop_stops_on_shutdown() {
        let weather = Arc::new(WeatherStore::new(0.05, Duration::from_secs(60), 10));
        weather.upsert(vec![WeatherReport {
            lat: 26.1,
            lon: 50.5,
            level: WeatherSafetyLevel::Caution,
            cost_multiplier: 1.5,
            updated_at: None,
        }]);

        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(run_weather_prune_loop(weather.clone(), Duration::from_secs(1), rx));
        tokio::time::sleep(Duration::from_secs(3)).await;
        // Entry is still within its TTL.
        assert_eq!(weather.len(), 1);

        tx.send(()).unwrap();
        task.await.unwrap();
    }
}
