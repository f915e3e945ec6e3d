use crypto_dashboard_sdk::types::GasPrice;
use crypto_dashboard_sdk::{Dashboard, DashboardConfig};
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DashboardConfig::from_env();
    println!("Crypto Dashboard (refresh: {})", config.refresh_interval.label());
    println!("==================================");

    let dashboard = Dashboard::new(config)?;
    dashboard.start();

    // Wait for the first price poll
    let mut prices = dashboard.prices().subscribe();
    prices.changed().await?;
    while prices.borrow().is_loading {
        prices.changed().await?;
    }

    for _ in 0..6 {
        println!("\n{:-<60}", "");

        let state = dashboard.prices().state();
        match (&state.value, &state.error) {
            (Some(coins), error) => {
                for coin in coins {
                    println!(
                        "{:<6} ${:<12.2} {:>+7.2}%  vol ${:.0}",
                        coin.symbol.to_uppercase(),
                        coin.current_price,
                        coin.price_change_percentage_24h,
                        coin.total_volume
                    );
                }
                if let Some(e) = error {
                    println!("(stale) {}", e);
                }
            }
            (None, Some(e)) => println!("Prices unavailable: {}", e),
            (None, None) => println!("Prices loading..."),
        }

        if let Some(fng) = dashboard.fear_greed().state().value {
            println!("Fear & Greed: {} ({})", fng.current.value, fng.current.classification);
        }
        if let Some(gas) = dashboard.gas().state().value {
            println!(
                "Gas: {:.1} / {:.1} / {:.1} gwei ({:?})",
                gas.safe,
                gas.standard,
                gas.fast,
                GasPrice::level(gas.standard)
            );
        }
        if let Some(halving) = dashboard.halving().state().value {
            let left = halving.countdown();
            println!(
                "Halving: block {} of {} ({:.2}%), {}y {}m {}d left",
                halving.current_block,
                halving.halving_block,
                halving.percent_complete,
                left.years,
                left.months,
                left.days
            );
        }

        sleep(Duration::from_secs(10)).await;
    }

    let health = dashboard.health_check().await;
    println!("\nHealth: {:?} - {}", health.status, health.message.unwrap_or_default());
    for m in dashboard.feed_metrics().await {
        println!(
            "{:<12} p50={:.0}ms p99={:.0}ms success={:.1}%",
            m.feed_name,
            m.latency_p50_ms,
            m.latency_p99_ms,
            m.success_rate * 100.0
        );
    }

    dashboard.stop();
    Ok(())
}
