use crypto_dashboard_sdk::alerts::{format_usd, AlertEngine, FileStore};
use crypto_dashboard_sdk::sources::{build_client, CryptoComparePrices};
use crypto_dashboard_sdk::{AlertCondition, Coin, DataSource};
use std::sync::Arc;
use std::time::Duration;

/// Usage:
///   alerts_cli list
///   alerts_cli add <coin> <above|below> <price>
///   alerts_cli remove <id>
///   alerts_cli check
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::var("DASHBOARD_STORAGE_DIR").unwrap_or_else(|_| ".crypto-dashboard".to_string());
    let engine = AlertEngine::load(Arc::new(FileStore::new(dir)));
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["add", coin, condition, price] => {
            let Some(coin) = Coin::search(coin).into_iter().next() else {
                eprintln!("Unknown coin: {}", coin);
                return Ok(());
            };
            let condition = match *condition {
                "above" => AlertCondition::Above,
                "below" => AlertCondition::Below,
                other => {
                    eprintln!("Condition must be 'above' or 'below', got {}", other);
                    return Ok(());
                }
            };
            let rule = engine.add_rule(coin.id(), coin.name(), price.parse()?, condition)?;
            println!("Added {} ({})", rule.message(), rule.id);
        }
        ["remove", id] => {
            if engine.remove_rule(id) {
                println!("Removed {}", id);
            } else {
                println!("No rule with id {}", id);
            }
        }
        ["check"] => {
            let client = build_client(Duration::from_secs(15))?;
            let prices = CryptoComparePrices::new(client).fetch().await?;
            for coin in &prices {
                println!("{:<10} ${}", coin.name, format_usd(coin.current_price));
            }
            let fired = engine.evaluate(&prices);
            if fired.is_empty() {
                println!("No alerts triggered");
            }
            for notification in fired {
                println!("ALERT: {}", notification);
            }
        }
        _ => {
            let rules = engine.rules();
            if rules.is_empty() {
                println!("No alerts configured");
            }
            for rule in rules {
                println!(
                    "{}  {:<10} {:<6} ${:<12} {}",
                    rule.id,
                    rule.coin_name,
                    rule.condition,
                    format_usd(rule.target_price),
                    if rule.triggered { "triggered" } else { "active" }
                );
            }
        }
    }

    Ok(())
}
