//! Stockfolio - portfolio tracking from the terminal
//!
//! Fetches portfolio, market and prediction data, caching market responses on
//! disk so repeated lookups stay off the network.

use std::error::Error;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use stockfolio::cache::{CacheEntry, CacheManager, SYMBOL_NAMESPACES};
use stockfolio::cli::{CacheCommand, Cli, Command};
use stockfolio::config::Config;
use stockfolio::data::{
    BackendClient, CompanyProfile, Dividend, MarketClient, Note, NoteForm, PortfolioOverview,
    PortfolioService, PredictionClient, Quote, SearchResult, Stock, StockForm,
};
use stockfolio::format::{
    format_large_monetary, format_large_number, format_number, format_percent, format_ratio,
};

/// Initializes logging to stderr, filtered by `RUST_LOG`
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockfolio=warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the cache in the configured, XDG, or temporary directory
fn open_cache(config: &Config) -> CacheManager {
    if let Some(dir) = &config.cache_dir {
        return CacheManager::with_dir(dir);
    }
    CacheManager::new().unwrap_or_else(|| {
        let dir = std::env::temp_dir().join("stockfolio");
        warn!(dir = %dir.display(), "No cache directory available, using temporary directory");
        CacheManager::with_dir(dir)
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = Some(dir);
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<(), Box<dyn Error>> {
    let cache = open_cache(config);
    let market = MarketClient::new(cache.clone(), config.market_api_key.clone())
        .with_base_url(config.market_url.clone());
    let backend = BackendClient::new(config.api_url.clone(), config.token.clone());

    match &command {
        Command::Search { query } => print_search_results(&market.search(query).await?),
        Command::Portfolio => {
            let service = PortfolioService::new(backend, market);
            print_portfolio(&service.load().await?);
        }
        Command::Add { symbol } => {
            PortfolioService::new(backend, market).add(symbol).await?;
            println!("{} added to portfolio", symbol);
        }
        Command::Remove { symbol } => {
            PortfolioService::new(backend, market).remove(symbol).await?;
            println!("{} removed from portfolio", symbol);
        }
        Command::Dividends { symbol } => print_dividends(&market.dividends(symbol).await?),
        Command::Profile { symbol } => print_profile(&market.company_profile(symbol).await?),
        Command::Predict { symbols } => {
            let predictions = PredictionClient::new(cache.clone(), config.predict_url.clone())
                .predictions(symbols.as_slice())
                .await?;
            println!("{}", serde_json::to_string_pretty(&predictions)?);
        }
        Command::Compare { symbols } => print_quotes(&market.compare(symbols.as_slice()).await?),
        Command::Notes { symbol, desc } => print_notes(&backend.list_notes(symbol, *desc).await?),
        Command::Note { id } => print_notes(&[backend.get_note(*id).await?]),
        Command::NewNote { symbol, note } => {
            backend.create_note(symbol, &NoteForm::from(note)).await?;
            println!("Note added to {}", symbol);
        }
        Command::EditNote { id, note } => {
            backend.update_note(*id, &NoteForm::from(note)).await?;
            println!("Note #{} updated", id);
        }
        Command::DeleteNote { id } => {
            backend.delete_note(*id).await?;
            println!("Note #{} deleted", id);
        }
        Command::Stocks { .. } => {
            let query = command.stock_query().unwrap_or_default();
            print_stocks(&backend.list_stocks(&query).await?);
        }
        Command::Stock { id } => print_stocks(&[backend.get_stock(*id).await?]),
        Command::NewStock(stock) => {
            backend.create_stock(&StockForm::from(stock)).await?;
            println!("{} saved", stock.symbol);
        }
        Command::EditStock { id, stock } => {
            backend.update_stock(*id, &StockForm::from(stock)).await?;
            println!("Stock #{} updated", id);
        }
        Command::DeleteStock { id } => {
            backend.delete_stock(*id).await?;
            println!("Stock #{} deleted", id);
        }
        Command::Cache(cache_command) => run_cache_command(&cache, cache_command)?,
    }

    Ok(())
}

fn run_cache_command(cache: &CacheManager, command: &CacheCommand) -> Result<(), Box<dyn Error>> {
    match command {
        CacheCommand::Invalidate { key, namespaces } => {
            let changed = if namespaces.is_empty() {
                cache.invalidate(key, SYMBOL_NAMESPACES)
            } else {
                cache.invalidate(key, namespaces)
            };
            if changed.is_empty() {
                println!("{} was not cached", key);
            }
            for namespace in changed {
                println!("Removed {} from {}", key, namespace);
            }
        }
        CacheCommand::Show { namespace, key: Some(key) } => match cache.peek(namespace, key) {
            Some(entry) => {
                println!("{}  {}", key, describe_age(&entry, Utc::now()));
                println!("{}", serde_json::to_string_pretty(&entry.data)?);
            }
            None => println!("{} is not cached in {}", key, namespace),
        },
        CacheCommand::Show { namespace, key: None } => {
            let entries = cache.entries(namespace);
            if entries.is_empty() {
                println!("{} is empty", namespace);
            }
            for (key, entry) in &entries {
                println!("{:<24} {}", key, describe_age(entry, Utc::now()));
            }
        }
        CacheCommand::Clear { namespace } => {
            if !cache.clear(namespace) {
                return Err(format!("Failed to clear {}", namespace).into());
            }
            println!("Cleared {}", namespace);
        }
    }
    Ok(())
}

/// Describes when an entry was written, e.g. `2024-05-02 21:30 UTC (42m ago)`
///
/// Entries stamped ahead of `now` (clock skew) read as `0m ago`.
fn describe_age(entry: &CacheEntry, now: DateTime<Utc>) -> String {
    let Some(written) = DateTime::<Utc>::from_timestamp_millis(entry.timestamp) else {
        return format!("timestamp {}", entry.timestamp);
    };
    let minutes = (now - written).num_minutes().max(0);
    let age = if minutes < 60 {
        format!("{}m ago", minutes)
    } else {
        format!("{}h {}m ago", minutes / 60, minutes % 60)
    };
    format!("{} ({})", written.format("%Y-%m-%d %H:%M UTC"), age)
}

fn print_search_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No matches");
    }
    for result in results {
        println!(
            "{:<10} {:<40} {}",
            result.symbol,
            result.name.as_deref().unwrap_or("-"),
            result.exchange_short_name.as_deref().unwrap_or("")
        );
    }
}

fn print_portfolio(overview: &PortfolioOverview) {
    if overview.holdings.is_empty() {
        println!("Portfolio is empty");
        return;
    }
    for holding in &overview.holdings {
        let last_dividend = holding
            .dividends
            .last()
            .map(|d| format!("{} on {}", format_number(d.dividend), d.date))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:>12}  last dividend: {}",
            holding.item.symbol,
            format_number(holding.price),
            last_dividend
        );
    }
    println!("Total value: {}", format_number(Some(overview.total_value())));
}

fn print_dividends(dividends: &[Dividend]) {
    if dividends.is_empty() {
        println!("No dividends");
    }
    for dividend in dividends {
        println!(
            "{}  {:>8}  paid {}",
            dividend.date,
            format_number(dividend.dividend),
            dividend.payment_date.as_deref().unwrap_or("-")
        );
    }
}

fn print_profile(profile: &CompanyProfile) {
    println!("{} {}", profile.symbol, profile.company_name.as_deref().unwrap_or(""));
    println!("  Price:      {}", format_number(profile.price));
    println!(
        "  Market cap: {}",
        profile.market_cap.map(format_large_monetary).unwrap_or_else(|| "-".to_string())
    );
    println!("  Last div:   {}", format_number(profile.last_div));
    println!("  Industry:   {}", profile.industry.as_deref().unwrap_or("-"));
    println!("  Beta:       {}", profile.beta.map(format_ratio).unwrap_or_else(|| "-".to_string()));
}

fn print_quotes(quotes: &[Quote]) {
    println!("{:<10} {:>12} {:>9} {:>10} {:>8}", "SYMBOL", "PRICE", "CHANGE", "MKT CAP", "P/E");
    for quote in quotes {
        println!(
            "{:<10} {:>12} {:>9} {:>10} {:>8}",
            quote.symbol,
            format_number(quote.price),
            format_percent(quote.changes_percentage.map(|p| p / 100.0)),
            quote.market_cap.map(format_large_number).unwrap_or_else(|| "-".to_string()),
            quote.pe.map(format_ratio).unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_notes(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes");
    }
    for note in notes {
        let created = note
            .created_on
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("#{} {}  {}", note.id, note.title, created);
        println!("    {}", note.content);
        for path in &note.file_paths {
            println!("    attachment: {}", path);
        }
    }
}

fn print_stocks(stocks: &[Stock]) {
    for stock in stocks {
        println!(
            "#{:<5} {:<8} {:<32} {:>10} {:>8} {:>10} {}",
            stock.id,
            stock.symbol,
            stock.company_name,
            format_number(Some(stock.purchase)),
            format_number(Some(stock.last_div)),
            format_large_monetary(stock.market_cap),
            stock.industry
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_714_685_400_000; // 2024-05-02 21:30 UTC

    fn entry_at(timestamp: i64) -> CacheEntry {
        CacheEntry {
            data: serde_json::Value::Null,
            timestamp,
        }
    }

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_describe_age_minutes_and_hours() {
        assert_eq!(describe_age(&entry_at(T0), at(T0 + 42 * 60_000)), "2024-05-02 21:30 UTC (42m ago)");
        assert_eq!(describe_age(&entry_at(T0), at(T0 + 125 * 60_000)), "2024-05-02 21:30 UTC (2h 5m ago)");
    }

    #[test]
    fn test_describe_age_future_timestamp_is_zero() {
        assert_eq!(describe_age(&entry_at(T0), at(T0 - 5 * 60_000)), "2024-05-02 21:30 UTC (0m ago)");
    }
}
