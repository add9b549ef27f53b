//! Command-line interface parsing for Stockfolio
//!
//! This module handles parsing of CLI arguments using clap: one subcommand per
//! data-access operation plus `cache` maintenance commands.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

use crate::data::{NoteForm, StockForm, StockQuery, StockSortBy};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The symbol is empty or contains characters no ticker uses
    #[error("Invalid symbol: '{0}'. Symbols contain letters, digits, '.', '-' or '^'")]
    InvalidSymbol(String),
}

/// Stockfolio - track a stock portfolio with cached market data
#[derive(Parser, Debug)]
#[command(name = "stockfolio")]
#[command(about = "Portfolio tracking with cached market data")]
#[command(version)]
pub struct Cli {
    /// Directory for cached API responses (overrides STOCKFOLIO_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Search symbols and company names
    Search {
        /// Free-text query, e.g. "apple"
        query: String,
    },
    /// Show holdings with latest prices and dividends
    Portfolio,
    /// Add a symbol to the portfolio
    Add {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
    },
    /// Remove a symbol from the portfolio and drop its cached data
    Remove {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
    },
    /// Show recent dividends for a symbol
    Dividends {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
    },
    /// Show the company profile for a symbol
    Profile {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
    },
    /// Show model predictions for one or more symbols
    Predict {
        #[arg(required = true, value_parser = parse_symbol_arg)]
        symbols: Vec<String>,
    },
    /// Compare current quotes for several symbols
    Compare {
        #[arg(required = true, value_parser = parse_symbol_arg)]
        symbols: Vec<String>,
    },
    /// List notes attached to a symbol
    Notes {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
        /// Newest first
        #[arg(long)]
        desc: bool,
    },
    /// Show a single note
    Note { id: i64 },
    /// Attach a new note to a symbol
    NewNote {
        #[arg(value_parser = parse_symbol_arg)]
        symbol: String,
        #[command(flatten)]
        note: NoteArgs,
    },
    /// Replace the contents of a note
    EditNote {
        id: i64,
        #[command(flatten)]
        note: NoteArgs,
    },
    /// Delete a note
    DeleteNote { id: i64 },
    /// List stock records
    Stocks {
        /// Filter by symbol prefix
        #[arg(long, default_value = "")]
        symbol: String,
        /// Filter by company name
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, value_enum, default_value_t = SortArg::Symbol)]
        sort: SortArg,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 5)]
        page_size: u32,
    },
    /// Show a single stock record
    Stock { id: i64 },
    /// Create a stock record
    NewStock(StockArgs),
    /// Replace the fields of a stock record
    EditStock {
        id: i64,
        #[command(flatten)]
        stock: StockArgs,
    },
    /// Delete a stock record
    DeleteStock { id: i64 },
    /// Inspect or maintain the local cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum CacheCommand {
    /// Remove an entry key from namespaces
    ///
    /// Without --namespace, the dividend and company profile caches are used.
    Invalidate {
        key: String,
        #[arg(long = "namespace", short = 'n', value_name = "NAMESPACE")]
        namespaces: Vec<String>,
    },
    /// List the entries of a namespace, or show one entry
    Show { namespace: String, key: Option<String> },
    /// Delete a whole namespace
    Clear { namespace: String },
}

/// Fields of a stock record for `new-stock` and `edit-stock`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct StockArgs {
    #[arg(long, value_parser = parse_symbol_arg)]
    pub symbol: String,
    #[arg(long)]
    pub company: String,
    /// Purchase price
    #[arg(long)]
    pub purchase: f64,
    /// Last dividend per share
    #[arg(long, default_value_t = 0.0)]
    pub last_div: f64,
    #[arg(long, default_value = "")]
    pub industry: String,
    #[arg(long, default_value_t = 0.0)]
    pub market_cap: f64,
}

impl From<&StockArgs> for StockForm {
    fn from(args: &StockArgs) -> Self {
        StockForm {
            symbol: args.symbol.clone(),
            company_name: args.company.clone(),
            purchase: args.purchase,
            last_div: args.last_div,
            industry: args.industry.clone(),
            market_cap: args.market_cap,
        }
    }
}

/// Contents of a note for `new-note` and `edit-note`
#[derive(Args, Debug, Clone, PartialEq)]
pub struct NoteArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub content: String,
    /// Path of an already uploaded attachment (repeatable)
    #[arg(long = "attachment", value_name = "PATH")]
    pub attachments: Vec<String>,
}

impl From<&NoteArgs> for NoteForm {
    fn from(args: &NoteArgs) -> Self {
        NoteForm {
            title: args.title.clone(),
            content: args.content.clone(),
            file_path: (!args.attachments.is_empty()).then(|| args.attachments.join(",")),
        }
    }
}

/// Sort field for `stocks`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Symbol,
    Company,
}

impl From<SortArg> for StockSortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Symbol => StockSortBy::Symbol,
            SortArg::Company => StockSortBy::CompanyName,
        }
    }
}

/// Parses a ticker symbol argument, normalizing it to upper case.
///
/// # Returns
/// * `Ok(String)` with the normalized symbol
/// * `Err(CliError::InvalidSymbol)` if the symbol is empty or malformed
pub fn parse_symbol_arg(s: &str) -> Result<String, CliError> {
    let symbol = s.trim();
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^'));

    if valid {
        Ok(symbol.to_ascii_uppercase())
    } else {
        Err(CliError::InvalidSymbol(s.to_string()))
    }
}

impl Command {
    /// Builds the stock listing query for `stocks`, if this is that command
    pub fn stock_query(&self) -> Option<StockQuery> {
        match self {
            Command::Stocks {
                symbol,
                company,
                sort,
                desc,
                page,
                page_size,
            } => Some(StockQuery {
                symbol: symbol.clone(),
                company_name: company.clone(),
                sort_by: (*sort).into(),
                descending: *desc,
                page_number: (*page).max(1),
                page_size: *page_size,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbol_arg_normalizes_case() {
        assert_eq!(parse_symbol_arg("aapl").unwrap(), "AAPL");
        assert_eq!(parse_symbol_arg(" brk.b ").unwrap(), "BRK.B");
        assert_eq!(parse_symbol_arg("^gspc").unwrap(), "^GSPC");
    }

    #[test]
    fn test_parse_symbol_arg_invalid() {
        let result = parse_symbol_arg("AAPL,MSFT");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Invalid symbol"));
        assert!(err.to_string().contains("AAPL,MSFT"));

        assert!(parse_symbol_arg("").is_err());
        assert!(parse_symbol_arg("../x").is_err());
    }

    #[test]
    fn test_cli_parse_search() {
        let cli = Cli::parse_from(["stockfolio", "search", "apple"]);
        assert_eq!(
            cli.command,
            Command::Search {
                query: "apple".to_string()
            }
        );
        assert!(cli.cache_dir.is_none());
    }

    #[test]
    fn test_cli_parse_predict_collects_symbols() {
        let cli = Cli::parse_from(["stockfolio", "predict", "aapl", "msft"]);
        assert_eq!(
            cli.command,
            Command::Predict {
                symbols: vec!["AAPL".to_string(), "MSFT".to_string()]
            }
        );
    }

    #[test]
    fn test_cli_predict_requires_symbols() {
        assert!(Cli::try_parse_from(["stockfolio", "predict"]).is_err());
    }

    #[test]
    fn test_cli_rejects_invalid_symbol() {
        assert!(Cli::try_parse_from(["stockfolio", "add", "not a symbol"]).is_err());
    }

    #[test]
    fn test_cli_global_cache_dir() {
        let cli = Cli::parse_from(["stockfolio", "portfolio", "--cache-dir", "/tmp/sf"]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/sf")));
        assert_eq!(cli.command, Command::Portfolio);
    }

    #[test]
    fn test_cli_parse_cache_invalidate_namespaces() {
        let cli = Cli::parse_from([
            "stockfolio",
            "cache",
            "invalidate",
            "AAPL",
            "-n",
            "searchCache",
            "--namespace",
            "dividendCache",
        ]);
        assert_eq!(
            cli.command,
            Command::Cache(CacheCommand::Invalidate {
                key: "AAPL".to_string(),
                namespaces: vec!["searchCache".to_string(), "dividendCache".to_string()],
            })
        );
    }

    #[test]
    fn test_stocks_query_from_args() {
        let cli = Cli::parse_from([
            "stockfolio", "stocks", "--symbol", "AA", "--sort", "company", "--desc", "--page", "0",
        ]);
        let query = cli.command.stock_query().unwrap();
        assert_eq!(query.symbol, "AA");
        assert_eq!(query.sort_by, StockSortBy::CompanyName);
        assert!(query.descending);
        assert_eq!(query.page_number, 1);
        assert_eq!(query.page_size, 5);
    }

    #[test]
    fn test_stock_query_only_for_stocks() {
        let cli = Cli::parse_from(["stockfolio", "portfolio"]);
        assert!(cli.command.stock_query().is_none());
    }

    #[test]
    fn test_cli_parse_new_stock() {
        let cli = Cli::parse_from([
            "stockfolio", "new-stock", "--symbol", "ko", "--company", "Coca-Cola", "--purchase", "60.5",
        ]);
        let Command::NewStock(args) = &cli.command else {
            panic!("Expected new-stock, got {:?}", cli.command);
        };
        let form = StockForm::from(args);
        assert_eq!(form.symbol, "KO");
        assert_eq!(form.company_name, "Coca-Cola");
        assert_eq!(form.purchase, 60.5);
        assert_eq!(form.last_div, 0.0);
        assert_eq!(form.industry, "");
    }

    #[test]
    fn test_cli_parse_edit_note_attachments() {
        let cli = Cli::parse_from([
            "stockfolio", "edit-note", "3", "--title", "Thesis", "--content", "Cheap",
            "--attachment", "a.pdf", "--attachment", "b.png",
        ]);
        let Command::EditNote { id, note } = &cli.command else {
            panic!("Expected edit-note, got {:?}", cli.command);
        };
        assert_eq!(*id, 3);
        assert_eq!(NoteForm::from(note).file_path.as_deref(), Some("a.pdf,b.png"));
    }

    #[test]
    fn test_note_without_attachments_has_no_file_path() {
        let cli = Cli::parse_from(["stockfolio", "new-note", "aapl", "--title", "T", "--content", "C"]);
        let Command::NewNote { symbol, note } = &cli.command else {
            panic!("Expected new-note, got {:?}", cli.command);
        };
        assert_eq!(symbol, "AAPL");
        assert!(NoteForm::from(note).file_path.is_none());
    }
}
