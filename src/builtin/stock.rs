//! Mock stock market tools

use chrono::{Duration, Local};
use serde_json::Value;

use super::int_arg;
use crate::tools::{ToolFn, ToolOutput, ToolParam, tool};

struct Quote {
    symbol: &'static str,
    name: &'static str,
    price: f64,
    change: f64,
    change_percent: f64,
}

const QUOTES: [Quote; 3] = [
    Quote {
        symbol: "AAPL",
        name: "Apple Inc.",
        price: 175.43,
        change: 2.15,
        change_percent: 1.24,
    },
    Quote {
        symbol: "MSFT",
        name: "Microsoft Corporation",
        price: 378.85,
        change: -1.25,
        change_percent: -0.33,
    },
    Quote {
        symbol: "OPENAI",
        name: "OpenAI",
        price: 45.67,
        change: 0.89,
        change_percent: 1.99,
    },
];

/// Accepts tickers and the company shorthands ("apple", "microsoft")
fn lookup(symbol: &str) -> Option<&'static Quote> {
    let upper = symbol.trim().to_uppercase();
    let ticker = match upper.as_str() {
        "APPLE" => "AAPL",
        "MICROSOFT" => "MSFT",
        other => other,
    };
    QUOTES.iter().find(|q| q.symbol == ticker)
}

pub(super) fn tools() -> Vec<ToolFn> {
    vec![
        ToolFn::new("get_stock_price", get_stock_price)
            .with_doc("Get the current stock price for a given symbol.")
            .with_param(ToolParam::required(
                "symbol",
                "string",
                "The stock symbol to get the price for (e.g., AAPL, MSFT, OPENAI)",
            ))
            .mark(
                tool("stock")
                    .description("Get current stock price for a symbol")
                    .tags(["stock", "price", "market", "realtime"])
                    .mock(true),
            ),
        ToolFn::new("get_stock_history", get_stock_history)
            .with_doc("Get stock price history for a given symbol.")
            .with_param(ToolParam::required(
                "symbol",
                "string",
                "The stock symbol to get history for (e.g., AAPL, MSFT, OPENAI)",
            ))
            .with_param(ToolParam::optional("days", "integer", "Number of days of history to retrieve"))
            .mark(
                tool("stock")
                    .description("Get historical stock price data")
                    .tags(["stock", "history", "historical", "trend"])
                    .mock(true),
            ),
    ]
}

fn get_stock_price(args: &Value) -> ToolOutput {
    let symbol = args["symbol"].as_str().unwrap_or_default();
    let Some(quote) = lookup(symbol) else {
        return ToolOutput::error(format!(
            "❌ Stock symbol '{}' not found. Available stocks: AAPL (Apple), MSFT (Microsoft), OPENAI",
            symbol
        ));
    };

    let arrow = if quote.change >= 0.0 { "📈" } else { "📉" };
    ToolOutput::success(format!(
        "📊 **{} ({})**\n💰 **Current Price:** ${:.2}\n{} **Change:** ${:+.2} ({:+.2}%)\n🕐 **Last Updated:** {}",
        quote.name,
        quote.symbol,
        quote.price,
        arrow,
        quote.change,
        quote.change_percent,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ))
}

fn get_stock_history(args: &Value) -> ToolOutput {
    let symbol = args["symbol"].as_str().unwrap_or_default();
    let Some(quote) = lookup(symbol) else {
        return ToolOutput::error(format!(
            "❌ History not available for '{}'. Available stocks: AAPL, MSFT, OPENAI",
            symbol
        ));
    };
    let days = int_arg(args, "days", 7, 1, 365);

    let today = Local::now().date_naive();
    let prices: Vec<f64> = (0..days)
        .map(|i| quote.price - quote.change * i as f64 + ((i % 3) as f64 - 1.0) * 0.5)
        .collect();

    let lines: Vec<String> = prices
        .iter()
        .enumerate()
        .map(|(i, price)| {
            let date = today - Duration::days(i as i64);
            format!("📅 {}: ${:.2}", date.format("%Y-%m-%d"), price)
        })
        .collect();

    let newest = prices.first().copied().unwrap_or(quote.price);
    let oldest = prices.last().copied().unwrap_or(quote.price);
    let trend = if newest >= oldest { "Upward" } else { "Downward" };

    ToolOutput::success(format!(
        "📊 **{} ({}) - {} Day History**\n{}\n📈 **Trend:** {}",
        quote.name,
        quote.symbol,
        days,
        lines.join("\n"),
        trend
    ))
}
