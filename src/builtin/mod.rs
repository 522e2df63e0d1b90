//! Built-in mock domain tools
//!
//! Pure functions, JSON arguments in, formatted text out, no shared state.
//! Each tool carries its default marking so a manifest only has to export it.

mod calendar;
mod stock;
mod weather;

use crate::tools::HandlerTable;

/// Register every built-in tool in `table`
pub fn register_all(table: &mut HandlerTable) {
    for function in weather::tools()
        .into_iter()
        .chain(stock::tools())
        .chain(calendar::tools())
    {
        table.register(function);
    }
}

/// Read an integer argument, clamped to `[min, max]`, or fall back to `default`
pub(crate) fn int_arg(args: &serde_json::Value, name: &str, default: i64, min: i64, max: i64) -> i64 {
    args.get(name)
        .and_then(|v| v.as_i64())
        .unwrap_or(default)
        .clamp(min, max)
}
