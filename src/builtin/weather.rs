//! Mock weather tools

use serde_json::Value;

use super::int_arg;
use crate::tools::{ToolFn, ToolOutput, ToolParam, tool};

const CONDITIONS: [&str; 4] = ["sunny", "cloudy", "rainy", "stormy"];

pub(super) fn tools() -> Vec<ToolFn> {
    vec![
        ToolFn::new("get_weather", get_weather)
            .with_doc("Get the current weather for a given location.")
            .with_param(ToolParam::required("location", "string", "The location to get the weather for."))
            .mark(
                tool("weather")
                    .description("Get current weather conditions for a location")
                    .tags(["weather", "current", "temperature", "conditions"])
                    .mock(true),
            ),
        ToolFn::new("get_forecast", get_forecast)
            .with_doc("Get weather forecast for multiple days.")
            .with_param(ToolParam::required("location", "string", "The location to get the forecast for."))
            .with_param(ToolParam::optional("days", "integer", "Number of days for forecast"))
            .mark(
                tool("weather")
                    .description("Get weather forecast for multiple days")
                    .tags(["weather", "forecast", "multi-day", "prediction"])
                    .mock(true),
            ),
    ]
}

fn get_weather(args: &Value) -> ToolOutput {
    let location = args["location"].as_str().unwrap_or_default();
    ToolOutput::success(format!(
        "The weather in {} is {} with a high of 22°C.",
        location, CONDITIONS[0]
    ))
}

fn get_forecast(args: &Value) -> ToolOutput {
    let location = args["location"].as_str().unwrap_or_default();
    let days = int_arg(args, "days", 3, 1, 7);

    let lines: Vec<String> = (1..=days)
        .map(|day| {
            let condition = CONDITIONS[day as usize % CONDITIONS.len()];
            format!("Day {}: {}, {}°C", day, condition, 18 + day)
        })
        .collect();

    ToolOutput::success(format!("Weather forecast for {}:\n{}", location, lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_weather() {
        let result = get_weather(&json!({"location": "London"}));
        assert!(!result.is_error);
        assert_eq!(result.content, "The weather in London is sunny with a high of 22°C.");
    }

    #[test]
    fn test_get_forecast_default_days() {
        let result = get_forecast(&json!({"location": "Paris"}));
        assert_eq!(
            result.content,
            "Weather forecast for Paris:\nDay 1: cloudy, 19°C\nDay 2: rainy, 20°C\nDay 3: stormy, 21°C"
        );
    }

    #[test]
    fn test_get_forecast_clamps_days() {
        let result = get_forecast(&json!({"location": "Oslo", "days": 40}));
        assert_eq!(result.content.lines().count(), 8);
    }

    #[test]
    fn test_marking() {
        let tools = tools();
        let forecast = tools.iter().find(|t| t.ident() == "get_forecast").unwrap();
        let metadata = forecast.metadata().unwrap();
        assert_eq!(metadata.id(), "weather.get_forecast");
        assert!(metadata.has_tag("forecast"));
        assert_eq!(metadata.signature.len(), 2);
    }

    #[test]
    fn test_missing_location_is_error_output() {
        let tools = tools();
        let weather = tools.iter().find(|t| t.ident() == "get_weather").unwrap();
        let result = weather.call(&json!({}));
        assert!(result.is_error);
    }
}
