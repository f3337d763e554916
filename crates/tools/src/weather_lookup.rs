//! Fixed city-to-forecast table behind the `get_weather` action.
//!
//! Offline and deterministic, so weather scenarios run without network
//! access and give the same answer every time.

use async_trait::async_trait;
use loopwright_core::action::{Action, ActionOutput};
use loopwright_core::error::ActionError;

/// Known cities and their canned conditions.
const FORECASTS: &[(&str, &str)] = &[
    ("london", "London: 14°C, light rain, humidity 82%"),
    ("new york", "New York: 21°C, partly cloudy, humidity 60%"),
    ("paris", "Paris: 18°C, clear skies, humidity 55%"),
    ("san francisco", "San Francisco: 16°C, foggy, humidity 78%"),
    ("sydney", "Sydney: 24°C, sunny, humidity 48%"),
    ("tokyo", "Tokyo: 26°C, overcast, humidity 70%"),
];

pub struct GetWeatherAction;

impl GetWeatherAction {
    /// Look a city up, ignoring case and surrounding whitespace.
    pub fn forecast(city: &str) -> Option<&'static str> {
        let key = city.trim().to_lowercase();
        FORECASTS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, forecast)| *forecast)
    }
}

#[async_trait]
impl Action for GetWeatherAction {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city. Call once per city."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "The city name, e.g. \"Paris\""
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ActionOutput, ActionError> {
        let city = arguments["city"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'city' argument".into()))?;

        let forecast = Self::forecast(city).ok_or_else(|| ActionError::ExecutionFailed {
            action: "get_weather".into(),
            reason: format!("no weather data for '{city}'"),
        })?;

        Ok(ActionOutput::ok(forecast))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_city_returns_forecast() {
        let result = GetWeatherAction
            .execute(serde_json::json!({"city": "Paris"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "Paris: 18°C, clear skies, humidity 55%");
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(GetWeatherAction::forecast("  TOKYO "), GetWeatherAction::forecast("tokyo"));
        assert!(GetWeatherAction::forecast("New York").is_some());
    }

    #[tokio::test]
    async fn unknown_city_is_execution_failure() {
        let err = GetWeatherAction
            .execute(serde_json::json!({"city": "Atlantis"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Atlantis"));
    }

    #[tokio::test]
    async fn missing_city_argument() {
        let result = GetWeatherAction.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ActionError::InvalidArguments(_))));
    }
}
