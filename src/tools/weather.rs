use async_trait::async_trait;
use serde_json::Value;

use crate::llm::tools::ToolParam;
use crate::tools::{Tool, required_str_arg};

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

const NETWORK_ERROR_TEXT: &str = "Could not reach the weather service. Please try again.";

/// Current-weather lookup backed by the keyless Open-Meteo API.
///
/// Resolves the city through the geocoding endpoint first, then fetches
/// current conditions for the returned coordinates.
pub struct WeatherTool {
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn current_weather(&self, city: &str) -> Result<String, WeatherFailure> {
        let geo: Value = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await
            .map_err(|_| WeatherFailure::Network)?
            .json()
            .await
            .map_err(|_| WeatherFailure::Network)?;

        let result = geo["results"]
            .as_array()
            .and_then(|results| results.first())
            .ok_or(WeatherFailure::UnknownCity)?;
        let latitude = result["latitude"]
            .as_f64()
            .ok_or(WeatherFailure::UnknownCity)?;
        let longitude = result["longitude"]
            .as_f64()
            .ok_or(WeatherFailure::UnknownCity)?;

        let forecast: Value = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|_| WeatherFailure::Network)?
            .json()
            .await
            .map_err(|_| WeatherFailure::Network)?;

        let current = &forecast["current_weather"];
        let temperature = current["temperature"]
            .as_f64()
            .ok_or(WeatherFailure::Network)?;
        let windspeed = current["windspeed"].as_f64().unwrap_or(0.0);

        Ok(format!(
            "Weather in {city}: {temperature}°C, wind {windspeed} km/h (source: Open-Meteo)."
        ))
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

enum WeatherFailure {
    Network,
    UnknownCity,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Fetches the current weather for a given city. Use this tool only \
         when the user asks about the weather."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required_string(
            "city",
            "City name, e.g. 'Paris'.",
        )]
    }

    async fn invoke(&self, args: &Value) -> String {
        let city = match required_str_arg(args, "city") {
            Ok(city) => city,
            Err(reason) => return format!("Weather lookup failed: {reason}."),
        };

        match self.current_weather(&city).await {
            Ok(report) => report,
            Err(WeatherFailure::UnknownCity) => {
                format!("City '{city}' was not found by the weather service.")
            }
            Err(WeatherFailure::Network) => NETWORK_ERROR_TEXT.to_string(),
        }
    }
}
