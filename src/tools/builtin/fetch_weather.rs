//! Current weather for a location.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::WeatherConfig;
use crate::context::ToolContext;
use crate::tools::tool::{Tool, ToolError, ToolOutcome, parse_input, to_output};

/// Current conditions at a resolved location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_gust: f64,
    pub conditions: String,
    pub location: String,
}

/// Where weather data comes from.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, location: &str) -> Result<WeatherReport, ToolError>;
}

/// Open-Meteo geocoding plus forecast.
pub struct OpenMeteo {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    wind_gusts_10m: f64,
    weather_code: u16,
}

impl OpenMeteo {
    pub fn new(config: &WeatherConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ToolError::ExecutionFailed(format!("http client: {e}")))?;
        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("weather request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "weather service returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("invalid weather response: {e}")))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteo {
    async fn current(&self, location: &str) -> Result<WeatherReport, ToolError> {
        let geo: GeocodingResponse = self
            .get_json(
                &self.geocoding_url,
                &[("name", location.to_string()), ("count", "1".to_string())],
            )
            .await?;
        let place = geo
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::ExecutionFailed(format!("Location '{location}' not found")))?;

        let forecast: ForecastResponse = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", place.latitude.to_string()),
                    ("longitude", place.longitude.to_string()),
                    (
                        "current",
                        "temperature_2m,apparent_temperature,relative_humidity_2m,wind_speed_10m,wind_gusts_10m,weather_code"
                            .to_string(),
                    ),
                ],
            )
            .await?;

        let current = forecast.current;
        Ok(WeatherReport {
            temperature: current.temperature_2m,
            feels_like: current.apparent_temperature,
            humidity: current.relative_humidity_2m,
            wind_speed: current.wind_speed_10m,
            wind_gust: current.wind_gusts_10m,
            conditions: describe_weather_code(current.weather_code).to_string(),
            location: place.name,
        })
    }
}

/// WMO weather interpretation codes.
pub fn describe_weather_code(code: u16) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Input {
    location: String,
}

pub struct FetchWeatherTool {
    source: Arc<dyn WeatherSource>,
}

impl FetchWeatherTool {
    pub fn new(source: Arc<dyn WeatherSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for FetchWeatherTool {
    fn name(&self) -> &str {
        "fetchWeatherTool"
    }

    fn description(&self) -> &str {
        "Get current weather for a location"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "City name" }
            },
            "required": ["location"],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "temperature": { "type": "number" },
                "feelsLike": { "type": "number" },
                "humidity": { "type": "number" },
                "windSpeed": { "type": "number" },
                "windGust": { "type": "number" },
                "conditions": { "type": "string" },
                "location": { "type": "string" }
            }
        })
    }

    fn validate_input(&self, input: &Value) -> Result<(), ToolError> {
        let input: Input = parse_input(input)?;
        if input.location.trim().is_empty() {
            return Err(ToolError::InvalidParameters(
                "location must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let input: Input = parse_input(&input)?;
        let report = self.source.current(input.location.trim()).await?;
        to_output(&report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedWeather;

    #[async_trait]
    impl WeatherSource for FixedWeather {
        async fn current(&self, location: &str) -> Result<WeatherReport, ToolError> {
            if location == "Atlantis" {
                return Err(ToolError::ExecutionFailed("Location 'Atlantis' not found".into()));
            }
            Ok(WeatherReport {
                temperature: 21.5,
                feels_like: 20.0,
                humidity: 55.0,
                wind_speed: 10.0,
                wind_gust: 18.0,
                conditions: describe_weather_code(2).to_string(),
                location: location.to_string(),
            })
        }
    }

    fn tool() -> FetchWeatherTool {
        FetchWeatherTool::new(Arc::new(FixedWeather))
    }

    #[tokio::test]
    async fn returns_camel_case_report() {
        let outcome = tool()
            .execute(json!({"location": "Lisbon"}), &ToolContext::default())
            .await
            .unwrap();
        let ToolOutcome::Output(value) = outcome else {
            panic!("expected output");
        };
        assert_eq!(value["feelsLike"], 20.0);
        assert_eq!(value["windGust"], 18.0);
        assert_eq!(value["conditions"], "Partly cloudy");
        assert_eq!(value["location"], "Lisbon");
    }

    #[tokio::test]
    async fn unknown_location_is_an_execution_error() {
        let err = tool()
            .execute(json!({"location": "Atlantis"}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[test]
    fn input_requires_location() {
        assert!(tool().validate_input(&json!({})).is_err());
        assert!(tool().validate_input(&json!({"location": "  "})).is_err());
        assert!(tool().validate_input(&json!({"location": "Paris"})).is_ok());
        assert!(!tool().can_suspend());
    }

    #[test]
    fn weather_codes() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(95), "Thunderstorm");
        assert_eq!(describe_weather_code(1234), "Unknown");
    }
}
