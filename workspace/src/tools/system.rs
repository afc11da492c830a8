//! system_info tool implementation.

use std::time::Duration;

use chrono::Local;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::process::Command;

use crate::config::Config;
use crate::error::{Result, WorkspaceError};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Upper bound for `df` to finish.
const DISK_USAGE_TIMEOUT_MS: u64 = 10_000;

/// Location used when a weather request names none.
pub const DEFAULT_WEATHER_LOCATION: &str = "Tokyo";

/// OpenWeatherMap current-weather endpoint.
const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

const MEMINFO_PATH: &str = "/proc/meminfo";

const CPUINFO_PATH: &str = "/proc/cpuinfo";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SystemCommand {
    DiskUsage,
    MemoryInfo,
    CpuInfo,
    CurrentTime,
    Weather,
}

/// Input for system_info tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SystemInfoInput {
    /// Information to retrieve: disk_usage, memory_info, cpu_info, current_time or weather.
    pub command: SystemCommand,

    /// City name for weather. Defaults to Tokyo.
    #[serde(default)]
    pub location: Option<String>,
}

/// Output for system_info tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SystemInfoOutput {
    pub command: SystemCommand,

    /// Human-readable report.
    pub report: String,

    /// Structured values behind the report, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Memory figures from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryInfo {
    pub total_kb: u64,
    pub available_kb: u64,
    pub free_kb: u64,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
    main: WeatherMain,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
    humidity: f64,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Handle the system_info tool call.
pub async fn handle_system_info(
    config: &Config,
    client: &reqwest::Client,
    params: Parameters<SystemInfoInput>,
) -> std::result::Result<Json<SystemInfoOutput>, McpError> {
    let input = params.0;
    let command = input.command;

    let result = match command {
        SystemCommand::DiskUsage => disk_usage().await,
        SystemCommand::MemoryInfo => memory_info(),
        SystemCommand::CpuInfo => Ok(cpu_info()),
        SystemCommand::CurrentTime => Ok(current_time()),
        SystemCommand::Weather => weather(config, client, input.location.as_deref()).await,
    };

    let (report, details) = result.map_err(|e| {
        tracing::debug!(?command, error = %e, "system_info failed");
        e.to_mcp_error()
    })?;

    Ok(Json(SystemInfoOutput {
        command,
        report,
        details,
    }))
}

async fn disk_usage() -> Result<(String, Option<Value>)> {
    let mut command = Command::new("df");
    command.arg("-h").kill_on_drop(true);

    let output = tokio::time::timeout(
        Duration::from_millis(DISK_USAGE_TIMEOUT_MS),
        command.output(),
    )
    .await
    .map_err(|_| WorkspaceError::CommandTimeout(DISK_USAGE_TIMEOUT_MS))?
    .map_err(|e| WorkspaceError::CommandFailed(format!("df: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WorkspaceError::CommandFailed(format!(
            "df exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    Ok((format!("Disk usage:\n{stdout}"), Some(json!({ "output": stdout }))))
}

fn memory_info() -> Result<(String, Option<Value>)> {
    let raw = std::fs::read_to_string(MEMINFO_PATH)
        .map_err(|_| WorkspaceError::Unsupported(format!("memory_info requires {MEMINFO_PATH}")))?;
    let info = parse_meminfo(&raw)
        .ok_or_else(|| WorkspaceError::Internal(format!("unexpected {MEMINFO_PATH} format")))?;

    let report = format!(
        "Memory: {:.1} GiB total, {:.1} GiB available, {:.1} GiB free",
        kib_to_gib(info.total_kb),
        kib_to_gib(info.available_kb),
        kib_to_gib(info.free_kb),
    );
    Ok((report, Some(serde_json::to_value(info)?)))
}

fn cpu_info() -> (String, Option<Value>) {
    let logical_cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let arch = std::env::consts::ARCH;
    let os = std::env::consts::OS;
    let model = std::fs::read_to_string(CPUINFO_PATH)
        .ok()
        .and_then(|raw| parse_cpu_model(&raw));

    let mut report = format!("CPU: {logical_cpus} logical core(s), {arch}, {os}");
    if let Some(model) = &model {
        report.push_str(&format!("\nModel: {model}"));
    }

    let details = json!({
        "logical_cpus": logical_cpus,
        "architecture": arch,
        "os": os,
        "model": model,
    });
    (report, Some(details))
}

fn current_time() -> (String, Option<Value>) {
    let now = Local::now();
    let local = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let details = json!({
        "local": local,
        "rfc3339": now.to_rfc3339(),
        "unix_ms": now.timestamp_millis(),
    });
    (format!("Current time: {local}"), Some(details))
}

async fn weather(
    config: &Config,
    client: &reqwest::Client,
    location: Option<&str>,
) -> Result<(String, Option<Value>)> {
    let location = location
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_WEATHER_LOCATION);

    let Some(api_key) = config.weather_api_key.as_deref() else {
        let report = format!(
            "An API key is required to get weather for {location}. Set OPENWEATHER_API_KEY to enable it."
        );
        return Ok((report, Some(json!({ "location": location, "available": false }))));
    };

    let timeout_ms = config.request_timeout_ms;
    let response = client
        .get(OPENWEATHER_URL)
        .query(&[("q", location), ("appid", api_key), ("units", "metric")])
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                WorkspaceError::RequestTimeout(timeout_ms)
            } else {
                WorkspaceError::RequestFailed(e.without_url().to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(WorkspaceError::RequestFailed(format!(
            "weather service returned HTTP {} for {}",
            status.as_u16(),
            location
        )));
    }

    let data: WeatherResponse = response
        .json()
        .await
        .map_err(|e| WorkspaceError::RequestFailed(e.to_string()))?;

    Ok(describe_weather(location, &data))
}

fn describe_weather(location: &str, data: &WeatherResponse) -> (String, Option<Value>) {
    let place = data.name.as_deref().unwrap_or(location);
    let description = data
        .weather
        .first()
        .map(|w| w.description.as_str())
        .unwrap_or("unknown");

    let report = format!(
        "Weather in {place}: {description}, {:.1}°C, humidity {:.0}%",
        data.main.temp, data.main.humidity
    );
    let details = json!({
        "location": place,
        "available": true,
        "description": description,
        "temperature_c": data.main.temp,
        "humidity": data.main.humidity,
    });
    (report, Some(details))
}

/// Extract total, available and free memory from `/proc/meminfo` text.
fn parse_meminfo(raw: &str) -> Option<MemoryInfo> {
    let field = |name: &str| {
        raw.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse::<u64>().ok()
        })
    };

    let total_kb = field("MemTotal")?;
    let free_kb = field("MemFree")?;
    // Kernels before 3.14 have no MemAvailable.
    let available_kb = field("MemAvailable").unwrap_or(free_kb);

    Some(MemoryInfo {
        total_kb,
        available_kb,
        free_kb,
    })
}

fn parse_cpu_model(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

fn kib_to_gib(kb: u64) -> f64 {
    kb as f64 / (1024.0 * 1024.0)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16303428 kB
MemFree:         1218140 kB
MemAvailable:    9418500 kB
Buffers:          512000 kB
";

    #[test]
    fn test_parse_meminfo() {
        let info = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(info.total_kb, 16_303_428);
        assert_eq!(info.free_kb, 1_218_140);
        assert_eq!(info.available_kb, 9_418_500);
    }

    #[test]
    fn test_parse_meminfo_without_available() {
        let info = parse_meminfo("MemTotal: 100 kB\nMemFree: 40 kB\n").unwrap();
        assert_eq!(info.available_kb, 40);
    }

    #[test]
    fn test_parse_meminfo_garbage() {
        assert!(parse_meminfo("nothing useful").is_none());
        assert!(parse_meminfo("MemTotalX: 1 kB\nMemFree: 1 kB").is_none());
    }

    #[test]
    fn test_parse_cpu_model() {
        let raw = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU\n";
        assert_eq!(parse_cpu_model(raw).as_deref(), Some("Intel(R) Xeon(R) CPU"));
        assert!(parse_cpu_model("processor: 0\n").is_none());
    }

    #[test]
    fn test_kib_to_gib() {
        assert_eq!(kib_to_gib(1024 * 1024), 1.0);
    }

    #[test]
    fn test_cpu_info_reports_parallelism() {
        let (report, details) = cpu_info();
        let details = details.unwrap();
        assert!(report.starts_with("CPU: "));
        assert!(details["logical_cpus"].as_u64().unwrap() >= 1);
        assert_eq!(details["architecture"], std::env::consts::ARCH);
    }

    #[test]
    fn test_current_time_format() {
        let (report, details) = current_time();
        let details = details.unwrap();
        let local = details["local"].as_str().unwrap();

        assert!(report.ends_with(local));
        assert!(chrono::NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(details["rfc3339"].as_str().unwrap()).is_ok());
        assert!(details["unix_ms"].as_i64().unwrap() > 1_600_000_000_000);
    }

    #[test]
    fn test_describe_weather() {
        let data: WeatherResponse = serde_json::from_value(json!({
            "name": "Osaka",
            "weather": [{ "description": "light rain" }],
            "main": { "temp": 18.34, "humidity": 81 }
        }))
        .unwrap();

        let (report, details) = describe_weather("osaka", &data);
        assert_eq!(report, "Weather in Osaka: light rain, 18.3°C, humidity 81%");
        assert_eq!(details.unwrap()["description"], "light rain");
    }

    #[tokio::test]
    async fn test_weather_without_key_is_informational() {
        let config = Config::default();
        let client = reqwest::Client::new();

        let (report, details) = weather(&config, &client, None).await.unwrap();
        assert!(report.contains("Tokyo"));
        assert!(report.contains("OPENWEATHER_API_KEY"));
        assert_eq!(details.unwrap()["available"], false);

        let (report, _) = weather(&config, &client, Some("  Paris ")).await.unwrap();
        assert!(report.contains("Paris"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memory_info_on_linux() {
        let (report, details) = memory_info().unwrap();
        assert!(report.starts_with("Memory: "));
        assert!(details.unwrap()["total_kb"].as_u64().unwrap() > 0);
    }
}
