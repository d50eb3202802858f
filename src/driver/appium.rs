//! Appium HTTP Client
//!
//! Thin W3C WebDriver client over the handful of endpoints the flow engine
//! needs. One client owns one session, created at connect time.

use super::gesture::PointerSequence;
use super::traits::{AutomationDriver, ElementId, Rect, Selector, Size};
use crate::error::{DriverError, DriverResult};
use crate::parser::types::GlobalSettings;
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Default Appium server URL
pub const DEFAULT_APPIUM_URL: &str = "http://127.0.0.1:4723";

/// W3C element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecc";

/// Session capabilities built from global settings
#[derive(Debug, Clone, Default)]
pub struct SessionCapabilities {
    values: Map<String, Value>,
}

impl SessionCapabilities {
    /// UiAutomator2 capabilities with environment overrides
    ///
    /// `DEVICE_NAME` and `DEVICE_UDID` take precedence over the configured
    /// device name and udid.
    pub fn from_settings(settings: &GlobalSettings) -> Self {
        Self::with_overrides(
            settings,
            std::env::var("DEVICE_NAME").ok(),
            std::env::var("DEVICE_UDID").ok(),
        )
    }

    pub fn with_overrides(
        settings: &GlobalSettings,
        device_name: Option<String>,
        udid: Option<String>,
    ) -> Self {
        let mut caps = Self::default();
        caps.set(
            "platformName",
            Value::from(settings.platform_name.as_deref().unwrap_or("Android")),
        );
        caps.set("appium:automationName", Value::from("UiAutomator2"));

        let device_name = device_name
            .filter(|v| !v.is_empty())
            .or_else(|| settings.device_name.clone());
        if let Some(name) = device_name {
            caps.set("appium:deviceName", Value::from(name));
        }
        let udid = udid
            .filter(|v| !v.is_empty())
            .or_else(|| settings.udid.clone());
        if let Some(udid) = udid {
            caps.set("appium:udid", Value::from(udid));
        }
        if let Some(ref pkg) = settings.app_package {
            caps.set("appium:appPackage", Value::from(pkg.as_str()));
        }
        if let Some(ref activity) = settings.app_activity {
            caps.set("appium:appActivity", Value::from(activity.as_str()));
        }
        caps.set(
            "appium:autoGrantPermissions",
            Value::from(settings.auto_grant_permissions),
        );
        caps.set("appium:noReset", Value::from(settings.no_reset));
        caps.set("appium:fullReset", Value::from(settings.full_reset));
        caps
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .get(name)
            .or_else(|| self.values.get(&format!("appium:{}", name)))
    }

    fn to_request(&self) -> Value {
        json!({ "capabilities": { "alwaysMatch": self.values } })
    }
}

/// Resolve the server URL: `APPIUM_URL` env, then settings, then the default
pub fn resolve_server_url(settings: &GlobalSettings) -> String {
    std::env::var("APPIUM_URL")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| settings.appium_url.clone())
        .unwrap_or_else(|| DEFAULT_APPIUM_URL.to_string())
}

#[derive(Debug, Deserialize)]
struct W3cResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct W3cError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Appium session client
pub struct AppiumDriver {
    base_url: String,
    client: reqwest::Client,
    session_id: String,
    capabilities: HashMap<String, String>,
}

impl AppiumDriver {
    /// Create a session on the server
    pub async fn connect(server_url: &str, caps: &SessionCapabilities) -> DriverResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DriverError::Request(format!("failed to create HTTP client: {}", e)))?;
        let base_url = server_url.trim_end_matches('/').to_string();

        log::info!("Creating session on {}", base_url);
        let resp = client
            .post(format!("{}/session", base_url))
            .json(&caps.to_request())
            .send()
            .await
            .map_err(|e| DriverError::Request(format!("failed to create session: {}", e)))?;
        let value = Self::unwrap_response(resp).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Request("no session ID in response".into()))?
            .to_string();

        let mut capabilities: HashMap<String, String> = caps
            .values
            .iter()
            .map(|(k, v)| (strip_vendor(k), value_to_string(v)))
            .collect();
        if let Some(granted) = value.get("capabilities").and_then(Value::as_object) {
            for (k, v) in granted {
                capabilities.insert(strip_vendor(k), value_to_string(v));
            }
        }

        log::info!("Session {} ready", session_id);
        Ok(Self {
            base_url,
            client,
            session_id,
            capabilities,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }

    async fn get(&self, path: &str) -> DriverResult<Value> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| DriverError::Request(e.to_string()))?;
        Self::unwrap_response(resp).await
    }

    async fn post(&self, path: &str, body: Value) -> DriverResult<Value> {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| DriverError::Request(e.to_string()))?;
        Self::unwrap_response(resp).await
    }

    async fn unwrap_response(resp: reqwest::Response) -> DriverResult<Value> {
        let status = resp.status();
        let body: W3cResponse = resp
            .json()
            .await
            .map_err(|e| DriverError::Request(format!("invalid response ({}): {}", status, e)))?;
        if status.is_success() {
            return Ok(body.value);
        }
        let err: W3cError = serde_json::from_value(body.value).unwrap_or(W3cError {
            error: "unknown error".into(),
            message: status.to_string(),
        });
        Err(map_w3c_error(&err.error, err.message))
    }

    fn element_path(element: &ElementId, suffix: &str) -> String {
        format!("/element/{}{}", element.0, suffix)
    }
}

fn strip_vendor(key: &str) -> String {
    key.strip_prefix("appium:").unwrap_or(key).to_string()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a W3C error code onto the driver error taxonomy
pub fn map_w3c_error(code: &str, message: String) -> DriverError {
    match code {
        "no such element" => DriverError::NoSuchElement(message),
        "stale element reference" => DriverError::StaleElement(message),
        "timeout" | "session not created" | "invalid session id" => {
            DriverError::Request(format!("{}: {}", code, message))
        }
        _ => DriverError::Other(format!("{}: {}", code, message)),
    }
}

fn parse_elements(value: Value) -> DriverResult<Vec<ElementId>> {
    let items = value
        .as_array()
        .ok_or_else(|| DriverError::Other("expected an element list".into()))?;
    Ok(items
        .iter()
        .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
        .map(|id| ElementId(id.to_string()))
        .collect())
}

#[async_trait]
impl AutomationDriver for AppiumDriver {
    async fn find_elements(&self, selector: &Selector) -> DriverResult<Vec<ElementId>> {
        let body = json!({ "using": selector.strategy(), "value": selector.value() });
        parse_elements(self.post("/elements", body).await?)
    }

    async fn find_elements_from(
        &self,
        root: &ElementId,
        selector: &Selector,
    ) -> DriverResult<Vec<ElementId>> {
        let body = json!({ "using": selector.strategy(), "value": selector.value() });
        parse_elements(
            self.post(&Self::element_path(root, "/elements"), body)
                .await?,
        )
    }

    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool> {
        let value = self.get(&Self::element_path(element, "/displayed")).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementId) -> DriverResult<bool> {
        let value = self.get(&Self::element_path(element, "/enabled")).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn rect(&self, element: &ElementId) -> DriverResult<Rect> {
        let value = self.get(&Self::element_path(element, "/rect")).await?;
        serde_json::from_value(value).map_err(|e| DriverError::Other(format!("bad rect: {}", e)))
    }

    async fn click(&self, element: &ElementId) -> DriverResult<()> {
        self.post(&Self::element_path(element, "/click"), json!({}))
            .await?;
        Ok(())
    }

    async fn script_click(&self, element: &ElementId) -> DriverResult<()> {
        let body = json!({
            "script": "mobile: clickGesture",
            "args": [{ "elementId": element.0 }],
        });
        self.post("/execute/sync", body).await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementId) -> DriverResult<()> {
        self.post(&Self::element_path(element, "/clear"), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()> {
        self.post(
            &Self::element_path(element, "/value"),
            json!({ "text": text }),
        )
        .await?;
        Ok(())
    }

    async fn perform_gesture(&self, gesture: &PointerSequence) -> DriverResult<()> {
        self.post("/actions", gesture.to_w3c_json()).await?;
        Ok(())
    }

    async fn window_size(&self) -> DriverResult<Size> {
        let value = self.get("/window/rect").await?;
        serde_json::from_value(value).map_err(|e| DriverError::Other(format!("bad size: {}", e)))
    }

    async fn page_source(&self) -> DriverResult<String> {
        let value = self.get("/source").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let value = self.get("/screenshot").await?;
        let encoded = value.as_str().unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Other(format!("failed to decode screenshot: {}", e)))
    }

    async fn hide_keyboard(&self) -> DriverResult<()> {
        self.post("/appium/device/hide_keyboard", json!({})).await?;
        Ok(())
    }

    async fn navigate_back(&self) -> DriverResult<()> {
        self.post("/back", json!({})).await?;
        Ok(())
    }

    async fn terminate_app(&self, app_id: &str) -> DriverResult<bool> {
        let value = self
            .post("/appium/device/terminate_app", json!({ "appId": app_id }))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn activate_app(&self, app_id: &str) -> DriverResult<()> {
        self.post("/appium/device/activate_app", json!({ "appId": app_id }))
            .await?;
        Ok(())
    }

    fn capability(&self, name: &str) -> Option<String> {
        self.capabilities.get(name).cloned()
    }

    async fn quit(&self) -> DriverResult<()> {
        self.client
            .delete(format!("{}/session/{}", self.base_url, self.session_id))
            .send()
            .await
            .map_err(|e| DriverError::Request(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> GlobalSettings {
        GlobalSettings {
            device_name: Some("Pixel 7".into()),
            app_package: Some("com.example.bank".into()),
            app_activity: Some(".MainActivity".into()),
            no_reset: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_capabilities_from_settings() {
        let caps = SessionCapabilities::with_overrides(&settings(), None, None);
        assert_eq!(caps.get("automationName"), Some(&Value::from("UiAutomator2")));
        assert_eq!(caps.get("deviceName"), Some(&Value::from("Pixel 7")));
        assert_eq!(caps.get("appPackage"), Some(&Value::from("com.example.bank")));
        assert_eq!(caps.get("noReset"), Some(&Value::from(true)));
        assert!(caps.get("udid").is_none());
    }

    #[test]
    fn test_env_overrides_win() {
        let caps = SessionCapabilities::with_overrides(
            &settings(),
            Some("emulator-5554".into()),
            Some("R58M123".into()),
        );
        assert_eq!(caps.get("deviceName"), Some(&Value::from("emulator-5554")));
        assert_eq!(caps.get("udid"), Some(&Value::from("R58M123")));
    }

    #[test]
    fn test_request_uses_always_match() {
        let caps = SessionCapabilities::with_overrides(&settings(), None, None);
        let body = caps.to_request();
        assert_eq!(
            body["capabilities"]["alwaysMatch"]["platformName"],
            "Android"
        );
    }

    #[test]
    fn test_error_mapping() {
        assert!(map_w3c_error("no such element", "x".into()).is_not_found());
        assert!(map_w3c_error("stale element reference", "x".into()).is_not_found());
        assert!(!map_w3c_error("unknown command", "x".into()).is_not_found());
    }

    #[test]
    fn test_parse_elements() {
        let value = json!([{ ELEMENT_KEY: "e1" }, { ELEMENT_KEY: "e2" }]);
        let ids = parse_elements(value).unwrap();
        assert_eq!(ids, vec![ElementId("e1".into()), ElementId("e2".into())]);
    }
}
