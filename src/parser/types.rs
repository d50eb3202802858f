use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root of `test-config.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    /// category -> name -> locator
    #[serde(default)]
    pub locators: Option<HashMap<String, HashMap<String, LocatorConfig>>>,

    #[serde(default)]
    pub global_settings: GlobalSettings,

    #[serde(default)]
    pub test_data_sets: Vec<TestDataSet>,

    #[serde(default)]
    pub flows: Vec<TestFlow>,

    #[serde(default)]
    pub suite_executions: Vec<SuiteExecution>,
}

impl TestConfig {
    pub fn data_set(&self, name: &str) -> Option<&TestDataSet> {
        self.test_data_sets.iter().find(|d| d.data_set_name == name)
    }

    pub fn flow(&self, name: &str) -> Option<&TestFlow> {
        self.flows.iter().find(|f| f.flow_name == name)
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteExecution> {
        self.suite_executions.iter().find(|s| s.suite_name == name)
    }
}

/// Session and timeout settings shared by every suite
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    #[serde(default)]
    pub appium_url: Option<String>,

    #[serde(default)]
    pub platform_name: Option<String>,

    #[serde(default)]
    pub device_name: Option<String>,

    #[serde(default)]
    pub udid: Option<String>,

    #[serde(default)]
    pub app_package: Option<String>,

    #[serde(default)]
    pub app_activity: Option<String>,

    #[serde(default)]
    pub auto_grant_permissions: bool,

    #[serde(default)]
    pub no_reset: bool,

    #[serde(default)]
    pub full_reset: bool,

    /// Free-form timeouts (`implicit`, `explicit` in seconds, `polling` in ms)
    #[serde(default)]
    pub timeouts: HashMap<String, serde_json::Value>,
}

impl GlobalSettings {
    /// Look up a setting by case-insensitive key
    pub fn setting(&self, key: &str) -> Option<&str> {
        let value = match key.to_lowercase().as_str() {
            "appiumurl" => &self.appium_url,
            "platformname" => &self.platform_name,
            "devicename" => &self.device_name,
            "udid" => &self.udid,
            "apppackage" => &self.app_package,
            "appactivity" => &self.app_activity,
            _ => return None,
        };
        value.as_deref()
    }

    /// Numeric timeout entry; numbers and numeric strings are accepted
    pub fn timeout(&self, key: &str) -> Option<u64> {
        match self.timeouts.get(key)? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Locator entry in the locator table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatorConfig {
    /// Selector kind (`id`, `xpath`, `class_name`, `accessibility_id`, `android_uiautomator`)
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    pub value: String,

    /// Alternatives tried in order when the primary selector fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<LocatorConfig>,

    /// Visible label near the element, for label-relative search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Widget class searched relative to the label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_target: Option<String>,
}

/// Named key/value data substituted into action values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDataSet {
    pub data_set_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub data: HashMap<String, String>,
}

/// A reusable business scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFlow {
    pub flow_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub steps: Vec<ExecutionStep>,
}

/// A data set plus ordered flows, run as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteExecution {
    pub suite_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub data_set_ref: String,

    #[serde(default)]
    pub flow_refs: Vec<String>,

    #[serde(default)]
    pub reset_after: bool,
}

/// One step of a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub step_name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub action_steps: Vec<ActionStep>,

    /// Legacy page/action pair, accepted but not executed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl ExecutionStep {
    pub fn is_legacy(&self) -> bool {
        self.action_steps.is_empty() && (self.page.is_some() || self.action.is_some())
    }
}

/// One declarative UI action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub action_type: ActionKind,

    #[serde(default)]
    pub locator_category: Option<String>,

    #[serde(default)]
    pub locator_name: Option<String>,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub params: HashMap<String, ParamValue>,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub description: Option<String>,
}

impl ActionStep {
    pub fn new(action_type: ActionKind) -> Self {
        Self {
            action_type,
            locator_category: None,
            locator_name: None,
            value: None,
            params: HashMap::new(),
            optional: false,
            description: None,
        }
    }

    pub fn param_i64(&self, name: &str, default: i64) -> i64 {
        match self.params.get(name) {
            Some(ParamValue::Int(v)) => *v,
            Some(ParamValue::Float(v)) => *v as i64,
            Some(ParamValue::Text(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Non-negative integer parameter (durations, counts)
    pub fn param_u64(&self, name: &str, default: u64) -> u64 {
        let value = self.param_i64(name, default as i64);
        u64::try_from(value).unwrap_or(default)
    }

    pub fn param_str(&self, name: &str, default: &str) -> String {
        match self.params.get(name) {
            Some(ParamValue::Text(s)) => s.clone(),
            Some(ParamValue::Int(v)) => v.to_string(),
            Some(ParamValue::Float(v)) => v.to_string(),
            Some(ParamValue::Bool(b)) => b.to_string(),
            None => default.to_string(),
        }
    }

    pub fn param_bool(&self, name: &str, default: bool) -> bool {
        match self.params.get(name) {
            Some(ParamValue::Bool(b)) => *b,
            Some(ParamValue::Text(s)) => s.eq_ignore_ascii_case("true"),
            Some(ParamValue::Int(v)) => *v != 0,
            _ => default,
        }
    }

    /// Human-readable label for console output
    pub fn display_name(&self) -> String {
        match (&self.locator_category, &self.locator_name) {
            (Some(cat), Some(name)) => {
                format!("{} {}.{}", self.action_type.name(), cat, name)
            }
            _ => self.action_type.name().to_string(),
        }
    }
}

/// Parameter value: number, string or boolean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Closed set of supported actions; anything else is kept as `Unknown`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Click,
    SendKeys,
    Clear,
    Scroll,
    ScrollToElement,
    Swipe,
    Wait,
    WaitForVisible,
    WaitForClickable,
    Tap,
    LongTap,
    HideKeyboard,
    GoBack,
    Unknown(String),
}

impl ActionKind {
    pub fn name(&self) -> &str {
        match self {
            ActionKind::Click => "click",
            ActionKind::SendKeys => "sendKeys",
            ActionKind::Clear => "clear",
            ActionKind::Scroll => "scroll",
            ActionKind::ScrollToElement => "scrollToElement",
            ActionKind::Swipe => "swipe",
            ActionKind::Wait => "wait",
            ActionKind::WaitForVisible => "waitForVisible",
            ActionKind::WaitForClickable => "waitForClickable",
            ActionKind::Tap => "tap",
            ActionKind::LongTap => "longTap",
            ActionKind::HideKeyboard => "hideKeyboard",
            ActionKind::GoBack => "goBack",
            ActionKind::Unknown(raw) => raw,
        }
    }

    /// Whether the action operates on a located element
    pub fn needs_locator(&self) -> bool {
        matches!(
            self,
            ActionKind::Click
                | ActionKind::SendKeys
                | ActionKind::Clear
                | ActionKind::ScrollToElement
                | ActionKind::WaitForVisible
                | ActionKind::WaitForClickable
                | ActionKind::Tap
                | ActionKind::LongTap
        )
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        match raw.to_lowercase().as_str() {
            "click" => ActionKind::Click,
            "sendkeys" | "entertext" => ActionKind::SendKeys,
            "clear" => ActionKind::Clear,
            "scroll" => ActionKind::Scroll,
            "scrolltoelement" => ActionKind::ScrollToElement,
            "swipe" => ActionKind::Swipe,
            "wait" => ActionKind::Wait,
            "waitforvisible" => ActionKind::WaitForVisible,
            "waitforclickable" => ActionKind::WaitForClickable,
            "tap" => ActionKind::Tap,
            "longtap" => ActionKind::LongTap,
            "hidekeyboard" => ActionKind::HideKeyboard,
            "goback" => ActionKind::GoBack,
            _ => ActionKind::Unknown(raw),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.name().to_string()
    }
}

fn default_true() -> bool {
    true
}
