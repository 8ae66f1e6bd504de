//! Rotina configuration system.
//!
//! TOML file with serde defaults, plus `ROTINA_*` environment overrides so
//! every threshold and window boundary can be changed at startup without
//! editing the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::clock::{parse_hhmm, TimeWindow, WindowSet};
use crate::error::{Result, RotinaError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotinaConfig {
    /// IANA zone the whole engine evaluates in (windows, dates, dedup keys).
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Max successful alerts per subject per local day, across all producers.
    #[serde(default = "default_daily_cap")]
    pub daily_cap: u32,
    #[serde(default)]
    pub finance: FinanceConfig,
    #[serde(default)]
    pub diet: DietConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub windows: WindowsConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_timezone() -> String {
    "America/Sao_Paulo".into()
}
fn default_daily_cap() -> u32 {
    3
}

impl Default for RotinaConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            daily_cap: default_daily_cap(),
            finance: FinanceConfig::default(),
            diet: DietConfig::default(),
            events: EventsConfig::default(),
            windows: WindowsConfig::default(),
            channel: ChannelConfig::default(),
            driver: DriverConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl RotinaConfig {
    /// Load from the default path (~/.rotina/config.toml), falling back to
    /// defaults when no file exists. Env overrides are applied either way.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RotinaError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RotinaError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".rotina")
    }

    /// Resolve the configured timezone against the IANA database.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|_| RotinaError::Config(format!("Unknown timezone '{}'", self.timezone)))
    }

    /// Build the resolved window set producers gate on.
    pub fn window_set(&self) -> Result<WindowSet> {
        let meals = self
            .windows
            .meals
            .iter()
            .map(|w| w.resolve())
            .collect::<Result<Vec<_>>>()?;
        Ok(WindowSet {
            meals,
            closing: self.windows.closing.resolve()?,
            morning: self.windows.morning.resolve()?,
        })
    }

    /// `ROTINA_*` env vars win over the file. Unparseable values are
    /// ignored with a warning rather than aborting startup.
    pub fn apply_env_overrides(&mut self) {
        env_str("ROTINA_TIMEZONE", &mut self.timezone);
        env_u32("ROTINA_DAILY_CAP", &mut self.daily_cap);
        env_f64("ROTINA_LOW_BALANCE_THRESHOLD", &mut self.finance.low_balance_threshold);
        env_f64("ROTINA_CATEGORY_ABS_THRESHOLD", &mut self.finance.category_abs_threshold);
        env_f64("ROTINA_CATEGORY_SHARE", &mut self.finance.category_share);
        env_u32("ROTINA_JUNK_REPEAT_MIN", &mut self.diet.junk_repeat_min);
        env_f64("ROTINA_PROTEIN_MIN_G", &mut self.diet.protein_min_g);
        env_u32("ROTINA_PROTEIN_AFTER_HOUR", &mut self.diet.protein_after_hour);
        env_i64("ROTINA_EVENT_LEAD_DAYS", &mut self.events.lead_days);
        env_i64("ROTINA_EVENT_TOLERANCE_MIN", &mut self.events.same_day_tolerance_min);
        env_i64("ROTINA_EVENT_HORIZON_DAYS", &mut self.events.horizon_days);
        env_str("ROTINA_COUNTRY_CODE", &mut self.channel.country_code);
        env_u64("ROTINA_SEND_TIMEOUT_SECS", &mut self.channel.send_timeout_secs);
        env_u64("ROTINA_PULSE_SECS", &mut self.driver.pulse_secs);
        env_str("ROTINA_DB_PATH", &mut self.store.db_path);
        if let Ok(v) = std::env::var("ROTINA_JUNK_KEYWORDS") {
            self.diet.junk_keywords = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("ROTINA_WHATSAPP_TOKEN") {
            self.channel.whatsapp.access_token = v;
        }
        if let Ok(v) = std::env::var("ROTINA_WHATSAPP_PHONE_ID") {
            self.channel.whatsapp.phone_number_id = v;
        }
        if let Ok(v) = std::env::var("ROTINA_WEBHOOK_URL") {
            self.channel.webhook.url = v;
        }
    }
}

fn env_str(name: &str, slot: &mut String) {
    if let Ok(v) = std::env::var(name) {
        *slot = v;
    }
}

fn env_u32(name: &str, slot: &mut u32) {
    env_parse(name, slot);
}

fn env_u64(name: &str, slot: &mut u64) {
    env_parse(name, slot);
}

fn env_i64(name: &str, slot: &mut i64) {
    env_parse(name, slot);
}

fn env_f64(name: &str, slot: &mut f64) {
    env_parse(name, slot);
}

fn env_parse<T: std::str::FromStr>(name: &str, slot: &mut T) {
    if let Ok(v) = std::env::var(name) {
        match v.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!("⚠️ Ignoring unparseable {name}='{v}'"),
        }
    }
}

/// Finance producer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceConfig {
    /// Low-balance alert fires when month-to-date balance ≤ this.
    #[serde(default = "default_low_balance")]
    pub low_balance_threshold: f64,
    /// Category spike: absolute monthly total that always alerts.
    #[serde(default = "default_category_abs")]
    pub category_abs_threshold: f64,
    /// Category spike: share of total monthly expenses that alerts.
    #[serde(default = "default_category_share")]
    pub category_share: f64,
}

fn default_low_balance() -> f64 {
    200.0
}
fn default_category_abs() -> f64 {
    800.0
}
fn default_category_share() -> f64 {
    0.4
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            low_balance_threshold: default_low_balance(),
            category_abs_threshold: default_category_abs(),
            category_share: default_category_share(),
        }
    }
}

/// Diet producer thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietConfig {
    /// Lowercased keywords counted against diary text.
    #[serde(default = "default_junk_keywords")]
    pub junk_keywords: Vec<String>,
    /// Occurrences in the last 7 days before the repeat alert fires.
    #[serde(default = "default_junk_repeat")]
    pub junk_repeat_min: u32,
    /// Fallback daily protein floor when the subject has no goal set.
    #[serde(default = "default_protein_min")]
    pub protein_min_g: f64,
    /// Low-protein is only evaluated from this local hour on.
    #[serde(default = "default_protein_after")]
    pub protein_after_hour: u32,
}

fn default_junk_keywords() -> Vec<String> {
    ["pizza", "hamburguer", "refrigerante", "salgadinho", "doce"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_junk_repeat() -> u32 {
    3
}
fn default_protein_min() -> f64 {
    60.0
}
fn default_protein_after() -> u32 {
    18
}

impl Default for DietConfig {
    fn default() -> Self {
        Self {
            junk_keywords: default_junk_keywords(),
            junk_repeat_min: default_junk_repeat(),
            protein_min_g: default_protein_min(),
            protein_after_hour: default_protein_after(),
        }
    }
}

/// Calendar reminder staging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Days before the event for the early stage (fires in the morning window).
    #[serde(default = "default_lead_days")]
    pub lead_days: i64,
    /// Same-day stage fires within ± this many minutes of the start instant.
    #[serde(default = "default_tolerance")]
    pub same_day_tolerance_min: i64,
    /// How far ahead the snapshot reads events.
    #[serde(default = "default_horizon")]
    pub horizon_days: i64,
}

fn default_lead_days() -> i64 {
    2
}
fn default_tolerance() -> i64 {
    10
}
fn default_horizon() -> i64 {
    3
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            lead_days: default_lead_days(),
            same_day_tolerance_min: default_tolerance(),
            horizon_days: default_horizon(),
        }
    }
}

/// A window in config form ("HH:MM" bounds, half-open).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowCfg {
    pub label: String,
    pub start: String,
    pub end: String,
}

impl WindowCfg {
    fn new(label: &str, start: &str, end: &str) -> Self {
        Self {
            label: label.into(),
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn resolve(&self) -> Result<TimeWindow> {
        let start = parse_hhmm(&self.start)
            .ok_or_else(|| RotinaError::Config(format!("Bad window start '{}'", self.start)))?;
        let end = parse_hhmm(&self.end)
            .ok_or_else(|| RotinaError::Config(format!("Bad window end '{}'", self.end)))?;
        if start >= end {
            return Err(RotinaError::Config(format!(
                "Window '{}' is empty or wraps midnight ({}–{})",
                self.label, self.start, self.end
            )));
        }
        Ok(TimeWindow::new(&self.label, start, end))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsConfig {
    #[serde(default = "default_meals")]
    pub meals: Vec<WindowCfg>,
    /// Late-evening window where daily goals are closed out.
    #[serde(default = "default_closing")]
    pub closing: WindowCfg,
    /// Morning window for day-relative reminders.
    #[serde(default = "default_morning")]
    pub morning: WindowCfg,
}

fn default_meals() -> Vec<WindowCfg> {
    vec![
        WindowCfg::new("Café da manhã", "07:00", "09:30"),
        WindowCfg::new("Almoço", "11:30", "14:00"),
        WindowCfg::new("Jantar", "19:00", "21:30"),
    ]
}
fn default_closing() -> WindowCfg {
    WindowCfg::new("Fechamento", "21:30", "22:30")
}
fn default_morning() -> WindowCfg {
    WindowCfg::new("Manhã", "08:00", "08:30")
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            meals: default_meals(),
            closing: default_closing(),
            morning: default_morning(),
        }
    }
}

/// Outbound channel selection + credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// "whatsapp" or "webhook".
    #[serde(default = "default_channel_kind")]
    pub kind: String,
    /// Prefix for bare local numbers ("55" = Brazil).
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    #[serde(default)]
    pub whatsapp: WhatsAppCfg,
    #[serde(default)]
    pub webhook: WebhookCfg,
}

fn default_channel_kind() -> String {
    "whatsapp".into()
}
fn default_country_code() -> String {
    "55".into()
}
fn default_send_timeout() -> u64 {
    10
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            kind: default_channel_kind(),
            country_code: default_country_code(),
            send_timeout_secs: default_send_timeout(),
            whatsapp: WhatsAppCfg::default(),
            webhook: WebhookCfg::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppCfg {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    /// Override for tests; empty means the Graph API default.
    #[serde(default)]
    pub api_base: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookCfg {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

/// Driver timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Pulse driver interval (minute-granularity producers).
    #[serde(default = "default_pulse")]
    pub pulse_secs: u64,
    /// Cron line for the morning driver (local time).
    #[serde(default = "default_morning_cron")]
    pub morning_cron: String,
    /// Cron line for the evening driver (local time).
    #[serde(default = "default_evening_cron")]
    pub evening_cron: String,
    /// A cycle completing less than this long ago suppresses the next fire
    /// (timer double-fire guard).
    #[serde(default = "default_min_gap")]
    pub min_gap_secs: u64,
    /// Minute-suppression entry lifetime; slightly over one minute.
    #[serde(default = "default_suppression_ttl")]
    pub suppression_ttl_secs: u64,
    /// Hard cap on the suppression set size.
    #[serde(default = "default_suppression_cap")]
    pub suppression_cap: usize,
}

fn default_pulse() -> u64 {
    60
}
fn default_morning_cron() -> String {
    "*/10 8 * * *".into()
}
fn default_evening_cron() -> String {
    "*/10 21,22 * * *".into()
}
fn default_min_gap() -> u64 {
    20
}
fn default_suppression_ttl() -> u64 {
    75
}
fn default_suppression_cap() -> usize {
    4096
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            pulse_secs: default_pulse(),
            morning_cron: default_morning_cron(),
            evening_cron: default_evening_cron(),
            min_gap_secs: default_min_gap(),
            suppression_ttl_secs: default_suppression_ttl(),
            suppression_cap: default_suppression_cap(),
        }
    }
}

/// Persistence locations and ledger table names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Preferred ledger table.
    #[serde(default = "default_ledger_table")]
    pub ledger_table: String,
    /// Legacy table tried when the primary lacks the minimum columns.
    #[serde(default = "default_ledger_fallback")]
    pub ledger_fallback_table: String,
}

fn default_db_path() -> String {
    "~/.rotina/rotina.db".into()
}
fn default_ledger_table() -> String {
    "alert_log".into()
}
fn default_ledger_fallback() -> String {
    "notification_log".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ledger_table: default_ledger_table(),
            ledger_fallback_table: default_ledger_fallback(),
        }
    }
}
