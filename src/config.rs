use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use log::{info, warn};

use crate::corners::{CORNER_COUNT, CornerSelector};
use crate::distance::DepthSampling;
use crate::planner::PlannerConfig;
use crate::tracker::TrackerConfig;

/// Complete service configuration, loaded from environment variables or default values.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
    pub tracker: TrackerConfig,
    pub corners: CornerSelector,
    pub depth: DepthSampling,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: planner_from_env(),
            tracker: tracker_from_env(),
            corners: corners_from_env(),
            depth: depth_from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            display_host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "BOXFIT_API_HOST";
    const PORT_VAR: &'static str = "BOXFIT_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let defaults = Self::default();

        let (bind_ip, display_host) = match host {
            Some(host_value) => match host_value.parse::<IpAddr>() {
                Ok(ip) => (ip, host_value),
                Err(err) => {
                    warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::HOST_VAR,
                        host_value,
                        err,
                        Self::DEFAULT_HOST
                    );
                    (defaults.bind_ip, defaults.display_host.clone())
                }
            },
            None => (defaults.bind_ip, defaults.display_host.clone()),
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!("{} must not be 0. Using {}.", Self::PORT_VAR, Self::DEFAULT_PORT);
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

fn planner_from_env() -> PlannerConfig {
    let support_ratio = load_f64_with_warning(
        "BOXFIT_PLANNER_SUPPORT_RATIO",
        PlannerConfig::DEFAULT_SUPPORT_RATIO,
        |value| (0.0..=1.0).contains(&value),
        "must be between 0 and 1",
        "Adjusted minimum support may lead to unstable stacks",
    );

    let grid_step = load_f64_with_warning(
        "BOXFIT_PLANNER_GRID_STEP",
        PlannerConfig::DEFAULT_GRID_STEP,
        is_valid_grid_step,
        "must be 0 or at least 0.5",
        "Grid positions slow down planning for large box counts",
    );

    let general_epsilon = load_f64_with_warning(
        "BOXFIT_PLANNER_EPSILON",
        PlannerConfig::DEFAULT_GENERAL_EPSILON,
        |value| value > 0.0,
        "must be greater than 0",
        "Adjusted tolerances may cause numerical instabilities",
    );

    let allow_rotations = load_bool(
        "BOXFIT_PLANNER_ALLOW_ROTATIONS",
        PlannerConfig::DEFAULT_ALLOW_ROTATIONS,
    );
    let largest_first = load_bool(
        "BOXFIT_PLANNER_LARGEST_FIRST",
        PlannerConfig::DEFAULT_LARGEST_FIRST,
    );

    PlannerConfig::builder()
        .support_ratio(support_ratio)
        .grid_step(grid_step)
        .general_epsilon(general_epsilon)
        .allow_rotations(allow_rotations)
        .largest_first(largest_first)
        .build()
}

fn tracker_from_env() -> TrackerConfig {
    TrackerConfig {
        max_history: load_parsed(
            "BOXFIT_TRACKER_MAX_HISTORY",
            TrackerConfig::DEFAULT_MAX_HISTORY,
            |value| value > 0,
            "must be greater than 0",
        ),
        lost_timeout_ms: load_parsed(
            "BOXFIT_TRACKER_LOST_TIMEOUT_MS",
            TrackerConfig::DEFAULT_LOST_TIMEOUT_MS,
            |value| value > 0,
            "must be greater than 0",
        ),
        min_samples: load_parsed(
            "BOXFIT_TRACKER_MIN_SAMPLES",
            TrackerConfig::DEFAULT_MIN_SAMPLES,
            |_| true,
            "",
        ),
        iqr_factor: load_f64_with_warning(
            "BOXFIT_TRACKER_IQR_FACTOR",
            TrackerConfig::DEFAULT_IQR_FACTOR,
            |value| value > 0.0,
            "must be greater than 0",
            "A narrow IQR fence discards valid measurements",
        ),
    }
}

fn corners_from_env() -> CornerSelector {
    CornerSelector::new(load_parsed(
        "BOXFIT_CORNERS_MAX_CANDIDATES",
        CornerSelector::DEFAULT_MAX_CANDIDATES,
        |value| (CORNER_COUNT..=CornerSelector::MAX_CANDIDATES_LIMIT).contains(&value),
        "must be between 6 and 20",
    ))
}

fn depth_from_env() -> DepthSampling {
    DepthSampling {
        distance_factor: load_f64_with_warning(
            "BOXFIT_DISTANCE_FACTOR",
            DepthSampling::DEFAULT_DISTANCE_FACTOR,
            |value| value > 0.0,
            "must be greater than 0",
            "Distance calibration factor changed",
        ),
        to_centimeter: load_f64_with_warning(
            "BOXFIT_DISTANCE_TO_CENTIMETER",
            DepthSampling::DEFAULT_TO_CENTIMETER,
            |value| value > 0.0,
            "must be greater than 0",
            "Depth unit conversion changed",
        ),
        window: load_parsed(
            "BOXFIT_DEPTH_WINDOW",
            DepthSampling::DEFAULT_WINDOW,
            |value| value <= DepthSampling::MAX_WINDOW,
            "must be between 0 and 64",
        ),
        iqr_sigma: load_f64_with_warning(
            "BOXFIT_DEPTH_IQR_SIGMA",
            DepthSampling::DEFAULT_IQR_SIGMA,
            |value| value > 0.0,
            "must be greater than 0",
            "Depth outlier fence changed",
        ),
    }
}

/// 0 disables the grid; smaller steps would explode the candidate count.
fn is_valid_grid_step(value: f64) -> bool {
    value == 0.0 || value >= PlannerConfig::MIN_GRID_STEP
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_bool(var_name: &str, default: bool) -> bool {
    env_string(var_name)
        .and_then(|raw| parse_bool(&raw, var_name))
        .unwrap_or(default)
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && validator(value) => {
                let tolerance = (default.abs().max(1.0)) * 1e-9;
                if (value - default).abs() > tolerance {
                    info!("{} ({} = {}).", notice, var_name, value);
                }
                value
            }
            Ok(_) => {
                warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

fn load_parsed<T>(var_name: &str, default: T, validator: impl Fn(T) -> bool, invalid_hint: &str) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env_string(var_name) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) if validator(value) => value,
            Ok(_) => {
                warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(name: &str, value: &str) {
        // Every test uses its own variable names.
        unsafe { env::set_var(name, value) };
    }

    #[test]
    fn test_parse_bool_true_values() {
        for raw in ["1", "true", "yes", "y", "on", "TRUE", "Yes", "ON", " true ", "  1  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(true), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_bool_false_values() {
        for raw in ["0", "false", "no", "n", "off", "FALSE", "No", "OFF", " false ", "  0  "] {
            assert_eq!(parse_bool(raw, "TEST_VAR"), Some(false), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn float_values_fall_back_when_invalid() {
        set("BOXFIT_TEST_RATIO_OK", "0.8");
        set("BOXFIT_TEST_RATIO_RANGE", "1.5");
        set("BOXFIT_TEST_RATIO_GARBAGE", "abc");
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);

        assert_eq!(load_f64_with_warning("BOXFIT_TEST_RATIO_OK", 0.6, in_unit, "", ""), 0.8);
        assert_eq!(load_f64_with_warning("BOXFIT_TEST_RATIO_RANGE", 0.6, in_unit, "", ""), 0.6);
        assert_eq!(load_f64_with_warning("BOXFIT_TEST_RATIO_GARBAGE", 0.6, in_unit, "", ""), 0.6);
        assert_eq!(load_f64_with_warning("BOXFIT_TEST_RATIO_UNSET", 0.6, in_unit, "", ""), 0.6);
    }

    #[test]
    fn integer_values_fall_back_when_invalid() {
        set("BOXFIT_TEST_HISTORY_OK", " 50 ");
        set("BOXFIT_TEST_HISTORY_ZERO", "0");
        set("BOXFIT_TEST_HISTORY_NEGATIVE", "-3");

        assert_eq!(load_parsed("BOXFIT_TEST_HISTORY_OK", 100usize, |v| v > 0, ""), 50);
        assert_eq!(load_parsed("BOXFIT_TEST_HISTORY_ZERO", 100usize, |v| v > 0, ""), 100);
        assert_eq!(load_parsed("BOXFIT_TEST_HISTORY_NEGATIVE", 100usize, |v| v > 0, ""), 100);
    }

    #[test]
    fn grid_step_is_zero_or_coarse_enough() {
        assert!(is_valid_grid_step(0.0));
        assert!(is_valid_grid_step(0.5));
        assert!(is_valid_grid_step(10.0));
        assert!(!is_valid_grid_step(1e-5));
        assert!(!is_valid_grid_step(-1.0));

        set("BOXFIT_TEST_GRID_TINY", "0.00001");
        assert_eq!(load_f64_with_warning("BOXFIT_TEST_GRID_TINY", 0.0, is_valid_grid_step, "", ""), 0.0);
    }

    #[test]
    fn depth_window_is_bounded() {
        set("BOXFIT_TEST_WINDOW_OK", "64");
        set("BOXFIT_TEST_WINDOW_HUGE", "18446744073709551615");
        let bounded = |v: usize| v <= DepthSampling::MAX_WINDOW;

        assert_eq!(load_parsed("BOXFIT_TEST_WINDOW_OK", 11usize, bounded, ""), 64);
        assert_eq!(load_parsed("BOXFIT_TEST_WINDOW_HUGE", 11usize, bounded, ""), 11);
    }

    #[test]
    fn api_config_parses_host_and_port() {
        let config = ApiConfig::from_values(Some("127.0.0.1".into()), Some("9000".into()));
        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert!(!config.binds_to_all_interfaces());

        let fallback = ApiConfig::from_values(Some("not-an-ip".into()), Some("0".into()));
        assert_eq!(fallback.display_host(), "0.0.0.0");
        assert_eq!(fallback.port(), 8080);
        assert!(fallback.binds_to_all_interfaces());
    }

    #[test]
    fn defaults_match_library_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.tracker.max_history, TrackerConfig::DEFAULT_MAX_HISTORY);
        assert_eq!(config.corners.max_candidates, CornerSelector::DEFAULT_MAX_CANDIDATES);
        assert_eq!(config.planner.support_ratio, PlannerConfig::DEFAULT_SUPPORT_RATIO);
        assert_eq!(config.api.port(), 8080);
    }
}
