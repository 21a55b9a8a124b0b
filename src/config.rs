use std::path::PathBuf;

use crate::engine::ReservationPolicy;

/// Process settings, read once from `COURTSIDE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub policy: ReservationPolicy,
    pub seed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            policy: ReservationPolicy::default(),
            seed: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            bind: lookup("COURTSIDE_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "COURTSIDE_PORT").unwrap_or(defaults.port),
            data_dir: lookup("COURTSIDE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parse_var(&lookup, "COURTSIDE_METRICS_PORT"),
            compact_threshold: parse_var(&lookup, "COURTSIDE_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            policy: ReservationPolicy {
                check_overlap_on_update: parse_var(&lookup, "COURTSIDE_CHECK_OVERLAP_ON_UPDATE")
                    .unwrap_or(defaults.policy.check_overlap_on_update),
            },
            seed: parse_var(&lookup, "COURTSIDE_SEED").unwrap_or(defaults.seed),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("courtside.wal")
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.wal_path(), PathBuf::from("./data/courtside.wal"));
        assert!(cfg.policy.check_overlap_on_update);
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("COURTSIDE_PORT", "9090"),
            ("COURTSIDE_DATA_DIR", "/var/lib/courtside"),
            ("COURTSIDE_METRICS_PORT", "9100"),
            ("COURTSIDE_COMPACT_THRESHOLD", "50"),
            ("COURTSIDE_CHECK_OVERLAP_ON_UPDATE", "false"),
            ("COURTSIDE_SEED", "true"),
        ]);
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 50);
        assert!(!cfg.policy.check_overlap_on_update);
        assert!(cfg.seed);
        assert_eq!(
            cfg.wal_path(),
            PathBuf::from("/var/lib/courtside/courtside.wal")
        );
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = config(&[("COURTSIDE_PORT", "http"), ("COURTSIDE_SEED", "yes")]);
        assert_eq!(cfg.port, 8080);
        assert!(!cfg.seed);
    }
}
