use std::path::PathBuf;

use tracing::warn;

pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api";
const CACHE_DIR_NAME: &str = "tasknotes-alfred";
const CACHE_DIR_VARS: [&str; 2] = ["alfred_workflow_cache", "ALFRED_WORKFLOW_CACHE"];

/// Tunables for the stale-while-revalidate task list cache, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskCacheSettings {
    pub ttl: f64,
    pub max_stale: f64,
    pub refresh_backoff: f64,
    pub rerun: f64,
}

impl Default for TaskCacheSettings {
    fn default() -> Self {
        Self {
            ttl: 5.0,
            max_stale: 600.0,
            refresh_backoff: 5.0,
            rerun: 0.4,
        }
    }
}

/// TTLs for the single-entry snapshot caches, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotSettings {
    pub active_session_ttl: f64,
    pub task_detail_ttl: f64,
    pub pomodoro_ttl: f64,
    pub pomodoro_max_stale: f64,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            active_session_ttl: 1.0,
            task_detail_ttl: 2.0,
            pomodoro_ttl: 1.0,
            pomodoro_max_stale: 3600.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base: String,
    pub token: Option<String>,
    pub fetch_limit: usize,
    pub return_limit: usize,
    pub subtitle_fields: Vec<String>,
    pub task_cache: TaskCacheSettings,
    pub snapshots: SnapshotSettings,
    pub cache_dir: PathBuf,
    /// `MODE=create_only`
    pub create_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            fetch_limit: 400,
            return_limit: 50,
            subtitle_fields: csv_fields("due,scheduled,projects"),
            task_cache: TaskCacheSettings::default(),
            snapshots: SnapshotSettings::default(),
            cache_dir: std::env::temp_dir().join(CACHE_DIR_NAME),
            create_only: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any variable source. Alfred hands workflow
    /// variables to the process as environment variables.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let task_cache = TaskCacheSettings {
            ttl: seconds(&var, "TASK_CACHE_TTL_SECONDS", defaults.task_cache.ttl),
            max_stale: seconds(
                &var,
                "TASK_CACHE_MAX_STALE_SECONDS",
                defaults.task_cache.max_stale,
            ),
            refresh_backoff: seconds(
                &var,
                "TASK_CACHE_REFRESH_BACKOFF_SECONDS",
                defaults.task_cache.refresh_backoff,
            ),
            rerun: seconds(&var, "TASK_CACHE_RERUN_SECONDS", defaults.task_cache.rerun),
        };

        let snapshots = SnapshotSettings {
            active_session_ttl: seconds(
                &var,
                "TIME_ACTIVE_CACHE_TTL_SECONDS",
                defaults.snapshots.active_session_ttl,
            ),
            task_detail_ttl: seconds(
                &var,
                "TASK_DETAIL_CACHE_TTL_SECONDS",
                defaults.snapshots.task_detail_ttl,
            ),
            pomodoro_ttl: seconds(
                &var,
                "POMODORO_CACHE_TTL_SECONDS",
                defaults.snapshots.pomodoro_ttl,
            ),
            pomodoro_max_stale: seconds(
                &var,
                "POMODORO_CACHE_MAX_STALE_SECONDS",
                defaults.snapshots.pomodoro_max_stale,
            ),
        };

        let cache_dir = CACHE_DIR_VARS
            .iter()
            .find_map(|key| var(*key))
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        Settings {
            api_base: var("TASKNOTES_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            token: var("TASKNOTES_TOKEN"),
            fetch_limit: count(&var, "TASK_FETCH_LIMIT", defaults.fetch_limit),
            return_limit: count(&var, "TASK_RETURN_LIMIT", defaults.return_limit),
            subtitle_fields: var("TASK_SUBTITLE_FIELDS")
                .map(|fields| csv_fields(&fields))
                .unwrap_or(defaults.subtitle_fields),
            task_cache,
            snapshots,
            cache_dir,
            create_only: var("MODE").is_some_and(|mode| mode.eq_ignore_ascii_case("create_only")),
        }
    }
}

fn csv_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|field| field.trim().to_lowercase())
        .filter(|field| !field.is_empty())
        .collect()
}

fn seconds<V>(var: &V, key: &str, default: f64) -> f64
where
    V: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => {
            warn!(key, value = %raw, default, "ignoring invalid duration");
            default
        }
    }
}

fn count<V>(var: &V, key: &str, default: usize) -> usize
where
    V: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(key, value = %raw, default, "ignoring invalid count");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]);

        assert_eq!(settings.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.token, None);
        assert_eq!(settings.fetch_limit, 400);
        assert_eq!(settings.return_limit, 50);
        assert_eq!(settings.subtitle_fields, vec!["due", "scheduled", "projects"]);
        assert_eq!(settings.task_cache, TaskCacheSettings::default());
        assert_eq!(settings.snapshots, SnapshotSettings::default());
        assert!(settings.cache_dir.ends_with(CACHE_DIR_NAME));
        assert!(!settings.create_only);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("TASKNOTES_API_BASE", "http://127.0.0.1:9000/api/"),
            ("TASKNOTES_TOKEN", "secret"),
            ("TASK_RETURN_LIMIT", "10"),
            ("TASK_SUBTITLE_FIELDS", " Tags, ,due "),
            ("TASK_CACHE_RERUN_SECONDS", "0.25"),
            ("POMODORO_CACHE_MAX_STALE_SECONDS", "60"),
            ("alfred_workflow_cache", "/tmp/wf-cache"),
            ("MODE", "Create_Only"),
        ]);

        assert_eq!(settings.api_base, "http://127.0.0.1:9000/api");
        assert_eq!(settings.token.as_deref(), Some("secret"));
        assert_eq!(settings.return_limit, 10);
        assert_eq!(settings.subtitle_fields, vec!["tags", "due"]);
        assert_eq!(settings.task_cache.rerun, 0.25);
        assert_eq!(settings.snapshots.pomodoro_max_stale, 60.0);
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/wf-cache"));
        assert!(settings.create_only);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let settings = settings(&[
            ("TASK_FETCH_LIMIT", "lots"),
            ("TASK_RETURN_LIMIT", "0"),
            ("TASK_CACHE_TTL_SECONDS", "-3"),
            ("TASK_CACHE_MAX_STALE_SECONDS", "NaN"),
            ("TASKNOTES_TOKEN", "   "),
        ]);

        assert_eq!(settings.fetch_limit, 400);
        assert_eq!(settings.return_limit, 50);
        assert_eq!(settings.task_cache.ttl, 5.0);
        assert_eq!(settings.task_cache.max_stale, 600.0);
        assert_eq!(settings.token, None);
    }

    #[test]
    fn test_uppercase_cache_dir_variable() {
        let settings = settings(&[("ALFRED_WORKFLOW_CACHE", "/var/cache/wf")]);
        assert_eq!(settings.cache_dir, PathBuf::from("/var/cache/wf"));
    }
}
