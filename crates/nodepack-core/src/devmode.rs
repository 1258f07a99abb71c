//! Dev mode: watch-and-resync instead of an immutable image.

use crate::entrypoint::EntrypointCommand;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Destination every sync rule copies into.
pub const WORKSPACE_DIR: &str = "/workspace";

/// Source globs synced into the running container, in order.
pub const SYNC_GLOBS: [&str; 6] = [
    "**/*.js",
    "**/*.mjs",
    "**/*.coffee",
    "**/*.litcoffee",
    "**/*.json",
    "public/**",
];

/// File watcher used for the long-lived dev process.
pub const WATCHER: &str = "nodemon";
/// Pinned watcher release.
pub const WATCHER_VERSION: &str = "2.0.22";

const WATCH_EXTENSIONS: &str = "js,mjs,coffee,litcoffee,json";

/// One file sync rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRule {
    pub src: String,
    pub dest: String,
}

/// Dev mode settings attached to a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevModeConfig {
    pub sync_rules: Vec<SyncRule>,
    /// Paths the watcher restarts on; always includes the entrypoint file
    /// when one is known.
    pub watch: Vec<String>,
}

/// Dev mode settings, or `None` when dev mode is off.
pub fn configure(enabled: bool, entrypoint: &EntrypointCommand) -> Option<DevModeConfig> {
    enabled.then(|| DevModeConfig::new(entrypoint))
}

impl DevModeConfig {
    pub fn new(entrypoint: &EntrypointCommand) -> Self {
        let mut watch: Vec<String> = entrypoint.script_file.iter().cloned().collect();
        watch.push(".".to_string());
        DevModeConfig {
            sync_rules: Self::default_sync_rules(),
            watch,
        }
    }

    /// The fixed rule list.
    pub fn default_sync_rules() -> Vec<SyncRule> {
        SYNC_GLOBS
            .iter()
            .map(|src| SyncRule {
                src: src.to_string(),
                dest: WORKSPACE_DIR.to_string(),
            })
            .collect()
    }

    /// Long-lived command wrapping `entrypoint` in the watcher.
    pub fn watch_command(&self, entrypoint: &EntrypointCommand) -> Vec<String> {
        let mut cmd = vec![WATCHER.to_string()];
        for path in &self.watch {
            cmd.push("--watch".to_string());
            cmd.push(path.clone());
        }
        cmd.extend([
            "--ext".to_string(),
            WATCH_EXTENSIONS.to_string(),
            "--exec".to_string(),
            entrypoint.raw.clone(),
        ]);
        cmd
    }

    /// Command installing the watcher with the runtime's bundled npm.
    pub fn tool_install_command() -> Vec<String> {
        vec![
            "npm".to_string(),
            "install".to_string(),
            "-g".to_string(),
            format!("{}@{}", WATCHER, WATCHER_VERSION),
        ]
    }

    /// Whether a change to `path` (relative to the workspace) is synced or
    /// watched and so triggers a rebuild.
    pub fn triggers_rebuild(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        self.watch.iter().any(|w| w == path)
            || self
                .sync_rules
                .iter()
                .any(|rule| glob_regex(&rule.src).is_some_and(|re| re.is_match(path)))
    }
}

/// Translate a sync glob into an anchored regex.
fn glob_regex(glob: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    let mut rest = glob;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("**/") {
            pattern.push_str("(?:.*/)?");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("**") {
            pattern.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('*') {
            pattern.push_str("[^/]*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('?') {
            pattern.push_str("[^/]");
            rest = tail;
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            pattern.push_str(&regex::escape(&ch.to_string()));
            rest = &rest[ch.len_utf8()..];
        }
    }
    pattern.push('$');
    Regex::new(&pattern).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entrypoint::EntrypointSource;

    fn entry(raw: &str, script: Option<&str>) -> EntrypointCommand {
        EntrypointCommand {
            tokens: raw.split(' ').map(str::to_string).collect(),
            raw: raw.to_string(),
            source: EntrypointSource::Convention,
            script_file: script.map(str::to_string),
        }
    }

    #[test]
    fn test_disabled_is_absent() {
        assert!(configure(false, &entry("node server.js", Some("server.js"))).is_none());
    }

    #[test]
    fn test_default_sync_rules() {
        let rules = DevModeConfig::default_sync_rules();
        let srcs: Vec<&str> = rules.iter().map(|r| r.src.as_str()).collect();
        assert_eq!(srcs, SYNC_GLOBS.to_vec());
        assert!(rules.iter().all(|r| r.dest == "/workspace"));
    }

    #[test]
    fn test_rules_independent_of_entrypoint() {
        let a = configure(true, &entry("node server.js", Some("server.js"))).unwrap();
        let b = configure(true, &entry("npm start", None)).unwrap();
        assert_eq!(a.sync_rules, b.sync_rules);
    }

    #[test]
    fn test_watch_command() {
        let entrypoint = entry("node server.js", Some("server.js"));
        let config = DevModeConfig::new(&entrypoint);
        let cmd = config.watch_command(&entrypoint);
        assert_eq!(
            cmd,
            vec![
                "nodemon",
                "--watch",
                "server.js",
                "--watch",
                ".",
                "--ext",
                "js,mjs,coffee,litcoffee,json",
                "--exec",
                "node server.js"
            ]
        );
    }

    #[test]
    fn test_entrypoint_triggers_rebuild() {
        let config = DevModeConfig::new(&entry("node server.js", Some("server.js")));
        assert!(config.triggers_rebuild("server.js"));
        assert!(config.triggers_rebuild("./server.js"));
        assert!(config.triggers_rebuild("lib/deep/util.mjs"));
        assert!(config.triggers_rebuild("public/css/site.css"));
        assert!(config.triggers_rebuild("package.json"));
        assert!(!config.triggers_rebuild("README.md"));
        assert!(!config.triggers_rebuild("static/site.css"));
    }

    #[test]
    fn test_glob_regex() {
        assert!(glob_regex("**/*.js").unwrap().is_match("a.js"));
        assert!(glob_regex("**/*.js").unwrap().is_match("a/b/c.js"));
        assert!(!glob_regex("**/*.js").unwrap().is_match("a.json"));
        assert!(glob_regex("public/**").unwrap().is_match("public/x/y"));
        assert!(!glob_regex("public/**").unwrap().is_match("src/public/x"));
    }
}
