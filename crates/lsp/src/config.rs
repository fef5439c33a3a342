// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-language server configuration.

use std::time::Duration;

use mayla_core::Language;

/// How to run and talk to one language's server.
#[derive(Debug, Clone)]
pub struct LspServerConfig {
    pub language: Language,
    /// Executable resolved on PATH.
    pub command: String,
    pub args: Vec<String>,
    /// Marker files whose presence identifies a project root.
    pub root_patterns: Vec<String>,
    /// Budget for spawn + initialize handshake.
    pub start_timeout: Duration,
    /// Budget for a single request once ready.
    pub request_timeout: Duration,
    /// Starts allowed before the language is given up on.
    pub max_restarts: u32,
}

impl LspServerConfig {
    fn new(
        language: Language,
        command: &str,
        args: &[&str],
        root_patterns: &[&str],
    ) -> Self {
        Self {
            language,
            command: command.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            root_patterns: root_patterns.iter().map(|p| (*p).to_string()).collect(),
            start_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            max_restarts: 5,
        }
    }
}

/// The set of languages the daemon can start servers for.
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    configs: Vec<LspServerConfig>,
}

impl ServerRegistry {
    /// Built-in server commands for the common languages.
    pub fn defaults() -> Self {
        Self {
            configs: vec![
                LspServerConfig::new(Language::Go, "gopls", &[], &["go.mod", "go.sum"]),
                LspServerConfig::new(
                    Language::Rust,
                    "rust-analyzer",
                    &[],
                    &["Cargo.toml", "Cargo.lock"],
                ),
                LspServerConfig::new(
                    Language::TypeScript,
                    "typescript-language-server",
                    &["--stdio"],
                    &["tsconfig.json", "package.json"],
                ),
                LspServerConfig::new(
                    Language::JavaScript,
                    "typescript-language-server",
                    &["--stdio"],
                    &["package.json", "jsconfig.json"],
                ),
                LspServerConfig::new(
                    Language::Python,
                    "pylsp",
                    &[],
                    &["pyproject.toml", "setup.py", "requirements.txt"],
                ),
            ],
        }
    }

    /// Registry with explicit configs (tests use throwaway commands).
    pub fn with_configs(configs: Vec<LspServerConfig>) -> Self {
        Self { configs }
    }

    pub fn config_for(&self, language: Language) -> Option<&LspServerConfig> {
        self.configs.iter().find(|c| c.language == language)
    }

    pub fn supports(&self, language: Language) -> bool {
        self.config_for(language).is_some()
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.configs.iter().map(|c| c.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_common_languages() {
        let registry = ServerRegistry::defaults();
        assert!(registry.supports(Language::Go));
        assert!(registry.supports(Language::Rust));
        assert!(registry.supports(Language::TypeScript));
        assert!(!registry.supports(Language::Shell));
    }

    #[test]
    fn config_lookup_returns_command() {
        let registry = ServerRegistry::defaults();
        let go = registry.config_for(Language::Go).unwrap();
        assert_eq!(go.command, "gopls");
        assert!(go.root_patterns.contains(&"go.mod".to_string()));
    }
}
