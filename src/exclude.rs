use anyhow::{Error, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// a rule that removes a changed path from the report
///
/// rules are matched against the slash-separated paths git prints:
/// - `Dir` matches when any directory component equals the name
/// - `Suffix`, `Exact` and `Prefix` match against the file name only
/// - `Path` matches one whole path relative to the project root
///
/// in config files a rule is either a typed object (`{"dir": "dist"}`) or a
/// pattern string (`"dist/"`, `"*.lock"`, `".env*"`, `"package-lock.json"`).
/// `Path` has no pattern form
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRule")]
pub enum ExclusionRule {
    Dir(String),
    Suffix(String),
    Exact(String),
    Prefix(String),
    Path(String),
}

impl ExclusionRule {
    pub fn matches(&self, path: &str) -> bool {
        let (dirs, file_name) = match path.rsplit_once('/') {
            Some((dirs, file_name)) => (dirs, file_name),
            None => ("", path),
        };

        match self {
            Self::Dir(name) => dirs.split('/').any(|component| component == name),
            Self::Suffix(suffix) => file_name.ends_with(suffix.as_str()),
            Self::Exact(name) => file_name == name,
            Self::Prefix(prefix) => file_name.starts_with(prefix.as_str()),
            Self::Path(full) => path == full,
        }
    }
}

impl FromStr for ExclusionRule {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        let rule = if let Some(name) = pattern.strip_suffix('/') {
            Self::Dir(name.trim_start_matches('/').to_string())
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            Self::Suffix(suffix.to_string())
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Self::Prefix(prefix.to_string())
        } else {
            Self::Exact(pattern.to_string())
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl ExclusionRule {
    fn validate(&self) -> Result<()> {
        let (Self::Dir(value)
        | Self::Suffix(value)
        | Self::Exact(value)
        | Self::Prefix(value)
        | Self::Path(value)) = self;
        if value.is_empty() {
            bail!("exclusion rule {} is empty", self);
        }
        if matches!(self, Self::Dir(_) | Self::Exact(_)) && value.contains('/') {
            bail!("exclusion rule {} must name a single path component", self);
        }
        if matches!(self, Self::Path(_)) && (value.starts_with('/') || value.ends_with('/')) {
            bail!("exclusion rule {} must be a file path relative to the root", self);
        }
        Ok(())
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dir(name) => write!(f, "'{name}/'"),
            Self::Suffix(suffix) => write!(f, "'*{suffix}'"),
            Self::Exact(name) => write!(f, "'{name}'"),
            Self::Prefix(prefix) => write!(f, "'{prefix}*'"),
            Self::Path(path) => write!(f, "path '{path}'"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Pattern(String),
    Typed(TypedRule),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TypedRule {
    Dir(String),
    Suffix(String),
    Exact(String),
    Prefix(String),
    Path(String),
}

impl TryFrom<RawRule> for ExclusionRule {
    type Error = Error;

    fn try_from(raw: RawRule) -> Result<Self> {
        let rule = match raw {
            RawRule::Pattern(pattern) => return pattern.parse(),
            RawRule::Typed(TypedRule::Dir(name)) => Self::Dir(name),
            RawRule::Typed(TypedRule::Suffix(suffix)) => Self::Suffix(suffix),
            RawRule::Typed(TypedRule::Exact(name)) => Self::Exact(name),
            RawRule::Typed(TypedRule::Prefix(prefix)) => Self::Prefix(prefix),
            RawRule::Typed(TypedRule::Path(path)) => Self::Path(path),
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// built-in rules: dependency and build output, vcs metadata, lock files,
/// environment files and the tool's own outputs
pub fn default_rules() -> Vec<ExclusionRule> {
    vec![
        ExclusionRule::Dir("node_modules".into()),
        ExclusionRule::Dir("dist".into()),
        ExclusionRule::Dir(".git".into()),
        ExclusionRule::Suffix(".lock".into()),
        ExclusionRule::Exact("package-lock.json".into()),
        ExclusionRule::Exact("full_codebase.md".into()),
        ExclusionRule::Dir("external-files".into()),
        ExclusionRule::Prefix(".env".into()),
        ExclusionRule::Exact(crate::constants::REPORT_FILE.into()),
    ]
}

pub fn is_excluded(rules: &[ExclusionRule], path: &str) -> bool {
    rules.iter().any(|rule| rule.matches(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = default_rules();

        let excluded = [
            "project/node_modules/pkg/index.js",
            "node_modules/left-pad/index.js",
            "dist/bundle.js",
            "packages/web/dist/index.html",
            "Cargo.lock",
            "web/yarn.lock",
            "package-lock.json",
            "docs/full_codebase.md",
            "external-files/scripts/sync.py",
            ".env",
            ".env.local",
            "config/.env.production",
            "SYNC_REPORT.md",
        ];
        for path in excluded {
            assert!(is_excluded(&rules, path), "{path} should be excluded");
        }

        let included = [
            "src/app.ts",
            "src/node_modules_handler.ts",
            "src/distance.ts",
            "dist.config.js",
            "src/lockfile.ts",
            ".gitignore",
            "src/environment.ts",
            "docs/SYNC_REPORT.md.bak",
        ];
        for path in included {
            assert!(!is_excluded(&rules, path), "{path} should be included");
        }
    }

    #[test]
    fn test_dir_rule_ignores_file_name() {
        let rule = ExclusionRule::Dir("dist".into());
        assert!(rule.matches("dist/app.js"));
        assert!(!rule.matches("dist"), "a file named dist is not a directory");
    }

    #[test]
    fn test_path_rule_matches_one_file() {
        let rule = ExclusionRule::Path("reports/sync.md".into());
        assert!(rule.matches("reports/sync.md"));
        assert!(!rule.matches("sync.md"));
        assert!(!rule.matches("docs/reports/sync.md"));
    }

    #[test]
    fn test_parse_pattern_syntax() {
        assert_eq!(
            "node_modules/".parse::<ExclusionRule>().unwrap(),
            ExclusionRule::Dir("node_modules".into())
        );
        assert_eq!(
            "*.lock".parse::<ExclusionRule>().unwrap(),
            ExclusionRule::Suffix(".lock".into())
        );
        assert_eq!(
            ".env*".parse::<ExclusionRule>().unwrap(),
            ExclusionRule::Prefix(".env".into())
        );
        assert_eq!(
            "package-lock.json".parse::<ExclusionRule>().unwrap(),
            ExclusionRule::Exact("package-lock.json".into())
        );
    }

    #[test]
    fn test_parse_rejects_invalid_patterns() {
        assert!("".parse::<ExclusionRule>().is_err());
        assert!("/".parse::<ExclusionRule>().is_err());
        assert!("*".parse::<ExclusionRule>().is_err());
        assert!("src/main.rs".parse::<ExclusionRule>().is_err());
    }

    #[test]
    fn test_deserialize_typed_and_pattern_rules() {
        let rules: Vec<ExclusionRule> =
            serde_json::from_str(r#"[{"dir": "build"}, {"suffix": ".map"}, "*.log", ".cache/"]"#)
                .unwrap();
        assert_eq!(
            rules,
            vec![
                ExclusionRule::Dir("build".into()),
                ExclusionRule::Suffix(".map".into()),
                ExclusionRule::Suffix(".log".into()),
                ExclusionRule::Dir(".cache".into()),
            ]
        );

        let path: ExclusionRule = serde_json::from_str(r#"{"path": "docs/notes.md"}"#).unwrap();
        assert_eq!(path, ExclusionRule::Path("docs/notes.md".into()));

        assert!(serde_json::from_str::<ExclusionRule>(r#"{"dir": ""}"#).is_err());
        assert!(serde_json::from_str::<ExclusionRule>(r#"{"path": "/etc/hosts"}"#).is_err());
        assert!(serde_json::from_str::<ExclusionRule>(r#"{"glob": "*.rs"}"#).is_err());
    }
}
