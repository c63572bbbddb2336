//! Diagnostic error types for rich error reporting via miette.

use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while resolving or executing a launch plan.
#[derive(Debug, Error, Diagnostic)]
pub enum LaunchError {
    #[error("ComfyUI entry point not found: {}", path.display())]
    #[diagnostic(
        code(comfy_launcher::launch::entry_point_missing),
        help("the build path must point at a ComfyUI checkout containing main.py")
    )]
    EntryPointMissing { path: PathBuf },

    #[error("no usable launch path under {}", dir.display())]
    #[diagnostic(
        code(comfy_launcher::launch::no_launch_path),
        help(
            "neither a launch script next to the ComfyUI directory nor a python interpreter was found"
        )
    )]
    NoLaunchPath { dir: PathBuf },
}

/// Errors related to the launcher configuration file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("no active build configured")]
    #[diagnostic(
        code(comfy_launcher::config::no_active_build),
        help("set `active` in config.toml to one of the configured build ids")
    )]
    NoActiveBuild,

    #[error("build '{id}' not found in configuration")]
    #[diagnostic(code(comfy_launcher::config::build_not_found))]
    BuildNotFound {
        id: String,
        #[help]
        suggestion: Option<String>,
    },

    #[error("build '{id}' points at an invalid ComfyUI path: {}", path.display())]
    #[diagnostic(
        code(comfy_launcher::config::invalid_build_path),
        help("the path must be a directory containing main.py")
    )]
    InvalidBuildPath { id: String, path: PathBuf },
}

/// Errors related to reading and writing the config file itself.
#[derive(Debug, Error, Diagnostic)]
pub enum FileError {
    #[error("failed to read file: {}", path.display())]
    #[diagnostic(code(comfy_launcher::file::read_error))]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file: {}", path.display())]
    #[diagnostic(code(comfy_launcher::file::write_error))]
    WriteError {
        path: PathBuf,
        #[help]
        details: Option<String>,
    },

    #[error("failed to serialize data for file: {}", path.display())]
    #[diagnostic(
        code(comfy_launcher::file::serialize_error),
        help("this is likely an internal error; please report it")
    )]
    SerializeError {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}

/// Find the most similar build id for suggestions.
pub fn find_similar_build<'a>(
    id: &str,
    available: impl Iterator<Item = &'a str>,
) -> Option<String> {
    use fuzzy_matcher::FuzzyMatcher;
    use fuzzy_matcher::skim::SkimMatcherV2;

    let matcher = SkimMatcherV2::default();
    available
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, id)
                .map(|score| (candidate, score))
        })
        .max_by_key(|(_, score)| *score)
        .filter(|(_, score)| *score > 0)
        .map(|(candidate, _)| format!("did you mean '{candidate}'?"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_error_display() {
        let err = LaunchError::EntryPointMissing {
            path: PathBuf::from("/opt/comfy/ComfyUI/main.py"),
        };
        assert!(err.to_string().contains("entry point not found"));
        assert!(err.to_string().contains("main.py"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::BuildNotFound {
            id: "portable".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "build 'portable' not found in configuration");
    }

    #[test]
    fn test_find_similar_build() {
        let builds = ["portable", "nightly", "main"];

        let suggestion = find_similar_build("portble", builds.iter().copied());
        assert_eq!(suggestion, Some("did you mean 'portable'?".to_string()));

        let suggestion = find_similar_build("xyz123", builds.iter().copied());
        assert!(suggestion.is_none());
    }
}
