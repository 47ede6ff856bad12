//! Miette diagnostic conversion for CLI errors.

use crate::error::{BuildError, CliError};
use edgelab_bundler::BundleError;
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => build_error_to_miette(e),
        CliError::Config(e) => miette::miette!("Configuration error: {}", e),
        CliError::Spawn(e) => miette::miette!("Runtime failed to start: {}", e),
        _ => miette::miette!("{}", err),
    }
}

/// Convert BuildError to miette Report
pub fn build_error_to_miette(err: BuildError) -> Report {
    match err {
        BuildError::Pipeline(BundleError::BundlerFailed { status, stderr }) => {
            miette::miette!(
                "Bundling failed ({}):\n\n{}\n\nHint: Fix the errors above; edgelab rebuilds on save",
                status,
                stderr
            )
        }
        BuildError::Pipeline(BundleError::Parse { path, errors }) => {
            miette::miette!(
                "Bundled output {} could not be parsed:\n{}",
                path.display(),
                errors.join("\n")
            )
        }
        _ => miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundler_failure_keeps_stderr() {
        let err = CliError::Build(BuildError::Pipeline(BundleError::BundlerFailed {
            status: "exit status: 1".to_string(),
            stderr: "Could not resolve \"left-pad\"".to_string(),
        }));
        let report = cli_error_to_miette(err);
        let rendered = format!("{report}");
        assert!(rendered.contains("left-pad"));
        assert!(rendered.contains("Hint:"));
    }
}
