//! `stencil render`: serve one request and print the body.

use std::process::ExitCode;
use std::time::SystemTime;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::coordinator::{Coordinator, ServiceResult};
use crate::error::render_diagnostics;
use crate::loader::Request;

/// Exit code when the template does not exist.
pub const EXIT_NOT_FOUND: u8 = 2;
/// Exit code when the template reported itself unavailable.
pub const EXIT_UNAVAILABLE: u8 = 3;

pub fn render(config: EngineConfig, path: &str, params: &[(String, String)]) -> Result<ExitCode> {
    let coordinator = Coordinator::builder(config).build()?;
    let request = params
        .iter()
        .fold(Request::new(path), |request, (k, v)| request.with_param(k, v));

    let result = coordinator.handle_request(&request, false);
    if let ServiceResult::Served(response) = &result {
        println!("{}", response.body);
    }
    Ok(exit_code(&result, path))
}

/// Report a non-served result on stderr and pick the exit code.
fn exit_code(result: &ServiceResult, path: &str) -> ExitCode {
    match result {
        ServiceResult::Served(_) => ExitCode::SUCCESS,
        ServiceResult::NotFound => {
            crate::log!("error"; "{} not found", path);
            ExitCode::from(EXIT_NOT_FOUND)
        }
        ServiceResult::Unavailable(until) => {
            let secs = until
                .duration_since(SystemTime::now())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            crate::log!("error"; "{} unavailable, retry in {}s", path, secs);
            ExitCode::from(EXIT_UNAVAILABLE)
        }
        ServiceResult::Error(e) => {
            crate::log!("error"; "{} failed", path);
            eprintln!("{}", render_diagnostics(&e.diagnostics()));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with(files: &[(&str, &str)]) -> (TempDir, EngineConfig) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            fs::write(dir.path().join(path), content).unwrap();
        }
        let mut config = EngineConfig::load_or_default(dir.path()).unwrap();
        config.store.in_memory = true;
        (dir, config)
    }

    #[test]
    fn test_exit_codes() {
        let (_dir, config) = config_with(&[
            ("ok.tpl", "Hi {{ name }}"),
            ("bad.tpl", "{{ nope"),
            ("later.tpl", "{{unavailable 30}}"),
        ]);
        let params = vec![("name".to_string(), "Ada".to_string())];

        assert_eq!(
            render(config.clone(), "/ok.tpl", &params).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            render(config.clone(), "/missing.tpl", &[]).unwrap(),
            ExitCode::from(EXIT_NOT_FOUND)
        );
        assert_eq!(
            render(config.clone(), "/later.tpl", &[]).unwrap(),
            ExitCode::from(EXIT_UNAVAILABLE)
        );
        assert_eq!(
            render(config, "/bad.tpl", &[]).unwrap(),
            ExitCode::FAILURE
        );
    }
}
