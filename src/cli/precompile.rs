//! `stencil precompile`: compile every template under a directory so
//! deployments can start with `precompiled_only`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};
use jwalk::WalkDir;
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::coordinator::{Coordinator, ServiceResult};
use crate::error::render_diagnostics;
use crate::logger::{status_error, status_success};
use crate::source::FsSource;

/// Compile all templates under `dir` (the template root by default).
///
/// Fails if any template fails; every failure is reported first.
pub fn precompile(config: EngineConfig, dir: Option<&Path>) -> Result<()> {
    if config.compile.precompiled_only {
        bail!("precompile needs `compile.precompiled_only = false`");
    }
    if config.store.in_memory {
        crate::log!("precompile"; "artifacts are kept in memory and will not outlive this run");
    }

    let sources = FsSource::new(config.root.clone());
    let start = match dir {
        Some(dir) => config.root.join(dir),
        None => config.root.clone(),
    };
    if !start.is_dir() {
        bail!("`{}` is not a directory", start.display());
    }

    let paths = collect_templates(&config, &sources, &start);
    if paths.is_empty() {
        crate::log!("precompile"; "no templates under {}", start.display());
        return Ok(());
    }

    let coordinator = Coordinator::builder(config)
        .sources(Arc::new(sources))
        .build()?;
    let started = Instant::now();

    let failed: usize = paths
        .par_iter()
        .map(|path| match coordinator.handle(path, true) {
            ServiceResult::Served(_) | ServiceResult::Unavailable(_) => {
                crate::debug!("precompile"; "{}", path);
                0
            }
            ServiceResult::Error(e) => {
                status_error(
                    &format!("failed: {path}"),
                    &render_diagnostics(&e.diagnostics()),
                );
                1
            }
            ServiceResult::NotFound => {
                crate::log!("precompile"; "{} disappeared", path);
                1
            }
        })
        .sum();

    if failed > 0 {
        bail!("{failed} of {} templates failed to compile", paths.len());
    }
    status_success(&format!(
        "precompiled {} templates ({} compiles) in {:.1?}",
        paths.len(),
        coordinator.stats().compiles,
        started.elapsed()
    ));
    Ok(())
}

/// Logical paths of the templates under `start`, sorted. Hidden entries
/// (including the scratch directory) are skipped.
fn collect_templates(config: &EngineConfig, sources: &FsSource, start: &Path) -> Vec<String> {
    let mut paths: Vec<String> = WalkDir::new(start)
        .skip_hidden(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path())
        .filter(|path| !is_hidden(start, path) && is_template(config, path))
        .filter_map(|path| sources.logical_path(&path))
        .collect();
    paths.sort();
    paths
}

/// Any component below `start` starting with a dot.
fn is_hidden(start: &Path, path: &Path) -> bool {
    path.strip_prefix(start)
        .map(|rel| {
            rel.components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        })
        .unwrap_or(false)
}

fn is_template(config: &EngineConfig, path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| config.compile.is_template_extension(ext))
}
