// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolving the environments of many variants at once.

Each setup script invocation takes seconds, almost all of it waiting on the
external tool. Every uncached variant's process is started before any is
waited on. Processes are then joined in the order variants were requested,
so output order never depends on completion order.
*/

use {
    crate::{
        cache::EnvironmentCache,
        environment::EnvironmentMap,
        error::{ResolverError, Result},
        extractor::{RunningSetup, SetupInvocation, SetupLauncher},
        locator::Installation,
        version::Variant,
    },
    log::{debug, info, warn},
    std::path::Path,
};

enum Source {
    Cached,
    Running(SetupInvocation, Box<dyn RunningSetup>),
    /// Never started because an earlier launch failed.
    Skipped,
}

/// Resolve the environment of every variant, reading through the cache.
///
/// Freshly extracted environments are written to the cache. On failure, every
/// started process is still joined before the first error is returned.
pub fn resolve_environments(
    installation: &Installation,
    variants: &[Variant],
    sdk_version: Option<&str>,
    cache: &EnvironmentCache,
    launcher: &dyn SetupLauncher,
    interpreter_dir: Option<&Path>,
) -> Result<Vec<(Variant, EnvironmentMap)>> {
    let mut first_error: Option<ResolverError> = None;
    let mut sources = Vec::with_capacity(variants.len());

    for variant in variants {
        if cache.contains(&variant.cache_file_name()) {
            debug!("using cached environment for {}", variant);
            sources.push(Source::Cached);
            continue;
        }

        if first_error.is_some() {
            sources.push(Source::Skipped);
            continue;
        }

        let invocation = SetupInvocation::new(installation, *variant, sdk_version);
        match launcher.launch(&invocation) {
            Ok(running) => sources.push(Source::Running(invocation, running)),
            Err(e) => {
                first_error = Some(e);
                sources.push(Source::Skipped);
            }
        }
    }

    let launched = sources
        .iter()
        .filter(|s| matches!(s, Source::Running(..)))
        .count();
    if launched > 0 {
        info!(
            "running Visual Studio {} setup script for {} variant(s)",
            installation.version, launched
        );
    }

    let mut resolved = Vec::with_capacity(variants.len());

    for (variant, source) in variants.iter().zip(sources) {
        let result = match source {
            Source::Skipped => continue,
            Source::Cached if first_error.is_some() => continue,
            Source::Cached => load_cached(cache, variant),
            Source::Running(invocation, running) => {
                let output = running.join();

                if first_error.is_some() {
                    continue;
                }

                output
                    .and_then(|output| invocation.parse_output(&output, interpreter_dir))
                    .and_then(|env| {
                        cache.save(&variant.cache_file_name(), &env)?;
                        Ok(env)
                    })
            }
        };

        match result {
            Ok(env) => resolved.push((*variant, env)),
            Err(e) => {
                warn!("unable to resolve environment for {}", variant);
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(resolved),
    }
}

fn load_cached(cache: &EnvironmentCache, variant: &Variant) -> Result<EnvironmentMap> {
    let name = variant.cache_file_name();

    cache
        .load(&name)?
        .ok_or_else(|| ResolverError::CacheDecode {
            path: cache.path(&name),
            reason: "removed while in use".to_string(),
        })
}
