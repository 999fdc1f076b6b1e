// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The `setup` pipeline. */

use {
    crate::{
        cache::EnvironmentCache,
        compiler::{probe_cl_version, probe_clang_cl_version},
        config::ResolverConfig,
        environment::{interpreter_dir, EnvironmentMap},
        error::{ResolverError, Result},
        extractor::SetupLauncher,
        gn::{emit_declarations, unique_sdk_path, CompilerDeclaration, ToolchainDeclaration},
        locator::{Installation, InstallationLocator},
        metadata::{derive_all, ToolchainMetadata},
        orchestrator::resolve_environments,
        version::{AppModel, Architecture, Variant, VersionSpecifier},
    },
    log::{info, warn},
    std::path::{Path, PathBuf},
};

/// Arguments of a `setup` run.
#[derive(Clone, Debug, Default)]
pub struct SetupRequest {
    pub version: VersionSpecifier,
    /// Install root to use instead of probing.
    pub install_root: Option<PathBuf>,
    /// Windows SDK version passed to the setup script.
    pub sdk_version: Option<String>,
    /// LLVM installation providing clang-cl.
    pub clang_base_path: Option<PathBuf>,
    /// `_MSC_VER` clang-cl should emulate.
    pub clang_msc_ver: Option<String>,
}

/// Positional argument meaning "not specified".
fn explicit_argument(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty() && *v != "default")
}

impl SetupRequest {
    /// Construct from positional command arguments.
    ///
    /// `default` or an empty string leave the optional arguments unset.
    pub fn from_arguments(
        version: &str,
        install_root: Option<&str>,
        sdk_version: Option<&str>,
        clang_base_path: Option<&str>,
        clang_msc_ver: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            version: version.parse()?,
            install_root: explicit_argument(install_root).map(PathBuf::from),
            sdk_version: explicit_argument(sdk_version).map(String::from),
            clang_base_path: explicit_argument(clang_base_path).map(PathBuf::from),
            clang_msc_ver: explicit_argument(clang_msc_ver).map(String::from),
        })
    }
}

/// Resolves toolchains using a probe chain and a way to run setup scripts.
pub struct ToolchainResolver<'a> {
    config: &'a ResolverConfig,
    locator: InstallationLocator,
    launcher: &'a dyn SetupLauncher,
}

impl<'a> ToolchainResolver<'a> {
    pub fn new(
        config: &'a ResolverConfig,
        locator: InstallationLocator,
        launcher: &'a dyn SetupLauncher,
    ) -> Self {
        Self {
            config,
            locator,
            launcher,
        }
    }

    /// Resolve every variant and render the GN declarations.
    ///
    /// Relative include and library paths are expressed against `base_dir`.
    /// The declarations are only returned once every stage succeeded.
    pub fn setup(&self, request: &SetupRequest, base_dir: &Path) -> Result<String> {
        let installation = self.locator.locate(request.version)?;
        info!(
            "using Visual Studio {} at {}",
            installation.version,
            installation.root.display()
        );

        let variants = Variant::product(&self.config.architectures, self.config.include_store);
        if variants.is_empty() {
            return Err(ResolverError::InvalidArgument(
                "no architectures requested".to_string(),
            ));
        }

        let cache = EnvironmentCache::new(&self.config.cache_dir);
        let envs = resolve_environments(
            &installation,
            &variants,
            request.sdk_version.as_deref(),
            &cache,
            self.launcher,
            interpreter_dir().as_deref(),
        )?;

        let metadata = derive_all(&envs, base_dir);
        let windows_sdk_path = unique_sdk_path(&metadata)?;
        let compiler = probe_compiler(&installation, request, &envs, &metadata)?;

        emit_declarations(
            &metadata,
            &ToolchainDeclaration {
                visual_studio_version: installation.version.year(),
                visual_studio_path: &installation.root,
                windows_sdk_path: &windows_sdk_path,
                compiler,
            },
        )
    }
}

/// Build the standard locator for a request.
///
/// An install root is ignored when resolving the newest release.
pub fn locator_for_request(config: &ResolverConfig, request: &SetupRequest) -> InstallationLocator {
    let explicit_root = match (&request.version, &request.install_root) {
        (VersionSpecifier::Latest, Some(root)) => {
            warn!(
                "ignoring install root {} when resolving the latest release",
                root.display()
            );
            None
        }
        (_, root) => root.as_deref(),
    };

    InstallationLocator::from_config(config, explicit_root)
}

fn probe_compiler(
    installation: &Installation,
    request: &SetupRequest,
    envs: &[(Variant, EnvironmentMap)],
    metadata: &[ToolchainMetadata],
) -> Result<CompilerDeclaration> {
    if let Some(base) = &request.clang_base_path {
        let msc_ver = request
            .clang_msc_ver
            .clone()
            .unwrap_or_else(|| installation.version.msc_ver().to_string());
        let version = probe_clang_cl_version(base, &msc_ver)?;

        return Ok(CompilerDeclaration::ClangCl {
            clang_version: version.clang_version,
            msc_full_ver: version.msc_full_ver,
        });
    }

    let x86 = Variant::new(Architecture::X86, AppModel::Desktop);
    let chosen = metadata
        .iter()
        .find(|m| m.variant == x86)
        .or_else(|| metadata.first())
        .ok_or(ResolverError::NoUsableVariant)?;

    let env = envs
        .iter()
        .find(|(variant, _)| *variant == chosen.variant)
        .map(|(_, env)| env)
        .ok_or(ResolverError::NoUsableVariant)?;

    Ok(CompilerDeclaration::Msvc {
        msc_full_ver: probe_cl_version(&chosen.vc_bin_dir, env)?,
    })
}
