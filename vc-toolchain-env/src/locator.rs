// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Locating Visual Studio installations.

Installations are found by a chain of [InstallationProbe]s tried in priority
order. The first probe yielding an existing directory with a setup script
wins.
*/

use {
    crate::{
        config::ResolverConfig,
        error::{ResolverError, Result},
        registry::RegistryProbe,
        version::{VersionSpecifier, VisualStudioVersion},
        vswhere::VswhereProbe,
    },
    log::{debug, warn},
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// Editions probed at their default install locations, in order.
pub const EDITIONS: &[&str] = &["Professional", "Community", "Enterprise", "BuildTools"];

/// Resolve the path to `vcvarsall.bat` within an installation root.
///
/// Older releases keep it directly in `VC`; 2017 and newer in `VC\Auxiliary\Build`.
pub fn find_setup_script(root: &Path) -> Result<PathBuf> {
    let legacy = root.join("VC").join("vcvarsall.bat");
    if legacy.exists() {
        return Ok(legacy);
    }

    let nested = root
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("vcvarsall.bat");
    if nested.exists() {
        Ok(nested)
    } else {
        Err(ResolverError::SetupScriptMissing(nested))
    }
}

/// A strategy for finding the installation root of a Visual Studio release.
pub trait InstallationProbe: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Attempt to find the install root of a release.
    ///
    /// `Ok(None)` means this strategy has nothing to offer and the next one
    /// should be tried.
    fn probe(&self, version: VisualStudioVersion) -> Result<Option<PathBuf>>;

    /// Whether a path returned by this probe is final.
    ///
    /// Authoritative results that fail validation are errors instead of
    /// falling through to later probes.
    fn is_authoritative(&self) -> bool {
        false
    }
}

/// An install root given by the caller.
pub struct ExplicitPathProbe {
    path: PathBuf,
}

impl ExplicitPathProbe {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl InstallationProbe for ExplicitPathProbe {
    fn name(&self) -> &'static str {
        "explicit"
    }

    fn probe(&self, _version: VisualStudioVersion) -> Result<Option<PathBuf>> {
        Ok(Some(self.path.clone()))
    }

    fn is_authoritative(&self) -> bool {
        true
    }
}

/// Default install locations of each edition.
///
/// A `vs<year>_install` override replaces the edition directories.
pub struct DefaultPathProbe {
    program_files_x86: PathBuf,
    overrides: BTreeMap<VisualStudioVersion, PathBuf>,
}

impl DefaultPathProbe {
    pub fn new(
        program_files_x86: impl AsRef<Path>,
        overrides: BTreeMap<VisualStudioVersion, PathBuf>,
    ) -> Self {
        Self {
            program_files_x86: program_files_x86.as_ref().to_path_buf(),
            overrides,
        }
    }

    fn candidates(&self, version: VisualStudioVersion) -> Vec<PathBuf> {
        if let Some(path) = self.overrides.get(&version) {
            return vec![path.clone()];
        }

        let root = self
            .program_files_x86
            .join("Microsoft Visual Studio")
            .join(version.year());

        EDITIONS.iter().map(|edition| root.join(edition)).collect()
    }
}

impl InstallationProbe for DefaultPathProbe {
    fn name(&self) -> &'static str {
        "default-path"
    }

    fn probe(&self, version: VisualStudioVersion) -> Result<Option<PathBuf>> {
        if !version.uses_installer_query() {
            return Ok(None);
        }

        Ok(self.candidates(version).into_iter().find(|p| p.exists()))
    }
}

/// A resolved Visual Studio installation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Installation {
    pub version: VisualStudioVersion,
    pub root: PathBuf,
    pub setup_script: PathBuf,
}

/// Finds installations by trying probes in order.
pub struct InstallationLocator {
    probes: Vec<Box<dyn InstallationProbe>>,
}

impl InstallationLocator {
    pub fn new(probes: Vec<Box<dyn InstallationProbe>>) -> Self {
        Self { probes }
    }

    /// The standard probe chain.
    ///
    /// Order: explicit path, vswhere, default edition paths, registry.
    pub fn from_config(config: &ResolverConfig, explicit_root: Option<&Path>) -> Self {
        let mut probes: Vec<Box<dyn InstallationProbe>> = vec![];

        if let Some(root) = explicit_root {
            probes.push(Box::new(ExplicitPathProbe::new(root)));
        }

        probes.push(Box::new(VswhereProbe::from_config(config)));
        probes.push(Box::new(DefaultPathProbe::new(
            &config.program_files_x86,
            config.install_overrides.clone(),
        )));
        probes.push(Box::new(RegistryProbe::default()));

        Self::new(probes)
    }

    /// Locate an installation for a version specifier.
    ///
    /// `latest` resolves to the newest release that can be found.
    pub fn locate(&self, spec: VersionSpecifier) -> Result<Installation> {
        match spec {
            VersionSpecifier::Exact(version) => self.locate_version(version),
            VersionSpecifier::Latest => {
                for version in VisualStudioVersion::NEWEST_FIRST {
                    match self.locate_version(version) {
                        Ok(installation) => return Ok(installation),
                        Err(e) => {
                            debug!("Visual Studio {} unavailable: {}", version, e);
                        }
                    }
                }

                Err(ResolverError::InstallationNotFound(spec.to_string()))
            }
        }
    }

    /// Locate an installation of one release.
    pub fn locate_version(&self, version: VisualStudioVersion) -> Result<Installation> {
        for probe in &self.probes {
            let root = match probe.probe(version)? {
                Some(root) => root,
                None => continue,
            };

            debug!(
                "{} probe offered {} for Visual Studio {}",
                probe.name(),
                root.display(),
                version
            );

            if !root.is_dir() {
                if probe.is_authoritative() {
                    warn!("{} does not exist", root.display());
                    return Err(ResolverError::InstallationNotFound(version.to_string()));
                }
                continue;
            }

            match find_setup_script(&root) {
                Ok(setup_script) => {
                    return Ok(Installation {
                        version,
                        root,
                        setup_script,
                    })
                }
                Err(e) if probe.is_authoritative() => return Err(e),
                Err(e) => {
                    debug!("ignoring {}: {}", root.display(), e);
                }
            }
        }

        Err(ResolverError::InstallationNotFound(version.to_string()))
    }
}
