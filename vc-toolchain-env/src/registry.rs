// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Registry lookup of pre-2017 installations. */

use {
    crate::{error::Result, locator::InstallationProbe, version::VisualStudioVersion},
    std::path::{Path, PathBuf},
};

/// `HKLM` subkeys holding the `InstallDir` value of a release.
///
/// The native view is tried before the 32-bit view on 64-bit Windows.
pub fn registry_keys(version: VisualStudioVersion) -> Vec<String> {
    let internal = version.internal_version();

    vec![
        format!(r"Software\Microsoft\VisualStudio\{}", internal),
        format!(r"Software\Wow6432Node\Microsoft\VisualStudio\{}", internal),
    ]
}

/// Convert an `InstallDir` value (`<root>\Common7\IDE\`) to the install root.
pub fn install_root_from_install_dir(install_dir: &Path) -> Option<PathBuf> {
    install_dir
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
}

#[cfg(windows)]
fn read_install_dir(key: &str) -> Option<PathBuf> {
    use winreg::{enums::HKEY_LOCAL_MACHINE, RegKey};

    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey(key)
        .and_then(|k| k.get_value::<String, _>("InstallDir"))
        .ok()
        .map(PathBuf::from)
}

#[cfg(not(windows))]
fn read_install_dir(_key: &str) -> Option<PathBuf> {
    None
}

/// Finds 2013 and 2015 installations through the registry.
#[derive(Default)]
pub struct RegistryProbe {}

impl InstallationProbe for RegistryProbe {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn probe(&self, version: VisualStudioVersion) -> Result<Option<PathBuf>> {
        if version.uses_installer_query() {
            return Ok(None);
        }

        Ok(registry_keys(version)
            .iter()
            .filter_map(|key| read_install_dir(key))
            .find_map(|dir| install_root_from_install_dir(&dir)))
    }
}
