// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Querying the Visual Studio installer database with `vswhere.exe`.

2017 and newer releases are not registered in the registry. See
https://github.com/Microsoft/vswhere for the tool.
*/

use {
    crate::{
        config::ResolverConfig,
        error::Result,
        locator::InstallationProbe,
        version::VisualStudioVersion,
    },
    log::{debug, warn},
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

const VSWHERE_RELATIVE_PATH: &str = r"Microsoft Visual Studio\Installer\vswhere.exe";

/// Attempt to locate vswhere.exe below the given well-known roots.
pub fn find_vswhere(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .map(|root| root.join(VSWHERE_RELATIVE_PATH))
        .find(|path| path.exists())
}

/// An installation record in `vswhere -format json` output.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VswhereInstance {
    pub installation_path: PathBuf,
    #[serde(default)]
    pub installation_version: Option<String>,
}

/// Parse `vswhere -format json` output.
pub fn parse_vswhere_json(data: &[u8]) -> Result<Vec<VswhereInstance>> {
    Ok(serde_json::from_slice(data)?)
}

/// Version range argument selecting a single release, e.g. `[16.0,17.0)`.
pub fn version_range(version: VisualStudioVersion) -> String {
    format!("[{}.0,{}.0)", version.major(), version.major() + 1)
}

/// Finds installations with `vswhere.exe`.
pub struct VswhereProbe {
    vswhere: Option<PathBuf>,
}

impl VswhereProbe {
    pub fn new(vswhere: Option<PathBuf>) -> Self {
        Self { vswhere }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(find_vswhere(&config.installer_roots()))
    }

    fn query(&self, vswhere: &Path, version: VisualStudioVersion) -> Result<Option<PathBuf>> {
        let output = duct::cmd(
            vswhere,
            vec![
                "-version".to_string(),
                version_range(version),
                "-legacy".to_string(),
                "-format".to_string(),
                "json".to_string(),
                "-utf8".to_string(),
            ],
        )
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()?;

        if !output.status.success() {
            warn!(
                "vswhere failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        let instances = parse_vswhere_json(&output.stdout)?;
        debug!("vswhere found {} installation(s)", instances.len());

        Ok(instances.into_iter().next().map(|i| i.installation_path))
    }
}

impl InstallationProbe for VswhereProbe {
    fn name(&self) -> &'static str {
        "vswhere"
    }

    fn probe(&self, version: VisualStudioVersion) -> Result<Option<PathBuf>> {
        match &self.vswhere {
            Some(vswhere) if version.uses_installer_query() => self.query(vswhere, version),
            _ => Ok(None),
        }
    }
}
