// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolver settings. */

use {
    crate::version::{Architecture, VisualStudioVersion},
    std::{
        collections::BTreeMap,
        ffi::OsString,
        path::PathBuf,
        time::Duration,
    },
};

/// Default limit on the run time of a single setup script invocation.
pub const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(300);

const DEFAULT_PROGRAM_FILES_X86: &str = r"C:\Program Files (x86)";

/// Settings controlling toolchain resolution.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Directory holding environment cache files.
    pub cache_dir: PathBuf,

    /// Architectures to resolve environments for.
    pub architectures: Vec<Architecture>,

    /// Whether to resolve store (UWP) variants as well.
    pub include_store: bool,

    /// Limit on the run time of each setup script invocation.
    pub setup_timeout: Duration,

    /// `%ProgramFiles(x86)%`.
    pub program_files_x86: PathBuf,

    /// `%ProgramData%`, if defined.
    pub program_data: Option<PathBuf>,

    /// Install roots overriding the default edition paths, from `vs<year>_install`.
    pub install_overrides: BTreeMap<VisualStudioVersion, PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("."),
            architectures: Architecture::ALL.to_vec(),
            include_store: true,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
            program_files_x86: PathBuf::from(DEFAULT_PROGRAM_FILES_X86),
            program_data: None,
            install_overrides: BTreeMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Construct an instance from the current process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Construct an instance from environment variables.
    ///
    /// Variable names are matched case-insensitively, as Windows does.
    pub fn from_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let vars = vars
            .into_iter()
            .filter_map(|(k, v)| k.into_string().ok().map(|k| (k.to_ascii_lowercase(), v)))
            .collect::<BTreeMap<_, _>>();

        let mut config = Self::default();

        if let Some(p) = vars.get("programfiles(x86)") {
            config.program_files_x86 = PathBuf::from(p);
        }
        config.program_data = vars.get("programdata").map(PathBuf::from);

        for version in VisualStudioVersion::NEWEST_FIRST {
            let key = format!("vs{}_install", version.year());
            if let Some(p) = vars.get(&key) {
                config.install_overrides.insert(version, PathBuf::from(p));
            }
        }

        config
    }

    /// Roots below which the Visual Studio installer lives.
    pub fn installer_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.program_files_x86.clone()];
        roots.extend(self.program_data.iter().cloned());

        roots
    }
}
