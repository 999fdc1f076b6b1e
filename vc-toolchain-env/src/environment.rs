// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Toolchain environment variables. */

use {
    crate::error::{ResolverError, Result},
    std::{
        collections::BTreeMap,
        ffi::{OsStr, OsString},
        path::Path,
    },
};

/// Environment variables needed to run the toolchain, keyed by upper case name.
pub type EnvironmentMap = BTreeMap<String, String>;

/// Separator of list valued variables such as `PATH` and `INCLUDE`.
pub const LIST_SEPARATOR: char = ';';

/// Variables captured from the setup script's environment, lower case.
pub const CAPTURED_VARIABLES: &[&str] = &[
    "include",
    "lib",
    "libpath",
    "path",
    "pathext",
    "systemroot",
    "temp",
    "tmp",
    "windowssdkdir",
];

/// Variables every captured environment must define.
pub const REQUIRED_VARIABLES: &[&str] = &["SYSTEMROOT", "TEMP", "TMP"];

/// Variables removed from the inherited environment when a previous setup script ran.
///
/// vcvarsall.bat appends to the list variables, so running it in an already
/// configured shell would yield duplicate entries. Newer releases also fail
/// outright when `VSINSTALLDIR` points to an older release.
const STALE_SETUP_VARIABLES: &[&str] = &["VSINSTALLDIR", "INCLUDE", "LIB", "LIBPATH"];

/// Extract the captured variables from the output of cmd.exe's `set` command.
///
/// `interpreter_dir` is prepended to `PATH` so the directory holding this tool
/// remains reachable from the toolchain environment.
pub fn parse_environment_dump(
    variant: &str,
    output: &str,
    interpreter_dir: Option<&Path>,
) -> Result<EnvironmentMap> {
    // This occasionally happens and leads to misleading SYSTEMROOT errors if
    // not caught here.
    if !output.contains('=') {
        return Err(ResolverError::EnvironmentExtraction {
            variant: variant.to_string(),
            message: "setup script output contains no environment assignments".to_string(),
            output: Some(output.to_string()),
            timed_out: false,
        });
    }

    let mut env = EnvironmentMap::new();

    for line in output.lines() {
        let captured = CAPTURED_VARIABLES.iter().find(|name| {
            line.get(..name.len() + 1).map_or(false, |prefix| {
                prefix.ends_with('=') && prefix[..name.len()].eq_ignore_ascii_case(name)
            })
        });

        if let Some(name) = captured {
            let value = &line[name.len() + 1..];

            let value = match (*name, interpreter_dir) {
                ("path", Some(dir)) => {
                    format!("{}{}{}", dir.display(), LIST_SEPARATOR, value)
                }
                _ => value.to_string(),
            };

            env.insert(name.to_ascii_uppercase(), value);
        }
    }

    for required in REQUIRED_VARIABLES {
        if !env.contains_key(*required) {
            return Err(ResolverError::EnvironmentExtraction {
                variant: variant.to_string(),
                message: format!(
                    "environment variable \"{}\" required to be set to valid path",
                    required
                ),
                output: Some(output.to_string()),
                timed_out: false,
            });
        }
    }

    Ok(env)
}

/// Split a list valued variable into its non-empty entries.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(LIST_SEPARATOR).filter(|s| !s.is_empty())
}

/// Directory holding the running executable.
pub fn interpreter_dir() -> Option<std::path::PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
}

/// Environment passed to setup script processes.
///
/// This is derived once from an inherited environment and handed to every
/// spawned process. The current process environment is never modified.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChildEnvironment {
    vars: BTreeMap<OsString, OsString>,
}

impl ChildEnvironment {
    /// Construct from the current process environment.
    pub fn from_current_process() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Construct from inherited variables, dropping leftovers of a prior setup script run.
    pub fn from_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        let vars = vars.into_iter().collect::<BTreeMap<_, _>>();

        let previously_configured = vars
            .keys()
            .any(|k| k.eq_ignore_ascii_case(STALE_SETUP_VARIABLES[0]));

        let vars = if previously_configured {
            vars.into_iter()
                .filter(|(k, _)| {
                    !STALE_SETUP_VARIABLES
                        .iter()
                        .any(|stale| k.eq_ignore_ascii_case(stale))
                })
                .collect()
        } else {
            vars
        };

        Self { vars }
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        let key = key.as_ref();
        self.vars
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_os_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsString, &OsString)> {
        self.vars.iter()
    }
}

/// Build a child environment from a captured toolchain environment.
pub fn child_environment_from_map(env: &EnvironmentMap) -> ChildEnvironment {
    ChildEnvironment::from_vars(
        env.iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v))),
    )
}
