// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Deriving build settings from a captured toolchain environment. */

use {
    crate::{
        environment::{split_list, EnvironmentMap},
        util::{real_path, relative_to},
        version::Variant,
    },
    log::info,
    once_cell::sync::Lazy,
    rayon::prelude::*,
    regex::Regex,
    std::path::{Path, PathBuf},
};

/// The compiler driver.
pub const COMPILER_BINARY: &str = "cl.exe";

/// Import library of the C runtime.
pub const CRT_LIBRARY: &str = "msvcrt.lib";

/// Import library of ATL, only present when ATL/MFC is installed.
pub const ATLMFC_LIBRARY: &str = "atls.lib";

/// A Windows API import library from the SDK.
pub const UM_LIBRARY: &str = "User32.Lib";

static UNQUOTED_FLAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._/\\:-]*$").expect("valid regex"));

/// Build settings of one toolchain variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolchainMetadata {
    pub variant: Variant,
    /// Name of the environment block file for this variant.
    pub env_filename: String,
    /// Directory containing the compiler.
    pub vc_bin_dir: PathBuf,
    /// Include directories as `/I` flags.
    pub include_flags_i: String,
    /// Include directories as `-imsvc` flags.
    pub include_flags_imsvc: String,
    pub vc_lib_path: PathBuf,
    pub vc_lib_atlmfc_path: Option<PathBuf>,
    pub vc_lib_um_path: PathBuf,
    /// The environment's `PATH`, verbatim.
    pub paths: String,
    /// Library directories as `-libpath:` flags.
    pub libpath_flags: String,
    pub windows_sdk_path: PathBuf,
}

/// Quote a flag if it contains spaces or other unusual characters.
pub fn quote_flag(flag: &str) -> String {
    if UNQUOTED_FLAG.is_match(flag) {
        flag.to_string()
    } else {
        format!("\"{}\"", flag)
    }
}

/// First directory in a list variable containing the given file.
///
/// Later entries containing the file are ignored.
pub fn find_directory_containing(list: &str, file_name: &str) -> Option<PathBuf> {
    split_list(list)
        .map(Path::new)
        .find(|dir| dir.join(file_name).exists())
        .map(real_path)
}

/// Rewrite list entries relative to `base_dir` where possible and escape quotes.
fn flag_paths(list: &str, base_dir: &Path) -> Vec<String> {
    split_list(list)
        .map(|entry| {
            let path = Path::new(entry);
            let path = relative_to(path, base_dir).unwrap_or_else(|| path.to_path_buf());

            path.display().to_string().replace('"', r#"\""#)
        })
        .collect()
}

fn join_flags(prefix: &str, paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| quote_flag(&format!("{}{}", prefix, p)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive the build settings of a variant.
///
/// Returns `None` for incomplete installations, e.g. when the compiler
/// supports an architecture the installed Windows SDK does not.
pub fn derive_metadata(
    variant: Variant,
    env: &EnvironmentMap,
    base_dir: &Path,
) -> Option<ToolchainMetadata> {
    let empty = String::new();
    let path = env.get("PATH").unwrap_or(&empty);
    let lib = env.get("LIB").unwrap_or(&empty);
    let include = env.get("INCLUDE").unwrap_or(&empty);

    let vc_bin_dir = match find_directory_containing(path, COMPILER_BINARY) {
        Some(dir) => dir,
        None => {
            info!("ignoring {}: {} not found in PATH", variant, COMPILER_BINARY);
            return None;
        }
    };

    let vc_lib_path = find_directory_containing(lib, CRT_LIBRARY);
    let vc_lib_atlmfc_path = find_directory_containing(lib, ATLMFC_LIBRARY);
    let vc_lib_um_path = find_directory_containing(lib, UM_LIBRARY);

    let (vc_lib_path, vc_lib_um_path) = match (vc_lib_path, vc_lib_um_path) {
        (Some(crt), Some(um)) => (crt, um),
        _ => {
            info!("ignoring incomplete installation for {}", variant);
            return None;
        }
    };

    let windows_sdk_path = match env.get("WINDOWSSDKDIR") {
        Some(dir) => real_path(Path::new(dir)),
        None => {
            info!("ignoring {}: WINDOWSSDKDIR not defined", variant);
            return None;
        }
    };

    let include = flag_paths(include, base_dir);
    let lib = flag_paths(lib, base_dir);

    Some(ToolchainMetadata {
        variant,
        env_filename: variant.cache_file_name(),
        vc_bin_dir,
        include_flags_i: join_flags("/I", &include),
        include_flags_imsvc: join_flags("-imsvc", &include),
        vc_lib_path,
        vc_lib_atlmfc_path,
        vc_lib_um_path,
        paths: path.clone(),
        libpath_flags: join_flags("-libpath:", &lib),
        windows_sdk_path,
    })
}

/// Derive the build settings of every variant, dropping incomplete ones.
///
/// Order of the input is preserved.
pub fn derive_all(envs: &[(Variant, EnvironmentMap)], base_dir: &Path) -> Vec<ToolchainMetadata> {
    envs.par_iter()
        .filter_map(|(variant, env)| derive_metadata(*variant, env, base_dir))
        .collect()
}
