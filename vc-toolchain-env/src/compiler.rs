// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Compiler version detection. */

use {
    crate::{
        environment::{child_environment_from_map, EnvironmentMap},
        error::{ResolverError, Result},
        metadata::COMPILER_BINARY,
    },
    log::debug,
    once_cell::sync::Lazy,
    regex::Regex,
    std::path::{Path, PathBuf},
};

static VERSION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" ([0-9]+(?:\.[0-9]+)+)").expect("valid regex"));

static DEFINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#define ([a-zA-Z0-9_]+) (.*)").expect("valid regex"));

/// Patch levels at or above this are ignored for GNU style compilers.
pub const LEGACY_PATCH_LIMIT: u64 = 100;

/// Patch levels at or above this are ignored for clang-cl.
pub const CLANG_CL_PATCH_LIMIT: u64 = 1000;

/// Macros holding the version components of a compiler.
#[derive(Clone, Copy, Debug)]
pub struct VersionMacros {
    pub major: &'static str,
    pub minor: &'static str,
    pub patch: &'static str,
}

pub const GCC_VERSION_MACROS: VersionMacros = VersionMacros {
    major: "__GNUC__",
    minor: "__GNUC_MINOR__",
    patch: "__GNUC_PATCHLEVEL__",
};

pub const CLANG_VERSION_MACROS: VersionMacros = VersionMacros {
    major: "__clang_major__",
    minor: "__clang_minor__",
    patch: "__clang_patchlevel__",
};

/// Parse the version out of the banner `cl.exe` prints.
///
/// `Version 19.29.30037` becomes `192930037`. The version must have a two
/// digit major, a two digit minor and a five digit build number.
pub fn parse_cl_version(banner: &str) -> Result<u64> {
    let token = banner
        .lines()
        .find_map(|line| VERSION_TOKEN.captures(line))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            ResolverError::CompilerVersion(format!(
                "failed to find MSVC version string in: {}",
                banner.lines().next().unwrap_or_default()
            ))
        })?;

    let parts = token.split('.').collect::<Vec<_>>();
    if parts.len() < 3 || parts[0].len() != 2 || parts[1].len() != 2 || parts[2].len() != 5 {
        return Err(ResolverError::CompilerVersion(format!(
            "invalid MSVC version: {}",
            token
        )));
    }

    parts[..3]
        .concat()
        .parse::<u64>()
        .map_err(|e| ResolverError::CompilerVersion(format!("invalid MSVC version {}: {}", token, e)))
}

/// `#define NAME VALUE` pairs in a preprocessor macro dump.
pub fn parse_defines(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| DEFINE.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect()
}

fn parse_macro_value(name: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        ResolverError::CompilerVersion(format!("{} is not an integer: {}", name, value))
    })
}

/// Fold version macros into `major * 10000 + minor * 100 + patch`.
///
/// Patch levels at or above `patch_limit` don't fit the encoding and are dropped.
pub fn fold_version(
    defines: &[(String, String)],
    macros: &VersionMacros,
    patch_limit: u64,
) -> Result<u64> {
    let mut version = 0;

    for (name, value) in defines {
        if name == macros.major {
            version += 10000 * parse_macro_value(name, value)?;
        } else if name == macros.minor {
            version += 100 * parse_macro_value(name, value)?;
        } else if name == macros.patch {
            let patch = parse_macro_value(name, value)?;
            if patch < patch_limit {
                version += patch;
            }
        }
    }

    Ok(version)
}

/// Versions reported by clang-cl.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClangClVersion {
    /// Folded clang version.
    pub clang_version: u64,
    /// The `_MSC_FULL_VER` clang-cl emulates.
    pub msc_full_ver: u64,
}

/// Extract clang-cl versions from a macro dump.
pub fn parse_clang_cl_defines(output: &str) -> Result<ClangClVersion> {
    let defines = parse_defines(output);

    let msc_full_ver = defines
        .iter()
        .find(|(name, _)| name == "_MSC_FULL_VER")
        .map(|(name, value)| parse_macro_value(name, value))
        .transpose()?
        .unwrap_or(0);

    Ok(ClangClVersion {
        clang_version: fold_version(&defines, &CLANG_VERSION_MACROS, CLANG_CL_PATCH_LIMIT)?,
        msc_full_ver,
    })
}

/// Run a compiler's preprocessor on empty input and return its macro dump.
fn dump_macros(compiler: &Path, args: Vec<String>) -> Result<String> {
    debug!("probing macros of {}", compiler.display());

    let output = duct::cmd(compiler, args)
        .stdin_bytes("\n")
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| {
            ResolverError::CompilerVersion(format!("running {}: {}", compiler.display(), e))
        })?;

    if !output.status.success() {
        return Err(ResolverError::CompilerVersion(format!(
            "{} failed with {}: {}",
            compiler.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Path of clang-cl below an LLVM installation root.
pub fn clang_cl_path(clang_base_path: &Path) -> PathBuf {
    clang_base_path.join("bin").join("clang-cl")
}

/// Ask clang-cl for its version while emulating the given `_MSC_VER`.
pub fn probe_clang_cl_version(clang_base_path: &Path, msc_ver: &str) -> Result<ClangClVersion> {
    let output = dump_macros(
        &clang_cl_path(clang_base_path),
        vec![
            format!("-fmsc-version={}", msc_ver),
            "-Xclang".to_string(),
            "-dM".to_string(),
            "-E".to_string(),
            "-".to_string(),
        ],
    )?;

    parse_clang_cl_defines(&output)
}

/// Version of a GNU style compiler driver (gcc or clang).
pub fn probe_gnu_compiler_version(compiler: &Path, macros: &VersionMacros) -> Result<u64> {
    let output = dump_macros(
        compiler,
        vec!["-dM".to_string(), "-E".to_string(), "-".to_string()],
    )?;

    fold_version(&parse_defines(&output), macros, LEGACY_PATCH_LIMIT)
}

/// Run `cl.exe` in a toolchain environment and parse its banner.
pub fn probe_cl_version(vc_bin_dir: &Path, env: &EnvironmentMap) -> Result<u64> {
    let cl = vc_bin_dir.join(COMPILER_BINARY);
    debug!("probing version of {}", cl.display());

    // cl.exe prints its banner on stderr and exits with an error without inputs.
    let output = duct::cmd(cl.clone(), Vec::<String>::new())
        .full_env(child_environment_from_map(env).iter())
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()
        .map_err(|e| ResolverError::CompilerVersion(format!("running {}: {}", cl.display(), e)))?;

    parse_cl_version(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CL_BANNER: &str = "\
Microsoft (R) C/C++ Optimizing Compiler Version 19.29.30037 for x64\r
Copyright (C) Microsoft Corporation.  All rights reserved.\r
\r
usage: cl [ option... ] filename... [ /link linkoption... ]\r
";

    #[test]
    fn cl_banner() -> anyhow::Result<()> {
        assert_eq!(parse_cl_version(CL_BANNER)?, 192930037);

        // Localized banners still carry the version token.
        assert_eq!(
            parse_cl_version("Microsoft (R) C/C++-Optimierungscompiler Version 19.16.27045 für x86")?,
            191627045
        );

        // Build revision components are ignored.
        assert_eq!(
            parse_cl_version("Microsoft (R) C/C++ Optimizing Compiler Version 19.00.24215.1 for x86")?,
            190024215
        );

        Ok(())
    }

    #[test]
    fn malformed_cl_banner() {
        assert!(parse_cl_version("Compiler Version 19.2.30037 for x64").is_err());
        assert!(parse_cl_version("Compiler Version 19.29 for x64").is_err());
        assert!(parse_cl_version("'cl.exe' is not recognized").is_err());
    }

    #[test]
    fn clang_cl_defines() -> anyhow::Result<()> {
        let output = "\
#define _MSC_FULL_VER 192000000
#define _MSC_VER 1920
#define __clang_major__ 12
#define __clang_minor__ 0
#define __clang_patchlevel__ 1
#define __clang_version__ \"12.0.1 \"
";

        assert_eq!(
            parse_clang_cl_defines(output)?,
            ClangClVersion {
                clang_version: 120001,
                msc_full_ver: 192000000,
            }
        );

        Ok(())
    }

    #[test]
    fn patch_limits() -> anyhow::Result<()> {
        let defines = parse_defines(
            "#define __GNUC__ 9\n#define __GNUC_MINOR__ 3\n#define __GNUC_PATCHLEVEL__ 150\n",
        );
        assert_eq!(
            fold_version(&defines, &GCC_VERSION_MACROS, LEGACY_PATCH_LIMIT)?,
            90300
        );
        assert_eq!(
            fold_version(&defines, &GCC_VERSION_MACROS, CLANG_CL_PATCH_LIMIT)?,
            90450
        );

        let defines = parse_defines("#define __GNUC__ 11\n#define __GNUC_PATCHLEVEL__ 2\n");
        assert_eq!(
            fold_version(&defines, &GCC_VERSION_MACROS, LEGACY_PATCH_LIMIT)?,
            110002
        );

        Ok(())
    }

    #[test]
    fn non_integer_macro() {
        let defines = parse_defines("#define __clang_major__ twelve\n");
        assert!(fold_version(&defines, &CLANG_VERSION_MACROS, CLANG_CL_PATCH_LIMIT).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn probe_scripts() -> anyhow::Result<()> {
        use {crate::testutil::*, std::os::unix::fs::PermissionsExt};

        let temp = temp_dir("compiler-probe")?;

        let gcc = temp.path().join("gcc");
        std::fs::write(
            &gcc,
            "#!/bin/sh\ncat >/dev/null\necho '#define __GNUC__ 10'\necho '#define __GNUC_MINOR__ 2'\necho '#define __GNUC_PATCHLEVEL__ 1'\n",
        )?;
        std::fs::set_permissions(&gcc, std::fs::Permissions::from_mode(0o755))?;
        assert_eq!(probe_gnu_compiler_version(&gcc, &GCC_VERSION_MACROS)?, 100201);

        let cl = temp.path().join(COMPILER_BINARY);
        std::fs::write(
            &cl,
            "#!/bin/sh\necho 'Microsoft (R) C/C++ Optimizing Compiler Version 19.29.30037 for x64' >&2\nexit 2\n",
        )?;
        std::fs::set_permissions(&cl, std::fs::Permissions::from_mode(0o755))?;
        let mut env = EnvironmentMap::new();
        env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        assert_eq!(probe_cl_version(temp.path(), &env)?, 192930037);

        assert!(probe_clang_cl_version(&temp.path().join("missing"), "1920").is_err());

        Ok(())
    }
}
