// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Emitting toolchain settings as GN declarations.

The output is a sequence of `key = value` assignments, with one
`<variant> = { ... }` scope per resolved variant followed by top-level
settings shared by all variants.
*/

use {
    crate::{
        error::{ResolverError, Result},
        metadata::ToolchainMetadata,
    },
    std::{
        fmt::{Display, Formatter, Write},
        path::{Path, PathBuf},
    },
};

/// A value in a GN assignment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GnValue {
    String(String),
    Integer(u64),
}

impl Display for GnValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::String(s) => {
                f.write_char('"')?;
                for c in s.chars() {
                    match c {
                        '\\' | '"' | '$' => {
                            f.write_char('\\')?;
                            f.write_char(c)?;
                        }
                        c => f.write_char(c)?,
                    }
                }
                f.write_char('"')
            }
        }
    }
}

impl From<&str> for GnValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for GnValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&Path> for GnValue {
    fn from(v: &Path) -> Self {
        Self::String(v.display().to_string())
    }
}

impl From<u64> for GnValue {
    fn from(v: u64) -> Self {
        Self::Integer(v)
    }
}

/// Compiler versions reported at top level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompilerDeclaration {
    /// The native compiler's `_MSC_FULL_VER`.
    Msvc { msc_full_ver: u64 },
    /// clang-cl and the `_MSC_FULL_VER` it emulates.
    ClangCl { clang_version: u64, msc_full_ver: u64 },
}

impl CompilerDeclaration {
    pub fn msc_full_ver(&self) -> u64 {
        match self {
            Self::Msvc { msc_full_ver } | Self::ClangCl { msc_full_ver, .. } => *msc_full_ver,
        }
    }

    /// `_MSC_VER` derived from the full version, e.g. `1929` from `192930037`.
    pub fn msc_ver(&self) -> u64 {
        self.msc_full_ver() / 100000
    }
}

/// Top-level settings following the variant scopes.
#[derive(Clone, Debug)]
pub struct ToolchainDeclaration<'a> {
    pub visual_studio_version: &'a str,
    pub visual_studio_path: &'a Path,
    pub windows_sdk_path: &'a Path,
    pub compiler: CompilerDeclaration,
}

/// The Windows SDK shared by every variant.
pub fn unique_sdk_path(metadata: &[ToolchainMetadata]) -> Result<PathBuf> {
    let first = metadata.first().ok_or(ResolverError::NoUsableVariant)?;

    if let Some(other) = metadata
        .iter()
        .find(|m| m.windows_sdk_path != first.windows_sdk_path)
    {
        return Err(ResolverError::SdkMismatch(format!(
            "{} uses {}; {} uses {}",
            first.variant,
            first.windows_sdk_path.display(),
            other.variant,
            other.windows_sdk_path.display()
        )));
    }

    Ok(first.windows_sdk_path.clone())
}

fn assign(out: &mut String, key: &str, value: impl Into<GnValue>) {
    // Writing to a String can't fail.
    let _ = writeln!(out, "{} = {}", key, value.into());
}

fn emit_variant(out: &mut String, m: &ToolchainMetadata) {
    let _ = writeln!(out, "{} = {{", m.variant.name());

    assign(out, "env_filename", m.env_filename.as_str());
    assign(out, "vc_bin_dir", m.vc_bin_dir.as_path());
    assign(out, "include_flags_I", m.include_flags_i.as_str());
    assign(out, "include_flags_imsvc", m.include_flags_imsvc.as_str());
    assign(out, "vc_lib_path", m.vc_lib_path.as_path());
    if let Some(path) = &m.vc_lib_atlmfc_path {
        assign(out, "vc_lib_atlmfc_path", path.as_path());
    }
    assign(out, "vc_lib_um_path", m.vc_lib_um_path.as_path());
    assign(out, "paths", m.paths.as_str());
    assign(out, "libpath_flags", m.libpath_flags.as_str());

    out.push_str("}\n");
}

/// Render the declarations for all variants and the shared settings.
///
/// Nothing is rendered unless the variants agree on a single Windows SDK.
pub fn emit_declarations(
    metadata: &[ToolchainMetadata],
    toolchain: &ToolchainDeclaration,
) -> Result<String> {
    let sdk = unique_sdk_path(metadata)?;
    if sdk != toolchain.windows_sdk_path {
        return Err(ResolverError::SdkMismatch(format!(
            "resolved variants use {}, not {}",
            sdk.display(),
            toolchain.windows_sdk_path.display()
        )));
    }

    let mut out = String::new();

    for m in metadata {
        emit_variant(&mut out, m);
    }

    assign(&mut out, "visual_studio_version", toolchain.visual_studio_version);
    assign(&mut out, "visual_studio_path", toolchain.visual_studio_path);
    assign(&mut out, "windows_sdk_path", toolchain.windows_sdk_path);

    if let CompilerDeclaration::ClangCl { clang_version, .. } = toolchain.compiler {
        assign(&mut out, "clang_version", clang_version);
    }
    assign(&mut out, "msc_ver", toolchain.compiler.msc_ver());
    assign(&mut out, "msc_full_ver", toolchain.compiler.msc_full_ver());

    Ok(out)
}
