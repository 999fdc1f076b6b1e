// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Visual Studio releases, target architectures and toolchain variants. */

use {
    crate::error::ResolverError,
    std::{
        convert::TryFrom,
        fmt::{Display, Formatter},
        str::FromStr,
    },
};

/// A supported Visual Studio release.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum VisualStudioVersion {
    Vs2013,
    Vs2015,
    Vs2017,
    Vs2019,
}

impl VisualStudioVersion {
    /// All supported releases, newest first.
    pub const NEWEST_FIRST: [Self; 4] = [Self::Vs2019, Self::Vs2017, Self::Vs2015, Self::Vs2013];

    /// The marketing year of this release.
    pub fn year(&self) -> &'static str {
        match self {
            Self::Vs2013 => "2013",
            Self::Vs2015 => "2015",
            Self::Vs2017 => "2017",
            Self::Vs2019 => "2019",
        }
    }

    /// Major version number used by the installer and the registry.
    pub fn major(&self) -> u32 {
        match self {
            Self::Vs2013 => 12,
            Self::Vs2015 => 14,
            Self::Vs2017 => 15,
            Self::Vs2019 => 16,
        }
    }

    /// Vendor-internal version string, e.g. `16.0`.
    pub fn internal_version(&self) -> String {
        format!("{}.0", self.major())
    }

    /// The `_MSC_VER` value a compiler from this release reports.
    ///
    /// See https://docs.microsoft.com/en-us/cpp/preprocessor/predefined-macros.
    pub fn msc_ver(&self) -> u32 {
        match self {
            Self::Vs2013 => 1800,
            Self::Vs2015 => 1900,
            Self::Vs2017 => 1910,
            Self::Vs2019 => 1920,
        }
    }

    /// Whether installations are registered with the vswhere installer database.
    pub fn uses_installer_query(&self) -> bool {
        matches!(self, Self::Vs2017 | Self::Vs2019)
    }

    /// Whether `vcvarsall.bat` accepts the `store` keyword.
    pub fn supports_store_keyword(&self) -> bool {
        !matches!(self, Self::Vs2013)
    }

    fn supported_years() -> String {
        let mut years = Self::NEWEST_FIRST
            .iter()
            .map(|v| v.year())
            .collect::<Vec<_>>();
        years.reverse();
        years.join(", ")
    }
}

impl Display for VisualStudioVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.year())
    }
}

impl FromStr for VisualStudioVersion {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NEWEST_FIRST
            .iter()
            .find(|v| v.year() == s)
            .copied()
            .ok_or_else(|| ResolverError::UnsupportedVersion {
                requested: s.to_string(),
                supported: Self::supported_years(),
            })
    }
}

/// A requested Visual Studio release.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VersionSpecifier {
    /// The newest release that is installed.
    #[default]
    Latest,
    /// One specific release.
    Exact(VisualStudioVersion),
}

impl Display for VersionSpecifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Exact(v) => v.fmt(f),
        }
    }
}

impl FromStr for VersionSpecifier {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" | "default" => Ok(Self::Latest),
            _ => Ok(Self::Exact(VisualStudioVersion::from_str(s)?)),
        }
    }
}

/// A target CPU architecture.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Architecture {
    X86,
    X64,
    Arm,
    Arm64,
}

impl Architecture {
    pub const ALL: [Self; 4] = [Self::X86, Self::X64, Self::Arm, Self::Arm64];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
        }
    }

    /// Argument passed to `vcvarsall.bat` to select this target.
    ///
    /// Only x64 hosted tools are used. x64 is the default target, so every
    /// other architecture needs the compound host_target form.
    pub fn setup_argument(&self) -> String {
        match self {
            Self::X64 => "amd64".to_string(),
            _ => format!("amd64_{}", self.as_str()),
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Architecture {
    type Error = ResolverError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "x86" => Ok(Self::X86),
            "x64" => Ok(Self::X64),
            "arm" => Ok(Self::Arm),
            "arm64" => Ok(Self::Arm64),
            _ => Err(ResolverError::InvalidArgument(format!(
                "{} is not a valid architecture; use 'x86', 'x64', 'arm', or 'arm64'",
                value
            ))),
        }
    }
}

/// Application model a toolchain environment targets.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AppModel {
    Desktop,
    /// Windows Store / UWP applications.
    Store,
}

/// One (architecture, app model) pair with its own environment.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Variant {
    pub arch: Architecture,
    pub app_model: AppModel,
}

impl Variant {
    pub fn new(arch: Architecture, app_model: AppModel) -> Self {
        Self { arch, app_model }
    }

    /// Every variant for the given architectures, desktop before store per architecture.
    pub fn product(archs: &[Architecture], include_store: bool) -> Vec<Self> {
        let mut res = vec![];
        for arch in archs {
            res.push(Self::new(*arch, AppModel::Desktop));
            if include_store {
                res.push(Self::new(*arch, AppModel::Store));
            }
        }

        res
    }

    /// `<arch>` or `<arch>_uwp`.
    pub fn name(&self) -> String {
        match self.app_model {
            AppModel::Desktop => self.arch.to_string(),
            AppModel::Store => format!("{}_uwp", self.arch),
        }
    }

    /// File name of the cached environment block for this variant.
    pub fn cache_file_name(&self) -> String {
        format!("environment_{}", self.name())
    }

    pub fn is_store(&self) -> bool {
        self.app_model == AppModel::Store
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_specifier() {
        assert_eq!(
            VersionSpecifier::from_str("latest").unwrap(),
            VersionSpecifier::Latest
        );
        assert_eq!(
            VersionSpecifier::from_str("default").unwrap(),
            VersionSpecifier::Latest
        );
        assert_eq!(
            VersionSpecifier::from_str("2017").unwrap(),
            VersionSpecifier::Exact(VisualStudioVersion::Vs2017)
        );

        let err = VersionSpecifier::from_str("2010").unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedVersion { .. }));
        assert_eq!(
            err.to_string(),
            "Visual Studio version 2010 not supported; supported versions are: 2013, 2015, 2017, 2019"
        );
    }

    #[test]
    fn version_numbers() {
        assert_eq!(VisualStudioVersion::Vs2013.internal_version(), "12.0");
        assert_eq!(VisualStudioVersion::Vs2019.internal_version(), "16.0");
        assert_eq!(VisualStudioVersion::Vs2015.msc_ver(), 1900);
        assert!(VisualStudioVersion::Vs2017.uses_installer_query());
        assert!(!VisualStudioVersion::Vs2015.uses_installer_query());
        assert!(!VisualStudioVersion::Vs2013.supports_store_keyword());
    }

    #[test]
    fn setup_arguments() {
        assert_eq!(Architecture::X64.setup_argument(), "amd64");
        assert_eq!(Architecture::X86.setup_argument(), "amd64_x86");
        assert_eq!(Architecture::Arm64.setup_argument(), "amd64_arm64");
        assert!(Architecture::try_from("mips").is_err());
    }

    #[test]
    fn variant_names() {
        let variants = Variant::product(&[Architecture::X86, Architecture::Arm64], true);
        let names = variants.iter().map(|v| v.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["x86", "x86_uwp", "arm64", "arm64_uwp"]);
        assert_eq!(variants[1].cache_file_name(), "environment_x86_uwp");

        assert_eq!(Variant::product(&Architecture::ALL, false).len(), 4);
    }
}
