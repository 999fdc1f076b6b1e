// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Visual C++ toolchain environments for build file generators.

This crate locates a Visual Studio installation, runs its `vcvarsall.bat`
for every requested target variant, caches the captured environments and
renders the resulting compiler, include and library settings as GN
declarations.
*/

pub mod cache;
pub mod compiler;
pub mod config;
pub mod environment;
pub mod error;
pub mod extractor;
pub mod gn;
pub mod locator;
pub mod metadata;
pub mod orchestrator;
pub mod registry;
pub mod setup;
#[cfg(test)]
mod testutil;
mod util;
pub mod version;
pub mod vswhere;

pub use {
    cache::EnvironmentCache,
    config::ResolverConfig,
    environment::{ChildEnvironment, EnvironmentMap},
    error::{ResolverError, Result},
    extractor::{SetupLauncher, ShellSetupLauncher},
    locator::{Installation, InstallationLocator, InstallationProbe},
    metadata::ToolchainMetadata,
    setup::{locator_for_request, SetupRequest, ToolchainResolver},
    version::{AppModel, Architecture, Variant, VersionSpecifier, VisualStudioVersion},
};
pub use util::normalize_path;
