// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::environment::EnvironmentMap,
    once_cell::sync::Lazy,
    std::path::{Path, PathBuf},
};

pub static DEFAULT_TEMP_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    tempfile::Builder::new()
        .prefix("vc-toolchain-env-test")
        .tempdir()
        .expect("unable to create temporary directory")
});

/// Create a fresh temporary directory for a single test.
pub fn temp_dir(prefix: &str) -> std::io::Result<tempfile::TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(DEFAULT_TEMP_DIR.path())
}

/// A captured environment with every required variable.
pub fn sample_environment(sdk_dir: &str) -> EnvironmentMap {
    [
        ("INCLUDE", r"C:\VS\VC\include;C:\SDK\Include\um"),
        ("LIB", r"C:\VS\VC\lib\x64;C:\SDK\Lib\um\x64"),
        ("LIBPATH", r"C:\VS\VC\lib\x64"),
        ("PATH", r"C:\VS\VC\bin;C:\Windows\system32"),
        ("PATHEXT", ".COM;.EXE;.BAT"),
        ("SYSTEMROOT", r"C:\Windows"),
        ("TEMP", r"C:\Temp"),
        ("TMP", r"C:\Temp"),
        ("WINDOWSSDKDIR", sdk_dir),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// A fake toolchain layout on the local filesystem.
///
/// Contains a compiler directory and library directories holding the anchor
/// files metadata derivation looks for.
pub struct FakeToolchain {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
    pub crt_lib_dir: PathBuf,
    pub atlmfc_lib_dir: PathBuf,
    pub um_lib_dir: PathBuf,
    pub include_dir: PathBuf,
    pub sdk_dir: PathBuf,
}

impl FakeToolchain {
    pub fn create(root: &Path) -> std::io::Result<Self> {
        let toolchain = Self {
            root: root.to_path_buf(),
            bin_dir: root.join("VC").join("bin"),
            crt_lib_dir: root.join("VC").join("lib"),
            atlmfc_lib_dir: root.join("VC").join("atlmfc").join("lib"),
            um_lib_dir: root.join("SDK").join("Lib").join("um"),
            include_dir: root.join("VC").join("include"),
            sdk_dir: root.join("SDK"),
        };

        for dir in [
            &toolchain.bin_dir,
            &toolchain.crt_lib_dir,
            &toolchain.atlmfc_lib_dir,
            &toolchain.um_lib_dir,
            &toolchain.include_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }

        std::fs::create_dir_all(root.join("VC").join("Auxiliary").join("Build"))?;
        std::fs::write(
            root.join("VC")
                .join("Auxiliary")
                .join("Build")
                .join("vcvarsall.bat"),
            b"@echo off\r\n",
        )?;
        std::fs::write(toolchain.bin_dir.join("cl.exe"), b"")?;
        std::fs::write(toolchain.crt_lib_dir.join("msvcrt.lib"), b"")?;
        std::fs::write(toolchain.atlmfc_lib_dir.join("atls.lib"), b"")?;
        std::fs::write(toolchain.um_lib_dir.join("User32.Lib"), b"")?;

        Ok(toolchain)
    }

    /// An environment pointing at this toolchain.
    pub fn environment(&self) -> EnvironmentMap {
        let mut env = sample_environment(&self.sdk_dir.display().to_string());
        env.insert(
            "PATH".to_string(),
            format!(
                "{};{}",
                self.root.join("nonexistent").display(),
                self.bin_dir.display()
            ),
        );
        env.insert(
            "LIB".to_string(),
            format!(
                "{};{};{}",
                self.crt_lib_dir.display(),
                self.atlmfc_lib_dir.display(),
                self.um_lib_dir.display()
            ),
        );
        env.insert("INCLUDE".to_string(), format!("{};", self.include_dir.display()));

        env
    }
}
