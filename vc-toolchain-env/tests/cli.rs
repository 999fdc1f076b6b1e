// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::Result,
    assert_cmd::Command,
    assert_fs::{prelude::*, TempDir},
    predicates::prelude::*,
};

const EXPECTED_COMMANDS: &str = "Expected one of: get_dir, setup, get_gcc_version, get_clang_version";

fn get_command() -> Result<Command> {
    let mut command = Command::cargo_bin("vc-toolchain-env")?;
    command
        .env_remove("VC_TOOLCHAIN_CACHE_DIR")
        .env_remove("VC_TOOLCHAIN_SETUP_TIMEOUT")
        .env_remove("VSINSTALLDIR");

    Ok(command)
}

#[test]
fn no_command() -> Result<()> {
    get_command()?
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(EXPECTED_COMMANDS));

    Ok(())
}

#[test]
fn unknown_command() -> Result<()> {
    get_command()?
        .arg("get_vs_dir")
        .arg("2019")
        .assert()
        .failure()
        .stderr(predicate::str::contains(EXPECTED_COMMANDS));

    Ok(())
}

#[test]
fn missing_version() -> Result<()> {
    get_command()?
        .arg("get_dir")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(
            predicate::str::contains("<VERSION>").and(predicate::str::contains(EXPECTED_COMMANDS)),
        );

    Ok(())
}

#[test]
fn unsupported_version() -> Result<()> {
    get_command()?
        .arg("get_dir")
        .arg("2005")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(
            predicate::str::contains("error: [locate] Visual Studio version 2005 not supported")
                .and(predicate::str::contains("2013, 2015, 2017, 2019")),
        );

    Ok(())
}

#[cfg(unix)]
mod unix {
    use {super::*, std::os::unix::fs::PermissionsExt, std::path::Path};

    fn write_executable(path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;

        Ok(())
    }

    /// A Visual Studio install tree whose setup script leaves a marker when run.
    struct FakeInstall {
        root: std::path::PathBuf,
        bin_dir: std::path::PathBuf,
        marker: std::path::PathBuf,
    }

    impl FakeInstall {
        fn create(temp: &TempDir) -> Result<Self> {
            let root = temp.child("vs");
            let marker = temp.path().join("setup-script-ran");

            root.child("VC/Auxiliary/Build/vcvarsall.bat")
                .write_str(&format!("touch '{}'\nexit 1\n", marker.display()))?;
            root.child("VC/bin").create_dir_all()?;
            root.child("VC/lib/msvcrt.lib").touch()?;
            root.child("VC/atlmfc/lib/atls.lib").touch()?;
            root.child("SDK/Lib/um/User32.Lib").touch()?;
            root.child("VC/include").create_dir_all()?;

            let bin_dir = std::fs::canonicalize(root.path().join("VC").join("bin"))?;
            write_executable(
                &bin_dir.join("cl.exe"),
                "#!/bin/sh\necho 'Microsoft (R) C/C++ Optimizing Compiler Version 19.16.27045 for x64' >&2\nexit 2\n",
            )?;

            Ok(Self {
                root: std::fs::canonicalize(root.path())?,
                bin_dir,
                marker,
            })
        }

        /// Cached environment block pointing at this install.
        fn environment_block(&self, sdk: &Path) -> Vec<u8> {
            let root = self.root.display();
            let vars = [
                format!("INCLUDE={}/VC/include", root),
                format!(
                    "LIB={}/VC/lib;{}/VC/atlmfc/lib;{}/SDK/Lib/um",
                    root, root, root
                ),
                format!("PATH={}/VC/bin;/usr/bin", root),
                "SYSTEMROOT=C:\\Windows".to_string(),
                "TEMP=/tmp".to_string(),
                "TMP=/tmp".to_string(),
                format!("WINDOWSSDKDIR={}", sdk.display()),
            ];

            let mut data = vec![];
            for var in vars {
                data.extend_from_slice(var.as_bytes());
                data.push(0);
            }
            data.push(0);

            data
        }
    }

    #[test]
    fn get_dir_default_path() -> Result<()> {
        let temp = TempDir::new()?;
        let install = temp.child("Microsoft Visual Studio/2019/Community");
        install
            .child("VC/Auxiliary/Build/vcvarsall.bat")
            .write_str("")?;

        get_command()?
            .env("ProgramFiles(x86)", temp.path())
            .arg("get_dir")
            .arg("2019")
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("{}\n", install.path().display())));

        Ok(())
    }

    #[test]
    fn get_dir_missing() -> Result<()> {
        let temp = TempDir::new()?;

        get_command()?
            .env("ProgramFiles(x86)", temp.path())
            .arg("get_dir")
            .arg("2019")
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "error: [locate] Visual Studio version 2019 not found",
            ));

        Ok(())
    }

    #[test]
    fn setup_from_cache_is_idempotent() -> Result<()> {
        let temp = TempDir::new()?;
        let fake = FakeInstall::create(&temp)?;
        let sdk = fake.root.join("SDK");
        temp.child("environment_x64")
            .write_binary(&fake.environment_block(&sdk))?;

        let run = || -> Result<Vec<u8>> {
            let output = get_command()?
                .current_dir(temp.path())
                .args(["setup", "2017"])
                .arg(&fake.root)
                .args(["--cpus", "x64", "--no-uwp"])
                .assert()
                .success()
                .get_output()
                .stdout
                .clone();

            Ok(output)
        };

        let first = run()?;
        let second = run()?;
        assert_eq!(first, second);
        assert!(!fake.marker.exists());

        let stdout = String::from_utf8(first)?;
        assert!(stdout.starts_with("x64 = {\nenv_filename = \"environment_x64\"\n"));
        assert!(stdout.contains(&format!("vc_bin_dir = \"{}\"\n", fake.bin_dir.display())));
        assert!(stdout.contains("include_flags_I = \"/Ivs/VC/include\"\n"));
        assert!(stdout.contains(
            "libpath_flags = \"-libpath:vs/VC/lib -libpath:vs/VC/atlmfc/lib -libpath:vs/SDK/Lib/um\"\n"
        ));
        assert!(stdout.contains("visual_studio_version = \"2017\"\n"));
        assert!(stdout.ends_with("msc_ver = 1916\nmsc_full_ver = 191627045\n"));

        Ok(())
    }

    #[test]
    fn setup_script_failure() -> Result<()> {
        let temp = TempDir::new()?;
        let fake = FakeInstall::create(&temp)?;

        get_command()?
            .current_dir(temp.path())
            .args(["setup", "2019"])
            .arg(&fake.root)
            .args(["--cpus", "arm", "--no-uwp"])
            .assert()
            .failure()
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("error: [extract] extracting environment for arm"));

        assert!(fake.marker.exists());
        temp.child("environment_arm").assert(predicate::path::missing());

        Ok(())
    }

    #[test]
    fn sdk_mismatch_emits_nothing() -> Result<()> {
        let temp = TempDir::new()?;
        let fake = FakeInstall::create(&temp)?;
        temp.child("SDK2").create_dir_all()?;

        let cache = temp.child("cache");
        cache
            .child("environment_x86")
            .write_binary(&fake.environment_block(&fake.root.join("SDK")))?;
        cache
            .child("environment_x64")
            .write_binary(&fake.environment_block(&temp.path().join("SDK2")))?;

        get_command()?
            .current_dir(temp.path())
            .args(["setup", "2015"])
            .arg(&fake.root)
            .arg("default")
            .args(["--cpus", "x86,x64", "--no-uwp", "--cache-dir"])
            .arg(cache.path())
            .assert()
            .failure()
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains(
                "error: [emit] different WINDOWSSDKDIR values",
            ));

        assert!(!fake.marker.exists());

        Ok(())
    }

    #[test]
    fn gcc_version() -> Result<()> {
        let temp = TempDir::new()?;
        let gcc = temp.path().join("gcc");
        write_executable(
            &gcc,
            "#!/bin/sh\ncat >/dev/null\nprintf '#define __GNUC__ 9\\n#define __GNUC_MINOR__ 4\\n#define __GNUC_PATCHLEVEL__ 0\\n'\n",
        )?;

        get_command()?
            .arg("get_gcc_version")
            .arg(&gcc)
            .assert()
            .success()
            .stdout("90400\n");

        Ok(())
    }
}
