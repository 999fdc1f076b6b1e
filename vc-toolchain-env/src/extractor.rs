// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Running `vcvarsall.bat` and capturing the environment it produces. */

use {
    crate::{
        cache::derive_store_overlay,
        environment::{parse_environment_dump, ChildEnvironment, EnvironmentMap},
        error::{ResolverError, Result},
        locator::Installation,
        version::Variant,
    },
    log::{debug, warn},
    std::{
        path::{Path, PathBuf},
        time::{Duration, Instant},
    },
};

/// How often a running setup script is checked for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Character encoding of captured script output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputEncoding {
    Utf8,
    /// What `cmd.exe /u` writes for internal commands such as `set`.
    Utf16Le,
}

impl OutputEncoding {
    /// The encoding the shell launcher requests on this platform.
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Utf16Le
        } else {
            Self::Utf8
        }
    }

    /// Decode output, rejecting anything that isn't valid in this encoding.
    pub fn decode(self, data: &[u8]) -> std::result::Result<String, String> {
        match self {
            Self::Utf8 => String::from_utf8(data.to_vec())
                .map_err(|e| format!("output is not valid UTF-8: {}", e)),
            Self::Utf16Le => {
                if data.len() % 2 != 0 {
                    return Err(format!(
                        "output is not valid UTF-16: odd length {}",
                        data.len()
                    ));
                }

                String::from_utf16(&utf16_units(data))
                    .map_err(|e| format!("output is not valid UTF-16: {}", e))
            }
        }
    }

    /// Decode output for diagnostics, replacing invalid sequences.
    pub fn decode_lossy(self, data: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Self::Utf16Le => String::from_utf16_lossy(&utf16_units(data)),
        }
    }
}

fn utf16_units(data: &[u8]) -> Vec<u16> {
    data.chunks(2)
        .map(|c| u16::from_le_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect()
}

/// A single invocation of the setup script for one variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SetupInvocation {
    pub variant: Variant,
    pub setup_script: PathBuf,
    /// Windows SDK version to select. `None` lets the script pick.
    pub sdk_version: Option<String>,
    /// Whether to pass the `store` keyword.
    pub store_keyword: bool,
    /// Whether the store environment is derived from the desktop one after capture.
    pub store_overlay: bool,
}

impl SetupInvocation {
    pub fn new(installation: &Installation, variant: Variant, sdk_version: Option<&str>) -> Self {
        let store_keyword = variant.is_store() && installation.version.supports_store_keyword();

        Self {
            variant,
            setup_script: installation.setup_script.clone(),
            sdk_version: sdk_version
                .filter(|v| !v.is_empty() && *v != "default")
                .map(|v| v.to_string()),
            store_keyword,
            store_overlay: variant.is_store() && !store_keyword,
        }
    }

    /// Arguments passed to the setup script.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![self.variant.arch.setup_argument()];

        if let Some(sdk) = &self.sdk_version {
            args.push(sdk.clone());
        }

        if self.store_keyword {
            args.push("store".to_string());
        }

        args
    }

    /// The cmd.exe command line running the script and dumping the environment.
    pub fn command_line(&self) -> String {
        let mut parts = vec![format!("\"{}\"", self.setup_script.display())];
        parts.extend(self.arguments());
        parts.push("&&".to_string());
        parts.push("set".to_string());

        parts.join(" ")
    }

    /// Turn captured script output into the variant's environment.
    pub fn parse_output(&self, output: &str, interpreter_dir: Option<&Path>) -> Result<EnvironmentMap> {
        let env = parse_environment_dump(&self.variant.name(), output, interpreter_dir)?;

        Ok(if self.store_overlay {
            derive_store_overlay(&env)
        } else {
            env
        })
    }
}

/// A started setup script process.
pub trait RunningSetup: Send {
    /// Wait for the process and return its combined stdout and stderr.
    ///
    /// Non-zero exit codes and timeouts are errors.
    fn join(self: Box<Self>) -> Result<String>;
}

/// Something that can start setup script processes.
pub trait SetupLauncher: Sync {
    /// Start the script for an invocation without waiting for it.
    fn launch(&self, invocation: &SetupInvocation) -> Result<Box<dyn RunningSetup>>;
}

/// Runs setup scripts in a shell with an explicit environment.
pub struct ShellSetupLauncher {
    env: ChildEnvironment,
    timeout: Duration,
}

impl ShellSetupLauncher {
    pub fn new(env: ChildEnvironment, timeout: Duration) -> Self {
        Self { env, timeout }
    }

    #[cfg(windows)]
    fn expression(invocation: &SetupInvocation) -> duct::Expression {
        // cmd.exe does not understand the escaping std::process applies, so the
        // command line is passed verbatim. /s strips the outer quotes. /u makes
        // `set` write UTF-16 instead of the console code page.
        let command_line = format!("\"{}\"", invocation.command_line());

        duct::cmd("cmd.exe", ["/u", "/d", "/s", "/c"]).before_spawn(move |cmd| {
            use std::os::windows::process::CommandExt;
            cmd.raw_arg(&command_line);
            Ok(())
        })
    }

    /// Sources the script with its arguments as positional parameters.
    #[cfg(not(windows))]
    fn expression(invocation: &SetupInvocation) -> duct::Expression {
        let mut args = vec![
            "-c".to_string(),
            ". \"$0\" && env".to_string(),
            invocation.setup_script.display().to_string(),
        ];
        args.extend(invocation.arguments());

        duct::cmd("sh", args)
    }
}

impl SetupLauncher for ShellSetupLauncher {
    fn launch(&self, invocation: &SetupInvocation) -> Result<Box<dyn RunningSetup>> {
        debug!("launching {} for {}", invocation.command_line(), invocation.variant);

        let handle = Self::expression(invocation)
            .full_env(self.env.iter())
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .start()
            .map_err(|e| {
                ResolverError::extraction(
                    invocation.variant,
                    format!("unable to start setup script: {}", e),
                )
            })?;

        Ok(Box::new(SetupProcess {
            variant: invocation.variant.name(),
            handle,
            deadline: Instant::now() + self.timeout,
            encoding: OutputEncoding::native(),
        }))
    }
}

/// A running shell process.
pub struct SetupProcess {
    variant: String,
    handle: duct::Handle,
    deadline: Instant,
    encoding: OutputEncoding,
}

impl RunningSetup for SetupProcess {
    fn join(self: Box<Self>) -> Result<String> {
        let Self {
            variant,
            handle,
            deadline,
            encoding,
        } = *self;

        let wait_error = |e: std::io::Error| {
            ResolverError::extraction(&variant, format!("waiting on setup script: {}", e))
        };

        while handle.try_wait().map_err(wait_error)?.is_none() {
            if Instant::now() >= deadline {
                if let Err(e) = handle.kill() {
                    warn!("unable to kill setup script for {}: {}", variant, e);
                }

                return Err(ResolverError::EnvironmentExtraction {
                    variant,
                    message: "setup script timed out".to_string(),
                    output: None,
                    timed_out: true,
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }

        let output = handle.into_output().map_err(wait_error)?;

        if !output.status.success() {
            return Err(ResolverError::EnvironmentExtraction {
                variant,
                message: format!("setup script failed with {}", output.status),
                output: Some(encoding.decode_lossy(&output.stdout)),
                timed_out: false,
            });
        }

        encoding
            .decode(&output.stdout)
            .map_err(|message| ResolverError::EnvironmentExtraction {
                variant,
                message,
                output: Some(encoding.decode_lossy(&output.stdout)),
                timed_out: false,
            })
    }
}

/// Run the setup script for one variant and return its environment.
pub fn extract_environment(
    launcher: &dyn SetupLauncher,
    invocation: &SetupInvocation,
    interpreter_dir: Option<&Path>,
) -> Result<EnvironmentMap> {
    let output = launcher.launch(invocation)?.join()?;

    invocation.parse_output(&output, interpreter_dir)
}
