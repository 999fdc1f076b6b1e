// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{error::ErrorKind, value_parser, Arg, ArgAction, ArgMatches, Command},
    log::{debug, LevelFilter},
    std::{io::Write, path::PathBuf, time::Duration},
    thiserror::Error,
    vc_toolchain_env::{
        compiler::{probe_gnu_compiler_version, CLANG_VERSION_MACROS, GCC_VERSION_MACROS},
        config::DEFAULT_SETUP_TIMEOUT,
        locator_for_request, normalize_path, Architecture, ChildEnvironment, ResolverConfig,
        ResolverError, SetupRequest, ShellSetupLauncher, ToolchainResolver, VersionSpecifier,
    },
};

/// Commands in the order they are advertised.
pub const COMMANDS: &[&str] = &["get_dir", "setup", "get_gcc_version", "get_clang_version"];

const SETUP_ABOUT: &str = "\
Resolve the toolchain environment of every target variant and print GN
declarations describing them.

Environments are captured by running vcvarsall.bat once per variant. All
invocations run concurrently and their results are cached in files named
environment_<variant> in the cache directory. Delete those files to force
the environments to be captured again.

Optional arguments may be given as `default` to skip them.
";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("argument parsing error: {0}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Resolver(#[from] ResolverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}", .0.to_string().trim_end())]
    Usage(clap::Error),

    #[error("Expected one of: {}", COMMANDS.join(", "))]
    UnknownCommand,
}

impl CliError {
    /// Single line diagnostic for standard error.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Resolver(e) => format!("error: [{}] {}", e.stage(), e),
            Self::UnknownCommand => self.to_string(),
            Self::Usage(_) => format!("{}\n{}", self, Self::UnknownCommand),
            _ => format!("error: {}", self),
        }
    }

    /// Classify an argument parsing failure.
    ///
    /// Help and version requests and invalid values keep clap's handling.
    /// Missing or unexpected arguments list the supported commands.
    fn from_parse_error(err: clap::Error) -> Self {
        match err.kind() {
            ErrorKind::MissingRequiredArgument
            | ErrorKind::MissingSubcommand
            | ErrorKind::InvalidSubcommand
            | ErrorKind::UnknownArgument
            | ErrorKind::TooFewValues
            | ErrorKind::WrongNumberOfValues => Self::Usage(err),
            _ => Self::Clap(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

fn version_arg() -> Arg {
    Arg::new("vs_version")
        .value_name("VERSION")
        .required(true)
        .help("Visual Studio release (2013, 2015, 2017, 2019) or `latest`")
}

fn command() -> Command {
    Command::new("vc-toolchain-env")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Resolve Visual C++ toolchain environments for GN builds")
        .allow_external_subcommands(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("cache_dir")
                .long("cache-dir")
                .global(true)
                .env("VC_TOOLCHAIN_CACHE_DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding cached environment files [default: current directory]"),
        )
        .arg(
            Arg::new("cpus")
                .long("cpus")
                .global(true)
                .value_delimiter(',')
                .default_value("x86,x64,arm,arm64")
                .help("Target architectures to resolve"),
        )
        .arg(
            Arg::new("no_uwp")
                .long("no-uwp")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Do not resolve Windows Store (UWP) variants"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .env("VC_TOOLCHAIN_SETUP_TIMEOUT")
                .value_parser(value_parser!(u64))
                .default_value(DEFAULT_SETUP_TIMEOUT.as_secs().to_string())
                .help("Seconds a single vcvarsall.bat invocation may run"),
        )
        .subcommand(
            Command::new("get_dir")
                .about("Print the install root of a Visual Studio release")
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("setup")
                .about("Print GN declarations for a Visual Studio toolchain")
                .long_about(SETUP_ABOUT)
                .arg(version_arg())
                .arg(
                    Arg::new("install_root")
                        .help("Visual Studio install root, or `default` to probe for it"),
                )
                .arg(Arg::new("sdk_version").help("Windows SDK version to select"))
                .arg(
                    Arg::new("clang_base_path")
                        .help("LLVM install root; report clang-cl versions instead of cl.exe"),
                )
                .arg(Arg::new("clang_msc_ver").help("_MSC_VER clang-cl should emulate")),
        )
        .subcommand(
            Command::new("get_gcc_version")
                .about("Print the version of a GCC compiler as an integer")
                .arg(Arg::new("path").required(true).value_parser(value_parser!(PathBuf))),
        )
        .subcommand(
            Command::new("get_clang_version")
                .about("Print the version of a clang compiler as an integer")
                .arg(Arg::new("path").required(true).value_parser(value_parser!(PathBuf))),
        )
}

fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.target(env_logger::Target::Stderr).init();
}

fn resolver_config(args: &ArgMatches) -> Result<ResolverConfig> {
    let mut config = ResolverConfig::from_env();

    if let Some(dir) = args.get_one::<PathBuf>("cache_dir") {
        config.cache_dir = dir.clone();
    }

    if let Some(cpus) = args.get_many::<String>("cpus") {
        let mut architectures = vec![];
        for cpu in cpus {
            let arch = Architecture::try_from(cpu.as_str())?;
            if !architectures.contains(&arch) {
                architectures.push(arch);
            }
        }
        config.architectures = architectures;
    }

    config.include_store = !args.get_flag("no_uwp");

    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.setup_timeout = Duration::from_secs(*timeout);
    }

    debug!("resolver configuration: {:?}", config);

    Ok(config)
}

fn write_stdout(data: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(data.as_bytes())?;
    stdout.flush()?;

    Ok(())
}

fn setup_request(args: &ArgMatches) -> Result<SetupRequest> {
    let arg = |name: &str| args.get_one::<String>(name).map(|s| s.as_str());

    Ok(SetupRequest::from_arguments(
        arg("vs_version").ok_or(CliError::UnknownCommand)?,
        arg("install_root"),
        arg("sdk_version"),
        arg("clang_base_path"),
        arg("clang_msc_ver"),
    )?)
}

fn command_get_dir(args: &ArgMatches) -> Result<()> {
    let config = resolver_config(args)?;
    let request = SetupRequest {
        version: args
            .get_one::<String>("vs_version")
            .ok_or(CliError::UnknownCommand)?
            .parse::<VersionSpecifier>()?,
        ..Default::default()
    };

    let installation = locator_for_request(&config, &request).locate(request.version)?;
    write_stdout(&format!("{}\n", installation.root.display()))
}

fn command_setup(args: &ArgMatches) -> Result<()> {
    let config = resolver_config(args)?;
    let request = setup_request(args)?;
    let launcher =
        ShellSetupLauncher::new(ChildEnvironment::from_current_process(), config.setup_timeout);
    let resolver =
        ToolchainResolver::new(&config, locator_for_request(&config, &request), &launcher);

    let declarations = resolver.setup(&request, &std::env::current_dir()?)?;
    write_stdout(&declarations)
}

fn command_compiler_version(args: &ArgMatches, clang: bool) -> Result<()> {
    let path = args
        .get_one::<PathBuf>("path")
        .ok_or(CliError::UnknownCommand)?;
    let macros = if clang {
        &CLANG_VERSION_MACROS
    } else {
        &GCC_VERSION_MACROS
    };

    let version = probe_gnu_compiler_version(&normalize_path(path), macros)?;
    write_stdout(&format!("{}\n", version))
}

pub fn run_cli() -> Result<()> {
    let matches = command()
        .try_get_matches()
        .map_err(CliError::from_parse_error)?;

    init_logging(matches.get_count("verbose"));

    match matches.subcommand() {
        Some(("get_dir", args)) => command_get_dir(args),
        Some(("setup", args)) => command_setup(args),
        Some(("get_gcc_version", args)) => command_compiler_version(args, false),
        Some(("get_clang_version", args)) => command_compiler_version(args, true),
        _ => Err(CliError::UnknownCommand),
    }
}
