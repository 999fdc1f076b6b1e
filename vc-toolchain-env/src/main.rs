// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod cli;

use {cli::CliError, log::debug};

fn main() {
    std::process::exit(match cli::run_cli() {
        Ok(_) => 0,
        Err(CliError::Clap(err)) => err.exit(),
        Err(err) => {
            if let CliError::Resolver(e) = &err {
                if let Some(output) = e.captured_output() {
                    debug!("setup script output:\n{}", output);
                }
            }

            eprintln!("{}", err.diagnostic());
            1
        }
    });
}
