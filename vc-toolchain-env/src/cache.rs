// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! On-disk cache of extracted environments.

Environments are stored as a `CreateProcess` environment block: a list of
`KEY=VALUE\0` records followed by an additional `\0`. The files can be handed
to child processes as-is by build tooling.
*/

use {
    crate::{
        environment::EnvironmentMap,
        error::{ResolverError, Result},
        version::Variant,
    },
    log::debug,
    std::{
        io::Write,
        path::{Path, PathBuf},
    },
};

const TERMINATOR: u8 = 0;

/// Encode an environment as an environment block.
pub fn encode_environment_block(env: &EnvironmentMap) -> Result<Vec<u8>> {
    let mut block = vec![];

    for (key, value) in env {
        if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
            return Err(ResolverError::InvalidArgument(format!(
                "environment variable {:?} cannot be stored in an environment block",
                key
            )));
        }

        block.extend_from_slice(key.as_bytes());
        block.push(b'=');
        block.extend_from_slice(value.as_bytes());
        block.push(TERMINATOR);
    }

    block.push(TERMINATOR);

    Ok(block)
}

/// Decode an environment block.
///
/// `path` is only used for error reporting.
pub fn decode_environment_block(path: &Path, data: &[u8]) -> Result<EnvironmentMap> {
    let malformed = |reason: &str| ResolverError::CacheDecode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    // An empty environment is a lone block terminator.
    if data == [TERMINATOR] {
        return Ok(EnvironmentMap::new());
    }

    // Drop the last 2 terminators: one for the block, one for the final record.
    let records = data
        .strip_suffix(&[TERMINATOR, TERMINATOR])
        .ok_or_else(|| malformed("missing block terminator"))?;

    let records = std::str::from_utf8(records).map_err(|_| malformed("not valid UTF-8"))?;

    records
        .split(TERMINATOR as char)
        .map(|record| {
            record
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| malformed(&format!("record without '=': {:?}", record)))
        })
        .collect()
}

/// Rewrite a desktop environment into its store (UWP) counterpart.
///
/// Store applications link against the store flavor of the C runtime, which
/// lives in a `store` directory beneath the desktop library directory.
pub fn derive_store_overlay(env: &EnvironmentMap) -> EnvironmentMap {
    env.iter()
        .map(|(k, v)| {
            let v = match k.as_str() {
                "LIB" | "LIBPATH" => v.replace(r"\VC\LIB", r"\VC\LIB\STORE"),
                _ => v.clone(),
            };

            (k.clone(), v)
        })
        .collect()
}

/// A directory holding cached environments, one file per variant.
#[derive(Clone, Debug)]
pub struct EnvironmentCache {
    dir: PathBuf,
}

impl EnvironmentCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file with the given name.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn variant_path(&self, variant: &Variant) -> PathBuf {
        self.path(&variant.cache_file_name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Load a cached environment.
    ///
    /// A missing file is a cache miss, not an error.
    pub fn load(&self, name: &str) -> Result<Option<EnvironmentMap>> {
        let path = self.path(name);

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ResolverError::io_path(path, e)),
        };

        debug!("loaded cached environment {}", path.display());

        decode_environment_block(&path, &data).map(Some)
    }

    /// Persist an environment.
    ///
    /// Content is written to a temporary file in the cache directory which is
    /// then renamed over the destination, so readers never observe partial
    /// writes.
    pub fn save(&self, name: &str, env: &EnvironmentMap) -> Result<()> {
        let path = self.path(name);
        let block = encode_environment_block(env)?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", name))
            .tempfile_in(&self.dir)
            .map_err(|e| ResolverError::io_path(&self.dir, e))?;
        temp.write_all(&block)
            .map_err(|e| ResolverError::io_path(temp.path(), e))?;
        temp.persist(&path)
            .map_err(|e| ResolverError::io_path(&path, e.error))?;

        debug!("wrote environment cache {}", path.display());

        Ok(())
    }
}
