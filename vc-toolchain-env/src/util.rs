// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Component, Path, PathBuf};

/// Canonicalize a path.
///
/// On Windows the `\\?\` prefix is stripped. Native `\` separators are kept.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, std::io::Error> {
    let p = path.canonicalize()?;

    Ok(if cfg!(windows) {
        PathBuf::from(strip_verbatim_prefix(&p.display().to_string()))
    } else {
        p
    })
}

/// Turn a `\\?\` path into the form other tools understand.
fn strip_verbatim_prefix(s: &str) -> String {
    if let Some(unc) = s.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{}", unc)
    } else if let Some(local) = s.strip_prefix(r"\\?\") {
        local.to_string()
    } else {
        s.to_string()
    }
}

/// Canonicalize a path, falling back to lexical normalization if it doesn't exist.
pub fn real_path(path: &Path) -> PathBuf {
    canonicalize_path(path).unwrap_or_else(|_| normalize_path(path))
}

/// Lexically resolve `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut res = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(res.components().next_back(), Some(Component::Normal(_)))
                    && res.pop();
                if !popped && !res.has_root() {
                    res.push("..");
                }
            }
            c => res.push(c),
        }
    }

    res
}

/// Express `path` relative to the directory `base`.
///
/// Returns `None` if the two don't share a filesystem root, such as paths on
/// different Windows drives.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = normalize_path(&base.join(path));
    let base = normalize_path(base);

    let mut path_components = path.components().peekable();
    let mut base_components = base.components().peekable();

    match (path_components.peek(), base_components.peek()) {
        (Some(a), Some(b)) if a == b => {}
        _ => return None,
    }

    while let (Some(a), Some(b)) = (path_components.peek(), base_components.peek()) {
        if a != b {
            break;
        }
        path_components.next();
        base_components.next();
    }

    let mut res = PathBuf::new();
    for _ in base_components {
        res.push("..");
    }
    for c in path_components {
        res.push(c);
    }

    if res.as_os_str().is_empty() {
        res.push(".");
    }

    Some(res)
}
