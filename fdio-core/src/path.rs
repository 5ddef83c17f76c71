//! `(dirfd, path)` resolution (§4.3): picking the base transport a path is
//! relative to, and the container/leaf split used by unlink-like calls.

use std::sync::Arc;

use crate::{
    cwd::CwdState,
    fdtab::Fdtab,
    status::{IoResult, Status},
    transport::{OpenFlags, Transport, TransportEntry},
};

/// Resolve `(dirfd, path)` to a base transport and the residual path still
/// to be traversed by that transport's `open`.
///
/// * An absolute `path` resolves against the root transport; the leading
///   `/` is stripped, and an empty result becomes `"."`.
/// * `dirfd == AT_FDCWD` resolves against the cwd transport.
/// * Any other `dirfd` must be a valid, currently-open descriptor.
pub fn resolve(
    fdtab: &Fdtab,
    cwd: &CwdState,
    root: &Option<Arc<TransportEntry>>,
    dirfd: i64,
    path: &str,
) -> IoResult<(Arc<TransportEntry>, String)> {
    if let Some(rest) = path.strip_prefix('/') {
        let root = root.clone().ok_or(Status::BadHandle)?;
        let residual = if rest.is_empty() { "." } else { rest };
        return Ok((root, residual.to_string()));
    }

    if dirfd == libc::AT_FDCWD as i64 {
        return Ok((cwd.transport(), path.to_string()));
    }

    let entry = fdtab.lookup(dirfd)?;
    Ok((entry, path.to_string()))
}

/// Resolve `(dirfd, path)` to the *parent directory* transport and the
/// trailing leaf name, as used by `unlink`/`unlinkat` and similar
/// container-level operations.
///
/// Trailing slashes are stripped first; a path of `"x"` yields parent
/// `"."` and leaf `"x"`. An empty leaf (e.g. resolving `"/"` or `""`)
/// fails [`Status::InvalidArgs`].
pub fn resolve_container(
    fdtab: &Fdtab,
    cwd: &CwdState,
    root: &Option<Arc<TransportEntry>>,
    dirfd: i64,
    path: &str,
) -> IoResult<(Arc<dyn Transport>, String)> {
    let trimmed = path.trim_end_matches('/');
    let (parent_path, leaf) = match trimmed.rfind('/') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };

    if leaf.is_empty() {
        return Err(Status::InvalidArgs);
    }

    let parent_path = if parent_path.is_empty() {
        "."
    } else {
        parent_path
    };

    let (base, residual) = resolve(fdtab, cwd, root, dirfd, parent_path)?;
    let parent = base
        .transport
        .open(&residual, OpenFlags::DIRECTORY, 0)?;
    Ok((parent, leaf.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MiscRequest, MiscResponse, TransportFlags};

    struct Root;
    impl Transport for Root {
        fn open(&self, path: &str, _flags: OpenFlags, _mode: u32) -> IoResult<Arc<dyn Transport>> {
            if path == "." || path == "dir" {
                Ok(Arc::new(Root))
            } else {
                Err(Status::NotFound)
            }
        }
        fn misc(&self, req: MiscRequest<'_>) -> IoResult<MiscResponse> {
            match req {
                MiscRequest::Stat => Ok(MiscResponse::Stat(Default::default())),
                _ => Err(Status::NotSupported),
            }
        }
    }

    fn setup() -> (Fdtab, CwdState, Option<Arc<TransportEntry>>) {
        let root = TransportEntry::new(Arc::new(Root), TransportFlags::empty());
        let cwd = CwdState::new("/".to_string(), root.clone());
        (Fdtab::new(), cwd, Some(root))
    }

    #[test]
    fn absolute_path_uses_root_and_strips_slash() {
        let (fdtab, cwd, root) = setup();
        let (_t, residual) = resolve(&fdtab, &cwd, &root, libc::AT_FDCWD as i64, "/dir").unwrap();
        assert_eq!(residual, "dir");
    }

    #[test]
    fn bare_root_becomes_dot() {
        let (fdtab, cwd, root) = setup();
        let (_t, residual) = resolve(&fdtab, &cwd, &root, libc::AT_FDCWD as i64, "/").unwrap();
        assert_eq!(residual, ".");
    }

    #[test]
    fn missing_root_fails_on_absolute_path() {
        let fdtab = Fdtab::new();
        let cwd = CwdState::new(
            "/".to_string(),
            TransportEntry::new(Arc::new(Root), TransportFlags::empty()),
        );
        let err = resolve(&fdtab, &cwd, &None, libc::AT_FDCWD as i64, "/x").unwrap_err();
        assert_eq!(err, Status::BadHandle);
    }

    #[test]
    fn container_split_single_component() {
        let (fdtab, cwd, root) = setup();
        let (_t, leaf) = resolve_container(&fdtab, &cwd, &root, libc::AT_FDCWD as i64, "x").unwrap();
        assert_eq!(leaf, "x");
    }

    #[test]
    fn container_split_rejects_empty_leaf() {
        let (fdtab, cwd, root) = setup();
        let err = resolve_container(&fdtab, &cwd, &root, libc::AT_FDCWD as i64, "/").unwrap_err();
        assert_eq!(err, Status::InvalidArgs);
    }
}
