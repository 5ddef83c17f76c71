//! Current-working-directory state: a normalized textual path plus the cwd
//! transport, guarded by its own mutex (§3, §4.3). Locking order relative
//! to the fdtab is **cwd → fdtab**; nothing here ever takes the fdtab lock
//! while holding this one.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{config::UNKNOWN_CWD, transport::TransportEntry};

struct Inner {
    path: String,
    transport: Arc<TransportEntry>,
}

pub struct CwdState(Mutex<Inner>);

impl CwdState {
    pub fn new(path: String, transport: Arc<TransportEntry>) -> Self {
        Self(Mutex::new(Inner { path, transport }))
    }

    pub fn path(&self) -> String {
        self.0.lock().path.clone()
    }

    pub fn transport(&self) -> Arc<TransportEntry> {
        self.0.lock().transport.clone()
    }

    /// `chdir`: normalize `path` against the current textual cwd and swap
    /// in the new transport. The transport swap and the textual update are
    /// applied together so a reader never observes one without the other.
    pub fn set(&self, new_path_component: &str, new_transport: Arc<TransportEntry>) {
        let mut inner = self.0.lock();
        inner.path = update_cwd_path(&inner.path, new_path_component);
        inner.transport = new_transport;
    }
}

/// Textual cwd normalization (§4.3): absolute paths reset to `/`, `.`
/// segments are skipped, `..` pops the last segment (never past `/`),
/// repeated separators collapse, and overflow beyond `PATH_MAX` falls back
/// to the `(unknown)` sentinel.
pub fn update_cwd_path(current: &str, input: &str) -> String {
    let mut segments: Vec<&str> = if input.starts_with('/') {
        Vec::new()
    } else {
        current
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    };

    for segment in input.split('/').filter(|s| !s.is_empty()) {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::from("/");
    normalized.push_str(&segments.join("/"));

    if normalized.len() > crate::config::PATH_MAX {
        return UNKNOWN_CWD.to_string();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_and_dotdot_and_absolute() {
        assert_eq!(update_cwd_path("/", "x"), "/x");
        assert_eq!(update_cwd_path("/x", "./y"), "/x/y");
        assert_eq!(update_cwd_path("/x/y", "../z"), "/x/z");
        assert_eq!(update_cwd_path("/anything", "/reset"), "/reset");
    }

    #[test]
    fn dotdot_never_pops_past_root() {
        assert_eq!(update_cwd_path("/", ".."), "/");
        assert_eq!(update_cwd_path("/a", "../../.."), "/");
    }

    #[test]
    fn repeated_separators_collapse() {
        assert_eq!(update_cwd_path("/", "a//b///c"), "/a/b/c");
    }

    #[test]
    fn chained_chdir_matches_spec_example() {
        // chdir("/x"); chdir("./y"); chdir("../z") -> "/x/z"
        let mut path = "/".to_string();
        path = update_cwd_path(&path, "/x/./y/../z");
        assert_eq!(path, "/x/z");
    }

    #[test]
    fn overflow_falls_back_to_sentinel() {
        let huge = "a".repeat(crate::config::PATH_MAX);
        assert_eq!(update_cwd_path("/", &huge), UNKNOWN_CWD);
    }
}
