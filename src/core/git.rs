//! Git interop: repository root discovery, tracked-file listing and
//! discarding working-tree changes.
//!
//! Every call shells out to `git` synchronously with an explicit working
//! directory. Core logic talks to [`GitBackend`] so it can run against a
//! fake in tests.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::infra::walk::FileWalker;

/// stderr fragments `git checkout` prints on success.
const BENIGN_STDERR: [&str; 3] = ["Already on", "Switched to branch", "Updated "];

/// File-name pattern for tracked config files.
pub const CONFIG_FILE_PATTERN: &str = r"(?i)^appsettings\..*\.json$";

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to run `git {args}`: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {args}` exited with {status}: {stderr}")]
    Failed { args: String, status: String, stderr: String },

    #[error("`git {args}` reported: {stderr}")]
    UnexpectedStderr { args: String, stderr: String },

    #[error("{} is not inside a git repository", .0.display())]
    NotARepository(PathBuf),

    #[error("{} is outside repository {}", path.display(), root.display())]
    OutsideRepository { path: PathBuf, root: PathBuf },
}

/// A working tree root. Discovered on demand, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepository {
    pub root: PathBuf,
}

impl GitRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `path` relative to the root, comparing canonical forms.
    pub fn relative(&self, path: &Path) -> Result<PathBuf, GitError> {
        let root = dunce::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let full = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        full.strip_prefix(&root)
            .map(Path::to_path_buf)
            .map_err(|_| GitError::OutsideRepository { path: path.to_path_buf(), root: self.root.clone() })
    }
}

/// The three git capabilities the tool needs.
pub trait GitBackend {
    /// Repository containing `start` (a file or directory).
    fn find_root(&self, start: &Path) -> Result<GitRepository, GitError>;

    /// Tracked files, relative to the repository root.
    fn list_tracked(&self, repo: &GitRepository) -> Result<Vec<PathBuf>, GitError>;

    /// Restore `files` (absolute or root-relative) from the index.
    fn discard(&self, repo: &GitRepository, files: &[PathBuf]) -> Result<(), GitError>;
}

/// [`GitBackend`] backed by the `git` executable on PATH.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    upward_limit: usize,
}

impl Default for GitCli {
    fn default() -> Self {
        Self { program: PathBuf::from("git"), upward_limit: 10 }
    }
}

impl GitCli {
    pub fn new(upward_limit: usize) -> Self {
        Self { upward_limit, ..Self::default() }
    }

    fn run<I, S>(&self, dir: &Path, args: I) -> Result<Output, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let label = args
            .iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(dir = %dir.display(), args = %label, "running git");

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| GitError::Spawn { args: label.clone(), source })?;

        if !output.status.success() {
            return Err(GitError::Failed {
                args: label,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    fn rev_parse(&self, dir: &Path, flag: &str) -> Result<String, GitError> {
        let out = self.run(dir, ["rev-parse", flag])?;
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl GitBackend for GitCli {
    #[instrument(skip_all, fields(start = %start.display()))]
    fn find_root(&self, start: &Path) -> Result<GitRepository, GitError> {
        let dir = start_dir(start);
        if let Some(root) = find_marker_root(&dir, self.upward_limit) {
            return Ok(GitRepository::new(root));
        }
        if !dir.is_dir() {
            return Err(GitError::NotARepository(start.to_path_buf()));
        }

        match self.rev_parse(&dir, "--show-toplevel") {
            Ok(top) if !top.is_empty() => return Ok(GitRepository::new(top)),
            Ok(_) => {}
            Err(err) => debug!(error = %err, "show-toplevel failed, trying --git-dir"),
        }

        // Inside a submodule's git dir there is no worktree; the parent of
        // the reported git dir is the best available root.
        let git_dir = self
            .rev_parse(&dir, "--git-dir")
            .map_err(|_| GitError::NotARepository(start.to_path_buf()))?;
        if git_dir.is_empty() || git_dir == ".git" {
            return Err(GitError::NotARepository(start.to_path_buf()));
        }
        let resolved = dir.join(&git_dir);
        let parent = resolved.parent().unwrap_or(&dir);
        Ok(GitRepository::new(dunce::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())))
    }

    fn list_tracked(&self, repo: &GitRepository) -> Result<Vec<PathBuf>, GitError> {
        let out = self.run(&repo.root, ["ls-files", "-z"])?;
        Ok(out
            .stdout
            .split(|b| *b == 0)
            .filter(|s| !s.is_empty())
            .map(|s| PathBuf::from(String::from_utf8_lossy(s).into_owned()))
            .collect())
    }

    fn discard(&self, repo: &GitRepository, files: &[PathBuf]) -> Result<(), GitError> {
        let relative = files
            .iter()
            .map(|f| if f.is_absolute() { repo.relative(f) } else { Ok(f.clone()) })
            .collect::<Result<Vec<_>, _>>()?;

        let mut args = vec![PathBuf::from("checkout"), PathBuf::from("--")];
        args.extend(relative);
        let out = self.run(&repo.root, &args)?;

        let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
        if !stderr.is_empty() && !is_benign(&stderr) {
            return Err(GitError::UnexpectedStderr { args: "checkout --".into(), stderr });
        }
        Ok(())
    }
}

fn start_dir(start: &Path) -> PathBuf {
    if start.is_file() {
        start.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        start.to_path_buf()
    }
}

fn is_benign(stderr: &str) -> bool {
    stderr
        .lines()
        .all(|line| BENIGN_STDERR.iter().any(|b| line.contains(b)))
}

/// Walk up from `start` (at most `limit` parent steps) looking for a
/// `.git` directory, or a `.git` file whose `gitdir:` target exists.
pub fn find_marker_root(start: &Path, limit: usize) -> Option<PathBuf> {
    let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .take(limit + 1)
        .find(|dir| {
            let marker = dir.join(".git");
            if marker.is_dir() {
                return true;
            }
            marker.is_file() && gitdir_target(&marker).is_some_and(|target| target.exists())
        })
        .map(Path::to_path_buf)
}

/// Target of a `.git` indirection file (`gitdir: <path>`), resolved
/// against the file's directory.
fn gitdir_target(marker: &Path) -> Option<PathBuf> {
    let text = std::fs::read_to_string(marker).ok()?;
    let target = text.lines().find_map(|l| l.strip_prefix("gitdir:"))?.trim();
    let dir = marker.parent()?;
    Some(dir.join(target))
}

/// Tracked config files of `repo` whose file name matches `pattern`, as
/// absolute paths. Falls back to a filesystem scan when git fails or
/// reports nothing.
#[instrument(skip_all, fields(repo = %repo.root.display()))]
pub fn list_tracked_matching(
    backend: &dyn GitBackend,
    repo: &GitRepository,
    pattern: &Regex,
    walker: &FileWalker,
) -> Vec<PathBuf> {
    let name_matches = |p: &Path| p.file_name().is_some_and(|n| pattern.is_match(&n.to_string_lossy()));

    match backend.list_tracked(repo) {
        Ok(tracked) => {
            let files: Vec<PathBuf> = tracked
                .into_iter()
                .filter(|p| name_matches(p))
                .map(|p| repo.root.join(p))
                .collect();
            if !files.is_empty() {
                debug!(count = files.len(), "tracked files from git");
                return files;
            }
            info!("git listed no matching files, scanning the filesystem");
        }
        Err(err) => warn!(error = %err, "git ls-files failed, scanning the filesystem"),
    }

    walker.walk_with_filter(&repo.root, |name| pattern.is_match(name))
}

/// Discard working-tree changes to `files`. A no-op for an empty list.
#[instrument(skip_all, fields(repo = %repo.root.display(), files = files.len()))]
pub fn discard_changes(backend: &dyn GitBackend, repo: &GitRepository, files: &[PathBuf]) -> Result<(), GitError> {
    if files.is_empty() {
        return Ok(());
    }
    backend.discard(repo, files)?;
    info!("discarded changes");
    Ok(())
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;

    /// In-memory backend: fixed tracked lists per root, records discards.
    #[derive(Default)]
    pub struct FakeGit {
        pub roots: Vec<PathBuf>,
        pub tracked: BTreeMap<PathBuf, Vec<PathBuf>>,
        pub fail_listing: bool,
        pub fail_discard_in: Option<PathBuf>,
        pub discarded: RefCell<Vec<(PathBuf, Vec<PathBuf>)>>,
    }

    impl GitBackend for FakeGit {
        fn find_root(&self, start: &Path) -> Result<GitRepository, GitError> {
            self.roots
                .iter()
                .filter(|r| start.starts_with(r))
                .max_by_key(|r| r.components().count())
                .map(|r| GitRepository::new(r.clone()))
                .ok_or_else(|| GitError::NotARepository(start.to_path_buf()))
        }

        fn list_tracked(&self, repo: &GitRepository) -> Result<Vec<PathBuf>, GitError> {
            if self.fail_listing {
                return Err(GitError::Failed {
                    args: "ls-files -z".into(),
                    status: "exit status: 128".into(),
                    stderr: "fatal: not a git repository".into(),
                });
            }
            Ok(self.tracked.get(&repo.root).cloned().unwrap_or_default())
        }

        fn discard(&self, repo: &GitRepository, files: &[PathBuf]) -> Result<(), GitError> {
            if self.fail_discard_in.as_ref() == Some(&repo.root) {
                return Err(GitError::UnexpectedStderr {
                    args: "checkout --".into(),
                    stderr: "error: pathspec did not match".into(),
                });
            }
            self.discarded.borrow_mut().push((repo.root.clone(), files.to_vec()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::fake::FakeGit;
    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "t")
            .env("GIT_AUTHOR_EMAIL", "t@example.com")
            .env("GIT_COMMITTER_NAME", "t")
            .env("GIT_COMMITTER_EMAIL", "t@example.com")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?}");
    }

    #[test]
    fn marker_search_finds_directory_and_indirection() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("repo/.git")).unwrap();
        fs::create_dir_all(tmp.path().join("repo/src/deep")).unwrap();
        fs::create_dir_all(tmp.path().join("repo/.git/modules/sub")).unwrap();
        fs::create_dir_all(tmp.path().join("repo/sub/inner")).unwrap();
        fs::write(tmp.path().join("repo/sub/.git"), "gitdir: ../.git/modules/sub\n").unwrap();
        fs::create_dir_all(tmp.path().join("broken/x")).unwrap();
        fs::write(tmp.path().join("broken/.git"), "gitdir: ./missing\n").unwrap();

        let canon = |p: &str| dunce::canonicalize(tmp.path().join(p)).unwrap();

        assert_eq!(find_marker_root(&tmp.path().join("repo/src/deep"), 10), Some(canon("repo")));
        assert_eq!(find_marker_root(&tmp.path().join("repo/sub/inner"), 10), Some(canon("repo/sub")));
        assert_eq!(find_marker_root(&tmp.path().join("repo/src/deep"), 1), None);
        assert_eq!(find_marker_root(&tmp.path().join("broken/x"), 1), None);
    }

    #[test]
    fn stderr_classification() {
        assert!(is_benign("Updated 2 paths from the index"));
        assert!(is_benign("Already on 'main'"));
        assert!(!is_benign("error: pathspec 'x' did not match any file(s) known to git"));
        assert!(!is_benign("Updated 1 path from the index\nwarning: something odd"));
    }

    #[test]
    fn relative_paths_are_checked_against_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("repo/a")).unwrap();
        fs::write(tmp.path().join("repo/a/f.json"), "{}").unwrap();
        fs::write(tmp.path().join("outside.json"), "{}").unwrap();
        let repo = GitRepository::new(tmp.path().join("repo"));

        assert_eq!(repo.relative(&tmp.path().join("repo/a/f.json")).unwrap(), PathBuf::from("a/f.json"));
        assert!(matches!(
            repo.relative(&tmp.path().join("outside.json")),
            Err(GitError::OutsideRepository { .. })
        ));
    }

    #[test]
    fn listing_filters_by_file_name() {
        let root = PathBuf::from("/r");
        let mut fake = FakeGit::default();
        fake.tracked.insert(
            root.clone(),
            vec!["src/appsettings.Dev.json".into(), "src/other.json".into(), "appsettings.json/readme.md".into()],
        );
        let pattern = Regex::new(CONFIG_FILE_PATTERN).unwrap();

        let files = list_tracked_matching(&fake, &GitRepository::new(&root), &pattern, &FileWalker::default());

        assert_eq!(files, vec![PathBuf::from("/r/src/appsettings.Dev.json")]);
    }

    #[test]
    fn listing_falls_back_to_scan() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("api")).unwrap();
        fs::write(tmp.path().join("api/appsettings.Prod.json"), "{}").unwrap();
        let repo = GitRepository::new(tmp.path());
        let pattern = Regex::new(CONFIG_FILE_PATTERN).unwrap();

        let failing = FakeGit { fail_listing: true, ..FakeGit::default() };
        let empty = FakeGit::default();

        for backend in [&failing, &empty] {
            let files = list_tracked_matching(backend, &repo, &pattern, &FileWalker::default());
            assert_eq!(files, vec![tmp.path().join("api/appsettings.Prod.json")]);
        }
    }

    #[test]
    fn empty_discard_is_a_no_op() {
        let fake = FakeGit::default();
        discard_changes(&fake, &GitRepository::new("/r"), &[]).unwrap();
        assert!(fake.discarded.borrow().is_empty());
    }

    #[test]
    fn cli_round_trip_on_a_real_repository() {
        if !git_available() {
            println!("Git not available, skipping test");
            return;
        }

        let tmp = TempDir::new().unwrap();
        let repo_dir = tmp.path().join("Svc_API");
        fs::create_dir_all(repo_dir.join("src")).unwrap();
        git(&repo_dir, &["init", "-q"]);
        fs::write(repo_dir.join("src/appsettings.Dev.json"), "{\"A\": 1}\n").unwrap();
        fs::write(repo_dir.join("notes.txt"), "x\n").unwrap();
        git(&repo_dir, &["add", "."]);
        git(&repo_dir, &["commit", "-q", "-m", "init"]);

        let cli = GitCli::default();
        let repo = cli.find_root(&repo_dir.join("src/appsettings.Dev.json")).unwrap();
        assert_eq!(
            dunce::canonicalize(&repo.root).unwrap(),
            dunce::canonicalize(&repo_dir).unwrap()
        );

        let mut tracked = cli.list_tracked(&repo).unwrap();
        tracked.sort();
        assert_eq!(tracked, vec![PathBuf::from("notes.txt"), PathBuf::from("src/appsettings.Dev.json")]);

        let target = repo_dir.join("src/appsettings.Dev.json");
        fs::write(&target, "{\"A\": 2}\n").unwrap();
        discard_changes(&cli, &repo, std::slice::from_ref(&target)).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "{\"A\": 1}\n");

        let err = cli.discard(&repo, &[PathBuf::from("missing.json")]).unwrap_err();
        assert!(matches!(err, GitError::Failed { .. }));
    }

    #[test]
    fn missing_start_is_not_a_repository() {
        let tmp = TempDir::new().unwrap();
        let err = GitCli::new(0).find_root(&tmp.path().join("missing/dir")).unwrap_err();
        assert!(matches!(err, GitError::NotARepository(_)));
    }
}
