//! Local Git repository operations via `git2`.

use std::path::{Component, Path, PathBuf};

use git2::{BranchType, Cred, ObjectType, PushOptions, RemoteCallbacks, Repository, Signature, Time};
use tracing::{debug, info, instrument, warn};

use super::ReplayTarget;
use crate::errors::GitError;

/// Destination Git repository wrapping a `git2::Repository`.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Initialize a fresh repository at `repo_path` with `initial_branch`
    /// as the unborn HEAD, independent of host git configuration.
    pub fn init<P: AsRef<Path>>(repo_path: P, initial_branch: &str) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), initial_branch, "initializing git repository");
        std::fs::create_dir_all(path)?;
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head(initial_branch);
        let repo = Repository::init_opts(path, &opts)?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Resolve a repository-relative path, rejecting anything that could
    /// escape the working tree.
    fn workdir_path(&self, rel: &str) -> Result<PathBuf, GitError> {
        let rel_path = Path::new(rel);
        if rel.is_empty()
            || rel_path.is_absolute()
            || rel_path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(GitError::InvalidPath(rel.to_string()));
        }
        Ok(self.repo_path.join(rel_path))
    }

    fn head_commit(&self) -> Result<git2::Commit<'_>, GitError> {
        Ok(self.repo.head()?.peel_to_commit()?)
    }

    /// Register the `origin` remote if absent.
    pub fn ensure_remote(&self, url: &str) -> Result<(), GitError> {
        if self.repo.find_remote("origin").is_ok() {
            return Ok(());
        }
        info!(url, "adding remote origin");
        self.repo.remote("origin", url)?;
        Ok(())
    }

    fn push_refspecs(&self, refspecs: &[&str]) -> Result<(), GitError> {
        let mut remote = self.repo.find_remote("origin")?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|_url, username_from_url, _allowed| {
            match Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")) {
                Ok(cred) => Ok(cred),
                Err(_) => Cred::default(),
            }
        });

        let push_error = std::sync::Arc::new(std::sync::Mutex::new(None::<(String, String)>));
        let push_error_clone = push_error.clone();
        callbacks.push_update_reference(move |refname, status| {
            if let Some(msg) = status {
                warn!(refname, msg, "push rejected");
                *push_error_clone.lock().unwrap() = Some((refname.to_string(), msg.to_string()));
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        remote.push(refspecs, Some(&mut push_opts))?;

        if let Some((refname, detail)) = push_error.lock().unwrap().take() {
            return Err(GitError::PushRejected { refname, detail });
        }
        Ok(())
    }

    /// Push a local branch to origin.
    #[instrument(skip(self))]
    pub fn push_branch(&self, branch: &str) -> Result<(), GitError> {
        info!(branch, "pushing branch");
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        self.push_refspecs(&[&refspec])
    }

    /// Delete a branch on origin.
    #[instrument(skip(self))]
    pub fn push_deleted_branch(&self, branch: &str) -> Result<(), GitError> {
        info!(branch, "deleting remote branch");
        let refspec = format!(":refs/heads/{}", branch);
        self.push_refspecs(&[&refspec])
    }

    /// Push all tags to origin.
    #[instrument(skip(self))]
    pub fn push_tags(&self) -> Result<(), GitError> {
        info!("pushing tags");
        self.push_refspecs(&["refs/tags/*:refs/tags/*"])
    }
}

impl ReplayTarget for GitClient {
    fn branch_exists(&self, name: &str) -> Result<bool, GitError> {
        Ok(self.repo.find_branch(name, BranchType::Local).is_ok())
    }

    #[instrument(skip(self))]
    fn create_branch_at_head(&self, name: &str) -> Result<(), GitError> {
        let commit = self.head_commit()?;
        self.repo.branch(name, &commit, false)?;
        info!(name, "created branch at head");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| GitError::RefNotFound(format!("refs/heads/{}", name)))?;
        branch.delete()?;
        info!(name, "deleted branch");
        Ok(())
    }

    #[instrument(skip(self))]
    fn checkout(&self, name: &str) -> Result<(), GitError> {
        let refname = format!("refs/heads/{}", name);
        self.repo
            .find_reference(&refname)
            .map_err(|_| GitError::RefNotFound(refname.clone()))?;
        self.repo.set_head(&refname)?;
        self.repo
            .checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
        debug!(name, "checked out branch");
        Ok(())
    }

    fn current_branch(&self) -> Result<String, GitError> {
        // On an unborn branch HEAD is still a symbolic ref to the target
        // branch, so read it directly rather than resolving.
        let head = self.repo.find_reference("HEAD")?;
        if let Some(target) = head.symbolic_target() {
            if let Some(name) = target.strip_prefix("refs/heads/") {
                return Ok(name.to_string());
            }
        }
        match self.repo.head()?.shorthand() {
            Some(name) => Ok(name.to_string()),
            None => Err(GitError::RefNotFound("HEAD".into())),
        }
    }

    fn tag_exists(&self, name: &str) -> Result<bool, GitError> {
        let tags = self.repo.tag_names(Some(name))?;
        Ok(tags.iter().flatten().any(|t| t == name))
    }

    #[instrument(skip(self, message))]
    fn create_tag(&self, name: &str, message: &str) -> Result<(), GitError> {
        let head = self.repo.head()?.peel(ObjectType::Commit)?;
        let tagger = Signature::now("svnreplay", "svnreplay@localhost")?;
        self.repo.tag(name, &head, &tagger, message, false)?;
        info!(name, "created tag");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_tag(&self, name: &str) -> Result<(), GitError> {
        self.repo.tag_delete(name)?;
        info!(name, "deleted tag");
        Ok(())
    }

    fn stage_write(&self, path: &str, bytes: &[u8]) -> Result<(), GitError> {
        let full = self.workdir_path(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&full, bytes)?;

        let mut index = self.repo.index()?;
        index.add_path(Path::new(path))?;
        index.write()?;
        debug!(path, bytes = bytes.len(), "staged write");
        Ok(())
    }

    fn stage_delete(&self, path: &str) -> Result<(), GitError> {
        let full = self.workdir_path(path)?;
        let mut index = self.repo.index()?;

        if full.is_dir() {
            std::fs::remove_dir_all(&full)?;
            index.remove_dir(Path::new(path), 0)?;
        } else if full.exists() {
            std::fs::remove_file(&full)?;
            index.remove_path(Path::new(path))?;
        } else {
            debug!(path, "stage_delete on missing path, nothing to do");
            return Ok(());
        }

        index.write()?;
        debug!(path, "staged delete");
        Ok(())
    }

    fn dir_is_empty(&self, path: &str) -> Result<bool, GitError> {
        let full = self.workdir_path(path)?;
        if !full.is_dir() {
            return Ok(true);
        }
        Ok(std::fs::read_dir(&full)?.next().is_none())
    }

    fn has_staged_changes(&self) -> Result<bool, GitError> {
        let index = self.repo.index()?;
        match self.repo.head() {
            Ok(head) => {
                let tree = head.peel_to_tree()?;
                let diff = self
                    .repo
                    .diff_tree_to_index(Some(&tree), Some(&index), None)?;
                Ok(diff.deltas().len() > 0)
            }
            // Unborn branch: anything in the index is a staged change.
            Err(_) => Ok(!index.is_empty()),
        }
    }

    #[instrument(skip(self, message))]
    fn commit(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
        timestamp: i64,
    ) -> Result<String, GitError> {
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let when = Time::new(timestamp, 0);
        let signature = Signature::new(author_name, author_email, &when)?;

        let parent_commit = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent_commit.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        info!(sha = %oid, "created commit");
        Ok(oid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_repo() -> (tempfile::TempDir, GitClient) {
        let dir = tempfile::tempdir().unwrap();
        let client = GitClient::init(dir.path(), "master").unwrap();
        (dir, client)
    }

    fn seed_commit(client: &GitClient) -> String {
        client.stage_write("README", b"seed\n").unwrap();
        client.commit("initial", "tester", "t@example.com", 1_230_000_000).unwrap()
    }

    #[test]
    fn test_stage_write_commit_roundtrip() {
        let (dir, client) = scratch_repo();
        client.stage_write("dojo/parser.js", b"// parser").unwrap();
        assert!(client.has_staged_changes().unwrap());

        let sha = client
            .commit("import parser", "alice", "alice@example.com", 1_231_000_000)
            .unwrap();
        assert!(!sha.is_empty());
        assert!(!client.has_staged_changes().unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("dojo/parser.js")).unwrap(),
            "// parser"
        );
    }

    #[test]
    fn test_commit_preserves_author_and_timestamp() {
        let (_dir, client) = scratch_repo();
        client.stage_write("f.txt", b"x").unwrap();
        let sha = client
            .commit("msg", "alice", "alice@example.com", 1_231_000_000)
            .unwrap();

        let commit = client
            .repo
            .find_commit(git2::Oid::from_str(&sha).unwrap())
            .unwrap();
        assert_eq!(commit.author().name(), Some("alice"));
        assert_eq!(commit.author().when().seconds(), 1_231_000_000);
    }

    #[test]
    fn test_branch_lifecycle() {
        let (_dir, client) = scratch_repo();
        seed_commit(&client);

        assert!(!client.branch_exists("1.3").unwrap());
        client.create_branch_at_head("1.3").unwrap();
        assert!(client.branch_exists("1.3").unwrap());

        client.checkout("1.3").unwrap();
        assert_eq!(client.current_branch().unwrap(), "1.3");

        client.checkout("master").unwrap();
        client.delete_branch("1.3").unwrap();
        assert!(!client.branch_exists("1.3").unwrap());
    }

    #[test]
    fn test_current_branch_on_unborn_head() {
        let (_dir, client) = scratch_repo();
        // No commit yet — HEAD is a symbolic ref to an unborn branch.
        assert_eq!(client.current_branch().unwrap(), "master");
    }

    #[test]
    fn test_tag_lifecycle() {
        let (_dir, client) = scratch_repo();
        seed_commit(&client);

        assert!(!client.tag_exists("1.3.0").unwrap());
        client.create_tag("1.3.0", "Adding tag 1.3.0").unwrap();
        assert!(client.tag_exists("1.3.0").unwrap());

        client.delete_tag("1.3.0").unwrap();
        assert!(!client.tag_exists("1.3.0").unwrap());
    }

    #[test]
    fn test_tag_exists_is_exact_match() {
        let (_dir, client) = scratch_repo();
        seed_commit(&client);
        client.create_tag("1.3.0", "tag").unwrap();
        assert!(!client.tag_exists("1.3").unwrap());
    }

    #[test]
    fn test_stage_delete_file_and_dir() {
        let (dir, client) = scratch_repo();
        client.stage_write("util/build/a.js", b"a").unwrap();
        client.stage_write("util/build/b.js", b"b").unwrap();
        client.commit("seed", "t", "t@example.com", 1_230_000_000).unwrap();

        client.stage_delete("util/build/a.js").unwrap();
        assert!(!dir.path().join("util/build/a.js").exists());
        assert!(client.has_staged_changes().unwrap());
        client.commit("rm a", "t", "t@example.com", 1_230_000_100).unwrap();

        client.stage_delete("util").unwrap();
        assert!(!dir.path().join("util").exists());
        assert!(client.has_staged_changes().unwrap());
    }

    #[test]
    fn test_stage_delete_missing_path_is_noop() {
        let (_dir, client) = scratch_repo();
        seed_commit(&client);
        client.stage_delete("no/such/file.js").unwrap();
        assert!(!client.has_staged_changes().unwrap());
    }

    #[test]
    fn test_dir_is_empty() {
        let (dir, client) = scratch_repo();
        assert!(client.dir_is_empty("tests").unwrap());
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        assert!(client.dir_is_empty("tests").unwrap());
        std::fs::write(dir.path().join("tests/x.js"), "x").unwrap();
        assert!(!client.dir_is_empty("tests").unwrap());
    }

    #[test]
    fn test_workdir_path_rejects_escapes() {
        let (_dir, client) = scratch_repo();
        assert!(matches!(
            client.stage_write("../evil", b"x"),
            Err(GitError::InvalidPath(_))
        ));
        assert!(matches!(
            client.stage_write("/abs/path", b"x"),
            Err(GitError::InvalidPath(_))
        ));
        assert!(matches!(
            client.stage_write("", b"x"),
            Err(GitError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_open_missing_repo() {
        assert!(matches!(
            GitClient::open("/nonexistent"),
            Err(GitError::RepositoryNotFound(_))
        ));
    }
}
