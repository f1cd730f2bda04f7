#![allow(clippy::module_name_repetitions)]
//! Git metadata extraction from porcelain status and log output.
//!
//! Parsing is deliberately tolerant: an unrecognized status header leaves
//! branch/upstream empty, a failed remote lookup leaves the remote URL
//! empty, and a failed commit lookup leaves a default commit record. Only a
//! malformed commit record itself is an error, and callers downgrade that
//! to a warning.

use serde::Deserialize;

use crate::color::{color_enabled_stderr, log_info_stderr, log_warn_stderr};
use crate::errors::{Error, Result};
use crate::exec::{CommandSpec, Runner};

const TRIM_CHARS: &[char] = &['\'', ' ', '\r', '\n'];

/// Author/SHA/date of the last commit plus a derived web URL
/// (`<remote-without-.git>/commit/<sha>`, empty without a known remote).
#[derive(Debug, Default, Clone)]
pub struct CommitInfo {
    pub author: String,
    pub sha: String,
    pub date: String,
    pub url: String,
}

/// Snapshot of the working tree's VCS state. Constructed fresh per call to
/// [`git_info`]; never mutated afterwards.
#[derive(Debug, Default, Clone)]
pub struct GitInfo {
    pub branch: String,
    pub upstream: String,
    pub remote_url: String,
    pub changes_made: bool,
    pub commit: CommitInfo,
}

#[derive(Debug, Deserialize)]
struct CommitRecord {
    author: String,
    sha: String,
    date: String,
}

fn run_git<I, S>(runner: &dyn Runner, args: I, dry_run: bool) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let spec = CommandSpec::new("git").args(args).dry_run(dry_run);
    let out = runner.capture(&spec)?;
    Ok(out.stdout)
}

/// Parsed `git status -sb` header plus change indication.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub branch: String,
    pub upstream: String,
    pub changes_made: bool,
}

/// Parse porcelain short-branch status text.
///
/// Recognized header forms: `## <branch>`, `## <branch>...<upstream>`,
/// `## No commits yet on <branch>`. Anything else leaves branch and
/// upstream empty. Any line beyond the header means uncommitted changes.
pub fn parse_status(output: &str) -> StatusSummary {
    let mut summary = StatusSummary::default();
    let trimmed = output.trim_matches(TRIM_CHARS);
    if trimmed.is_empty() {
        return summary;
    }
    let mut lines = trimmed.lines();
    let header = lines.next().unwrap_or("").trim_matches(TRIM_CHARS);

    const NO_COMMITS: &str = "## No commits yet on ";
    const BRANCH_PREFIX: &str = "## ";
    const UPSTREAM_SEP: &str = "...";

    if let Some(branch) = header.strip_prefix(NO_COMMITS) {
        summary.branch = branch.trim_matches(TRIM_CHARS).to_string();
    } else if let Some(rest) = header.strip_prefix(BRANCH_PREFIX) {
        match rest.split_once(UPSTREAM_SEP) {
            Some((branch, upstream)) => {
                summary.branch = branch.trim_matches(TRIM_CHARS).to_string();
                summary.upstream = upstream.trim_matches(TRIM_CHARS).to_string();
            }
            None => summary.branch = rest.trim_matches(TRIM_CHARS).to_string(),
        }
    }

    summary.changes_made = lines.next().is_some();
    summary
}

/// Remote name is the substring of the upstream ref before the first `/`.
pub fn remote_name(upstream: &str) -> &str {
    upstream.split('/').next().unwrap_or(upstream)
}

/// Resolve the configured URL of the upstream's remote.
fn remote_url(runner: &dyn Runner, upstream: &str, dry_run: bool) -> Result<String> {
    let key = format!("remote.{}.url", remote_name(upstream));
    let out = run_git(runner, ["config", "--local", &key[..]], dry_run)?;
    Ok(out.trim_matches(TRIM_CHARS).to_string())
}

/// Derive the commit's web URL from a remote URL, removing a trailing
/// `.git` suffix. Empty when no remote URL is known.
pub fn commit_web_url(remote: &str, sha: &str) -> String {
    if remote.is_empty() || sha.is_empty() {
        return String::new();
    }
    let base = remote.strip_suffix(".git").unwrap_or(remote);
    format!("{base}/commit/{sha}")
}

/// Parse the single-line commit record emitted by `git log --pretty`.
pub fn parse_commit_record(raw: &str, remote: &str) -> Result<CommitInfo> {
    let record: CommitRecord = serde_json::from_str(raw.trim_matches(TRIM_CHARS))
        .map_err(|e| Error::CommitParse {
            detail: e.to_string(),
        })?;
    let url = commit_web_url(remote, &record.sha);
    Ok(CommitInfo {
        author: record.author,
        sha: record.sha,
        date: record.date,
        url,
    })
}

fn last_commit(runner: &dyn Runner, remote: &str, dry_run: bool) -> Result<CommitInfo> {
    let out = run_git(
        runner,
        [
            "log",
            "-n",
            "1",
            "--pretty=format:'{\"author\":\"%cn\",\"sha\":\"%H\",\"date\":\"%cd\"}'",
        ],
        dry_run,
    )?;
    parse_commit_record(&out, remote)
}

/// Extract branch, upstream, remote URL, change state and last commit.
///
/// Remote and commit lookups are best-effort: their failure leaves the
/// corresponding fields empty rather than failing the whole extraction.
pub fn git_info(runner: &dyn Runner, dry_run: bool) -> Result<GitInfo> {
    let version = run_git(runner, ["version"], dry_run)?;
    if version.trim_matches(TRIM_CHARS).is_empty() && !dry_run {
        return Err(Error::CommandFailed {
            program: "git".to_string(),
            stderr: "git does not appear to be available".to_string(),
        });
    }

    let status = run_git(runner, ["status", "-sb"], dry_run)?;
    let summary = parse_status(&status);

    let use_err = color_enabled_stderr();
    let mut info = GitInfo {
        branch: summary.branch,
        upstream: summary.upstream,
        changes_made: summary.changes_made,
        ..GitInfo::default()
    };

    if !info.upstream.is_empty() {
        match remote_url(runner, &info.upstream, dry_run) {
            Ok(url) => info.remote_url = url,
            Err(e) => log_warn_stderr(
                use_err,
                &format!("devstack: could not resolve repository URL: {e}"),
            ),
        }
    } else {
        log_info_stderr(
            use_err,
            "devstack: no upstream configured; repository URL unknown",
        );
    }

    match last_commit(runner, &info.remote_url, dry_run) {
        Ok(commit) => info.commit = commit,
        Err(e) => log_warn_stderr(
            use_err,
            &format!("devstack: could not determine current commit: {e}"),
        ),
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_with_upstream() {
        let s = parse_status("## main...origin/main\n");
        assert_eq!(s.branch, "main");
        assert_eq!(s.upstream, "origin/main");
        assert!(!s.changes_made);
    }

    #[test]
    fn test_parse_status_no_upstream() {
        let s = parse_status("## feature-x\n");
        assert_eq!(s.branch, "feature-x");
        assert_eq!(s.upstream, "");
    }

    #[test]
    fn test_parse_status_unborn_branch() {
        let s = parse_status("## No commits yet on main\n");
        assert_eq!(s.branch, "main");
        assert_eq!(s.upstream, "");
    }

    #[test]
    fn test_parse_status_changes_present() {
        let s = parse_status("## main...origin/main\n M src/lib.rs\n?? notes.txt\n");
        assert!(s.changes_made);
        let clean = parse_status("## main...origin/main\n");
        assert!(!clean.changes_made);
    }

    #[test]
    fn test_parse_status_unmatched_header() {
        let s = parse_status("fatal-looking noise\nmore\n");
        assert_eq!(s.branch, "");
        assert_eq!(s.upstream, "");
        assert!(s.changes_made);
    }

    #[test]
    fn test_remote_name_before_first_slash() {
        assert_eq!(remote_name("origin/main"), "origin");
        assert_eq!(remote_name("upstream/release/1.0"), "upstream");
        assert_eq!(remote_name("noslash"), "noslash");
    }

    #[test]
    fn test_commit_web_url_strips_dot_git() {
        assert_eq!(
            commit_web_url("https://example.com/org/repo.git", "abc123"),
            "https://example.com/org/repo/commit/abc123"
        );
        assert_eq!(
            commit_web_url("https://example.com/org/repo", "abc123"),
            "https://example.com/org/repo/commit/abc123"
        );
        assert_eq!(commit_web_url("", "abc123"), "");
    }

    #[test]
    fn test_parse_commit_record_roundtrip() {
        let raw = "'{\"author\":\"Jane Dev\",\"sha\":\"deadbeef\",\"date\":\"Thu Aug 28\"}'";
        let c = parse_commit_record(raw, "https://example.com/org/repo.git").unwrap();
        assert_eq!(c.author, "Jane Dev");
        assert_eq!(c.sha, "deadbeef");
        assert_eq!(c.url, "https://example.com/org/repo/commit/deadbeef");
    }

    #[test]
    fn test_parse_commit_record_malformed() {
        match parse_commit_record("not json at all", "") {
            Err(Error::CommitParse { .. }) => {}
            other => panic!("expected CommitParse, got {other:?}"),
        }
    }
}
