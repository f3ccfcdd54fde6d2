//! Document sharding and the per-project context cache.
//!
//! Documents are split at markdown headings of level 1 and 2; deeper headings
//! stay inside their parent shard. Shards are cached per project and served to
//! prompts as a size-capped "relevant context" block.

use crate::collab::{DocumentSource, ProjectDocument};
use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

pub const PREAMBLE_TITLE: &str = "Preamble";

/// Headings at or above this level start a new shard.
pub const SHARD_HEADING_LEVEL: usize = 2;

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;

pub const TRUNCATION_MARKER: &str = "[... context truncated]";

// ---------------------------------------------------------------------------
// DocumentShard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentShard {
    pub title: String,
    pub content: String,
    pub order: usize,
    /// Heading depth; 0 for the preamble shard.
    pub level: usize,
    /// Name of the source document; empty when split outside the cache.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub document: String,
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*?)\s*$").unwrap())
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let caps = heading_re().captures(line)?;
    let level = caps[1].len();
    let raw = &caps[2];
    // A closing `##` run only counts when separated by whitespace ("C#" stays).
    let stripped = raw.trim_end_matches('#');
    let title = if stripped.ends_with([' ', '\t']) {
        stripped.trim_end()
    } else {
        raw
    };
    Some((level, title.to_string()))
}

fn fence_marker(line: &str) -> Option<char> {
    let t = line.trim_start();
    if t.starts_with("```") {
        Some('`')
    } else if t.starts_with("~~~") {
        Some('~')
    } else {
        None
    }
}

/// Visit every line, telling the callback whether it is a heading outside a
/// fenced code block.
fn scan_lines<'a>(document: &'a str, mut visit: impl FnMut(&'a str, Option<(usize, String)>)) {
    let mut fence: Option<char> = None;
    for line in document.lines() {
        if let Some(marker) = fence_marker(line) {
            fence = match fence {
                None => Some(marker),
                Some(open) if open == marker => None,
                still_open => still_open,
            };
            visit(line, None);
            continue;
        }
        if fence.is_some() {
            visit(line, None);
            continue;
        }
        visit(line, parse_heading(line));
    }
}

fn join_trimmed(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

/// Split a markdown document into ordered shards.
///
/// Content before the first heading becomes a [`PREAMBLE_TITLE`] shard when
/// it is non-blank. A document with no shard-level heading yields exactly one
/// preamble shard holding the whole text.
pub fn split_into_sections(document: &str) -> Vec<DocumentShard> {
    let mut shards: Vec<DocumentShard> = Vec::new();
    let mut current: Option<(usize, String)> = None;
    let mut buf: Vec<&str> = Vec::new();
    let mut saw_heading = false;

    let mut flush = |current: &Option<(usize, String)>, buf: &mut Vec<&str>, keep_blank: bool| {
        let content = join_trimmed(buf);
        buf.clear();
        let (level, title) = match current {
            Some((level, title)) => (*level, title.clone()),
            None if content.is_empty() && !keep_blank => return,
            None => (0, PREAMBLE_TITLE.to_string()),
        };
        shards.push(DocumentShard {
            title,
            content,
            order: shards.len(),
            level,
            document: String::new(),
        });
    };

    scan_lines(document, |line, heading| match heading {
        Some((level, title)) if level <= SHARD_HEADING_LEVEL => {
            flush(&current, &mut buf, false);
            current = Some((level, title));
            saw_heading = true;
        }
        _ => buf.push(line),
    });
    flush(&current, &mut buf, !saw_heading);

    shards
}

/// Every heading in the document at any level, outside code fences.
pub fn headings(document: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    scan_lines(document, |_, heading| out.extend(heading));
    out
}

// ---------------------------------------------------------------------------
// Relevance
// ---------------------------------------------------------------------------

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "are", "was", "were", "will",
    "should", "must", "have", "has", "not", "but", "all", "any", "our", "your", "its",
];

/// Lowercase alphanumeric tokens of three or more chars, stop words removed,
/// first occurrence order.
pub fn query_keywords(query: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in query
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
    {
        if token.chars().count() < 3 || STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

fn shard_matches(shard: &DocumentShard, keywords: &[String]) -> bool {
    let title = shard.title.to_lowercase();
    let content = shard.content.to_lowercase();
    keywords
        .iter()
        .any(|k| title.contains(k.as_str()) || content.contains(k.as_str()))
}

/// Query text for a task: its title plus description.
pub fn task_query(title: &str, description: Option<&str>) -> String {
    match description {
        Some(d) if !d.trim().is_empty() => format!("{title} {d}"),
        _ => title.to_string(),
    }
}

/// Render shards as one block, capped at `max_chars`.
///
/// Whole shards are appended in order while they fit. The first shard that
/// does not fit is cut to the remaining budget and followed by
/// [`TRUNCATION_MARKER`]; anything after it is dropped.
pub fn render_context(shards: &[DocumentShard], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for shard in shards {
        let sep = if out.is_empty() { "" } else { "\n\n" };
        let piece = format!("{sep}## {}\n{}", shard.title, shard.content);
        let len = piece.chars().count();
        if used + len <= max_chars {
            out.push_str(&piece);
            used += len;
            continue;
        }
        let remaining = max_chars.saturating_sub(used);
        out.extend(piece.chars().take(remaining));
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(TRUNCATION_MARKER);
        break;
    }
    out
}

fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// ShardCache
// ---------------------------------------------------------------------------

struct CachedDocument {
    name: String,
    fingerprint: String,
    shards: Vec<DocumentShard>,
}

impl CachedDocument {
    fn build(doc: &ProjectDocument) -> Self {
        let shards = split_into_sections(&doc.content)
            .into_iter()
            .map(|mut s| {
                s.document = doc.name.clone();
                s
            })
            .collect();
        Self {
            name: doc.name.clone(),
            fingerprint: fingerprint(&doc.content),
            shards,
        }
    }
}

#[derive(Default)]
struct ProjectShards {
    documents: Vec<CachedDocument>,
    contexts: HashMap<String, String>,
}

impl ProjectShards {
    fn all_shards(&self) -> Vec<DocumentShard> {
        self.documents
            .iter()
            .flat_map(|d| d.shards.iter().cloned())
            .collect()
    }
}

#[derive(Default)]
struct CacheInner {
    projects: HashMap<String, ProjectShards>,
    epochs: HashMap<String, u64>,
    global_epoch: u64,
}

impl CacheInner {
    /// Changes whenever the project is invalidated or the cache cleared.
    fn epoch(&self, project_id: &str) -> (u64, u64) {
        (
            self.global_epoch,
            self.epochs.get(project_id).copied().unwrap_or(0),
        )
    }
}

/// Process-wide shard cache keyed by project id.
///
/// Documents are loaded from the [`DocumentSource`] with no lock held. A fill
/// or rendered context that raced with an invalidation or a document
/// replacement is returned to its caller but never stored.
pub struct ShardCache {
    source: Arc<dyn DocumentSource>,
    max_context_chars: usize,
    inner: RwLock<CacheInner>,
}

impl ShardCache {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            source,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    pub fn with_max_context_chars(mut self, max_chars: usize) -> Self {
        self.max_context_chars = max_chars;
        self
    }

    pub fn is_cached(&self, project_id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .projects
            .contains_key(project_id)
    }

    /// Cached shards for the project, loading them on first access.
    pub fn get_document_shards(&self, project_id: &str) -> Result<Vec<DocumentShard>> {
        let epoch = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(project) = inner.projects.get(project_id) {
                return Ok(project.all_shards());
            }
            inner.epoch(project_id)
        };

        let documents = self.source.load_documents(project_id)?;
        let entry = ProjectShards {
            documents: documents.iter().map(CachedDocument::build).collect(),
            contexts: HashMap::new(),
        };
        let shards = entry.all_shards();
        tracing::debug!(
            project = %project_id,
            documents = documents.len(),
            shards = shards.len(),
            "sharded project documents"
        );

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.epoch(project_id) == epoch && !inner.projects.contains_key(project_id) {
            inner.projects.insert(project_id.to_string(), entry);
        }
        Ok(shards)
    }

    /// Shard one document and store it, replacing earlier shards of the same
    /// document name. Returns that document's shards.
    pub fn shard_document(
        &self,
        project_id: &str,
        document: &ProjectDocument,
    ) -> Result<Vec<DocumentShard>> {
        self.get_document_shards(project_id)?;
        let built = CachedDocument::build(document);
        let shards = built.shards.clone();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(project) = inner.projects.get_mut(project_id) else {
            return Ok(shards);
        };
        let changed = match project.documents.iter_mut().find(|d| d.name == built.name) {
            Some(existing) if existing.fingerprint == built.fingerprint => false,
            Some(existing) => {
                *existing = built;
                true
            }
            None => {
                project.documents.push(built);
                true
            }
        };
        if changed {
            project.contexts.clear();
            // A context rendered from the previous document must not be memoized.
            *inner.epochs.entry(project_id.to_string()).or_insert(0) += 1;
        }
        Ok(shards)
    }

    /// Shards whose title or content mention any query keyword, in source order.
    pub fn get_relevant_shards(&self, project_id: &str, query: &str) -> Result<Vec<DocumentShard>> {
        let keywords = query_keywords(query);
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .get_document_shards(project_id)?
            .into_iter()
            .filter(|s| shard_matches(s, &keywords))
            .collect())
    }

    /// Relevant shards for a task query rendered as one capped block.
    pub fn build_task_context(&self, project_id: &str, query: &str) -> Result<String> {
        let epoch = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = inner
                .projects
                .get(project_id)
                .and_then(|p| p.contexts.get(query))
            {
                return Ok(hit.clone());
            }
            inner.epoch(project_id)
        };

        let relevant = self.get_relevant_shards(project_id, query)?;
        let context = render_context(&relevant, self.max_context_chars);

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let fresh = inner.epoch(project_id) == epoch;
        if let Some(project) = inner.projects.get_mut(project_id).filter(|_| fresh) {
            project.contexts.insert(query.to_string(), context.clone());
        }
        Ok(context)
    }

    pub fn invalidate_project(&self, project_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.projects.remove(project_id);
        *inner.epochs.entry(project_id.to_string()).or_insert(0) += 1;
        tracing::debug!(project = %project_id, "invalidated shard cache");
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.projects.clear();
        inner.global_epoch += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::thread;

    struct MemorySource {
        docs: Mutex<HashMap<String, Vec<ProjectDocument>>>,
        loads: AtomicUsize,
    }

    impl MemorySource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                docs: Mutex::new(HashMap::new()),
                loads: AtomicUsize::new(0),
            })
        }

        fn set(&self, project: &str, docs: Vec<ProjectDocument>) {
            self.docs.lock().unwrap().insert(project.to_string(), docs);
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl DocumentSource for MemorySource {
        fn load_documents(&self, project_id: &str) -> Result<Vec<ProjectDocument>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .docs
                .lock()
                .unwrap()
                .get(project_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Pauses the first load after reading its documents until released.
    /// Later loads go straight through.
    struct GatedSource {
        docs: Mutex<Vec<ProjectDocument>>,
        loads: AtomicUsize,
        gate: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
    }

    impl GatedSource {
        /// Returns the source, a receiver signalled once the first load is
        /// paused, and the sender that releases it.
        fn new(docs: Vec<ProjectDocument>) -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let source = Arc::new(Self {
                docs: Mutex::new(docs),
                loads: AtomicUsize::new(0),
                gate: Mutex::new(Some((entered_tx, release_rx))),
            });
            (source, entered_rx, release_tx)
        }

        fn set(&self, docs: Vec<ProjectDocument>) {
            *self.docs.lock().unwrap() = docs;
        }
    }

    impl DocumentSource for GatedSource {
        fn load_documents(&self, _project_id: &str) -> Result<Vec<ProjectDocument>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let docs = self.docs.lock().unwrap().clone();
            let gate = self.gate.lock().unwrap().take();
            if let Some((entered, release)) = gate {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
            Ok(docs)
        }
    }

    fn titles(shards: &[DocumentShard]) -> Vec<&str> {
        shards.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn splits_at_top_two_heading_levels() {
        let doc = "# Title\nPreamble content\n\n## Section One\nContent of section one\n\n## Section Two\nContent of section two\nMore content";
        let shards = split_into_sections(doc);
        assert_eq!(titles(&shards), ["Title", "Section One", "Section Two"]);
        assert_eq!(shards[0].content, "Preamble content");
        assert_eq!(shards[2].content, "Content of section two\nMore content");
        assert_eq!(
            shards.iter().map(|s| s.order).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[test]
    fn heading_free_document_is_one_preamble_shard() {
        let shards = split_into_sections("Just plain text\nNo headings here");
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].title, PREAMBLE_TITLE);
        assert_eq!(shards[0].content, "Just plain text\nNo headings here");
        assert_eq!(shards[0].level, 0);
    }

    #[test]
    fn empty_document_still_yields_one_shard() {
        let shards = split_into_sections("");
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].title, PREAMBLE_TITLE);
        assert!(shards[0].content.is_empty());
    }

    #[test]
    fn leading_text_becomes_preamble() {
        let shards = split_into_sections("intro line\n\n# First\nbody");
        assert_eq!(titles(&shards), [PREAMBLE_TITLE, "First"]);
        assert_eq!(shards[0].content, "intro line");
    }

    #[test]
    fn blank_preamble_is_dropped() {
        let shards = split_into_sections("\n\n   \n# First\nbody");
        assert_eq!(titles(&shards), ["First"]);
    }

    #[test]
    fn deeper_headings_nest_in_parent() {
        let doc = "## API\nOverview\n### Endpoints\nGET /users\n#### Errors\n404\n## Storage\nPostgres";
        let shards = split_into_sections(doc);
        assert_eq!(titles(&shards), ["API", "Storage"]);
        assert!(shards[0].content.contains("### Endpoints"));
        assert!(shards[0].content.contains("#### Errors\n404"));
    }

    #[test]
    fn headings_inside_code_fences_are_content() {
        let doc = "# Setup\n```bash\n# install deps\nnpm install\n```\n# Usage\nrun it";
        let shards = split_into_sections(doc);
        assert_eq!(titles(&shards), ["Setup", "Usage"]);
        assert!(shards[0].content.contains("# install deps"));
    }

    #[test]
    fn hash_without_space_is_not_a_heading() {
        let shards = split_into_sections("#hashtag\n#\nplain");
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].title, PREAMBLE_TITLE);
    }

    #[test]
    fn shards_reconstruct_body_text() {
        let doc = "Intro\n\n# One\nalpha\n### Deep\nbeta\n\n## Two\ngamma\n";
        let shards = split_into_sections(doc);
        let mut rebuilt: Vec<String> = Vec::new();
        for s in &shards {
            if s.level > 0 {
                rebuilt.push(format!("{} {}", "#".repeat(s.level), s.title));
            }
            rebuilt.extend(s.content.lines().map(str::to_string));
        }
        let expected: Vec<&str> = doc.lines().filter(|l| !l.trim().is_empty()).collect();
        let rebuilt: Vec<&str> = rebuilt
            .iter()
            .map(String::as_str)
            .filter(|l| !l.trim().is_empty())
            .collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn headings_lists_every_level() {
        let found = headings("# A\n### B\n```\n## not\n```\n###### C");
        assert_eq!(
            found,
            vec![
                (1, "A".to_string()),
                (3, "B".to_string()),
                (6, "C".to_string())
            ]
        );
    }

    #[test]
    fn keywords_drop_short_and_stop_words() {
        assert_eq!(
            query_keywords("Add the OAuth login to API, and the login page"),
            ["add", "oauth", "login", "api", "page"]
        );
        assert!(query_keywords("a an to of").is_empty());
    }

    #[test]
    fn render_context_truncates_at_budget() {
        let shards = split_into_sections("# A\naaaa\n# B\nbbbbbbbbbbbbbbbbbbbb\n# C\ncc");
        let full = render_context(&shards, 10_000);
        assert!(!full.contains(TRUNCATION_MARKER));

        let capped = render_context(&shards, 15);
        assert!(capped.starts_with("## A\naaaa"));
        assert!(capped.ends_with(TRUNCATION_MARKER));
        assert!(!capped.contains("## C"));
        let body = capped.trim_end_matches(TRUNCATION_MARKER).trim_end_matches('\n');
        assert!(body.chars().count() <= 15);
    }

    #[test]
    fn lazy_fill_loads_once() {
        let source = MemorySource::new();
        source.set("p1", vec![ProjectDocument::new("prd", "# Goals\nShip it")]);
        let cache = ShardCache::new(source.clone());

        assert!(!cache.is_cached("p1"));
        let first = cache.get_document_shards("p1").unwrap();
        let second = cache.get_document_shards("p1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].document, "prd");
        assert_eq!(source.loads(), 1);
        assert!(cache.is_cached("p1"));
    }

    #[test]
    fn invalidation_recomputes_from_current_document() {
        let source = MemorySource::new();
        source.set("p1", vec![ProjectDocument::new("prd", "# Old\nstale")]);
        let cache = ShardCache::new(source.clone());
        assert_eq!(titles(&cache.get_document_shards("p1").unwrap()), ["Old"]);

        source.set("p1", vec![ProjectDocument::new("prd", "# New\nfresh")]);
        cache.invalidate_project("p1");
        assert_eq!(titles(&cache.get_document_shards("p1").unwrap()), ["New"]);
        assert_eq!(source.loads(), 2);
    }

    #[test]
    fn invalidation_is_per_project() {
        let source = MemorySource::new();
        source.set("a", vec![ProjectDocument::new("prd", "# A")]);
        source.set("b", vec![ProjectDocument::new("prd", "# B")]);
        let cache = ShardCache::new(source.clone());
        cache.get_document_shards("a").unwrap();
        cache.get_document_shards("b").unwrap();

        cache.invalidate_project("a");
        assert!(!cache.is_cached("a"));
        assert!(cache.is_cached("b"));

        cache.clear();
        assert!(!cache.is_cached("b"));
    }

    #[test]
    fn shard_document_replaces_same_name_only() {
        let source = MemorySource::new();
        source.set(
            "p1",
            vec![
                ProjectDocument::new("prd", "# Goals\nv1"),
                ProjectDocument::new("architecture", "# Stack\nRust"),
            ],
        );
        let cache = ShardCache::new(source.clone());
        cache
            .shard_document("p1", &ProjectDocument::new("prd", "# Goals\nv2\n# Scope\nsmall"))
            .unwrap();

        let shards = cache.get_document_shards("p1").unwrap();
        assert_eq!(titles(&shards), ["Goals", "Scope", "Stack"]);
        assert_eq!(shards[0].content, "v2");
    }

    #[test]
    fn shard_document_adds_new_document() {
        let source = MemorySource::new();
        let cache = ShardCache::new(source.clone());
        let shards = cache
            .shard_document("p1", &ProjectDocument::new("brief", "Pitch only"))
            .unwrap();
        assert_eq!(titles(&shards), [PREAMBLE_TITLE]);
        assert_eq!(titles(&cache.get_document_shards("p1").unwrap()), [PREAMBLE_TITLE]);
    }

    #[test]
    fn relevant_shards_filter_in_source_order() {
        let source = MemorySource::new();
        source.set(
            "p1",
            vec![ProjectDocument::new(
                "architecture",
                "# Overview\nlogin flows and billing\n# Billing\nStripe\n# Auth\nOAuth login\n# Ops\nk8s",
            )],
        );
        let cache = ShardCache::new(source);
        let relevant = cache.get_relevant_shards("p1", "Fix login").unwrap();
        assert_eq!(titles(&relevant), ["Overview", "Auth"]);
        assert!(cache.get_relevant_shards("p1", "a b").unwrap().is_empty());
    }

    #[test]
    fn task_context_is_memoized_and_dropped_on_change() {
        let source = MemorySource::new();
        source.set("p1", vec![ProjectDocument::new("prd", "# Login\nuse email")]);
        let cache = ShardCache::new(source.clone());

        let ctx = cache.build_task_context("p1", "login form").unwrap();
        assert_eq!(ctx, "## Login\nuse email");

        cache
            .shard_document("p1", &ProjectDocument::new("prd", "# Login\nuse passkeys"))
            .unwrap();
        let ctx = cache.build_task_context("p1", "login form").unwrap();
        assert_eq!(ctx, "## Login\nuse passkeys");
    }

    #[test]
    fn task_context_respects_cap() {
        let source = MemorySource::new();
        let long = format!("# Login\n{}", "x".repeat(500));
        source.set("p1", vec![ProjectDocument::new("prd", long)]);
        let cache = ShardCache::new(source).with_max_context_chars(100);
        let ctx = cache.build_task_context("p1", "login").unwrap();
        assert!(ctx.ends_with(TRUNCATION_MARKER));
        assert!(ctx.chars().count() <= 100 + 1 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn fill_racing_invalidation_is_not_stored() {
        let (source, entered, release) =
            GatedSource::new(vec![ProjectDocument::new("prd", "# Goals\nold goal")]);
        let cache = Arc::new(ShardCache::new(source.clone()));

        let filler = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.get_document_shards("p").unwrap())
        };
        entered.recv().unwrap();
        source.set(vec![ProjectDocument::new("prd", "# Goals\nnew goal")]);
        cache.invalidate_project("p");
        release.send(()).unwrap();

        let raced = filler.join().unwrap();
        assert_eq!(raced[0].content, "old goal");
        assert!(!cache.is_cached("p"));

        let fresh = cache.get_document_shards("p").unwrap();
        assert_eq!(fresh[0].content, "new goal");
        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert!(cache.is_cached("p"));
    }

    #[test]
    fn context_racing_document_replacement_is_not_memoized() {
        let (source, entered, release) =
            GatedSource::new(vec![ProjectDocument::new("prd", "# Login\nuse email")]);
        let cache = Arc::new(ShardCache::new(source));

        let reader = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.build_task_context("p", "login").unwrap())
        };
        entered.recv().unwrap();
        cache
            .shard_document("p", &ProjectDocument::new("prd", "# Login\nuse passkeys"))
            .unwrap();
        release.send(()).unwrap();

        assert_eq!(reader.join().unwrap(), "## Login\nuse email");

        let shards = cache.get_document_shards("p").unwrap();
        assert_eq!(shards[0].content, "use passkeys");
        let ctx = cache.build_task_context("p", "login").unwrap();
        assert_eq!(ctx, "## Login\nuse passkeys");
    }

    #[test]
    fn task_query_joins_description() {
        assert_eq!(task_query("Login", Some("with email")), "Login with email");
        assert_eq!(task_query("Login", Some("  ")), "Login");
        assert_eq!(task_query("Login", None), "Login");
    }
}
