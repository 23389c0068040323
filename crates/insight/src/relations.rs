//! Common-reference analysis across a set of papers
//!
//! A common reference is one cited by *every* analyzed paper. Reference
//! lists come from the bibliography provider as reported at query time;
//! a failed fetch contributes an empty list, which can only shrink the
//! intersection.

use paperpilot_common::config::RelationsConfig;
use paperpilot_common::db::{CitationEdgeRecord, PaperStore};
use paperpilot_common::domain::{arxiv_key, strip_arxiv_prefix};
use paperpilot_common::llm::parse::parse_selected_index;
use paperpilot_common::llm::{CompletionRequest, LlmPurpose, TextGenerator};
use paperpilot_common::metrics::record_fallback;
use paperpilot_common::providers::{BibliographyProvider, ReferenceEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Relation type written for provider-reported references
pub const REFERENCE_RELATION: &str = "reference";

/// Input paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationPaper {
    /// Storage id, when the paper is stored
    pub id: Option<Uuid>,
    pub title: String,
    /// arXiv id, with or without the `arXiv:` prefix
    pub external_id: String,
}

impl RelationPaper {
    fn arxiv_id(&self) -> &str {
        strip_arxiv_prefix(self.external_id.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Recommended,
    CommonReference,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

/// Directed citing → cited edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub common_citation_count: usize,
}

impl RelationGraph {
    pub fn common_reference_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::CommonReference)
    }
}

/// How the key reference was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickMethod {
    /// Only one common reference existed
    Direct,
    Llm,
    /// LLM answer unusable; first candidate taken
    Fallback,
}

/// The single common reference highlighted to the reader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyReference {
    pub reference: ReferenceEntry,
    pub reason: Option<String>,
    pub method: PickMethod,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationReport {
    pub graph: RelationGraph,
    pub common_references: Vec<ReferenceEntry>,
    pub key_reference: Option<KeyReference>,
    /// Empty when the explanation call failed
    pub explanation: String,
    /// Papers whose reference lists were consulted
    pub papers_analyzed: usize,
    /// Storage ids of the analyzed papers
    pub paper_ids: Vec<Uuid>,
    /// Citation edges newly written to storage
    pub edges_written: usize,
}

struct PaperReferenceSet<'a> {
    paper: &'a RelationPaper,
    references: Vec<ReferenceEntry>,
    ids: HashSet<String>,
}

pub struct CitationRelationAnalyzer {
    llm: Arc<dyn TextGenerator>,
    bibliography: Arc<dyn BibliographyProvider>,
    store: Option<Arc<dyn PaperStore>>,
    config: RelationsConfig,
}

impl CitationRelationAnalyzer {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        bibliography: Arc<dyn BibliographyProvider>,
        config: RelationsConfig,
    ) -> Self {
        Self {
            llm,
            bibliography,
            store: None,
            config,
        }
    }

    /// Write discovered edges through this store
    pub fn with_store(mut self, store: Arc<dyn PaperStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Analyze shared references; fewer than two resolvable papers gives an
    /// empty report without any provider or LLM call.
    #[instrument(skip_all, fields(papers = papers.len()))]
    pub async fn analyze(&self, papers: &[RelationPaper]) -> RelationReport {
        let resolvable: Vec<&RelationPaper> =
            papers.iter().filter(|p| !p.arxiv_id().is_empty()).collect();
        if resolvable.len() < 2 {
            debug!(resolvable = resolvable.len(), "Not enough papers for relation analysis");
            return RelationReport::default();
        }

        let mut sets = Vec::with_capacity(resolvable.len());
        for paper in resolvable {
            sets.push(self.fetch_references(paper).await);
        }

        let common = common_references(&sets, self.config.common_reference_cap);
        let graph = build_graph(papers, &sets, &common);
        info!(
            common = graph.common_citation_count,
            edges = graph.edges.len(),
            "Common references computed"
        );

        let key_reference = self.pick_key_reference(&sets, &common).await;
        let explanation = self.explain(&sets, graph.common_citation_count).await;
        let (paper_ids, edges_written) = self.persist_edges(&sets).await;

        RelationReport {
            graph,
            common_references: common,
            key_reference,
            explanation,
            papers_analyzed: sets.len(),
            paper_ids,
            edges_written,
        }
    }

    async fn fetch_references<'a>(&self, paper: &'a RelationPaper) -> PaperReferenceSet<'a> {
        let references = match self.bibliography.references(paper.arxiv_id()).await {
            Ok(refs) => refs.references,
            Err(e) => {
                warn!(
                    arxiv_id = paper.arxiv_id(),
                    error = %e,
                    "Reference list unavailable, treating as empty"
                );
                record_fallback("references");
                Vec::new()
            }
        };
        let ids = references.iter().map(|r| r.paper_id.clone()).collect();

        PaperReferenceSet {
            paper,
            references,
            ids,
        }
    }

    async fn pick_key_reference(
        &self,
        sets: &[PaperReferenceSet<'_>],
        common: &[ReferenceEntry],
    ) -> Option<KeyReference> {
        match common {
            [] => None,
            [only] => Some(KeyReference {
                reference: only.clone(),
                reason: None,
                method: PickMethod::Direct,
            }),
            _ => {
                let prompt = build_pick_prompt(sets, common);
                let request = CompletionRequest::for_purpose(LlmPurpose::ReferencePick, prompt);
                let choice = match self.llm.complete(&request).await {
                    Ok(text) => parse_selected_index(&text, common.len()),
                    Err(e) => {
                        warn!(error = %e, "Reference pick failed");
                        None
                    }
                };

                Some(match choice {
                    Some(choice) => KeyReference {
                        reference: common[choice.index].clone(),
                        reason: choice.reason,
                        method: PickMethod::Llm,
                    },
                    None => {
                        record_fallback("reference_pick");
                        KeyReference {
                            reference: common[0].clone(),
                            reason: None,
                            method: PickMethod::Fallback,
                        }
                    }
                })
            }
        }
    }

    async fn explain(&self, sets: &[PaperReferenceSet<'_>], common_count: usize) -> String {
        let titles = sets
            .iter()
            .map(|s| format!("- {}", s.paper.title))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Explain the citation relationship between the following papers to a reader.\n\n\
             Papers:\n{titles}\n\n\
             Number of works cited by all of them: {common_count}\n\n\
             Describe how the papers relate and what research context they share. \
             If they cite common works, explain what that suggests. \
             Write two or three short paragraphs."
        );

        let request = CompletionRequest::for_purpose(LlmPurpose::RelationExplanation, prompt);
        match self.llm.complete(&request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Relation explanation failed");
                record_fallback("relation_explanation");
                String::new()
            }
        }
    }

    /// Write reference edges between stored papers, one unit per edge
    async fn persist_edges(&self, sets: &[PaperReferenceSet<'_>]) -> (Vec<Uuid>, usize) {
        let Some(store) = &self.store else {
            return (Vec::new(), 0);
        };

        let mut paper_ids = Vec::new();
        let mut written = 0;

        for set in sets {
            let citing = match set.paper.id {
                Some(id) => id,
                None => match store
                    .find_paper_by_external_id(&arxiv_key(set.paper.arxiv_id()))
                    .await
                {
                    Ok(Some(paper)) => paper.id,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(
                            arxiv_id = set.paper.arxiv_id(),
                            error = %e,
                            "Citing paper lookup failed, skipping its edges"
                        );
                        continue;
                    }
                },
            };
            paper_ids.push(citing);

            for reference in &set.references {
                let cited = match store.find_paper_by_external_id(&reference.storage_key()).await {
                    Ok(Some(paper)) if paper.id != citing => paper.id,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Cited paper lookup failed");
                        continue;
                    }
                };

                let edge = CitationEdgeRecord {
                    citing_paper_id: citing,
                    cited_paper_id: cited,
                    relation_type: REFERENCE_RELATION.to_string(),
                    is_influential: reference.is_influential,
                };
                match store.insert_citation_if_absent(&edge).await {
                    Ok(true) => written += 1,
                    Ok(false) => {}
                    Err(e) => warn!(
                        citing = %citing,
                        cited = %cited,
                        error = %e,
                        "Failed to store citation edge"
                    ),
                }
            }
        }

        if written > 0 {
            info!(written, "Citation edges stored");
        }
        (paper_ids, written)
    }
}

/// References present in every set, in the first set's order, capped
fn common_references(sets: &[PaperReferenceSet<'_>], cap: usize) -> Vec<ReferenceEntry> {
    let Some((first, rest)) = sets.split_first() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    first
        .references
        .iter()
        .filter(|r| rest.iter().all(|s| s.ids.contains(&r.paper_id)))
        .filter(|r| seen.insert(r.paper_id.clone()))
        .take(cap)
        .cloned()
        .collect()
}

/// Node id for an input paper: arXiv id, else storage id, else position
fn paper_node_id(paper: &RelationPaper, position: usize) -> String {
    match (paper.arxiv_id(), paper.id) {
        (arxiv_id, _) if !arxiv_id.is_empty() => arxiv_id.to_string(),
        (_, Some(id)) => id.to_string(),
        _ => format!("paper-{}", position + 1),
    }
}

fn build_graph(
    papers: &[RelationPaper],
    sets: &[PaperReferenceSet<'_>],
    common: &[ReferenceEntry],
) -> RelationGraph {
    let mut nodes: Vec<GraphNode> = papers
        .iter()
        .enumerate()
        .map(|(i, p)| GraphNode {
            id: paper_node_id(p, i),
            label: p.title.clone(),
            kind: NodeKind::Recommended,
        })
        .collect();

    nodes.extend(common.iter().enumerate().map(|(i, r)| GraphNode {
        id: r.paper_id.clone(),
        label: if r.title.trim().is_empty() {
            format!("Cited Paper {}", i + 1)
        } else {
            r.title.clone()
        },
        kind: NodeKind::CommonReference,
    }));

    // only where the paper itself lists the reference
    let edges = sets
        .iter()
        .flat_map(|s| {
            common
                .iter()
                .filter(|r| s.ids.contains(&r.paper_id))
                .map(|r| GraphEdge {
                    source: s.paper.arxiv_id().to_string(),
                    target: r.paper_id.clone(),
                    kind: "cites",
                })
        })
        .collect();

    RelationGraph {
        nodes,
        edges,
        common_citation_count: common.len(),
    }
}

fn build_pick_prompt(sets: &[PaperReferenceSet<'_>], common: &[ReferenceEntry]) -> String {
    let papers = sets
        .iter()
        .map(|s| format!("- {}", s.paper.title))
        .collect::<Vec<_>>()
        .join("\n");
    let options = common
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r.title))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The following papers were recommended to a reader today:\n{papers}\n\n\
         All of them cite these works:\n{options}\n\n\
         Pick the single work that best explains what connects the recommended papers.\n\
         Answer in exactly this format:\n\
         Selected index: <number>\n\
         Reason: <one sentence>"
    )
}
