use tracing::{debug, warn};

use super::types::{BatchResult, FailurePolicy, ProjectInput, RankedProject, SkippedProject};
use crate::error::{ContractResult, ErrorBody};
use crate::scoring::{FactorSet, Scorer};

/// Score every project and return them ranked.
///
/// Under `Abort` the first invalid project fails the whole batch, with the
/// offending field prefixed by `projects[i]`. Under `Skip` invalid projects
/// are listed in `skipped` and the rest are still ranked.
pub fn assemble(
    projects: &[ProjectInput],
    scorer: &Scorer,
    policy: FailurePolicy,
) -> ContractResult<BatchResult> {
    let mut results = Vec::with_capacity(projects.len());
    let mut skipped = Vec::new();

    for (index, project) in projects.iter().enumerate() {
        match score_project(project, scorer) {
            Ok(ranked) => results.push(ranked),
            Err(e) => {
                let e = e.within(&format!("projects[{}]", index));
                match policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Skip => {
                        warn!(index, id = %project.id, error = %e, "skipping invalid project");
                        skipped.push(SkippedProject {
                            index,
                            id: Some(project.id.clone()),
                            error: ErrorBody::from(&e),
                        });
                    }
                }
            }
        }
    }

    rank(&mut results);
    debug!(
        scored = results.len(),
        skipped = skipped.len(),
        "assembled batch result"
    );

    Ok(BatchResult {
        total_projects: results.len(),
        results,
        skipped,
    })
}

fn score_project(project: &ProjectInput, scorer: &Scorer) -> ContractResult<RankedProject> {
    let factors = FactorSet::from_named(&project.factors, scorer.out_of_range())?;
    let priority = scorer.aggregate(&factors)?;
    Ok(RankedProject {
        id: project.id.clone(),
        name: project.name.clone(),
        area: project.area.clone(),
        sponsor: project.sponsor.clone(),
        priority,
    })
}

/// Sort by score descending. `sort_by` is stable, so ties keep input order.
pub fn rank(results: &mut [RankedProject]) {
    results.sort_by(|a, b| b.score().cmp(&a.score()));
}
