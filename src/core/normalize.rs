// noveldup - core/normalize.rs
//
// Group normalizer (§4.5). Merges every pairwise relation produced by the
// relation detector into disjoint duplicate groups via union-find, then
// picks one deterministic keeper per group through a tie-break chain that
// always bottoms out at a total order (lexicographic path).

use crate::core::model::{DuplicateGroup, DuplicateType, Evidence, FileDescriptor, PairwiseRelation};
use crate::util::error::{EngineError, InternalError, NormalizeError};
use std::collections::{BTreeMap, HashMap, HashSet};

struct UnionFind {
    parent: HashMap<u64, u64>,
}

impl UnionFind {
    fn new() -> Self {
        Self { parent: HashMap::new() }
    }

    fn make_set(&mut self, id: u64) {
        self.parent.entry(id).or_insert(id);
    }

    fn find(&mut self, id: u64) -> u64 {
        let parent = *self.parent.get(&id).unwrap_or(&id);
        if parent == id {
            return id;
        }
        let root = self.find(parent);
        self.parent.insert(id, root);
        root
    }

    fn union(&mut self, a: u64, b: u64) {
        self.make_set(a);
        self.make_set(b);
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Lower id becomes the root, purely so result is deterministic
            // regardless of relation iteration order.
            if ra < rb {
                self.parent.insert(rb, ra);
            } else {
                self.parent.insert(ra, rb);
            }
        }
    }
}

/// Merge `relations` into disjoint [`DuplicateGroup`]s and assign keepers.
///
/// `descriptors` must contain every file_id referenced by `relations`; the
/// caller (the pipeline) guarantees this by construction.
pub fn normalize(
    relations: &[PairwiseRelation],
    descriptors: &HashMap<u64, FileDescriptor>,
) -> Result<Vec<DuplicateGroup>, EngineError> {
    let mut uf = UnionFind::new();

    for relation in relations {
        let members = relation.member_ids();
        for id in &members {
            uf.make_set(*id);
        }
        for pair in members.windows(2) {
            uf.union(pair[0], pair[1]);
        }
    }

    let mut components: HashMap<u64, HashSet<u64>> = HashMap::new();
    let ids: Vec<u64> = uf.parent.keys().copied().collect();
    for id in ids {
        let root = uf.find(id);
        components.entry(root).or_default().insert(id);
    }

    let mut relations_by_root: HashMap<u64, Vec<&PairwiseRelation>> = HashMap::new();
    for relation in relations {
        let members = relation.member_ids();
        if let Some(first) = members.first() {
            let root = uf.find(*first);
            relations_by_root.entry(root).or_default().push(relation);
        }
    }

    let mut component_lists: Vec<Vec<u64>> = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| {
            let mut v: Vec<u64> = members.into_iter().collect();
            v.sort_unstable();
            v
        })
        .collect();

    // Stable enumeration order: sort components by their smallest member id.
    component_lists.sort_by_key(|v| v[0]);

    let mut groups = Vec::with_capacity(component_lists.len());
    for (idx, file_ids) in component_lists.into_iter().enumerate() {
        let root = uf.find(file_ids[0]);
        let touching = relations_by_root.get(&root).cloned().unwrap_or_default();
        let group_id = (idx + 1) as u32;
        let group = build_group(group_id, file_ids, &touching, descriptors)?;
        groups.push(group);
    }

    validate(&groups, descriptors)?;
    Ok(groups)
}

fn build_group(
    group_id: u32,
    file_ids: Vec<u64>,
    touching: &[&PairwiseRelation],
    descriptors: &HashMap<u64, FileDescriptor>,
) -> Result<DuplicateGroup, EngineError> {
    let duplicate_type = infer_type(touching);
    let confidence = touching.iter().map(|r| r.confidence()).fold(0.0_f64, f64::max);

    let mut preferred_counts: HashMap<u64, u32> = HashMap::new();
    for relation in touching {
        match relation {
            PairwiseRelation::Containment { container_id, .. } => {
                *preferred_counts.entry(*container_id).or_insert(0) += 1;
            }
            PairwiseRelation::Version { newer_id, .. } => {
                *preferred_counts.entry(*newer_id).or_insert(0) += 1;
            }
            PairwiseRelation::Exact { file_ids, .. } => {
                for id in file_ids {
                    *preferred_counts.entry(*id).or_insert(0) += 1;
                }
            }
        }
    }

    let keeper = select_keeper(&file_ids, &preferred_counts, descriptors)?;
    let evidence = build_evidence(touching);

    Ok(DuplicateGroup {
        group_id,
        duplicate_type,
        file_ids,
        recommended_keeper_id: keeper,
        confidence,
        evidence,
    })
}

fn infer_type(touching: &[&PairwiseRelation]) -> DuplicateType {
    let mut types: HashSet<DuplicateType> = HashSet::new();
    for relation in touching {
        types.insert(match relation {
            PairwiseRelation::Containment { .. } => DuplicateType::Containment,
            PairwiseRelation::Version { .. } => DuplicateType::Version,
            PairwiseRelation::Exact { .. } => DuplicateType::Exact,
        });
    }
    match types.len() {
        1 => types.into_iter().next().unwrap(),
        _ => DuplicateType::Merged,
    }
}

/// Deterministic tie-break chain (§4.5): preferred count, then size, then
/// mtime, then lexicographically smallest path.
fn select_keeper(
    file_ids: &[u64],
    preferred_counts: &HashMap<u64, u32>,
    descriptors: &HashMap<u64, FileDescriptor>,
) -> Result<u64, EngineError> {
    let mut descs = Vec::with_capacity(file_ids.len());
    for id in file_ids {
        let descriptor = descriptors.get(id).ok_or_else(|| {
            EngineError::from(InternalError::InvariantViolated {
                context: "normalize::select_keeper",
                detail: format!("missing descriptor for file_id {id}"),
            })
        })?;
        descs.push(descriptor);
    }

    let winner = descs.into_iter().reduce(|current, candidate| {
        let candidate_count = preferred_counts.get(&candidate.file_id).copied().unwrap_or(0);
        let current_count = preferred_counts.get(&current.file_id).copied().unwrap_or(0);
        if better(candidate, candidate_count, current, current_count) {
            candidate
        } else {
            current
        }
    });

    winner.map(|d| d.file_id).ok_or_else(|| {
        EngineError::from(InternalError::InvariantViolated {
            context: "normalize::select_keeper",
            detail: "empty component".to_string(),
        })
    })
}

fn better(candidate: &FileDescriptor, candidate_count: u32, current: &FileDescriptor, current_count: u32) -> bool {
    if candidate_count != current_count {
        return candidate_count > current_count;
    }
    if candidate.size != current.size {
        return candidate.size > current.size;
    }
    if candidate.mtime != current.mtime {
        return candidate.mtime > current.mtime;
    }
    candidate.path < current.path
}

fn build_evidence(touching: &[&PairwiseRelation]) -> Evidence {
    let mut evidence: Evidence = BTreeMap::new();

    let mut types: Vec<&str> = touching
        .iter()
        .map(|r| match r {
            PairwiseRelation::Containment { .. } => "containment",
            PairwiseRelation::Version { .. } => "version",
            PairwiseRelation::Exact { .. } => "exact",
        })
        .collect();
    types.sort_unstable();
    types.dedup();

    evidence.insert("duplicate_types".to_string(), types.join(","));
    evidence.insert("original_groups_count".to_string(), touching.len().to_string());

    let merged: Vec<serde_json::Value> = touching
        .iter()
        .map(|r| match r {
            PairwiseRelation::Containment {
                container_id,
                contained_id,
                evidence,
                confidence,
            } => serde_json::json!({
                "type": "containment",
                "container_id": container_id,
                "contained_id": contained_id,
                "confidence": confidence,
                "evidence": evidence,
            }),
            PairwiseRelation::Version {
                newer_id,
                older_id,
                evidence,
                confidence,
            } => serde_json::json!({
                "type": "version",
                "newer_id": newer_id,
                "older_id": older_id,
                "confidence": confidence,
                "evidence": evidence,
            }),
            PairwiseRelation::Exact {
                file_ids,
                evidence,
                confidence,
            } => serde_json::json!({
                "type": "exact",
                "file_ids": file_ids,
                "confidence": confidence,
                "evidence": evidence,
            }),
        })
        .collect();

    evidence.insert(
        "merged_evidence".to_string(),
        serde_json::to_string(&merged).unwrap_or_default(),
    );

    evidence
}

/// Enforce the cross-group invariants (§4.5). Any violation indicates a bug
/// in the merge above, not bad input, so it aborts the run.
fn validate(groups: &[DuplicateGroup], descriptors: &HashMap<u64, FileDescriptor>) -> Result<(), EngineError> {
    let mut seen: HashSet<u64> = HashSet::new();

    for group in groups {
        if group.file_ids.len() < 2 {
            return Err(EngineError::from(InternalError::InvariantViolated {
                context: "normalize::validate",
                detail: format!("group {} has fewer than 2 members", group.group_id),
            }));
        }

        if !group.file_ids.contains(&group.recommended_keeper_id) {
            return Err(EngineError::from(NormalizeError::KeeperNotInGroup {
                group_id: group.group_id,
                keeper_id: group.recommended_keeper_id,
            }));
        }

        let mut ids_in_group: HashSet<u64> = HashSet::new();
        let mut paths_in_group: HashSet<&std::path::Path> = HashSet::new();
        for id in &group.file_ids {
            if !ids_in_group.insert(*id) {
                return Err(EngineError::from(NormalizeError::DuplicateFileInGroup {
                    group_id: group.group_id,
                    file_id: *id,
                }));
            }
            if !seen.insert(*id) {
                return Err(EngineError::from(NormalizeError::FileInMultipleGroups { file_id: *id }));
            }
            if let Some(descriptor) = descriptors.get(id) {
                if !paths_in_group.insert(descriptor.path.as_path()) {
                    return Err(EngineError::from(NormalizeError::DuplicatePathInGroup {
                        group_id: group.group_id,
                        path: descriptor.path.clone(),
                    }));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn descriptor(id: u64, size: u64, secs: i64, path: &str) -> FileDescriptor {
        FileDescriptor {
            file_id: id,
            path: PathBuf::from(path),
            name: path.to_string(),
            extension: ".txt".to_string(),
            size,
            mtime: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn evidence() -> Evidence {
        BTreeMap::new()
    }

    #[test]
    fn containment_group_keeps_container() {
        let descriptors: HashMap<u64, FileDescriptor> = [
            (1, descriptor(1, 200_000, 1000, "/a/1.txt")),
            (2, descriptor(2, 280_000, 1001, "/a/2.txt")),
        ]
        .into_iter()
        .collect();

        let relations = vec![PairwiseRelation::Containment {
            container_id: 2,
            contained_id: 1,
            evidence: evidence(),
            confidence: 0.90,
        }];

        let groups = normalize(&relations, &descriptors).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].file_ids, vec![1, 2]);
        assert_eq!(groups[0].recommended_keeper_id, 2);
        assert_eq!(groups[0].duplicate_type, DuplicateType::Containment);
    }

    #[test]
    fn chained_relations_merge_into_one_group() {
        let descriptors: HashMap<u64, FileDescriptor> = [
            (1, descriptor(1, 10_000_000, 2000, "/a/1.txt")),
            (2, descriptor(2, 8_000_000, 1000, "/a/2.txt")),
            (3, descriptor(3, 9_000_000, 1500, "/a/3.txt")),
        ]
        .into_iter()
        .collect();

        let relations = vec![
            PairwiseRelation::Containment {
                container_id: 1,
                contained_id: 2,
                evidence: evidence(),
                confidence: 0.90,
            },
            PairwiseRelation::Version {
                newer_id: 1,
                older_id: 3,
                evidence: evidence(),
                confidence: 0.85,
            },
        ];

        let groups = normalize(&relations, &descriptors).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].file_ids, vec![1, 2, 3]);
        assert_eq!(groups[0].duplicate_type, DuplicateType::Merged);
        assert_eq!(groups[0].recommended_keeper_id, 1);
        assert!((groups[0].confidence - 0.90).abs() < 1e-9);
    }

    #[test]
    fn tie_break_falls_through_to_path() {
        let descriptors: HashMap<u64, FileDescriptor> = [
            (1, descriptor(1, 100_000, 1000, "/z/1.txt")),
            (2, descriptor(2, 100_000, 1000, "/a/2.txt")),
        ]
        .into_iter()
        .collect();

        // Neither has a preferred-side relation pointing at it (an Exact
        // clique gives both ids a count), same size, same mtime -- so the
        // lexicographically smaller path wins.
        let relations = vec![PairwiseRelation::Exact {
            file_ids: vec![1, 2],
            evidence: evidence(),
            confidence: 1.0,
        }];

        let groups = normalize(&relations, &descriptors).unwrap();
        assert_eq!(groups[0].recommended_keeper_id, 2);
    }

    #[test]
    fn no_relations_means_no_groups() {
        let descriptors: HashMap<u64, FileDescriptor> = HashMap::new();
        let groups = normalize(&[], &descriptors).unwrap();
        assert!(groups.is_empty());
    }
}
