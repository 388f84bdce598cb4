// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generation tracking of workload children.
//!
//! `status.children` records the `metadata.generation` of each workload the
//! reconciler last wrote. A live generation that differs from the recorded one
//! means the object was changed by someone else and must be re-applied. An
//! object with no record gets `-1`, which never matches a live generation.

use crate::crd::{CSIDriverDeployment, GenerationHistory};
use crate::store::StoreObject;
use kube::{Resource, ResourceExt};

/// Generation `obj` had when the reconciler last wrote it, or `-1` if unknown.
#[must_use]
pub fn expected_generation<K: StoreObject>(cr: &CSIDriverDeployment, obj: &K) -> i64 {
    let group = K::group(&());
    let resource = K::kind(&());
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    cr.status
        .as_ref()
        .and_then(|status| {
            status.children.iter().find(|child| {
                child.group == group
                    && child.resource == resource
                    && child.namespace == namespace
                    && child.name == name
            })
        })
        .map_or(-1, |child| child.last_generation)
}

/// Record the generation of `obj`, replacing an existing entry for the same
/// object or appending a new one.
pub fn set_generation<K: StoreObject>(children: &mut Vec<GenerationHistory>, obj: &K) {
    let entry = GenerationHistory {
        group: K::group(&()).to_string(),
        resource: K::kind(&()).to_string(),
        namespace: obj.namespace().unwrap_or_default(),
        name: obj.name_any(),
        last_generation: obj.meta().generation.unwrap_or_default(),
    };

    match children.iter_mut().find(|child| {
        child.group == entry.group
            && child.resource == entry.resource
            && child.namespace == entry.namespace
            && child.name == entry.name
    }) {
        Some(existing) => existing.last_generation = entry.last_generation,
        None => children.push(entry),
    }
}

/// Whether the resource spec changed since the last fully successful pass.
#[must_use]
pub fn generation_changed(cr: &CSIDriverDeployment) -> bool {
    let observed = cr.status.as_ref().and_then(|s| s.observed_generation);
    observed.is_none() || observed != cr.metadata.generation
}

#[cfg(test)]
#[path = "generation_tests.rs"]
mod generation_tests;
