//! staged walks over the graph
//!
//! A walk starts at the roots (blocks that can be resolved before planning first) and visits a
//! block once all its parents are ready. Blocks with an unresolved `for_each` are replaced by one
//! instance per element when they are reached, their edges are copied to every instance. The walk
//! itself never stops early, errors are collected.
use crate::block::{PlanContext, Resolution};
use crate::config::Configuration;
use crate::decode;
use crate::error::{Error, Errors};
use crate::raw_block::ForEach;
use crate::value::{self, ArrayKeys};
use std::collections::{HashSet, VecDeque};

type Callback = fn(&mut Configuration, &str) -> Result<(), Error>;

/// Resolve variables and locals, and expand what can be expanded already
pub(crate) fn run_pre_plan(config: &mut Configuration) -> Result<(), Errors> {
    walk(config, pre_plan)
}

/// Decode every block and run [PlanBlock](crate::block::PlanBlock)s
pub(crate) fn run_plan(config: &mut Configuration) -> Result<(), Errors> {
    walk(config, plan)
}

/// Run every [ApplyBlock](crate::block::ApplyBlock), parents first
pub(crate) fn run_apply(config: &mut Configuration) -> Result<(), Errors> {
    let eval = config.eval_context();
    let inputs = &config.inputs;

    config.dag.traverse(|block| {
        let cx = PlanContext {
            eval: block.base().bind_each(&eval),
            inputs,
        };
        match block.as_apply() {
            Some(apply) => apply.apply(&cx),
            None => Ok(()),
        }
    })
}

#[tracing::instrument(level = "debug", skip_all)]
fn walk(config: &mut Configuration, callback: Callback) -> Result<(), Errors> {
    let mut errors = Errors::new();
    let mut visited = HashSet::new();
    let mut pending = seed(config);

    while let Some(address) = pending.pop_front() {
        if !config.dag.contains(&address) {
            tracing::trace!(%address, "gone, expanded earlier");
            continue;
        }
        if visited.contains(&address) {
            continue;
        }

        let parents = config.dag.parents(&address).map_err(Errors::from)?;
        let waiting_for = parents
            .iter()
            .find(|parent| !config.dag.vertex(parent).is_some_and(|block| block.base().is_ready()));
        if let Some(parent) = waiting_for {
            tracing::trace!(%address, %parent, "waiting for parent");
            continue;
        }

        if config.dag.vertex(&address).is_some_and(|block| block.base().expandable()) {
            let children: Vec<String> = config
                .dag
                .children(&address)
                .map_err(Errors::from)?
                .iter()
                .cloned()
                .collect();

            let expanded = match expand_block(config, &address) {
                Ok(expanded) => expanded,
                Err(e) => {
                    errors.log(e.in_block(&address));
                    continue;
                }
            };

            let mut next: VecDeque<String> = expanded.into();
            next.extend(pending.drain(..));
            next.extend(children);
            pending = next;
            continue;
        }

        visited.insert(address.clone());
        tracing::trace!(%address, "ready");
        if let Err(e) = callback(config, &address) {
            errors.log(e.in_block(&address));
        }

        // the callback may have removed the vertex
        if let Ok(children) = config.dag.children(&address) {
            pending.extend(children.iter().cloned());
        }
    }

    errors.into_result()
}

/// Roots, those resolved before planning first
fn seed(config: &mut Configuration) -> VecDeque<String> {
    let (mut first, mut rest) = (VecDeque::new(), VecDeque::new());
    for root in config.dag.roots() {
        let pre_plan = config
            .dag
            .vertex_mut(&root)
            .is_some_and(|block| block.as_pre_plan().is_some());
        if pre_plan {
            first.push_back(root);
        } else {
            rest.push_back(root);
        }
    }
    first.append(&mut rest);
    first
}

/// Replace the block at `address` with one instance per `for_each` element
///
/// Every instance gets an edge from each ancestor of the original and an edge to each of its
/// children. Returns the addresses of the new instances, none for an empty collection.
#[tracing::instrument(level = "debug", skip(config))]
pub(crate) fn expand_block(
    config: &mut Configuration,
    address: &str,
) -> Result<Vec<String>, Error> {
    let eval = config.eval_context();
    let block = config
        .dag
        .vertex(address)
        .ok_or_else(|| Error::UnknownAddress(address.to_string()))?;
    let raw = block.base().raw().clone();
    let Some(attribute) = raw.attribute("for_each") else {
        return Ok(vec![]);
    };

    let collection = eval
        .evaluate(&attribute.expr)
        .map_err(|e| Error::evaluate(&attribute.range, e))?;
    let elements = value::elements(&collection, ArrayKeys::Elements).ok_or_else(|| {
        Error::ForEachNotIterable {
            got: value::type_name(&collection),
            range: attribute.range.clone(),
        }
    })?;

    let ancestors = config.dag.ancestors(address)?;
    let children = config.dag.children(address)?.clone();

    let mut expanded = Vec::with_capacity(elements.len());
    for (key, value) in elements {
        let instance = config.registry.construct(raw.with_for_each(ForEach::new(key, value)))?;
        let instance_address = instance.base().address();
        config.dag.add_vertex(instance_address.clone(), instance)?;

        for ancestor in &ancestors {
            config.dag.add_edge(ancestor, &instance_address)?;
        }
        for child in &children {
            config.dag.add_edge(&instance_address, child)?;
        }
        expanded.push(instance_address);
    }

    tracing::debug!(instances = expanded.len(), "expanded");
    config.dag.delete_vertex(address);
    Ok(expanded)
}

fn pre_plan(config: &mut Configuration, address: &str) -> Result<(), Error> {
    let eval = config.eval_context();
    let Some(block) = config.dag.vertex_mut(address) else {
        return Ok(());
    };
    if block.base().is_ready() {
        return Ok(());
    }

    let cx = PlanContext {
        eval: block.base().bind_each(&eval),
        inputs: &config.inputs,
    };
    let Some(pre_plan) = block.as_pre_plan() else {
        return Ok(());
    };

    match pre_plan.execute_before_plan(&cx)? {
        Resolution::Ready => block.base_mut().mark_ready(),
        Resolution::Deferred => tracing::debug!(%address, "deferred to plan"),
    }
    Ok(())
}

fn plan(config: &mut Configuration, address: &str) -> Result<(), Error> {
    let Some(block) = config.dag.vertex(address) else {
        return Ok(());
    };

    // resolved before planning, nothing left to decode
    if block.base().is_ready() {
        if let Some(block) = config.dag.vertex_mut(address) {
            block.base_mut().mark_decoded();
        }
        return Ok(());
    }

    decode::verify_depends_on(block.base().raw(), |address| config.valid_address(address))?;

    let eval = config.eval_context();
    let Some(block) = config.dag.vertex_mut(address) else {
        return Ok(());
    };
    decode::decode_verified(block, &eval)?;

    let cx = PlanContext {
        eval: block.base().bind_each(&eval),
        inputs: &config.inputs,
    };
    if let Some(plan) = block.as_plan() {
        plan.execute_during_plan(&cx)?;
    }

    block.base_mut().mark_decoded();
    block.base_mut().mark_ready();
    Ok(())
}
