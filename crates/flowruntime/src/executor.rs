use crate::graph::{self, NodeHandle};
use crate::manager::NodeManager;
use chrono::Utc;
use flowcore::{ExecutionEvent, FlowError, NodeStatus, ProcessContext, RunId};
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use std::collections::HashSet;
use std::time::Instant;

/// Outcome of one `run` / `run_all` invocation
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    /// Nodes whose `process` ran, in execution order
    pub executed: Vec<String>,
    /// Nodes left waiting because an input had no data
    pub skipped: Vec<String>,
    pub duration_ms: u64,
}

impl NodeManager {
    /// Run `handle` and everything downstream of it in dependency order.
    ///
    /// With `notify_children` the downstream nodes are invalidated first, so
    /// nothing stale survives even when a node ends up skipped.
    pub fn run(&mut self, handle: NodeHandle, notify_children: bool) -> Result<RunReport, FlowError> {
        let start = self.index(handle)?;
        if notify_children {
            self.invalidate(&[start], false);
        }
        let targets = graph::forward_closure(&self.graph, &[start]);
        let starts: HashSet<NodeIndex> = [start].into_iter().collect();
        self.execute(&starts, &targets)
    }

    /// Run every node. Nodes without inbound connections are the start nodes;
    /// values placed on their outputs from outside are kept.
    pub fn run_all(&mut self, notify_children: bool) -> Result<RunReport, FlowError> {
        let roots = graph::roots(&self.graph);
        if notify_children {
            self.invalidate(&roots, false);
        }
        let targets: HashSet<NodeIndex> = self.graph.node_indices().collect();
        let starts: HashSet<NodeIndex> = roots.into_iter().collect();
        self.execute(&starts, &targets)
    }

    fn execute(
        &mut self,
        starts: &HashSet<NodeIndex>,
        targets: &HashSet<NodeIndex>,
    ) -> Result<RunReport, FlowError> {
        let run_id = RunId::new_v4();
        let started = Instant::now();
        let order = graph::topological_order(&self.graph, targets);

        tracing::info!("Starting run {} over {} nodes", run_id, order.len());
        self.emit(ExecutionEvent::RunStarted {
            run_id,
            targets: order.len(),
            timestamp: Utc::now(),
        });

        let mut executed: HashSet<NodeIndex> = HashSet::new();
        let mut report = RunReport {
            run_id,
            executed: Vec::new(),
            skipped: Vec::new(),
            duration_ms: 0,
        };

        for n in order {
            let upstream_ran = self
                .graph
                .neighbors_directed(n, Direction::Incoming)
                .any(|p| executed.contains(&p));
            let entry = &mut self.graph[n];
            if !starts.contains(&n) && !upstream_ran && entry.status == NodeStatus::Done {
                tracing::debug!("Node {} is up to date", entry.name);
                continue;
            }

            entry.status = NodeStatus::Waiting;
            if !entry.inputs_ready() {
                tracing::debug!("Node {} is missing input data, skipping", entry.name);
                let name = entry.name.clone();
                self.emit(ExecutionEvent::NodeSkipped {
                    run_id,
                    node: name.clone(),
                    timestamp: Utc::now(),
                });
                report.skipped.push(name);
                continue;
            }
            entry.status = NodeStatus::Ready;

            let name = entry.name.clone();
            let node_type = entry.node_type.clone();
            self.emit(ExecutionEvent::NodeStarted {
                run_id,
                node: name.clone(),
                node_type,
                timestamp: Utc::now(),
            });

            let node_started = Instant::now();
            let result = {
                let globals = &self.globals;
                let entry = &mut self.graph[n];
                let mut ctx = ProcessContext::new(
                    &entry.name,
                    &entry.inputs,
                    &mut entry.outputs,
                    &entry.params,
                    globals,
                );
                entry.node.process(&mut ctx)
            };
            let duration_ms = node_started.elapsed().as_millis() as u64;

            if let Err(e) = result {
                tracing::error!("Node {} failed: {}", name, e);
                self.graph[n].status = NodeStatus::Error;
                self.emit(ExecutionEvent::NodeFailed {
                    run_id,
                    node: name.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.emit(ExecutionEvent::RunCompleted {
                    run_id,
                    success: false,
                    executed: report.executed.len(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });
                return Err(FlowError::node(name, e));
            }

            self.push_outputs(n);
            self.graph[n].status = NodeStatus::Done;
            executed.insert(n);
            tracing::debug!("Node {} completed in {}ms", name, duration_ms);
            self.emit(ExecutionEvent::NodeCompleted {
                run_id,
                node: name.clone(),
                duration_ms,
                timestamp: Utc::now(),
            });
            report.executed.push(name);
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Run {} finished: {} executed, {} skipped in {}ms",
            run_id,
            report.executed.len(),
            report.skipped.len(),
            report.duration_ms
        );
        self.emit(ExecutionEvent::RunCompleted {
            run_id,
            success: true,
            executed: report.executed.len(),
            duration_ms: report.duration_ms,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}
