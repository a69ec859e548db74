//! Off-thread damage processing.
//!
//! Fracture work for a cluster runs on the worker pool against a snapshot of
//! its grid. Requests for the same cluster are serialized in submission
//! order; different clusters run in parallel. Results are committed to the
//! graph only from [`DamageScheduler::poll`], on the caller's thread.

use std::collections::VecDeque;

use glam::Vec3;
use hashbrown::HashMap;
use splinter_core::{spawn_pass, CancelToken, Error, PassHandle, Result};

use crate::cluster::ClusterId;
use crate::graph::{DamageReport, DamageResult, DestructionGraph};

/// Identifies one submitted damage request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DamageTicket(pub u64);

/// A damage event in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageRequest {
    pub cluster: ClusterId,
    pub point: Vec3,
    pub radius: f32,
}

impl DamageRequest {
    pub fn new(cluster: ClusterId, point: Vec3, radius: f32) -> Self {
        Self {
            cluster,
            point,
            radius,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    ticket: DamageTicket,
    handle: PassHandle<DamageResult>,
}

/// Queues damage per cluster and runs at most one job per cluster at a time.
#[derive(Debug, Default)]
pub struct DamageScheduler {
    queued: HashMap<ClusterId, VecDeque<(DamageTicket, DamageRequest)>>,
    in_flight: HashMap<ClusterId, InFlight>,
    next_ticket: u64,
}

impl DamageScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. Work starts on the next [`Self::poll`].
    pub fn submit(
        &mut self,
        graph: &DestructionGraph,
        request: DamageRequest,
    ) -> Result<DamageTicket> {
        if graph.cluster(request.cluster).is_none() {
            return Err(Error::UnknownCluster(request.cluster.0));
        }
        let ticket = DamageTicket(self.next_ticket);
        self.next_ticket += 1;
        self.queued
            .entry(request.cluster)
            .or_default()
            .push_back((ticket, request));
        tracing::trace!(?ticket, cluster = %request.cluster, "damage queued");
        Ok(ticket)
    }

    /// Commit finished jobs and start the next queued job for each idle
    /// cluster. Finished jobs are committed in cluster id order.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn poll(
        &mut self,
        graph: &mut DestructionGraph,
    ) -> Vec<(DamageTicket, Result<DamageReport>)> {
        let mut finished = Vec::new();
        let mut done: Vec<ClusterId> = Vec::new();
        for (&cluster, job) in &self.in_flight {
            match job.handle.try_take() {
                Ok(None) => {}
                Ok(Some(result)) => {
                    done.push(cluster);
                    finished.push((cluster, job.ticket, Ok(result)));
                }
                Err(err) => {
                    done.push(cluster);
                    finished.push((cluster, job.ticket, Err(err)));
                }
            }
        }
        for cluster in done {
            self.in_flight.remove(&cluster);
        }
        finished.sort_by_key(|(cluster, ..)| *cluster);

        let reports = finished
            .into_iter()
            .map(|(cluster, ticket, result)| {
                let report = result.and_then(|r| graph.commit_damage(cluster, r));
                (ticket, report)
            })
            .collect();

        self.start_idle(graph);
        reports
    }

    fn start_idle(&mut self, graph: &DestructionGraph) {
        let mut ready: Vec<ClusterId> = self
            .queued
            .keys()
            .filter(|id| !self.in_flight.contains_key(*id))
            .copied()
            .collect();
        ready.sort_unstable();

        for id in ready {
            let Some(queue) = self.queued.get_mut(&id) else {
                continue;
            };
            let Some((ticket, request)) = queue.pop_front() else {
                continue;
            };
            if queue.is_empty() {
                self.queued.remove(&id);
            }
            let Some(cluster) = graph.cluster(id) else {
                continue;
            };
            // Snapshot taken now so queued hits see every earlier commit.
            let grid = cluster.grid().copy();
            let placement = *cluster.placement();
            let policy = graph.policy().clone();
            let handle = spawn_pass("damage", CancelToken::new(), move |token| {
                token.check().ok()?;
                Some(DamageResult::compute(
                    policy.as_ref(),
                    grid,
                    &placement,
                    request.point,
                    request.radius,
                ))
            });
            self.in_flight.insert(id, InFlight { ticket, handle });
        }
    }

    /// Drop a request. A running job is cancelled and its result discarded.
    /// Returns false if the ticket is unknown or already reported.
    pub fn cancel(&mut self, ticket: DamageTicket) -> bool {
        let queued = self.queued.iter().find_map(|(&id, queue)| {
            queue
                .iter()
                .position(|(t, _)| *t == ticket)
                .map(|i| (id, i))
        });
        if let Some((id, i)) = queued {
            if let Some(queue) = self.queued.get_mut(&id) {
                queue.remove(i);
                if queue.is_empty() {
                    self.queued.remove(&id);
                }
            }
            return true;
        }
        let running = self
            .in_flight
            .iter()
            .find_map(|(&id, job)| (job.ticket == ticket).then_some(id));
        if let Some(id) = running {
            if let Some(job) = self.in_flight.remove(&id) {
                job.handle.cancel();
                tracing::debug!(?ticket, cluster = %id, "damage cancelled in flight");
            }
            return true;
        }
        false
    }

    /// Block until every queued and running request has been committed.
    pub fn flush(
        &mut self,
        graph: &mut DestructionGraph,
    ) -> Vec<(DamageTicket, Result<DamageReport>)> {
        let mut reports = Vec::new();
        while !self.is_idle() {
            let batch = self.poll(graph);
            if batch.is_empty() {
                std::thread::yield_now();
            }
            reports.extend(batch);
        }
        reports
    }

    /// Requests for `cluster` not yet reported, running or queued.
    pub fn pending(&self, cluster: ClusterId) -> usize {
        usize::from(self.in_flight.contains_key(&cluster))
            + self.queued.get(&cluster).map_or(0, VecDeque::len)
    }

    pub fn is_idle(&self) -> bool {
        self.queued.is_empty() && self.in_flight.is_empty()
    }
}
